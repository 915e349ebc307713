//! Per-sample trimming processors.
//!
//! These `Unordered` stages run the alignment engine, optional collapsing
//! and quality trimming over each chunk of classified reads, route every
//! read to its output class and update per-worker statistics borrowed from a
//! [`SinkPool`].

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::adapters::AdapterPair;
use crate::alignment::{
    align_paired_end, align_single_end, truncate_paired_end, truncate_single_end,
};
use crate::chunks::{Chunk, OutputChunk, ReadChunk};
use crate::collapse::collapse_paired_end;
use crate::config::{AlignmentVerdict, UserConfig};
use crate::errors::{PipelineError, Result};
use crate::fastq::FastqRecord;
use crate::scheduler::{PipelineStep, StepId, StepOrdering};
use crate::sink::SinkPool;
use crate::stats::{ReadClass, TrimStatistics};

/// Resolved output edges for one sample's processor.
///
/// Optional edges are absent when the corresponding output class does not
/// exist under the current configuration (no mate 2 file in single-end or
/// interleaved-output mode, no collapsed outputs without `--collapse`).
#[derive(Debug, Clone)]
pub struct SampleEdges {
    /// Mate 1 / single-end output
    pub mate_1: StepId,
    /// Mate 2 output
    pub mate_2: Option<StepId>,
    /// Singleton output
    pub singleton: Option<StepId>,
    /// Full-length collapsed output
    pub collapsed: Option<StepId>,
    /// Quality-trimmed collapsed output
    pub collapsed_truncated: Option<StepId>,
    /// Discarded-read output
    pub discarded: StepId,
}

/// Output chunks under construction for one input chunk.
///
/// One chunk is emitted per live edge per input chunk, empty or not, so
/// every writer sees the dense chunk sequence and can stay ordered.
struct OutputSet<'a> {
    edges: &'a SampleEdges,
    config: &'a UserConfig,
    mate_1: OutputChunk,
    mate_2: Option<OutputChunk>,
    singleton: Option<OutputChunk>,
    collapsed: Option<OutputChunk>,
    collapsed_truncated: Option<OutputChunk>,
    discarded: OutputChunk,
}

impl<'a> OutputSet<'a> {
    fn new(edges: &'a SampleEdges, config: &'a UserConfig, eof: bool) -> Self {
        Self {
            edges,
            config,
            mate_1: OutputChunk::empty(eof),
            mate_2: edges.mate_2.map(|_| OutputChunk::empty(eof)),
            singleton: edges.singleton.map(|_| OutputChunk::empty(eof)),
            collapsed: edges.collapsed.map(|_| OutputChunk::empty(eof)),
            collapsed_truncated: edges.collapsed_truncated.map(|_| OutputChunk::empty(eof)),
            discarded: OutputChunk::empty(eof),
        }
    }

    fn add(chunk: &mut OutputChunk, config: &UserConfig, read: &FastqRecord, nreads: usize) {
        read.encode_into(&mut chunk.bytes, config.quality_output_fmt);
        chunk.nreads += nreads;
    }

    fn add_mate_1(&mut self, read: &FastqRecord) {
        Self::add(&mut self.mate_1, self.config, read, 1);
    }

    fn add_mate_2(&mut self, read: &FastqRecord) {
        match self.mate_2.as_mut() {
            // Interleaved output folds mate 2 into the mate 1 file
            None => Self::add(&mut self.mate_1, self.config, read, 1),
            Some(chunk) => Self::add(chunk, self.config, read, 1),
        }
    }

    fn add_singleton(&mut self, read: &FastqRecord) {
        if let Some(chunk) = self.singleton.as_mut() {
            Self::add(chunk, self.config, read, 1);
        }
    }

    fn add_collapsed(&mut self, read: &FastqRecord, truncated: bool, nreads: usize) {
        let chunk = if truncated {
            self.collapsed_truncated.as_mut()
        } else {
            self.collapsed.as_mut()
        };
        if let Some(chunk) = chunk {
            Self::add(chunk, self.config, read, nreads);
        }
    }

    fn add_discarded(&mut self, read: &FastqRecord, nreads: usize) {
        Self::add(&mut self.discarded, self.config, read, nreads);
    }

    fn into_routes(self) -> Vec<(StepId, Chunk)> {
        let mut routes = vec![(self.edges.mate_1, Chunk::Bytes(self.mate_1))];
        if let (Some(id), Some(chunk)) = (self.edges.mate_2, self.mate_2) {
            routes.push((id, Chunk::Bytes(chunk)));
        }
        if let (Some(id), Some(chunk)) = (self.edges.singleton, self.singleton) {
            routes.push((id, Chunk::Bytes(chunk)));
        }
        if let (Some(id), Some(chunk)) = (self.edges.collapsed, self.collapsed) {
            routes.push((id, Chunk::Bytes(chunk)));
        }
        if let (Some(id), Some(chunk)) = (self.edges.collapsed_truncated, self.collapsed_truncated)
        {
            routes.push((id, Chunk::Bytes(chunk)));
        }
        routes.push((self.edges.discarded, Chunk::Bytes(self.discarded)));
        routes
    }
}

/// Quality-trim a consensus read, mark its header and route it.
///
/// The prefix records whether quality trimming changed the consensus:
/// `M_` for full-length, `MT_` for truncated. A collapsed pair counts as two
/// reads in the output tallies of paired-end mode.
fn process_collapsed_read(
    config: &UserConfig,
    stats: &mut TrimStatistics,
    mut read: FastqRecord,
    outputs: &mut OutputSet<'_>,
) {
    let (left, right) = config.trim_read_if_enabled(&mut read);
    let was_truncated = left > 0 || right > 0;

    read.add_prefix_to_header(if was_truncated { "MT_" } else { "M_" });

    let read_count = if config.paired_ended_mode { 2 } else { 1 };
    if config.is_acceptable_read(&read) {
        stats.retained_nucleotides += read.len() as u64;
        stats.retained_reads += 1;
        stats.count_length(
            if was_truncated { ReadClass::CollapsedTruncated } else { ReadClass::Collapsed },
            read.len(),
        );

        if was_truncated {
            stats.collapsed_truncated += 1;
        } else {
            stats.collapsed_full_length += 1;
        }
        outputs.add_collapsed(&read, was_truncated, read_count);
    } else {
        stats.discarded_mate1 += 1;
        if config.paired_ended_mode {
            stats.discarded_mate2 += 1;
        }
        stats.count_length(ReadClass::Discarded, read.len());
        outputs.add_discarded(&read, read_count);
    }
}

fn expect_reads(chunk: Chunk, stage: &str) -> Result<ReadChunk> {
    match chunk {
        Chunk::Reads(reads) => Ok(reads),
        _ => Err(PipelineError::SchedulerCancelled(format!(
            "{stage} received a chunk of unexpected type"
        ))),
    }
}

/// Trimming processor for single-end reads.
pub struct SingleEndProcessor {
    config: Arc<UserConfig>,
    adapters: Vec<AdapterPair>,
    edges: SampleEdges,
    stats: SinkPool<TrimStatistics>,
}

impl SingleEndProcessor {
    /// Build the processor for one sample.
    #[must_use]
    pub fn new(config: Arc<UserConfig>, edges: SampleEdges) -> Self {
        let adapters = config.adapters.adapters().to_vec();
        let stats = {
            let config = Arc::clone(&config);
            SinkPool::new(move || config.new_statistics())
        };
        Self { config, adapters, edges, stats }
    }

    /// Reduce the per-worker statistics into the final per-sample totals.
    #[must_use]
    pub fn final_statistics(&self) -> TrimStatistics {
        *self.stats.finalize(|dst, src| dst.merge(&src))
    }
}

impl PipelineStep for SingleEndProcessor {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Unordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let reads = expect_reads(chunk, "single-end processor")?;
        let config = &*self.config;

        let mut stats = self.stats.get();
        let mut outputs = OutputSet::new(&self.edges, config, reads.eof);
        stats.records += reads.reads_1.len() as u64;

        for mut read in reads.reads_1 {
            let alignment = align_single_end(&read, &self.adapters, config.shift);

            if config.evaluate_alignment(&alignment) == AlignmentVerdict::Good {
                truncate_single_end(&alignment, &mut read);
                stats.adapter_hits[alignment.adapter_id] += 1;
                stats.well_aligned += 1;

                if config.is_alignment_collapsible(&alignment) {
                    process_collapsed_read(config, &mut stats, read, &mut outputs);
                    continue;
                }
            } else {
                stats.unaligned += 1;
            }

            config.trim_read_if_enabled(&mut read);
            if config.is_acceptable_read(&read) {
                stats.singleton_mate1 += 1;
                stats.retained_reads += 1;
                stats.retained_nucleotides += read.len() as u64;
                stats.count_length(ReadClass::Mate1, read.len());
                outputs.add_mate_1(&read);
            } else {
                stats.discarded_mate1 += 1;
                stats.count_length(ReadClass::Discarded, read.len());
                outputs.add_discarded(&read, 1);
            }
        }

        self.stats.put(stats);
        Ok(outputs.into_routes())
    }
}

/// Trimming processor for paired-end reads.
pub struct PairedEndProcessor {
    config: Arc<UserConfig>,
    adapters: Vec<AdapterPair>,
    edges: SampleEdges,
    stats: SinkPool<TrimStatistics>,
    rngs: SinkPool<StdRng>,
}

impl PairedEndProcessor {
    /// Build the processor for one sample.
    ///
    /// Each worker draws its own RNG stream, seeded from a seed generator
    /// driven by the configured master seed.
    #[must_use]
    pub fn new(config: Arc<UserConfig>, edges: SampleEdges) -> Self {
        let adapters = config.adapters.adapters().to_vec();
        let stats = {
            let config = Arc::clone(&config);
            SinkPool::new(move || config.new_statistics())
        };
        let mut seeder = StdRng::seed_from_u64(config.seed);
        let rngs = SinkPool::new(move || StdRng::seed_from_u64(seeder.random::<u64>()));

        Self { config, adapters, edges, stats, rngs }
    }

    /// Reduce the per-worker statistics into the final per-sample totals.
    #[must_use]
    pub fn final_statistics(&self) -> TrimStatistics {
        *self.stats.finalize(|dst, src| dst.merge(&src))
    }
}

impl PipelineStep for PairedEndProcessor {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Unordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let reads = expect_reads(chunk, "paired-end processor")?;
        let config = &*self.config;

        if reads.reads_1.len() != reads.reads_2.len() {
            return Err(PipelineError::SchedulerCancelled(
                "paired chunk with unequal mate counts".into(),
            ));
        }

        let mut stats = self.stats.get();
        let mut rng = self.rngs.get();
        let mut outputs = OutputSet::new(&self.edges, config, reads.eof);
        stats.records += reads.reads_1.len() as u64;

        for (mut read_1, mut read_2) in reads.reads_1.into_iter().zip(reads.reads_2) {
            FastqRecord::validate_paired(&read_1, &read_2, config.mate_separator)?;

            // Match read1's orientation for alignment and collapsing
            read_2.reverse_complement();

            let alignment = align_paired_end(&read_1, &read_2, &self.adapters, config.shift);

            if config.evaluate_alignment(&alignment) == AlignmentVerdict::Good {
                stats.well_aligned += 1;
                let adapters_hit = truncate_paired_end(&alignment, &mut read_1, &mut read_2);
                stats.adapter_hits[alignment.adapter_id] += adapters_hit as u64;

                if config.is_alignment_collapsible(&alignment) {
                    let consensus = collapse_paired_end(
                        &alignment,
                        &read_1,
                        &read_2,
                        &mut rng,
                        config.quality_output_fmt.max_score(),
                    );
                    process_collapsed_read(config, &mut stats, consensus, &mut outputs);
                    continue;
                }
            } else {
                stats.unaligned += 1;
            }

            // Restore mate 2 orientation now that adapters are gone
            read_2.reverse_complement();

            config.trim_read_if_enabled(&mut read_1);
            config.trim_read_if_enabled(&mut read_2);
            let acceptable_1 = config.is_acceptable_read(&read_1);
            let acceptable_2 = config.is_acceptable_read(&read_2);

            stats.retained_reads += u64::from(acceptable_1) + u64::from(acceptable_2);
            stats.retained_nucleotides +=
                if acceptable_1 { read_1.len() as u64 } else { 0 };
            stats.retained_nucleotides +=
                if acceptable_2 { read_2.len() as u64 } else { 0 };

            if acceptable_1 && acceptable_2 {
                outputs.add_mate_1(&read_1);
                outputs.add_mate_2(&read_2);
                stats.count_length(ReadClass::Mate1, read_1.len());
                stats.count_length(ReadClass::Mate2, read_2.len());
            } else {
                stats.singleton_mate1 += u64::from(acceptable_1);
                stats.singleton_mate2 += u64::from(acceptable_2);
                stats.discarded_mate1 += u64::from(!acceptable_1);
                stats.discarded_mate2 += u64::from(!acceptable_2);
                stats.count_length(
                    if acceptable_1 { ReadClass::Mate1 } else { ReadClass::Discarded },
                    read_1.len(),
                );
                stats.count_length(
                    if acceptable_2 { ReadClass::Mate2 } else { ReadClass::Discarded },
                    read_2.len(),
                );

                if acceptable_1 {
                    outputs.add_singleton(&read_1);
                } else {
                    outputs.add_discarded(&read_1, 1);
                }
                if acceptable_2 {
                    outputs.add_singleton(&read_2);
                } else {
                    outputs.add_discarded(&read_2, 1);
                }
            }
        }

        self.stats.put(stats);
        self.rngs.put(rng);
        Ok(outputs.into_routes())
    }
}
