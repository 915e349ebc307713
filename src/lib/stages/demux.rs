//! Demultiplexing stage.
//!
//! Classifies each incoming read (pair) by barcode and routes it to the
//! matching sample's trimming stage with the barcode bases stripped.
//! Unidentified and ambiguous reads are serialized unmodified and routed to
//! the unidentified writers. One chunk is emitted per sample (and per
//! unidentified writer) for every input chunk, keeping edge sequences dense.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunks::{Chunk, OutputChunk, ReadChunk};
use crate::config::UserConfig;
use crate::demux::{BarcodeMatch, BarcodeTable};
use crate::errors::{PipelineError, Result};
use crate::fastq::FastqRecord;
use crate::scheduler::{PipelineStep, StepId, StepOrdering};
use crate::stats::DemuxStatistics;

/// Ordered stage classifying reads into per-sample streams.
pub struct DemultiplexReads {
    config: Arc<UserConfig>,
    table: BarcodeTable,
    /// Trimming stage of each sample, indexed by sample
    trim_steps: Vec<StepId>,
    /// Writer (or compressor) for unidentified mate 1 reads
    unidentified_1: StepId,
    /// Writer (or compressor) for unidentified mate 2 reads, PE only
    unidentified_2: Option<StepId>,
    stats: Mutex<DemuxStatistics>,
}

impl DemultiplexReads {
    /// Build the stage from the configured barcodes.
    pub fn new(
        config: Arc<UserConfig>,
        trim_steps: Vec<StepId>,
        unidentified_1: StepId,
        unidentified_2: Option<StepId>,
    ) -> Result<Self> {
        let table = BarcodeTable::new(
            config.adapters.barcodes(),
            config.barcode_mm,
            config.barcode_mm_r1,
            config.barcode_mm_r2,
        )?;
        if trim_steps.len() != config.adapters.barcode_count() {
            return Err(PipelineError::ConfigInvalid(
                "demultiplexer requires one trimming stage per barcode".into(),
            ));
        }

        let stats = Mutex::new(DemuxStatistics::new(trim_steps.len()));
        Ok(Self { config, table, trim_steps, unidentified_1, unidentified_2, stats })
    }

    /// Snapshot of the demultiplexing tallies; call after the run finishes.
    #[must_use]
    pub fn statistics(&self) -> DemuxStatistics {
        self.stats.lock().clone()
    }

    fn write_unidentified(
        &self,
        read_1: &FastqRecord,
        read_2: Option<&FastqRecord>,
        out_1: &mut OutputChunk,
        out_2: &mut Option<OutputChunk>,
    ) {
        let encoding = self.config.quality_output_fmt;
        read_1.encode_into(&mut out_1.bytes, encoding);
        out_1.nreads += 1;

        if let Some(read_2) = read_2 {
            match out_2.as_mut() {
                Some(chunk) => {
                    read_2.encode_into(&mut chunk.bytes, encoding);
                    chunk.nreads += 1;
                }
                // Single unidentified file: interleave the mates
                None => {
                    read_2.encode_into(&mut out_1.bytes, encoding);
                    out_1.nreads += 1;
                }
            }
        }
    }
}

impl PipelineStep for DemultiplexReads {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let Chunk::Reads(reads) = chunk else {
            return Err(PipelineError::SchedulerCancelled(
                "demultiplexer received a chunk of unexpected type".into(),
            ));
        };

        let paired = self.config.paired_ended_mode;
        let mut per_sample: Vec<ReadChunk> =
            self.trim_steps.iter().map(|_| ReadChunk::empty(reads.eof)).collect();
        let mut unidentified_1 = OutputChunk::empty(reads.eof);
        let mut unidentified_2 = self.unidentified_2.map(|_| OutputChunk::empty(reads.eof));

        let mut stats = self.stats.lock();

        let mut reads_2 = reads.reads_2.into_iter();
        for mut read_1 in reads.reads_1 {
            let mut read_2 = if paired { reads_2.next() } else { None };

            match self.table.classify(&read_1, read_2.as_ref()) {
                BarcodeMatch::Identified(sample) => {
                    stats.barcodes[sample] += 1;
                    self.table.strip(&mut read_1, read_2.as_mut());

                    let target = &mut per_sample[sample];
                    target.reads_1.push(read_1);
                    if let Some(read_2) = read_2 {
                        target.reads_2.push(read_2);
                    }
                }
                BarcodeMatch::Ambiguous => {
                    stats.ambiguous += 1;
                    self.write_unidentified(
                        &read_1,
                        read_2.as_ref(),
                        &mut unidentified_1,
                        &mut unidentified_2,
                    );
                }
                BarcodeMatch::Unidentified => {
                    stats.unidentified += 1;
                    self.write_unidentified(
                        &read_1,
                        read_2.as_ref(),
                        &mut unidentified_1,
                        &mut unidentified_2,
                    );
                }
            }
        }
        drop(stats);

        let mut routes: Vec<(StepId, Chunk)> = self
            .trim_steps
            .iter()
            .zip(per_sample)
            .map(|(&step, chunk)| (step, Chunk::Reads(chunk)))
            .collect();
        routes.push((self.unidentified_1, Chunk::Bytes(unidentified_1)));
        if let (Some(step), Some(chunk)) = (self.unidentified_2, unidentified_2) {
            routes.push((step, Chunk::Bytes(chunk)));
        }
        Ok(routes)
    }
}
