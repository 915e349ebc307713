//! Pipeline graph construction and execution.
//!
//! Wires the stage graph for one run: input decoding, optional
//! demultiplexing, one trimming stage per sample, and the per-output-class
//! writer chains (with compressor shims when enabled). Stage ids are
//! allocated so that downstream stages carry higher ids, which the
//! scheduler uses to prefer draining work near the sinks.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use log::info;

use crate::config::{OutputFileKind, UserConfig};
use crate::errors::{PipelineError, Result};
use crate::report;
use crate::scheduler::{PipelineStep, Scheduler, StepId};
use crate::stages::demux::DemultiplexReads;
use crate::stages::reader::{ReadInterleavedFastq, ReadPairedFastq, ReadSingleFastq};
use crate::stages::trim::{PairedEndProcessor, SampleEdges, SingleEndProcessor};
use crate::stages::writer::{Bzip2Fastq, GzipFastq, WriteFastq};
use crate::stats::{DemuxStatistics, TrimStatistics};

/// Final tallies of one pipeline run.
#[derive(Debug)]
pub struct TrimSummary {
    /// Reduced trimming statistics, one entry per sample
    pub per_sample: Vec<TrimStatistics>,
    /// Demultiplexing tallies, when demultiplexing was enabled
    pub demux: Option<DemuxStatistics>,
}

impl TrimSummary {
    /// Total input records across all samples.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        let trimmed: u64 = self.per_sample.iter().map(|stats| stats.records).sum();
        match &self.demux {
            Some(demux) => trimmed + demux.unidentified + demux.ambiguous,
            None => trimmed,
        }
    }
}

/// Explicit edge table mapping `(sample, output kind)` to stage ids.
///
/// Built while the writer chains are registered; the trimming and
/// demultiplexing stages resolve their routes through it instead of id
/// arithmetic.
#[derive(Debug, Default)]
struct EdgeTable {
    entries: Vec<((usize, OutputFileKind), StepId)>,
}

impl EdgeTable {
    fn insert(&mut self, sample: usize, kind: OutputFileKind, id: StepId) {
        self.entries.push(((sample, kind), id));
    }

    fn get(&self, sample: usize, kind: OutputFileKind) -> Option<StepId> {
        self.entries
            .iter()
            .find(|((entry_sample, entry_kind), _)| {
                *entry_sample == sample && *entry_kind == kind
            })
            .map(|(_, id)| *id)
    }

    fn require(&self, sample: usize, kind: OutputFileKind) -> Result<StepId> {
        self.get(sample, kind).ok_or_else(|| {
            PipelineError::ConfigInvalid(format!(
                "no writer registered for sample {sample} output {kind:?}"
            ))
        })
    }
}

/// Monotonic stage id allocator.
#[derive(Debug, Default)]
struct IdAllocator {
    next: StepId,
}

impl IdAllocator {
    fn next(&mut self) -> StepId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Register the writer for one output file, preceded by a compressor stage
/// when compression is enabled. Returns the id producers should target.
fn add_write_step(
    scheduler: &mut Scheduler,
    ids: &mut IdAllocator,
    config: &UserConfig,
    sample: usize,
    kind: OutputFileKind,
    label: &str,
) -> Result<StepId> {
    let path = config.output_path(kind, sample);

    if config.gzip {
        let compressor_id = ids.next();
        let writer_id = ids.next();
        scheduler.add_step(
            writer_id,
            &format!("write_gzip_{label}"),
            Box::new(WriteFastq::new(path.clone())),
        )?;
        scheduler.add_step(
            compressor_id,
            &format!("gzip_{label}"),
            Box::new(GzipFastq::new(config.gzip_level, writer_id, path)?),
        )?;
        Ok(compressor_id)
    } else if config.bzip2 {
        let compressor_id = ids.next();
        let writer_id = ids.next();
        scheduler.add_step(
            writer_id,
            &format!("write_bzip2_{label}"),
            Box::new(WriteFastq::new(path.clone())),
        )?;
        scheduler.add_step(
            compressor_id,
            &format!("bzip2_{label}"),
            Box::new(Bzip2Fastq::new(config.bzip2_level, writer_id, path)?),
        )?;
        Ok(compressor_id)
    } else {
        let writer_id = ids.next();
        scheduler.add_step(writer_id, &format!("write_{label}"), Box::new(WriteFastq::new(path)))?;
        Ok(writer_id)
    }
}

/// Register the writer chains of one sample and record them in the table.
fn add_sample_writers(
    scheduler: &mut Scheduler,
    ids: &mut IdAllocator,
    table: &mut EdgeTable,
    config: &UserConfig,
    sample: usize,
) -> Result<()> {
    let name = config.adapters.sample_name(sample);
    let label = |kind: &str| {
        if name.is_empty() { kind.to_string() } else { format!("{name}_{kind}") }
    };

    let mate_1 = add_write_step(scheduler, ids, config, sample, OutputFileKind::Mate1, &label("mate_1"))?;
    table.insert(sample, OutputFileKind::Mate1, mate_1);

    if config.paired_ended_mode && !config.interleaved_output {
        let mate_2 =
            add_write_step(scheduler, ids, config, sample, OutputFileKind::Mate2, &label("mate_2"))?;
        table.insert(sample, OutputFileKind::Mate2, mate_2);
    }

    if config.paired_ended_mode {
        let singleton = add_write_step(
            scheduler,
            ids,
            config,
            sample,
            OutputFileKind::Singleton,
            &label("singleton"),
        )?;
        table.insert(sample, OutputFileKind::Singleton, singleton);
    }

    if config.collapse {
        let collapsed = add_write_step(
            scheduler,
            ids,
            config,
            sample,
            OutputFileKind::Collapsed,
            &label("collapsed"),
        )?;
        table.insert(sample, OutputFileKind::Collapsed, collapsed);

        let truncated = add_write_step(
            scheduler,
            ids,
            config,
            sample,
            OutputFileKind::CollapsedTruncated,
            &label("collapsed_truncated"),
        )?;
        table.insert(sample, OutputFileKind::CollapsedTruncated, truncated);
    }

    let discarded = add_write_step(
        scheduler,
        ids,
        config,
        sample,
        OutputFileKind::Discarded,
        &label("discarded"),
    )?;
    table.insert(sample, OutputFileKind::Discarded, discarded);

    Ok(())
}

fn sample_edges(table: &EdgeTable, config: &UserConfig, sample: usize) -> Result<SampleEdges> {
    Ok(SampleEdges {
        mate_1: table.require(sample, OutputFileKind::Mate1)?,
        mate_2: table.get(sample, OutputFileKind::Mate2),
        singleton: table.get(sample, OutputFileKind::Singleton),
        collapsed: table.get(sample, OutputFileKind::Collapsed),
        collapsed_truncated: table.get(sample, OutputFileKind::CollapsedTruncated),
        discarded: table.require(sample, OutputFileKind::Discarded)?,
    })
}

enum Processor {
    Single(Arc<SingleEndProcessor>),
    Paired(Arc<PairedEndProcessor>),
}

impl Processor {
    fn final_statistics(&self) -> TrimStatistics {
        match self {
            Processor::Single(processor) => processor.final_statistics(),
            Processor::Paired(processor) => processor.final_statistics(),
        }
    }
}

/// Run the full trimming pipeline described by `config`.
///
/// Builds the stage graph, drives it on `max_threads` workers, writes the
/// per-sample settings reports and the demultiplexing report, and returns
/// the reduced statistics.
pub fn run(config: UserConfig) -> Result<TrimSummary> {
    config.validate()?;
    let config = Arc::new(config);

    if config.paired_ended_mode {
        info!("Trimming paired end reads ...");
    } else {
        info!("Trimming single ended reads ...");
    }

    let mut scheduler = Scheduler::new();
    let mut ids = IdAllocator::default();
    let mut table = EdgeTable::default();

    let demultiplexing = config.adapters.barcode_count() > 0;
    let sample_count = config.adapters.sample_count();

    // Upstream ids first: source, demultiplexer, one trim stage per sample.
    // Writer chains are registered afterwards and get the highest ids.
    let source_id = ids.next();
    let demux_id = demultiplexing.then(|| ids.next());
    let trim_ids: Vec<StepId> = (0..sample_count).map(|_| ids.next()).collect();

    for sample in 0..sample_count {
        add_sample_writers(&mut scheduler, &mut ids, &mut table, &config, sample)?;
    }

    let unidentified = if demultiplexing {
        let mate_1 = add_write_step(
            &mut scheduler,
            &mut ids,
            &config,
            0,
            OutputFileKind::UnidentifiedMate1,
            "unidentified_mate_1",
        )?;
        let mate_2 = if config.paired_ended_mode {
            Some(add_write_step(
                &mut scheduler,
                &mut ids,
                &config,
                0,
                OutputFileKind::UnidentifiedMate2,
                "unidentified_mate_2",
            )?)
        } else {
            None
        };
        Some((mate_1, mate_2))
    } else {
        None
    };

    let mut processors = Vec::with_capacity(sample_count);
    for (sample, &trim_id) in trim_ids.iter().enumerate() {
        let edges = sample_edges(&table, &config, sample)?;
        let name = config.adapters.sample_name(sample);
        let suffix = if name.is_empty() { String::new() } else { format!("_{name}") };

        if config.paired_ended_mode {
            let processor = Arc::new(PairedEndProcessor::new(Arc::clone(&config), edges));
            scheduler.add_step(
                trim_id,
                &format!("trim_pe{suffix}"),
                Box::new(Arc::clone(&processor)),
            )?;
            processors.push(Processor::Paired(processor));
        } else {
            let processor = Arc::new(SingleEndProcessor::new(Arc::clone(&config), edges));
            scheduler.add_step(
                trim_id,
                &format!("trim_se{suffix}"),
                Box::new(Arc::clone(&processor)),
            )?;
            processors.push(Processor::Single(processor));
        }
    }

    let demultiplexer = match (demux_id, unidentified) {
        (Some(demux_id), Some((unidentified_1, unidentified_2))) => {
            let stage = Arc::new(DemultiplexReads::new(
                Arc::clone(&config),
                trim_ids.clone(),
                unidentified_1,
                unidentified_2,
            )?);
            let name =
                if config.paired_ended_mode { "demultiplex_pe" } else { "demultiplex_se" };
            scheduler.add_step(demux_id, name, Box::new(Arc::clone(&stage)))?;
            Some(stage)
        }
        _ => None,
    };

    // The reader feeds the demultiplexer when present, else the only sample
    let first_stage = demux_id.unwrap_or(trim_ids[0]);
    let reader: Box<dyn PipelineStep> = if config.paired_ended_mode {
        if config.interleaved_input {
            Box::new(ReadInterleavedFastq::new(
                &config.input_file_1,
                config.quality_input_fmt,
                first_stage,
            )?)
        } else {
            let input_file_2 = config.input_file_2.as_ref().ok_or_else(|| {
                PipelineError::ConfigInvalid("paired-end mode requires a second input file".into())
            })?;
            Box::new(ReadPairedFastq::new(
                &config.input_file_1,
                input_file_2,
                config.quality_input_fmt,
                first_stage,
            )?)
        }
    } else {
        Box::new(ReadSingleFastq::new(
            &config.input_file_1,
            config.quality_input_fmt,
            first_stage,
        )?)
    };
    let reader_name = if config.interleaved_input {
        "read_interleaved_fastq"
    } else if config.paired_ended_mode {
        "read_paired_fastq"
    } else {
        "read_fastq"
    };
    scheduler.add_step(source_id, reader_name, reader)?;

    scheduler.run(source_id, config.max_threads)?;

    // Reduce per-worker statistics and write the reports
    let per_sample: Vec<TrimStatistics> =
        processors.iter().map(Processor::final_statistics).collect();

    for (sample, stats) in per_sample.iter().enumerate() {
        let path = config.output_path(OutputFileKind::Settings, sample);
        let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        report::write_trimming_report(&mut out, &config, stats, sample)
            .map_err(|e| PipelineError::io(&path, e))?;
    }

    let demux = match demultiplexer {
        Some(stage) => {
            let stats = stage.statistics();
            let path = config.output_path(OutputFileKind::DemuxStats, 0);
            let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
            let mut out = BufWriter::new(file);
            report::write_demux_report(&mut out, &config, &stats)
                .map_err(|e| PipelineError::io(&path, e))?;
            Some(stats)
        }
        None => None,
    };

    Ok(TrimSummary { per_sample, demux })
}
