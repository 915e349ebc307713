//! User configuration and derived policy helpers.
//!
//! [`UserConfig`] holds every user-supplied option plus the helper predicates
//! the trimming stages apply: alignment evaluation, read acceptance and
//! optional quality trimming. It is read-only after startup and shared by
//! reference with every stage.

use std::path::PathBuf;

use crate::adapters::AdapterSet;
use crate::alignment::AlignmentInfo;
use crate::encoding::QualityEncoding;
use crate::errors::{PipelineError, Result};
use crate::fastq::FastqRecord;
use crate::stats::TrimStatistics;

/// Verdict on a candidate adapter alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentVerdict {
    /// Alignment satisfies the user's thresholds
    Good,
    /// Alignment exists but scored at or below zero
    Poor,
    /// No usable alignment: too short or over the mismatch budget
    NotAligned,
}

/// Which output file of a sample a path is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFileKind {
    /// Mate 1 (or single-end) reads
    Mate1,
    /// Mate 2 reads
    Mate2,
    /// Reads whose mate was discarded
    Singleton,
    /// Full-length collapsed consensus reads
    Collapsed,
    /// Collapsed consensus reads shortened by quality trimming
    CollapsedTruncated,
    /// Reads failing the acceptance filters
    Discarded,
    /// Per-sample human-readable settings/statistics report
    Settings,
    /// Mate 1 reads that could not be demultiplexed
    UnidentifiedMate1,
    /// Mate 2 reads that could not be demultiplexed
    UnidentifiedMate2,
    /// Global demultiplexing statistics
    DemuxStats,
}

/// All user-supplied options, resolved and validated.
#[derive(Debug, Clone)]
pub struct UserConfig {
    /// Prefix for every output path
    pub basename: PathBuf,
    /// Mate 1 (or interleaved / single-end) input file
    pub input_file_1: PathBuf,
    /// Mate 2 input file, for paired-end mode with separate files
    pub input_file_2: Option<PathBuf>,

    /// True when processing read pairs
    pub paired_ended_mode: bool,
    /// Mate 1 and mate 2 records alternate within one input file
    pub interleaved_input: bool,
    /// Write both mates to the mate 1 output file
    pub interleaved_output: bool,

    /// Character separating the mate number from the read name
    pub mate_separator: char,

    /// Minimum length of a trimmed read to be retained
    pub min_genomic_length: usize,
    /// Maximum length of a trimmed read to be retained
    pub max_genomic_length: usize,
    /// Minimum adapter overlap before trimming single-end reads
    pub min_adapter_overlap: usize,
    /// Minimum mate overlap before collapsing a pair
    pub min_alignment_length: usize,
    /// Accepted mismatch rate over informative aligned positions
    pub mismatch_threshold: f64,

    /// Quality encoding of the input files
    pub quality_input_fmt: QualityEncoding,
    /// Quality encoding used for every written record
    pub quality_output_fmt: QualityEncoding,

    /// Trim low-quality bases from read termini
    pub trim_by_quality: bool,
    /// Highest Phred score still considered low quality
    pub low_quality_score: u8,
    /// Trim no-call bases from read termini
    pub trim_ambiguous_bases: bool,
    /// Maximum number of `N` bases in a retained read
    pub max_ambiguous_bases: usize,

    /// Collapse overlapping pairs into consensus reads
    pub collapse: bool,
    /// Maximum alignment slippage in bases
    pub shift: usize,
    /// Master seed for the per-worker RNG streams
    pub seed: u64,
    /// Worker pool size
    pub max_threads: usize,

    /// Gzip-compress output reads
    pub gzip: bool,
    /// Gzip compression level (1..=12)
    pub gzip_level: u32,
    /// Bzip2-compress output reads
    pub bzip2: bool,
    /// Bzip2 compression level (1..=9)
    pub bzip2_level: u32,

    /// Combined mismatch budget across both barcodes
    pub barcode_mm: usize,
    /// Mismatch budget for the mate 1 barcode
    pub barcode_mm_r1: usize,
    /// Mismatch budget for the mate 2 barcode
    pub barcode_mm_r2: usize,

    /// Adapter and barcode metadata
    pub adapters: AdapterSet,
}

impl UserConfig {
    /// Validate cross-option consistency; called once after construction.
    pub fn validate(&self) -> Result<()> {
        if self.gzip && self.bzip2 {
            return Err(PipelineError::ConfigInvalid(
                "--gzip and --bzip2 are mutually exclusive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mismatch_threshold) {
            return Err(PipelineError::ConfigInvalid(format!(
                "mismatch threshold {} is not a rate in [0, 1]",
                self.mismatch_threshold
            )));
        }
        if self.min_genomic_length > self.max_genomic_length {
            return Err(PipelineError::ConfigInvalid(format!(
                "minimum genomic length {} exceeds maximum {}",
                self.min_genomic_length, self.max_genomic_length
            )));
        }
        if self.gzip && !(1..=12).contains(&self.gzip_level) {
            return Err(PipelineError::ConfigInvalid(format!(
                "gzip level {} out of range 1..=12",
                self.gzip_level
            )));
        }
        if self.bzip2 && !(1..=9).contains(&self.bzip2_level) {
            return Err(PipelineError::ConfigInvalid(format!(
                "bzip2 level {} out of range 1..=9",
                self.bzip2_level
            )));
        }
        if self.interleaved_input && !self.paired_ended_mode {
            return Err(PipelineError::ConfigInvalid(
                "interleaved input requires paired-end mode".into(),
            ));
        }
        if self.paired_ended_mode && !self.interleaved_input && self.input_file_2.is_none() {
            return Err(PipelineError::ConfigInvalid(
                "paired-end mode requires a second input file or interleaved input".into(),
            ));
        }
        Ok(())
    }

    /// Characterize an alignment against the configured thresholds.
    ///
    /// Verdicts: no overlap at all is `NotAligned`; a non-positive score is
    /// `Poor`; an overlap shorter than the single-end minimum or over the
    /// mismatch budget is `NotAligned`; anything else is `Good`. The
    /// mismatch budget applies to informative positions only, ambiguous
    /// bases excluded.
    #[must_use]
    pub fn evaluate_alignment(&self, alignment: &AlignmentInfo) -> AlignmentVerdict {
        if alignment.length == 0 {
            return AlignmentVerdict::NotAligned;
        }
        if alignment.score <= 0 {
            return AlignmentVerdict::Poor;
        }

        if !self.paired_ended_mode && alignment.length < self.min_adapter_overlap {
            return AlignmentVerdict::NotAligned;
        }

        let informative = alignment.length - alignment.n_ambiguous;
        let budget = (self.mismatch_threshold * informative as f64).ceil() as usize;
        if alignment.n_mismatches > budget {
            return AlignmentVerdict::NotAligned;
        }

        AlignmentVerdict::Good
    }

    /// True when the alignment is good enough to collapse the pair.
    #[must_use]
    pub fn is_alignment_collapsible(&self, alignment: &AlignmentInfo) -> bool {
        self.collapse && alignment.length >= self.min_alignment_length
    }

    /// Acceptance predicate applied to every read after trimming.
    #[must_use]
    pub fn is_acceptable_read(&self, read: &FastqRecord) -> bool {
        read.len() >= self.min_genomic_length
            && read.len() <= self.max_genomic_length
            && read.count_ns() <= self.max_ambiguous_bases
    }

    /// Quality/N trimming, when enabled. Returns bases removed per end.
    pub fn trim_read_if_enabled(&self, read: &mut FastqRecord) -> (usize, usize) {
        read.trim_low_quality(self.trim_ambiguous_bases, self.trim_by_quality, self.low_quality_score)
    }

    /// Statistics instance sized for this configuration's adapter list.
    #[must_use]
    pub fn new_statistics(&self) -> TrimStatistics {
        TrimStatistics::new(self.adapters.adapters().len())
    }

    /// Derive the output path for `kind` of sample `nth`.
    ///
    /// Sample names are inserted when demultiplexing; compressed read outputs
    /// get a `.gz`/`.bz2` suffix. Reports are never compressed.
    #[must_use]
    pub fn output_path(&self, kind: OutputFileKind, nth: usize) -> PathBuf {
        let mut name = self.basename.as_os_str().to_string_lossy().into_owned();

        if self.adapters.barcode_count() > 0 && !matches!(kind, OutputFileKind::DemuxStats) {
            let sample = self.adapters.sample_name(nth);
            if !matches!(
                kind,
                OutputFileKind::UnidentifiedMate1 | OutputFileKind::UnidentifiedMate2
            ) && !sample.is_empty()
            {
                name.push('.');
                name.push_str(sample);
            }
        }

        let suffix = match kind {
            OutputFileKind::Mate1 if self.paired_ended_mode => ".pair1.truncated",
            OutputFileKind::Mate1 => ".truncated",
            OutputFileKind::Mate2 => ".pair2.truncated",
            OutputFileKind::Singleton => ".singleton.truncated",
            OutputFileKind::Collapsed => ".collapsed",
            OutputFileKind::CollapsedTruncated => ".collapsed.truncated",
            OutputFileKind::Discarded => ".discarded",
            OutputFileKind::Settings => ".settings",
            OutputFileKind::UnidentifiedMate1 if self.paired_ended_mode => ".unidentified.pair1",
            OutputFileKind::UnidentifiedMate1 => ".unidentified",
            OutputFileKind::UnidentifiedMate2 => ".unidentified.pair2",
            OutputFileKind::DemuxStats => ".demux_stats",
        };
        name.push_str(suffix);

        let is_report = matches!(kind, OutputFileKind::Settings | OutputFileKind::DemuxStats);
        if !is_report {
            if self.gzip {
                name.push_str(".gz");
            } else if self.bzip2 {
                name.push_str(".bz2");
            }
        }

        PathBuf::from(name)
    }
}
