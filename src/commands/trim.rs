//! Trim adapters, low-quality bases and barcodes from FASTQ reads.

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use readclean_lib::adapters::AdapterSet;
use readclean_lib::config::UserConfig;
use readclean_lib::encoding::QualityEncoding;
use readclean_lib::logging::{OperationTimer, format_count};
use readclean_lib::pipeline;

use crate::commands::command::Command;

/// Default adapter expected at the 3' end of mate 1 reads.
const DEFAULT_ADAPTER_1: &str = "AGATCGGAAGAGCACACGTCTGAACTCCAGTCAC";
/// Default adapter expected at the 3' end of mate 2 reads.
const DEFAULT_ADAPTER_2: &str = "AGATCGGAAGAGCGTCGTGTAGGGAAAGAGTGTA";

/// Trim adapter contamination and low-quality bases from sequencing reads.
#[derive(Debug, Parser)]
#[command(
    name = "trim",
    about = "Trim adapters and low-quality bases from FASTQ reads",
    long_about = r#"
Clean next-generation sequencing reads delivered as FASTQ records: locate
and remove adapter contamination, trim low-quality and ambiguous termini,
optionally collapse overlapping mate pairs into consensus reads, and
demultiplex barcoded samples.

EXAMPLES:

  # Single-end trimming with default adapters
  readclean trim --input1 reads.fq.gz --basename cleaned --gzip

  # Paired-end trimming with collapsing
  readclean trim --input1 r1.fq --input2 r2.fq --collapse --basename cleaned

  # Demultiplexing with one mismatch allowed
  readclean trim --input1 r1.fq --barcode-list barcodes.txt --barcode-mm 1
"#
)]
pub struct Trim {
    /// Input FASTQ file with mate 1 (or single-end, or interleaved) reads.
    #[arg(long = "input1", value_name = "FILE")]
    pub input_file_1: PathBuf,

    /// Input FASTQ file with mate 2 reads; enables paired-end mode.
    #[arg(long = "input2", value_name = "FILE")]
    pub input_file_2: Option<PathBuf>,

    /// Prefix for all output files.
    #[arg(long, default_value = "output")]
    pub basename: PathBuf,

    /// Shorthand for --interleaved-input --interleaved-output.
    #[arg(long)]
    pub interleaved: bool,

    /// Mate 1 and mate 2 records alternate within the input file.
    #[arg(long = "interleaved-input")]
    pub interleaved_input: bool,

    /// Write both mates to the mate 1 output file.
    #[arg(long = "interleaved-output")]
    pub interleaved_output: bool,

    /// Character separating the mate number from the read name.
    #[arg(long = "mate-separator", default_value_t = '/')]
    pub mate_separator: char,

    /// Adapter expected at the 3' end of mate 1 reads; repeat for multiple.
    #[arg(long = "adapter1", value_name = "SEQUENCE")]
    pub adapter_1: Vec<String>,

    /// Adapter expected at the 3' end of mate 2 reads; repeat for multiple.
    #[arg(long = "adapter2", value_name = "SEQUENCE")]
    pub adapter_2: Vec<String>,

    /// File with per-sample barcodes: 'name barcode1 [barcode2]' per line.
    #[arg(long = "barcode-list", value_name = "FILE")]
    pub barcode_list: Option<PathBuf>,

    /// Minimum length of retained reads after trimming.
    #[arg(long = "min-length", default_value_t = 15)]
    pub min_genomic_length: usize,

    /// Maximum length of retained reads after trimming.
    #[arg(long = "max-length", default_value_t = usize::MAX)]
    pub max_genomic_length: usize,

    /// Minimum adapter overlap before trimming single-end reads.
    #[arg(long = "min-adapter-overlap", default_value_t = 3)]
    pub min_adapter_overlap: usize,

    /// Minimum mate overlap required to collapse a pair.
    #[arg(long = "min-alignment-length", default_value_t = 11)]
    pub min_alignment_length: usize,

    /// Accepted mismatch rate over informative aligned positions.
    #[arg(long = "mismatch-rate", default_value_t = 1.0 / 3.0)]
    pub mismatch_threshold: f64,

    /// Quality encoding of the input: 33, 64, solexa or 64ext.
    #[arg(long = "quality-input-format", default_value = "33")]
    pub quality_input_fmt: QualityEncoding,

    /// Quality encoding of the output: 33, 64, solexa or 64ext.
    #[arg(long = "quality-output-format", default_value = "33")]
    pub quality_output_fmt: QualityEncoding,

    /// Trim low-quality bases from read termini.
    #[arg(long = "trim-qualities")]
    pub trim_by_quality: bool,

    /// Highest Phred score still considered low quality.
    #[arg(long = "min-quality", default_value_t = 2)]
    pub low_quality_score: u8,

    /// Trim ambiguous bases (N) from read termini.
    #[arg(long = "trim-ns")]
    pub trim_ambiguous_bases: bool,

    /// Maximum number of ambiguous bases in a retained read.
    #[arg(long = "max-ns", default_value_t = 1000)]
    pub max_ambiguous_bases: usize,

    /// Collapse overlapping mate pairs into consensus reads.
    #[arg(long)]
    pub collapse: bool,

    /// Maximum alignment slippage in bases.
    #[arg(long, default_value_t = 2)]
    pub shift: usize,

    /// Master RNG seed; defaults to the current time.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker pool size.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Gzip-compress output reads.
    #[arg(long)]
    pub gzip: bool,

    /// Gzip compression level (1-12).
    #[arg(long = "gzip-level", default_value_t = 6)]
    pub gzip_level: u32,

    /// Bzip2-compress output reads.
    #[arg(long)]
    pub bzip2: bool,

    /// Bzip2 compression level (1-9).
    #[arg(long = "bzip2-level", default_value_t = 6)]
    pub bzip2_level: u32,

    /// Maximum barcode mismatches across both mates.
    #[arg(long = "barcode-mm", default_value_t = 0)]
    pub barcode_mm: usize,

    /// Maximum barcode mismatches in mate 1.
    #[arg(long = "barcode-mm-r1", default_value_t = 0)]
    pub barcode_mm_r1: usize,

    /// Maximum barcode mismatches in mate 2.
    #[arg(long = "barcode-mm-r2", default_value_t = 0)]
    pub barcode_mm_r2: usize,
}

impl Trim {
    fn adapter_pairs(&self) -> Result<Vec<(String, String)>> {
        let adapter_1: Vec<String> = if self.adapter_1.is_empty() {
            vec![DEFAULT_ADAPTER_1.to_string()]
        } else {
            self.adapter_1.clone()
        };

        let adapter_2: Vec<String> = if self.adapter_2.is_empty() {
            vec![DEFAULT_ADAPTER_2.to_string(); adapter_1.len()]
        } else if self.adapter_2.len() == adapter_1.len() {
            self.adapter_2.clone()
        } else {
            bail!(
                "--adapter2 given {} times but --adapter1 {} times",
                self.adapter_2.len(),
                adapter_1.len()
            );
        };

        Ok(adapter_1.into_iter().zip(adapter_2).collect())
    }

    fn build_config(&self) -> Result<UserConfig> {
        let mut adapters = AdapterSet::new(&self.adapter_pairs()?)?;
        if let Some(path) = &self.barcode_list {
            adapters.load_barcodes(path)?;
        }

        let paired_ended_mode =
            self.input_file_2.is_some() || self.interleaved || self.interleaved_input;
        let seed = match self.seed {
            Some(seed) => seed,
            None => SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()),
        };

        Ok(UserConfig {
            basename: self.basename.clone(),
            input_file_1: self.input_file_1.clone(),
            input_file_2: self.input_file_2.clone(),
            paired_ended_mode,
            interleaved_input: self.interleaved || self.interleaved_input,
            interleaved_output: self.interleaved || self.interleaved_output,
            mate_separator: self.mate_separator,
            min_genomic_length: self.min_genomic_length,
            max_genomic_length: self.max_genomic_length,
            min_adapter_overlap: self.min_adapter_overlap,
            min_alignment_length: self.min_alignment_length,
            mismatch_threshold: self.mismatch_threshold,
            quality_input_fmt: self.quality_input_fmt,
            quality_output_fmt: self.quality_output_fmt,
            trim_by_quality: self.trim_by_quality,
            low_quality_score: self.low_quality_score,
            trim_ambiguous_bases: self.trim_ambiguous_bases,
            max_ambiguous_bases: self.max_ambiguous_bases,
            collapse: self.collapse,
            shift: self.shift,
            seed,
            max_threads: self.threads,
            gzip: self.gzip,
            gzip_level: self.gzip_level,
            bzip2: self.bzip2,
            bzip2_level: self.bzip2_level,
            barcode_mm: self.barcode_mm,
            barcode_mm_r1: self.barcode_mm_r1,
            barcode_mm_r2: self.barcode_mm_r2,
            adapters,
        })
    }
}

impl Command for Trim {
    fn execute(&self) -> Result<()> {
        let config = self.build_config()?;

        info!("Input: {}", config.input_file_1.display());
        if let Some(input_file_2) = &config.input_file_2 {
            info!("Input (mate 2): {}", input_file_2.display());
        }
        info!("Threads: {}", config.max_threads);
        if config.adapters.barcode_count() > 0 {
            info!("Demultiplexing {} samples", config.adapters.barcode_count());
        }

        let timer = OperationTimer::new("Trimming reads");
        let summary = pipeline::run(config)?;
        timer.log_completion(summary.total_records());

        if let Some(demux) = &summary.demux {
            info!(
                "Demultiplexed {} records: {} unidentified, {} ambiguous",
                format_count(demux.total()),
                format_count(demux.unidentified),
                format_count(demux.ambiguous)
            );
        }

        Ok(())
    }
}
