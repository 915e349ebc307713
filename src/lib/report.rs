//! Human-readable settings and statistics reports.
//!
//! Line-oriented, reproducible output: a settings preamble describing the
//! run, a `[Trimming statistics]` block with a `[Length distribution]`
//! table per sample, and a global `[Demultiplexing statistics]` table. The
//! section headers and column layouts are stable and consumed by downstream
//! tooling; changes here are format changes.

use std::io::{self, Write};

use itertools::Itertools;

use crate::config::UserConfig;
use crate::stats::{DemuxStatistics, ReadClass, TrimStatistics};

/// Program name carried into every report.
const NAME: &str = "readclean";
/// Program version carried into every report.
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// Write the settings preamble.
///
/// `sample` marks one sample in the demultiplexing table with `*`; `None`
/// is used for the global demultiplexing report.
pub fn write_settings(
    out: &mut dyn Write,
    config: &UserConfig,
    sample: Option<usize>,
) -> io::Result<()> {
    write!(out, "{NAME} {VERSION}\nTrimming of ")?;

    if config.adapters.barcode_count() > 0 {
        if config.adapters.double_indexed() {
            write!(out, "double-indexed ")?;
        } else {
            write!(out, "single-indexed ")?;
        }
    }

    if config.paired_ended_mode {
        if config.interleaved_input {
            write!(out, "interleaved ")?;
        }
        writeln!(out, "paired-end reads")?;
    } else {
        writeln!(out, "single-end reads")?;
    }

    if config.adapters.barcode_count() > 0 {
        writeln!(out, "\n\n[Demultiplexing]")?;
        writeln!(out, "Maximum mismatches (total): {}", config.barcode_mm)?;
        if config.paired_ended_mode {
            writeln!(out, "Maximum mate 1 mismatches: {}", config.barcode_mm_r1)?;
            writeln!(out, "Maximum mate 2 mismatches: {}", config.barcode_mm_r2)?;
        }

        writeln!(out, "\n\n[Demultiplexing samples]")?;
        writeln!(out, "Name\tBarcode_1\tBarcode_2")?;
        for (nth, entry) in config.adapters.barcodes().iter().enumerate() {
            let marker = if sample == Some(nth) { "*" } else { "" };
            let barcode_2 = if entry.barcode2.is_empty() {
                "*".to_string()
            } else {
                String::from_utf8_lossy(&entry.barcode2).into_owned()
            };
            writeln!(
                out,
                "{}{marker}\t{}\t{barcode_2}",
                entry.name,
                String::from_utf8_lossy(&entry.barcode1)
            )?;
        }
    }

    writeln!(out, "\n[Adapter sequences]")?;
    for (nth, pair) in config.adapters.adapters().iter().enumerate() {
        writeln!(out, "Adapter1[{}]: {}", nth + 1, String::from_utf8_lossy(&pair.adapter1))?;
        if config.paired_ended_mode {
            writeln!(out, "Adapter2[{}]: {}", nth + 1, String::from_utf8_lossy(&pair.adapter2))?;
        }
    }

    writeln!(out, "\n[Adapter trimming]")?;
    if config.max_threads > 1 {
        writeln!(out, "RNG seed: NA")?;
    } else {
        writeln!(out, "RNG seed: {}", config.seed)?;
    }
    writeln!(out, "Alignment shift value: {}", config.shift)?;
    writeln!(out, "Global mismatch threshold: {}", config.mismatch_threshold)?;
    writeln!(out, "Quality format (input): {}", config.quality_input_fmt.name())?;
    writeln!(out, "Quality score max (input): {}", config.quality_input_fmt.max_score())?;
    writeln!(out, "Quality format (output): {}", config.quality_output_fmt.name())?;
    writeln!(out, "Quality score max (output): {}", config.quality_output_fmt.max_score())?;
    writeln!(out, "Mate-number separator (input): '{}'", config.mate_separator)?;
    writeln!(out, "Trimming Ns: {}", yes_no(config.trim_ambiguous_bases))?;
    writeln!(
        out,
        "Trimming Phred scores <= {}: {}",
        config.low_quality_score,
        yes_no(config.trim_by_quality)
    )?;
    writeln!(out, "Minimum genomic length: {}", config.min_genomic_length)?;
    writeln!(out, "Maximum genomic length: {}", config.max_genomic_length)?;
    writeln!(out, "Collapse overlapping reads: {}", yes_no(config.collapse))?;
    writeln!(out, "Minimum overlap (in case of collapse): {}", config.min_alignment_length)?;
    if !config.paired_ended_mode {
        writeln!(out, "Minimum adapter overlap: {}", config.min_adapter_overlap)?;
    }

    Ok(())
}

/// Write one sample's full settings report: preamble, trimming counters and
/// the length distribution table.
pub fn write_trimming_report(
    out: &mut dyn Write,
    config: &UserConfig,
    stats: &TrimStatistics,
    sample: usize,
) -> io::Result<()> {
    write_settings(out, config, Some(sample))?;

    let reads_type = if config.paired_ended_mode { "read pairs" } else { "reads" };

    writeln!(out, "\n\n[Trimming statistics]")?;
    writeln!(out, "Total number of {reads_type}: {}", stats.records)?;
    writeln!(out, "Number of unaligned {reads_type}: {}", stats.unaligned)?;
    writeln!(out, "Number of well aligned {reads_type}: {}", stats.well_aligned)?;
    writeln!(out, "Number of discarded mate 1 reads: {}", stats.discarded_mate1)?;
    writeln!(out, "Number of singleton mate 1 reads: {}", stats.singleton_mate1)?;
    if config.paired_ended_mode {
        writeln!(out, "Number of discarded mate 2 reads: {}", stats.discarded_mate2)?;
        writeln!(out, "Number of singleton mate 2 reads: {}", stats.singleton_mate2)?;
    }

    for (adapter_id, count) in stats.adapter_hits.iter().enumerate() {
        writeln!(out, "Number of {reads_type} with adapters[{}]: {count}", adapter_id + 1)?;
    }

    if config.collapse {
        writeln!(out, "Number of full-length collapsed pairs: {}", stats.collapsed_full_length)?;
        writeln!(out, "Number of truncated collapsed pairs: {}", stats.collapsed_truncated)?;
    }

    let average = if stats.retained_reads > 0 {
        stats.retained_nucleotides as f64 / stats.retained_reads as f64
    } else {
        0.0
    };
    writeln!(out, "Number of retained reads: {}", stats.retained_reads)?;
    writeln!(out, "Number of retained nucleotides: {}", stats.retained_nucleotides)?;
    writeln!(out, "Average read length of retained reads: {average}")?;

    writeln!(out, "\n\n[Length distribution]")?;
    let mut header = vec!["Length", "Mate1"];
    if config.paired_ended_mode {
        header.extend(["Mate2", "Singleton"]);
    }
    if config.collapse {
        header.extend(["Collapsed", "CollapsedTruncated"]);
    }
    header.extend(["Discarded", "All"]);
    writeln!(out, "{}", header.iter().join("\t"))?;

    for (length, row) in stats.length_counts.iter().enumerate() {
        let total: u64 = row.iter().sum();
        let mut columns = vec![length as u64, row[ReadClass::Mate1 as usize]];
        if config.paired_ended_mode {
            columns.push(row[ReadClass::Mate2 as usize]);
            columns.push(row[ReadClass::Singleton as usize]);
        }
        if config.collapse {
            columns.push(row[ReadClass::Collapsed as usize]);
            columns.push(row[ReadClass::CollapsedTruncated as usize]);
        }
        columns.push(row[ReadClass::Discarded as usize]);
        columns.push(total);
        writeln!(out, "{}", columns.iter().join("\t"))?;
    }

    out.flush()
}

/// Write the global demultiplexing report.
pub fn write_demux_report(
    out: &mut dyn Write,
    config: &UserConfig,
    stats: &DemuxStatistics,
) -> io::Result<()> {
    write_settings(out, config, None)?;

    let total = stats.total();
    let fraction = |count: u64| {
        if total == 0 { 0.0 } else { count as f64 / total as f64 }
    };

    writeln!(out, "\n\n[Demultiplexing statistics]")?;
    writeln!(out, "Name\tBarcode_1\tBarcode_2\tHits\tFraction")?;
    writeln!(out, "unidentified\tNA\tNA\t{}\t{:.3}", stats.unidentified, fraction(stats.unidentified))?;
    writeln!(out, "ambiguous\tNA\tNA\t{}\t{:.3}", stats.ambiguous, fraction(stats.ambiguous))?;

    for (nth, entry) in config.adapters.barcodes().iter().enumerate() {
        let barcode_2 = if entry.barcode2.is_empty() {
            "*".to_string()
        } else {
            String::from_utf8_lossy(&entry.barcode2).into_owned()
        };
        writeln!(
            out,
            "{}\t{}\t{barcode_2}\t{}\t{:.3}",
            entry.name,
            String::from_utf8_lossy(&entry.barcode1),
            stats.barcodes[nth],
            fraction(stats.barcodes[nth])
        )?;
    }

    writeln!(out, "*\t*\t*\t{total}\t{:.3}", 1.0)?;
    out.flush()
}
