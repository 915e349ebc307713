//! Helper utilities for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use readclean_lib::adapters::AdapterSet;
use readclean_lib::config::UserConfig;
use readclean_lib::encoding::QualityEncoding;
use tempfile::TempDir;

/// Write a FASTQ file from `(header, sequence, quality)` records.
pub fn write_fastq(path: &Path, records: &[(&str, &str, &str)]) {
    let mut content = String::new();
    for (header, sequence, quality) in records {
        assert_eq!(sequence.len(), quality.len(), "bad test record");
        content.push('@');
        content.push_str(header);
        content.push('\n');
        content.push_str(sequence);
        content.push_str("\n+\n");
        content.push_str(quality);
        content.push('\n');
    }
    fs::write(path, content).expect("failed to write test FASTQ");
}

/// Parse a FASTQ file back into `(header, sequence, quality)` records.
pub fn read_fastq(path: &Path) -> Vec<(String, String, String)> {
    let content = fs::read_to_string(path).expect("failed to read FASTQ output");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len() % 4, 0, "truncated FASTQ output in {}", path.display());

    lines
        .chunks(4)
        .map(|record| {
            assert!(record[0].starts_with('@'));
            assert!(record[2].starts_with('+'));
            (record[0][1..].to_string(), record[1].to_string(), record[3].to_string())
        })
        .collect()
}

/// Single-end configuration with a `TTTT` adapter and permissive filters.
///
/// `input` and the output basename live inside `dir`; tests override fields
/// as needed.
pub fn base_config(dir: &TempDir, input: &str) -> UserConfig {
    UserConfig {
        basename: dir.path().join("output"),
        input_file_1: dir.path().join(input),
        input_file_2: None,
        paired_ended_mode: false,
        interleaved_input: false,
        interleaved_output: false,
        mate_separator: '/',
        min_genomic_length: 1,
        max_genomic_length: usize::MAX,
        min_adapter_overlap: 3,
        min_alignment_length: 11,
        mismatch_threshold: 1.0 / 3.0,
        quality_input_fmt: QualityEncoding::Phred33,
        quality_output_fmt: QualityEncoding::Phred33,
        trim_by_quality: false,
        low_quality_score: 2,
        trim_ambiguous_bases: false,
        max_ambiguous_bases: 1000,
        collapse: false,
        shift: 2,
        seed: 42,
        max_threads: 1,
        gzip: false,
        gzip_level: 6,
        bzip2: false,
        bzip2_level: 6,
        barcode_mm: 0,
        barcode_mm_r1: 0,
        barcode_mm_r2: 0,
        adapters: AdapterSet::new(&[("TTTT".to_string(), String::new())]).unwrap(),
    }
}

/// Path of an output file produced by a run with `base_config`.
pub fn output_path(dir: &TempDir, suffix: &str) -> PathBuf {
    dir.path().join(format!("output{suffix}"))
}
