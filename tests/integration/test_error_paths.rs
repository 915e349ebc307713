//! Fatal error propagation through the pipeline.

use std::fs;

use readclean_lib::PipelineError;
use readclean_lib::pipeline;
use tempfile::TempDir;

use crate::helpers::{base_config, write_fastq};

#[test]
fn test_missing_input_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir, "does_not_exist.fq");
    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::IoFailure { .. })));
}

#[test]
fn test_malformed_fastq_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("reads.fq"), "@r1\nACGT\nIIII\n").unwrap();

    let config = base_config(&dir, "reads.fq");
    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::MalformedRecord { .. })));
}

#[test]
fn test_malformed_record_mid_stream_fails() {
    let dir = TempDir::new().unwrap();
    let mut content = String::new();
    for index in 0..100 {
        content.push_str(&format!("@read_{index}\nACGCACGC\n+\nIIIIIIII\n"));
    }
    content.push_str("@broken\nACGT\n+\nII\n");
    fs::write(dir.path().join("reads.fq"), content).unwrap();

    let mut config = base_config(&dir, "reads.fq");
    config.max_threads = 4;

    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::MalformedRecord { .. })));
}

#[test]
fn test_mate_pair_name_mismatch_fails() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("r1.fq"), &[("fragA/1", "ACGCACGC", "IIIIIIII")]);
    write_fastq(&dir.path().join("r2.fq"), &[("fragB/2", "ACGCACGC", "IIIIIIII")]);

    let mut config = base_config(&dir, "r1.fq");
    config.input_file_2 = Some(dir.path().join("r2.fq"));
    config.paired_ended_mode = true;

    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::MatePairMismatch { .. })));
}

#[test]
fn test_uneven_mate_files_fail() {
    let dir = TempDir::new().unwrap();
    write_fastq(
        &dir.path().join("r1.fq"),
        &[("frag/1", "ACGCACGC", "IIIIIIII"), ("frag2/1", "ACGCACGC", "IIIIIIII")],
    );
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "ACGCACGC", "IIIIIIII")]);

    let mut config = base_config(&dir, "r1.fq");
    config.input_file_2 = Some(dir.path().join("r2.fq"));
    config.paired_ended_mode = true;

    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::MalformedRecord { .. })));
}

#[test]
fn test_quality_out_of_range_fails() {
    let dir = TempDir::new().unwrap();
    // Phred+64 input with a byte below the offset
    fs::write(dir.path().join("reads.fq"), "@r1\nACGT\n+\nIII!\n").unwrap();

    let mut config = base_config(&dir, "reads.fq");
    config.quality_input_fmt = readclean_lib::encoding::QualityEncoding::Phred64;

    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::QualityOutOfRange { .. })));
}

#[test]
fn test_inconsistent_config_fails() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGT", "IIII")]);

    let mut config = base_config(&dir, "reads.fq");
    config.gzip = true;
    config.bzip2 = true;

    let result = pipeline::run(config);
    assert!(matches!(result, Err(PipelineError::ConfigInvalid(_))));
}
