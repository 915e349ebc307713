//! End-to-end single-end trimming runs.

use std::io::Read;

use readclean_lib::adapters::AdapterSet;
use readclean_lib::pipeline;
use tempfile::TempDir;

use crate::helpers::{base_config, output_path, read_fastq, write_fastq};

#[test]
fn test_adapter_is_trimmed_from_read_end() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGTACGT", "IIIIIIII")]);

    let mut config = base_config(&dir, "reads.fq");
    config.adapters = AdapterSet::new(&[("ACGT".to_string(), String::new())]).unwrap();

    let summary = pipeline::run(config).unwrap();

    let records = read_fastq(&output_path(&dir, ".truncated"));
    assert_eq!(records, vec![("r".to_string(), "ACGT".to_string(), "IIII".to_string())]);

    assert_eq!(summary.per_sample.len(), 1);
    let stats = &summary.per_sample[0];
    assert_eq!(stats.records, 1);
    assert_eq!(stats.well_aligned, 1);
    assert_eq!(stats.adapter_hits, vec![1]);
}

#[test]
fn test_unmatched_adapter_leaves_read_intact() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGTACGT", "IIIIIIII")]);

    // TTTT never aligns usefully against this read
    let config = base_config(&dir, "reads.fq");
    let summary = pipeline::run(config).unwrap();

    let records = read_fastq(&output_path(&dir, ".truncated"));
    assert_eq!(records, vec![("r".to_string(), "ACGTACGT".to_string(), "IIIIIIII".to_string())]);
    assert_eq!(summary.per_sample[0].unaligned, 1);
    assert_eq!(summary.per_sample[0].well_aligned, 0);
}

#[test]
fn test_clean_input_round_trips_byte_identical() {
    let dir = TempDir::new().unwrap();
    let records: Vec<(String, String, String)> = (0..50)
        .map(|index| {
            (format!("read_{index}"), "ACCAGGACCAGGACCAGG".to_string(), "I".repeat(18))
        })
        .collect();
    let borrowed: Vec<(&str, &str, &str)> = records
        .iter()
        .map(|(header, sequence, quality)| {
            (header.as_str(), sequence.as_str(), quality.as_str())
        })
        .collect();
    write_fastq(&dir.path().join("reads.fq"), &borrowed);

    pipeline::run(base_config(&dir, "reads.fq")).unwrap();

    let input = std::fs::read(dir.path().join("reads.fq")).unwrap();
    let output = std::fs::read(output_path(&dir, ".truncated")).unwrap();
    assert_eq!(input, output);
}

#[test]
fn test_low_quality_tail_is_trimmed() {
    let dir = TempDir::new().unwrap();
    // Last four bases carry Phred 2 ('#')
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGCACGCCCCC", "IIIIIIII####")]);

    let mut config = base_config(&dir, "reads.fq");
    config.trim_by_quality = true;
    config.low_quality_score = 2;
    config.min_genomic_length = 8;

    pipeline::run(config).unwrap();

    let records = read_fastq(&output_path(&dir, ".truncated"));
    assert_eq!(records[0].1, "ACGCACGC");
    assert_eq!(records[0].2, "IIIIIIII");
}

#[test]
fn test_low_quality_trimming_can_discard_short_reads() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGCACGCCCCC", "IIIIIIII####")]);

    let mut config = base_config(&dir, "reads.fq");
    config.trim_by_quality = true;
    config.low_quality_score = 2;
    config.min_genomic_length = 10;

    let summary = pipeline::run(config).unwrap();

    assert!(read_fastq(&output_path(&dir, ".truncated")).is_empty());
    let discarded = read_fastq(&output_path(&dir, ".discarded"));
    assert_eq!(discarded.len(), 1);
    assert_eq!(summary.per_sample[0].discarded_mate1, 1);
}

#[test]
fn test_gzip_output_is_valid_multi_member_gzip() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGTACGT", "IIIIIIII")]);

    let mut config = base_config(&dir, "reads.fq");
    config.gzip = true;

    pipeline::run(config).unwrap();

    let compressed = std::fs::File::open(output_path(&dir, ".truncated.gz")).unwrap();
    let mut decoder = flate2::read::MultiGzDecoder::new(compressed);
    let mut content = String::new();
    decoder.read_to_string(&mut content).unwrap();
    assert_eq!(content, "@r\nACGTACGT\n+\nIIIIIIII\n");
}

#[test]
fn test_bzip2_output_round_trips() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGTACGT", "IIIIIIII")]);

    let mut config = base_config(&dir, "reads.fq");
    config.bzip2 = true;

    pipeline::run(config).unwrap();

    let compressed = std::fs::File::open(output_path(&dir, ".truncated.bz2")).unwrap();
    let mut decoder = bzip2::read::MultiBzDecoder::new(compressed);
    let mut content = String::new();
    decoder.read_to_string(&mut content).unwrap();
    assert_eq!(content, "@r\nACGTACGT\n+\nIIIIIIII\n");
}

#[test]
fn test_settings_report_is_written() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("reads.fq"), &[("r", "ACGTACGT", "IIIIIIII")]);

    pipeline::run(base_config(&dir, "reads.fq")).unwrap();

    let settings = std::fs::read_to_string(output_path(&dir, ".settings")).unwrap();
    assert!(settings.contains("[Trimming statistics]"));
    assert!(settings.contains("[Length distribution]"));
    assert!(settings.contains("Total number of reads: 1"));
    assert!(settings.contains("Length\tMate1\tDiscarded\tAll"));
}

#[test]
fn test_gzip_compressed_input_is_accepted() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reads.fq.gz");
    {
        use std::io::Write;
        let file = std::fs::File::create(&input).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"@r\nACGTACGT\n+\nIIIIIIII\n").unwrap();
        encoder.finish().unwrap();
    }

    let config = base_config(&dir, "reads.fq.gz");
    let summary = pipeline::run(config).unwrap();
    assert_eq!(summary.per_sample[0].records, 1);

    let records = read_fastq(&output_path(&dir, ".truncated"));
    assert_eq!(records[0].1, "ACGTACGT");
}
