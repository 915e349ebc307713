//! End-to-end demultiplexing runs.

use std::fs;
use std::io::Write;

use readclean_lib::pipeline;
use tempfile::TempDir;

use crate::helpers::{base_config, read_fastq, write_fastq};

fn write_barcode_list(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("barcodes.txt");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_demultiplex_by_barcode_with_mismatch_budget() {
    let dir = TempDir::new().unwrap();
    write_fastq(
        &dir.path().join("reads.fq"),
        &[
            ("r1", "ACGTAACCAACC", "IIIIIIIIIIII"),
            ("r2", "TTTTAACCAACC", "IIIIIIIIIIII"),
            ("r3", "ACGAAACCAACC", "IIIIIIIIIIII"),
        ],
    );
    let barcode_list = write_barcode_list(&dir, "sample1 ACGT\n");

    let mut config = base_config(&dir, "reads.fq");
    config.adapters.load_barcodes(&barcode_list).unwrap();
    config.barcode_mm = 1;
    config.barcode_mm_r1 = 1;

    let summary = pipeline::run(config).unwrap();

    // Reads r1 (exact) and r3 (one mismatch) land in sample1 with the
    // barcode stripped; r2 is unidentified and written unmodified
    let sample = read_fastq(&dir.path().join("output.sample1.truncated"));
    assert_eq!(sample.len(), 2);
    assert_eq!(sample[0].0, "r1");
    assert_eq!(sample[0].1, "AACCAACC");
    assert_eq!(sample[1].0, "r3");
    assert_eq!(sample[1].1, "AACCAACC");

    let unidentified = read_fastq(&dir.path().join("output.unidentified"));
    assert_eq!(unidentified.len(), 1);
    assert_eq!(unidentified[0].0, "r2");
    assert_eq!(unidentified[0].1, "TTTTAACCAACC");

    let demux = summary.demux.expect("demultiplexing statistics expected");
    assert_eq!(demux.barcodes, vec![2]);
    assert_eq!(demux.unidentified, 1);
    assert_eq!(demux.ambiguous, 0);
    assert_eq!(demux.total(), 3);
}

#[test]
fn test_demux_stats_report_totals() {
    let dir = TempDir::new().unwrap();
    write_fastq(
        &dir.path().join("reads.fq"),
        &[
            ("r1", "ACGTAACCAACC", "IIIIIIIIIIII"),
            ("r2", "GGCCAACCAACC", "IIIIIIIIIIII"),
        ],
    );
    let barcode_list = write_barcode_list(&dir, "alpha ACGT\nbeta GGCC\n");

    let mut config = base_config(&dir, "reads.fq");
    config.adapters.load_barcodes(&barcode_list).unwrap();

    let summary = pipeline::run(config).unwrap();
    let demux = summary.demux.unwrap();
    assert_eq!(demux.barcodes, vec![1, 1]);

    let report = fs::read_to_string(dir.path().join("output.demux_stats")).unwrap();
    assert!(report.contains("[Demultiplexing statistics]"));
    assert!(report.contains("Name\tBarcode_1\tBarcode_2\tHits\tFraction"));
    assert!(report.contains("unidentified\tNA\tNA\t0\t0.000"));
    assert!(report.contains("ambiguous\tNA\tNA\t0\t0.000"));
    assert!(report.contains("alpha\tACGT\t*\t1\t0.500"));
    assert!(report.contains("beta\tGGCC\t*\t1\t0.500"));
    assert!(report.contains("*\t*\t*\t2\t1.000"));

    // Each sample gets its own settings report
    assert!(dir.path().join("output.alpha.settings").exists());
    assert!(dir.path().join("output.beta.settings").exists());
}

#[test]
fn test_demux_invariant_totals_add_up() {
    let dir = TempDir::new().unwrap();
    // alpha: exact; between alpha and beta at one mismatch each: ambiguous
    write_fastq(
        &dir.path().join("reads.fq"),
        &[
            ("r1", "AAAAGGGGCCCC", "IIIIIIIIIIII"),
            ("r2", "AAATGGGGCCCC", "IIIIIIIIIIII"),
            ("r3", "CCCCGGGGCCCC", "IIIIIIIIIIII"),
        ],
    );
    let barcode_list = write_barcode_list(&dir, "alpha AAAA\nbeta AATT\n");

    let mut config = base_config(&dir, "reads.fq");
    config.adapters.load_barcodes(&barcode_list).unwrap();
    config.barcode_mm = 1;
    config.barcode_mm_r1 = 1;

    let summary = pipeline::run(config).unwrap();
    let demux = summary.demux.unwrap();

    let identified: u64 = demux.barcodes.iter().sum();
    assert_eq!(identified + demux.ambiguous + demux.unidentified, 3);
    assert_eq!(demux.total(), 3);
}

#[test]
fn test_paired_demux_strips_only_mate1_for_single_index() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("r1.fq"), &[("frag/1", "ACGTCCGGACCA", "IIIIIIIIIIII")]);
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "AGTCAGTCAGTC", "IIIIIIIIIIII")]);
    let barcode_list = write_barcode_list(&dir, "alpha ACGT\n");

    let mut config = base_config(&dir, "r1.fq");
    config.input_file_2 = Some(dir.path().join("r2.fq"));
    config.paired_ended_mode = true;
    config.adapters =
        readclean_lib::adapters::AdapterSet::new(&[(String::new(), String::new())]).unwrap();
    config.adapters.load_barcodes(&barcode_list).unwrap();

    let summary = pipeline::run(config).unwrap();
    assert_eq!(summary.demux.unwrap().barcodes, vec![1]);

    let mate_1 = read_fastq(&dir.path().join("output.alpha.pair1.truncated"));
    let mate_2 = read_fastq(&dir.path().join("output.alpha.pair2.truncated"));
    assert_eq!(mate_1[0].1, "CCGGACCA");
    assert_eq!(mate_2[0].1, "AGTCAGTCAGTC");
}
