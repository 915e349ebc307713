//! End-to-end paired-end trimming and collapsing runs.

use readclean_lib::adapters::AdapterSet;
use readclean_lib::pipeline;
use tempfile::TempDir;

use crate::helpers::{base_config, output_path, read_fastq, write_fastq};

fn paired_config(dir: &TempDir) -> readclean_lib::config::UserConfig {
    let mut config = base_config(dir, "r1.fq");
    config.input_file_2 = Some(dir.path().join("r2.fq"));
    config.paired_ended_mode = true;
    config.adapters = AdapterSet::new(&[(String::new(), String::new())]).unwrap();
    config
}

#[test]
fn test_overlapping_pair_is_collapsed() {
    let dir = TempDir::new().unwrap();
    // The mates overlap over their last/first four bases: mate 2 as
    // sequenced is the reverse complement of the template suffix AAAACGTA
    write_fastq(&dir.path().join("r1.fq"), &[("frag/1", "ACGTAAAA", "IIIIIIII")]);
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "TACGTTTT", "IIIIIIII")]);

    let mut config = paired_config(&dir);
    config.collapse = true;
    config.min_alignment_length = 4;

    let summary = pipeline::run(config).unwrap();

    let collapsed = read_fastq(&output_path(&dir, ".collapsed"));
    assert_eq!(collapsed.len(), 1);
    assert_eq!(collapsed[0].0, "M_frag/1");
    assert_eq!(collapsed[0].1, "ACGTAAAACGTA");
    // Agreeing overlap positions get the summed, capped quality
    assert_eq!(collapsed[0].2, "IIIIJJJJIIII");

    assert!(read_fastq(&output_path(&dir, ".pair1.truncated")).is_empty());
    assert!(read_fastq(&output_path(&dir, ".collapsed.truncated")).is_empty());

    let stats = &summary.per_sample[0];
    assert_eq!(stats.collapsed_full_length, 1);
    assert_eq!(stats.collapsed_truncated, 0);
    assert_eq!(stats.well_aligned, 1);
}

#[test]
fn test_non_overlapping_pair_passes_through() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("r1.fq"), &[("frag/1", "ACGTCCGGAC", "IIIIIIIIII")]);
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "AGTCAGTCAG", "IIIIIIIIII")]);

    let config = paired_config(&dir);
    pipeline::run(config).unwrap();

    let mate_1 = read_fastq(&output_path(&dir, ".pair1.truncated"));
    let mate_2 = read_fastq(&output_path(&dir, ".pair2.truncated"));
    assert_eq!(mate_1[0].1, "ACGTCCGGAC");
    assert_eq!(mate_2[0].1, "AGTCAGTCAG");
}

#[test]
fn test_singleton_and_discarded_routing() {
    let dir = TempDir::new().unwrap();
    write_fastq(&dir.path().join("r1.fq"), &[("frag/1", "ACGTCCGGAC", "IIIIIIIIII")]);
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "AAAA", "IIII")]);

    let mut config = paired_config(&dir);
    config.min_genomic_length = 6;

    let summary = pipeline::run(config).unwrap();

    let singletons = read_fastq(&output_path(&dir, ".singleton.truncated"));
    assert_eq!(singletons.len(), 1);
    assert_eq!(singletons[0].0, "frag/1");

    let discarded = read_fastq(&output_path(&dir, ".discarded"));
    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].0, "frag/2");

    let stats = &summary.per_sample[0];
    assert_eq!(stats.singleton_mate1, 1);
    assert_eq!(stats.discarded_mate2, 1);
}

#[test]
fn test_interleaved_input_and_output() {
    let dir = TempDir::new().unwrap();
    write_fastq(
        &dir.path().join("reads.fq"),
        &[
            ("frag/1", "ACGTCCGGAC", "IIIIIIIIII"),
            ("frag/2", "AGTCAGTCAG", "IIIIIIIIII"),
        ],
    );

    let mut config = base_config(&dir, "reads.fq");
    config.paired_ended_mode = true;
    config.interleaved_input = true;
    config.interleaved_output = true;
    config.adapters = AdapterSet::new(&[(String::new(), String::new())]).unwrap();

    let summary = pipeline::run(config).unwrap();
    assert_eq!(summary.per_sample[0].records, 1);

    let records = read_fastq(&output_path(&dir, ".pair1.truncated"));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, "frag/1");
    assert_eq!(records[1].0, "frag/2");
}

#[test]
fn test_pe_adapter_readthrough_is_trimmed() {
    let dir = TempDir::new().unwrap();
    // Template ACGTACGTA with both mates reading through into the adapters
    write_fastq(&dir.path().join("r1.fq"), &[("frag/1", "ACGTACGTAAGA", "IIIIIIIIIIII")]);
    // As-sequenced mate 2: reverse complement of CTTACGTACGTA
    write_fastq(&dir.path().join("r2.fq"), &[("frag/2", "TACGTACGTAAG", "IIIIIIIIIIII")]);

    let mut config = paired_config(&dir);
    config.adapters =
        AdapterSet::new(&[("AGATCG".to_string(), "GCTCTT".to_string())]).unwrap();

    let summary = pipeline::run(config).unwrap();

    let mate_1 = read_fastq(&output_path(&dir, ".pair1.truncated"));
    let mate_2 = read_fastq(&output_path(&dir, ".pair2.truncated"));
    assert_eq!(mate_1[0].1, "ACGTACGTA");
    // Mate 2 is restored to its original orientation after truncation
    assert_eq!(mate_2[0].1, "TACGTACGT");

    let stats = &summary.per_sample[0];
    assert_eq!(stats.well_aligned, 1);
    assert_eq!(stats.adapter_hits, vec![2]);
}
