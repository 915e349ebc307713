//! Integration tests for the readclean library.
//!
//! These tests validate end-to-end pipeline runs over real files: trimming,
//! collapsing, demultiplexing, compressed output, report generation and
//! multi-threaded ordering guarantees.

mod helpers;
mod test_demux_pipeline;
mod test_error_paths;
mod test_paired_pipeline;
mod test_pipeline_concurrency;
mod test_single_end_pipeline;
