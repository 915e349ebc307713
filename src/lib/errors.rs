//! Custom error types for readclean operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for readclean operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for the read-processing pipeline.
///
/// Every kind is fatal: the scheduler cancels in-flight work, the first error
/// is surfaced to the user and the process exits non-zero. There are no
/// per-record retries or skip-on-error modes.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A FASTQ record could not be parsed or violated the format grammar
    #[error("Malformed FASTQ record in '{}': {reason}", path.display())]
    MalformedRecord {
        /// Originating input file
        path: PathBuf,
        /// Explanation of the problem
        reason: String,
    },

    /// Mate 1 and mate 2 headers do not describe the same template
    #[error("Mismatching read names for mate pair: '{name_1}' vs '{name_2}'")]
    MatePairMismatch {
        /// Read name from the mate 1 record
        name_1: String,
        /// Read name from the mate 2 record
        name_2: String,
    },

    /// A quality byte fell outside the range of the configured encoding
    #[error("Quality score {score} out of range for {encoding} (max {max})")]
    QualityOutOfRange {
        /// The decoded or raw score that was rejected
        score: i32,
        /// Name of the offending encoding
        encoding: &'static str,
        /// Highest score the encoding can represent
        max: i32,
    },

    /// An I/O operation failed
    #[error("IO error on '{}': {source}", path.display())]
    IoFailure {
        /// File being read or written when the failure occurred
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// User-supplied configuration is inconsistent or out of range
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The scheduler was cancelled after another failure
    #[error("Pipeline cancelled: {0}")]
    SchedulerCancelled(String),
}

impl PipelineError {
    /// Wrap an `io::Error` with the file it originated from.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PipelineError::IoFailure { path: path.to_path_buf(), source }
    }

    /// Build a [`PipelineError::MalformedRecord`] for the given input file.
    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord { path: path.to_path_buf(), reason: reason.into() }
    }
}
