//! Sink writers and compression shims.
//!
//! A [`WriteFastq`] stage appends output-chunk bytes to its file, creating
//! it on the first chunk and closing it on end-of-stream. When compression
//! is enabled, an `Ordered` compressor stage sits in front of the writer and
//! transforms each chunk into an independent gzip member (libdeflater) or
//! bzip2 stream; concatenated members form a valid compressed file, the same
//! layout the block-parallel gzip writers in this codebase's lineage emit.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use bzip2::Compression;
use bzip2::write::BzEncoder;
use libdeflater::{CompressionLvl, Compressor};
use parking_lot::Mutex;

use crate::chunks::{Chunk, OutputChunk};
use crate::errors::{PipelineError, Result};
use crate::scheduler::{PipelineStep, StepId, StepOrdering};

fn expect_bytes(chunk: Chunk, stage: &str) -> Result<OutputChunk> {
    match chunk {
        Chunk::Bytes(output) => Ok(output),
        _ => Err(PipelineError::SchedulerCancelled(format!(
            "{stage} received a chunk of unexpected type"
        ))),
    }
}

/// Ordered sink appending chunk bytes to one output file.
pub struct WriteFastq {
    path: PathBuf,
    state: Mutex<WriterState>,
}

struct WriterState {
    file: Option<BufWriter<File>>,
    closed: bool,
}

impl WriteFastq {
    /// Create a writer for `path`; the file itself is created lazily.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, state: Mutex::new(WriterState { file: None, closed: false }) }
    }
}

impl PipelineStep for WriteFastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let output = expect_bytes(chunk, "writer")?;
        let mut state = self.state.lock();

        if state.closed {
            return Err(PipelineError::SchedulerCancelled(format!(
                "chunk arrived for '{}' after end-of-stream",
                self.path.display()
            )));
        }

        if state.file.is_none() {
            let file = File::create(&self.path).map_err(|e| PipelineError::io(&self.path, e))?;
            state.file = Some(BufWriter::new(file));
        }

        let file = state.file.as_mut().expect("file opened above");
        file.write_all(&output.bytes).map_err(|e| PipelineError::io(&self.path, e))?;

        if output.eof {
            file.flush().map_err(|e| PipelineError::io(&self.path, e))?;
            state.file = None;
            state.closed = true;
        }

        Ok(Vec::new())
    }
}

/// Ordered gzip compressor in front of a writer stage.
pub struct GzipFastq {
    compressor: Mutex<Compressor>,
    next_step: StepId,
    /// Final output path, for error context only
    path: PathBuf,
}

impl GzipFastq {
    /// Create a compressor forwarding to `next_step`.
    pub fn new(level: u32, next_step: StepId, path: PathBuf) -> Result<Self> {
        let level = CompressionLvl::new(level as i32).map_err(|e| {
            PipelineError::ConfigInvalid(format!("invalid gzip compression level: {e:?}"))
        })?;
        Ok(Self { compressor: Mutex::new(Compressor::new(level)), next_step, path })
    }
}

impl PipelineStep for GzipFastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let output = expect_bytes(chunk, "gzip compressor")?;
        if output.bytes.is_empty() {
            return Ok(vec![(self.next_step, Chunk::Bytes(output))]);
        }

        let mut compressor = self.compressor.lock();
        let bound = compressor.gzip_compress_bound(output.bytes.len());
        let mut compressed = vec![0u8; bound];
        let written = compressor.gzip_compress(&output.bytes, &mut compressed).map_err(|e| {
            PipelineError::io(&self.path, std::io::Error::other(format!("gzip failed: {e:?}")))
        })?;
        compressed.truncate(written);

        let chunk =
            OutputChunk { bytes: compressed, nreads: output.nreads, eof: output.eof };
        Ok(vec![(self.next_step, Chunk::Bytes(chunk))])
    }
}

/// Ordered bzip2 compressor in front of a writer stage.
pub struct Bzip2Fastq {
    level: u32,
    next_step: StepId,
    /// Final output path, for error context only
    path: PathBuf,
}

impl Bzip2Fastq {
    /// Create a compressor forwarding to `next_step`.
    pub fn new(level: u32, next_step: StepId, path: PathBuf) -> Result<Self> {
        if !(1..=9).contains(&level) {
            return Err(PipelineError::ConfigInvalid(format!(
                "invalid bzip2 compression level {level}"
            )));
        }
        Ok(Self { level, next_step, path })
    }
}

impl PipelineStep for Bzip2Fastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let output = expect_bytes(chunk, "bzip2 compressor")?;
        if output.bytes.is_empty() {
            return Ok(vec![(self.next_step, Chunk::Bytes(output))]);
        }

        let io_error =
            |e: std::io::Error| PipelineError::io(&self.path, e);

        let mut encoder =
            BzEncoder::new(Vec::with_capacity(output.bytes.len() / 2), Compression::new(self.level));
        encoder.write_all(&output.bytes).map_err(io_error)?;
        let compressed = encoder.finish().map_err(io_error)?;

        let chunk =
            OutputChunk { bytes: compressed, nreads: output.nreads, eof: output.eof };
        Ok(vec![(self.next_step, Chunk::Bytes(chunk))])
    }
}
