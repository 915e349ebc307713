//! Work units flowing along the edges of the pipeline graph.

use crate::fastq::FastqRecord;

/// Target number of reads (or read pairs) per chunk.
///
/// Large enough to amortize scheduling overhead, small enough that chunks
/// spread across the worker pool.
pub const CHUNK_SIZE: usize = 1024;

/// A batch of decoded reads moving between stages.
#[derive(Debug, Default)]
pub struct ReadChunk {
    /// Mate 1 (or single-end) reads
    pub reads_1: Vec<FastqRecord>,
    /// Mate 2 reads; empty for single-end data
    pub reads_2: Vec<FastqRecord>,
    /// Sticky end-of-stream marker: no chunk follows this one on its edge
    pub eof: bool,
}

impl ReadChunk {
    /// Create an empty chunk carrying only the end-of-stream flag.
    #[must_use]
    pub fn empty(eof: bool) -> Self {
        Self { reads_1: Vec::new(), reads_2: Vec::new(), eof }
    }
}

/// A batch of serialized output bytes headed for a writer.
#[derive(Debug, Default)]
pub struct OutputChunk {
    /// Serialized FASTQ (possibly compressed) bytes
    pub bytes: Vec<u8>,
    /// Number of reads the bytes encode, for logging
    pub nreads: usize,
    /// Sticky end-of-stream marker
    pub eof: bool,
}

impl OutputChunk {
    /// Create an empty chunk carrying only the end-of-stream flag.
    #[must_use]
    pub fn empty(eof: bool) -> Self {
        Self { bytes: Vec::new(), nreads: 0, eof }
    }
}

/// One unit of work delivered to a stage.
#[derive(Debug)]
pub enum Chunk {
    /// Scheduler trigger delivered to the source stage
    Start,
    /// Decoded reads
    Reads(ReadChunk),
    /// Serialized bytes
    Bytes(OutputChunk),
}

impl Chunk {
    /// True when this chunk closes its edge.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        match self {
            Chunk::Start => false,
            Chunk::Reads(chunk) => chunk.eof,
            Chunk::Bytes(chunk) => chunk.eof,
        }
    }
}
