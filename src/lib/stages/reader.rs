//! Source stages decoding FASTQ input into read chunks.
//!
//! The byte-level FASTQ tokenizer is `seq_io`; these stages validate its
//! output shape, normalize sequences and decode quality strings into raw
//! Phred scores. Inputs may be plain, gzip- or bzip2-compressed; the
//! compression is sniffed from the leading magic bytes.
//!
//! Every source is `Ordered`: the scheduler triggers it with [`Chunk::Start`]
//! and it emits one [`ReadChunk`] of up to [`CHUNK_SIZE`] reads (pairs) per
//! trigger, flagging the final chunk `eof`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use parking_lot::Mutex;
use seq_io::fastq::{Reader as FastqReader, Record};

use crate::chunks::{CHUNK_SIZE, Chunk, ReadChunk};
use crate::encoding::QualityEncoding;
use crate::errors::{PipelineError, Result};
use crate::fastq::FastqRecord;
use crate::scheduler::{PipelineStep, StepId, StepOrdering};

type InputReader = FastqReader<Box<dyn BufRead + Send>>;

/// Open an input file, transparently decompressing gzip and bzip2.
fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let magic = reader.fill_buf().map_err(|e| PipelineError::io(path, e))?;
    if magic.starts_with(&[0x1f, 0x8b]) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else if magic.starts_with(b"BZh") {
        Ok(Box::new(BufReader::new(MultiBzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Pull and decode the next record, or `None` at end of input.
fn next_record(
    reader: &mut InputReader,
    path: &Path,
    encoding: QualityEncoding,
) -> Result<Option<FastqRecord>> {
    match reader.next() {
        None => Ok(None),
        Some(Err(error)) => Err(PipelineError::malformed(path, error.to_string())),
        Some(Ok(record)) => {
            FastqRecord::parse(path, record.head(), record.seq(), record.qual(), encoding).map(Some)
        }
    }
}

/// Source stage for single-end input.
pub struct ReadSingleFastq {
    state: Mutex<SingleState>,
    next_step: StepId,
}

struct SingleState {
    reader: InputReader,
    path: PathBuf,
    encoding: QualityEncoding,
}

impl ReadSingleFastq {
    /// Open `path` and target decoded chunks at `next_step`.
    pub fn new(path: &Path, encoding: QualityEncoding, next_step: StepId) -> Result<Self> {
        let reader = FastqReader::new(open_input(path)?);
        Ok(Self {
            state: Mutex::new(SingleState { reader, path: path.to_path_buf(), encoding }),
            next_step,
        })
    }
}

impl PipelineStep for ReadSingleFastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, _chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let mut state = self.state.lock();
        let SingleState { reader, path, encoding } = &mut *state;

        let mut chunk = ReadChunk::empty(false);
        chunk.reads_1.reserve(CHUNK_SIZE);
        while chunk.reads_1.len() < CHUNK_SIZE {
            match next_record(reader, path, *encoding)? {
                Some(read) => chunk.reads_1.push(read),
                None => {
                    chunk.eof = true;
                    break;
                }
            }
        }

        Ok(vec![(self.next_step, Chunk::Reads(chunk))])
    }
}

/// Source stage for paired-end input split across two files.
pub struct ReadPairedFastq {
    state: Mutex<PairedState>,
    next_step: StepId,
}

struct PairedState {
    reader_1: InputReader,
    reader_2: InputReader,
    path_1: PathBuf,
    path_2: PathBuf,
    encoding: QualityEncoding,
}

impl ReadPairedFastq {
    /// Open both mate files and target decoded chunks at `next_step`.
    pub fn new(
        path_1: &Path,
        path_2: &Path,
        encoding: QualityEncoding,
        next_step: StepId,
    ) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(PairedState {
                reader_1: FastqReader::new(open_input(path_1)?),
                reader_2: FastqReader::new(open_input(path_2)?),
                path_1: path_1.to_path_buf(),
                path_2: path_2.to_path_buf(),
                encoding,
            }),
            next_step,
        })
    }
}

impl PipelineStep for ReadPairedFastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, _chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let mut state = self.state.lock();
        let PairedState { reader_1, reader_2, path_1, path_2, encoding } = &mut *state;

        let mut chunk = ReadChunk::empty(false);
        chunk.reads_1.reserve(CHUNK_SIZE);
        chunk.reads_2.reserve(CHUNK_SIZE);

        while chunk.reads_1.len() < CHUNK_SIZE {
            let mate_1 = next_record(reader_1, path_1, *encoding)?;
            let mate_2 = next_record(reader_2, path_2, *encoding)?;

            match (mate_1, mate_2) {
                (Some(read_1), Some(read_2)) => {
                    chunk.reads_1.push(read_1);
                    chunk.reads_2.push(read_2);
                }
                (None, None) => {
                    chunk.eof = true;
                    break;
                }
                (Some(_), None) => {
                    return Err(PipelineError::malformed(
                        path_2,
                        "file contains fewer records than its mate file",
                    ));
                }
                (None, Some(_)) => {
                    return Err(PipelineError::malformed(
                        path_1,
                        "file contains fewer records than its mate file",
                    ));
                }
            }
        }

        Ok(vec![(self.next_step, Chunk::Reads(chunk))])
    }
}

/// Source stage for paired-end input with interleaved mates in one file.
pub struct ReadInterleavedFastq {
    state: Mutex<SingleState>,
    next_step: StepId,
}

impl ReadInterleavedFastq {
    /// Open `path` and target decoded chunks at `next_step`.
    pub fn new(path: &Path, encoding: QualityEncoding, next_step: StepId) -> Result<Self> {
        let reader = FastqReader::new(open_input(path)?);
        Ok(Self {
            state: Mutex::new(SingleState { reader, path: path.to_path_buf(), encoding }),
            next_step,
        })
    }
}

impl PipelineStep for ReadInterleavedFastq {
    fn ordering(&self) -> StepOrdering {
        StepOrdering::Ordered
    }

    fn process(&self, _chunk: Chunk) -> Result<Vec<(StepId, Chunk)>> {
        let mut state = self.state.lock();
        let SingleState { reader, path, encoding } = &mut *state;

        let mut chunk = ReadChunk::empty(false);
        while chunk.reads_1.len() < CHUNK_SIZE {
            let Some(read_1) = next_record(reader, path, *encoding)? else {
                chunk.eof = true;
                break;
            };
            let Some(read_2) = next_record(reader, path, *encoding)? else {
                return Err(PipelineError::malformed(
                    path,
                    "interleaved file contains an odd number of records",
                ));
            };
            chunk.reads_1.push(read_1);
            chunk.reads_2.push(read_2);
        }

        Ok(vec![(self.next_step, Chunk::Reads(chunk))])
    }
}
