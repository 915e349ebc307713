//! Pipeline stage implementations.
//!
//! Each submodule provides one kind of [`crate::scheduler::PipelineStep`]:
//! sources decoding FASTQ input, the demultiplexer, per-sample trimming
//! processors, and sink writers with their compression shims.

pub mod demux;
pub mod reader;
pub mod trim;
pub mod writer;
