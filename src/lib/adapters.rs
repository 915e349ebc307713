//! Adapter and barcode metadata.
//!
//! An [`AdapterSet`] is the immutable description of the adapters to trim and
//! (optionally) the per-sample barcodes to demultiplex on. It is built once
//! at startup and shared read-only by every stage that needs it.

use std::io::BufRead;
use std::path::Path;

use crate::dna::normalize_base;
use crate::errors::{PipelineError, Result};

/// A pair of adapter sequences.
///
/// `adapter1` is expected at the 3' end of mate 1 reads; `adapter2` at the
/// 3' end of mate 2 reads (empty for single-end data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterPair {
    /// Adapter contaminating mate 1 reads
    pub adapter1: Vec<u8>,
    /// Adapter contaminating mate 2 reads
    pub adapter2: Vec<u8>,
}

/// A named barcode (pair) identifying one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeEntry {
    /// Sample name used for output files and reports
    pub name: String,
    /// Barcode expected as the prefix of mate 1 reads
    pub barcode1: Vec<u8>,
    /// Barcode expected as the prefix of mate 2 reads (may be empty)
    pub barcode2: Vec<u8>,
}

/// Immutable adapter/barcode metadata shared by all pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct AdapterSet {
    adapters: Vec<AdapterPair>,
    barcodes: Vec<BarcodeEntry>,
}

impl AdapterSet {
    /// Build an adapter set from raw sequence strings.
    ///
    /// `pairs` is the ordered list of `(adapter1, adapter2)` sequences;
    /// adapter2 entries are empty for single-end data.
    pub fn new(pairs: &[(String, String)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(PipelineError::ConfigInvalid("at least one adapter is required".into()));
        }

        let mut adapters = Vec::with_capacity(pairs.len());
        for (adapter1, adapter2) in pairs {
            adapters.push(AdapterPair {
                adapter1: normalize_sequence(adapter1, "adapter1")?,
                adapter2: normalize_sequence(adapter2, "adapter2")?,
            });
        }

        Ok(Self { adapters, barcodes: Vec::new() })
    }

    /// Attach per-sample barcodes parsed from a barcode-list file.
    ///
    /// Each non-empty, non-comment line holds `name barcode1 [barcode2]`
    /// separated by whitespace. All `barcode1` sequences must share one
    /// length; `barcode2` sequences must either all be present with one
    /// length or all be absent.
    pub fn load_barcodes(&mut self, path: &Path) -> Result<()> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let reader = std::io::BufReader::new(file);

        let mut barcodes = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| PipelineError::io(path, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            let (name, barcode1, barcode2) = match fields.as_slice() {
                [name, barcode1] => (*name, *barcode1, ""),
                [name, barcode1, barcode2] => (*name, *barcode1, *barcode2),
                other => {
                    return Err(PipelineError::ConfigInvalid(format!(
                        "barcode list '{}' line {}: expected 2 or 3 fields, found {}",
                        path.display(),
                        lineno + 1,
                        other.len()
                    )));
                }
            };

            barcodes.push(BarcodeEntry {
                name: name.to_string(),
                barcode1: normalize_sequence(barcode1, "barcode1")?,
                barcode2: normalize_sequence(barcode2, "barcode2")?,
            });
        }

        if barcodes.is_empty() {
            return Err(PipelineError::ConfigInvalid(format!(
                "barcode list '{}' contains no barcodes",
                path.display()
            )));
        }

        validate_barcode_lengths(&barcodes)?;
        self.barcodes = barcodes;
        Ok(())
    }

    /// The ordered list of adapter pairs.
    #[must_use]
    pub fn adapters(&self) -> &[AdapterPair] {
        &self.adapters
    }

    /// Per-sample barcodes; empty when demultiplexing is disabled.
    #[must_use]
    pub fn barcodes(&self) -> &[BarcodeEntry] {
        &self.barcodes
    }

    /// Number of barcoded samples (zero when demultiplexing is disabled).
    #[must_use]
    pub fn barcode_count(&self) -> usize {
        self.barcodes.len()
    }

    /// Number of per-sample trimming stages the pipeline needs.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.barcodes.len().max(1)
    }

    /// Name of the nth sample; the empty string when not demultiplexing.
    #[must_use]
    pub fn sample_name(&self, nth: usize) -> &str {
        self.barcodes.get(nth).map_or("", |entry| entry.name.as_str())
    }

    /// True when the loaded barcodes carry a second (mate 2) index.
    #[must_use]
    pub fn double_indexed(&self) -> bool {
        self.barcodes.first().is_some_and(|entry| !entry.barcode2.is_empty())
    }
}

fn normalize_sequence(raw: &str, what: &str) -> Result<Vec<u8>> {
    let mut sequence = Vec::with_capacity(raw.len());
    for byte in raw.bytes() {
        match normalize_base(byte) {
            Some(base) => sequence.push(base),
            None => {
                return Err(PipelineError::ConfigInvalid(format!(
                    "invalid nucleotide {:?} in {what} sequence '{raw}'",
                    char::from(byte)
                )));
            }
        }
    }
    Ok(sequence)
}

fn validate_barcode_lengths(barcodes: &[BarcodeEntry]) -> Result<()> {
    let len1 = barcodes[0].barcode1.len();
    let len2 = barcodes[0].barcode2.len();

    for entry in barcodes {
        if entry.barcode1.is_empty() {
            return Err(PipelineError::ConfigInvalid(format!(
                "sample '{}' has an empty mate 1 barcode",
                entry.name
            )));
        }
        if entry.barcode1.len() != len1 || entry.barcode2.len() != len2 {
            return Err(PipelineError::ConfigInvalid(format!(
                "inconsistent barcode lengths for sample '{}'",
                entry.name
            )));
        }
    }

    Ok(())
}
