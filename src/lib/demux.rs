//! Barcode-based demultiplexing.
//!
//! Classifies reads (or read pairs) into samples by comparing their leading
//! bases against a table of per-sample barcodes under a mismatch budget, then
//! strips the barcode bases so downstream trimming sees genomic sequence.

use crate::adapters::BarcodeEntry;
use crate::errors::{PipelineError, Result};
use crate::fastq::FastqRecord;

/// Outcome of classifying one read (pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeMatch {
    /// Exactly one barcode was the strict best match within the budget
    Identified(usize),
    /// Two or more barcodes tied for the best match within the budget
    Ambiguous,
    /// No barcode satisfied the mismatch budget
    Unidentified,
}

/// Static lookup of per-sample barcodes with mismatch budgets.
#[derive(Debug, Clone)]
pub struct BarcodeTable {
    barcodes: Vec<BarcodeEntry>,
    length_1: usize,
    length_2: usize,
    max_mismatches: usize,
    max_mismatches_r1: usize,
    max_mismatches_r2: usize,
}

impl BarcodeTable {
    /// Build the table, validating that barcode lengths are consistent.
    pub fn new(
        barcodes: &[BarcodeEntry],
        max_mismatches: usize,
        max_mismatches_r1: usize,
        max_mismatches_r2: usize,
    ) -> Result<Self> {
        let Some(first) = barcodes.first() else {
            return Err(PipelineError::ConfigInvalid(
                "demultiplexing requires at least one barcode".into(),
            ));
        };

        let length_1 = first.barcode1.len();
        let length_2 = first.barcode2.len();
        for entry in barcodes {
            if entry.barcode1.len() != length_1 || entry.barcode2.len() != length_2 {
                return Err(PipelineError::ConfigInvalid(format!(
                    "inconsistent barcode lengths for sample '{}'",
                    entry.name
                )));
            }
        }

        Ok(Self {
            barcodes: barcodes.to_vec(),
            length_1,
            length_2,
            max_mismatches,
            max_mismatches_r1,
            max_mismatches_r2,
        })
    }

    /// Number of bases stripped from mate 1 reads.
    #[must_use]
    pub fn barcode1_length(&self) -> usize {
        self.length_1
    }

    /// Number of bases stripped from mate 2 reads (zero when single-indexed).
    #[must_use]
    pub fn barcode2_length(&self) -> usize {
        self.length_2
    }

    /// Classify a read (pair) against every barcode.
    ///
    /// A sample is identified only when it is strictly the unique minimum
    /// total mismatch count among barcodes satisfying all three budgets.
    #[must_use]
    pub fn classify(&self, read1: &FastqRecord, read2: Option<&FastqRecord>) -> BarcodeMatch {
        if read1.len() < self.length_1 {
            return BarcodeMatch::Unidentified;
        }
        let mate = if self.length_2 > 0 {
            match read2 {
                Some(mate) if mate.len() >= self.length_2 => Some(mate),
                _ => return BarcodeMatch::Unidentified,
            }
        } else {
            None
        };

        let mut best_total = usize::MAX;
        let mut best_index = 0;
        let mut best_count = 0usize;

        for (index, entry) in self.barcodes.iter().enumerate() {
            let mismatches_1 = hamming(&read1.sequence()[..self.length_1], &entry.barcode1);
            if mismatches_1 > self.max_mismatches_r1 {
                continue;
            }

            let mismatches_2 =
                mate.map_or(0, |mate| hamming(&mate.sequence()[..self.length_2], &entry.barcode2));
            if mismatches_2 > self.max_mismatches_r2 {
                continue;
            }

            let total = mismatches_1 + mismatches_2;
            if total > self.max_mismatches {
                continue;
            }

            if total < best_total {
                best_total = total;
                best_index = index;
                best_count = 1;
            } else if total == best_total {
                best_count += 1;
            }
        }

        match best_count {
            0 => BarcodeMatch::Unidentified,
            1 => BarcodeMatch::Identified(best_index),
            _ => BarcodeMatch::Ambiguous,
        }
    }

    /// Remove the barcode prefixes from an identified read (pair).
    pub fn strip(&self, read1: &mut FastqRecord, read2: Option<&mut FastqRecord>) {
        read1.trim_ends(self.length_1, 0);
        if self.length_2 > 0 {
            if let Some(mate) = read2 {
                mate.trim_ends(self.length_2, 0);
            }
        }
    }
}

/// Hamming distance over equal-length slices; `N` counts as a mismatch.
fn hamming(observed: &[u8], expected: &[u8]) -> usize {
    observed.iter().zip(expected).filter(|(a, b)| a != b).count()
}
