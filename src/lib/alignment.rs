//! Adapter alignment engine.
//!
//! Finds the best ungapped overlap between a read and an adapter (single-end)
//! or between the two mates of a pair plus their flanking adapters
//! (paired-end). Scoring is `matches - mismatches`; a no-call base on either
//! side neither matches nor mismatches and is tracked separately so mismatch
//! budgets can be applied to informative positions only.

use crate::adapters::AdapterPair;
use crate::fastq::FastqRecord;

/// Location and score of one candidate adapter/read overlap.
///
/// `offset` is the signed position of the second sequence relative to the
/// first (negative when the second sequence starts before the first). The
/// null alignment has `length == 0` and `score == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlignmentInfo {
    /// `matches - mismatches` over the overlap
    pub score: isize,
    /// Signed shift of the second sequence relative to the first
    pub offset: isize,
    /// Number of overlapping positions, ambiguous ones included
    pub length: usize,
    /// Positions where both sides held informative, differing bases
    pub n_mismatches: usize,
    /// Positions where either side held an `N`
    pub n_ambiguous: usize,
    /// Index of the adapter pair that produced this alignment
    pub adapter_id: usize,
}

impl AlignmentInfo {
    /// Ordering used to select the best candidate: higher score first, then
    /// smaller shift, then smaller adapter index.
    fn is_better_than(&self, other: &AlignmentInfo) -> bool {
        if self.score != other.score {
            return self.score > other.score;
        }
        if self.offset != other.offset {
            return self.offset < other.offset;
        }
        self.adapter_id < other.adapter_id
    }
}

/// Score `seq2` placed at signed `offset` relative to `seq1`.
///
/// Returns `None` when the sequences do not overlap at that offset.
fn compare_subsequences(seq1: &[u8], seq2: &[u8], offset: isize) -> Option<AlignmentInfo> {
    let start1 = offset.max(0) as usize;
    let start2 = (-offset).max(0) as usize;
    if start1 >= seq1.len() || start2 >= seq2.len() {
        return None;
    }

    let length = (seq1.len() - start1).min(seq2.len() - start2);
    let mut matches = 0isize;
    let mut n_mismatches = 0usize;
    let mut n_ambiguous = 0usize;

    for (base1, base2) in seq1[start1..start1 + length].iter().zip(&seq2[start2..start2 + length]) {
        if *base1 == b'N' || *base2 == b'N' {
            n_ambiguous += 1;
        } else if base1 == base2 {
            matches += 1;
        } else {
            n_mismatches += 1;
        }
    }

    Some(AlignmentInfo {
        score: matches - n_mismatches as isize,
        offset,
        length,
        n_mismatches,
        n_ambiguous,
        adapter_id: 0,
    })
}

/// Align every candidate placement of `seq2` against `seq1`, keeping the best.
///
/// Offsets run from `-(max_shift)` (allowing `seq2` to slip off the 5' end of
/// `seq1`) through `seq1.len() - 1`.
fn pairwise_align(
    best: &mut AlignmentInfo,
    seq1: &[u8],
    seq2: &[u8],
    max_shift: usize,
    adapter_id: usize,
) {
    let min_offset = -(max_shift as isize);
    for offset in min_offset..seq1.len() as isize {
        if let Some(mut candidate) = compare_subsequences(seq1, seq2, offset) {
            candidate.adapter_id = adapter_id;
            if candidate.is_better_than(best) {
                *best = candidate;
            }
        }
    }
}

/// Locate the best adapter overlap at the 3' end of a single-end read.
///
/// A candidate shift aligns the suffix `read[shift..]` against a prefix of
/// the adapter, so the overlap always reaches the read's end and
/// `length == |read| - shift`; shifts the adapter is too short to cover are
/// skipped. The adapter may additionally slip up to `max_shift` bases off
/// the 5' end of the read, accounting for missing leading bases.
#[must_use]
pub fn align_single_end(
    read: &FastqRecord,
    adapters: &[AdapterPair],
    max_shift: usize,
) -> AlignmentInfo {
    let mut best = AlignmentInfo::default();
    let sequence = read.sequence();

    for (adapter_id, pair) in adapters.iter().enumerate() {
        let adapter = &pair.adapter1;

        for shift in -(max_shift as isize)..sequence.len() as isize {
            let start1 = shift.max(0) as usize;
            let start2 = (-shift).max(0) as usize;
            let overlap = sequence.len() - start1;
            if overlap == 0 || adapter.len() < start2 + overlap {
                continue;
            }

            let mut matches = 0isize;
            let mut n_mismatches = 0usize;
            let mut n_ambiguous = 0usize;
            for (base, expected) in sequence[start1..].iter().zip(&adapter[start2..]) {
                if *base == b'N' || *expected == b'N' {
                    n_ambiguous += 1;
                } else if base == expected {
                    matches += 1;
                } else {
                    n_mismatches += 1;
                }
            }

            let candidate = AlignmentInfo {
                score: matches - n_mismatches as isize,
                offset: shift,
                length: overlap,
                n_mismatches,
                n_ambiguous,
                adapter_id,
            };
            if candidate.is_better_than(&best) {
                best = candidate;
            }
        }
    }

    best
}

/// Locate the best overlap between the mates of a pair.
///
/// `read2` must already be reverse-complemented into mate 1 orientation. The
/// comparison sequences are `adapter2 + read1` versus `read2 + adapter1`, so
/// a single ungapped scan scores the mate/mate agreement zone together with
/// any read-through into either adapter. The returned offset is relative to
/// the first base of `read1`.
#[must_use]
pub fn align_paired_end(
    read1: &FastqRecord,
    read2: &FastqRecord,
    adapters: &[AdapterPair],
    max_shift: usize,
) -> AlignmentInfo {
    let mut best = AlignmentInfo::default();
    let mut found = false;

    for (adapter_id, pair) in adapters.iter().enumerate() {
        let mut seq1 = Vec::with_capacity(pair.adapter2.len() + read1.len());
        seq1.extend_from_slice(&pair.adapter2);
        seq1.extend_from_slice(read1.sequence());

        let mut seq2 = Vec::with_capacity(read2.len() + pair.adapter1.len());
        seq2.extend_from_slice(read2.sequence());
        seq2.extend_from_slice(&pair.adapter1);

        let mut candidate = AlignmentInfo::default();
        pairwise_align(&mut candidate, &seq1, &seq2, max_shift, adapter_id);

        if candidate.length > 0 {
            // Report offsets relative to read1, not the padded sequence
            candidate.offset -= pair.adapter2.len() as isize;
            if !found || candidate.is_better_than(&best) {
                best = candidate;
                found = true;
            }
        }
    }

    best
}

/// Remove an identified adapter from a single-end read.
///
/// Keeps the bases before the alignment offset; a non-positive offset empties
/// the read.
pub fn truncate_single_end(alignment: &AlignmentInfo, read: &mut FastqRecord) {
    read.truncate_to(alignment.offset.max(0) as usize);
}

/// Remove read-through adapter sequence from an aligned pair.
///
/// `read2` must still be in mate 1 orientation (reverse-complemented). The
/// template ends `offset + |read2|` bases into `read1`; anything beyond that
/// in `read1` is adapter 1. A negative offset means `read2` starts inside
/// adapter 2, and that prefix is removed from `read2`.
///
/// Returns the number of mates whose truncation actually removed bases
/// (0, 1 or 2); this feeds the per-adapter hit counts.
pub fn truncate_paired_end(
    alignment: &AlignmentInfo,
    read1: &mut FastqRecord,
    read2: &mut FastqRecord,
) -> usize {
    let mut truncated = 0;

    let template_end = alignment.offset + read2.len() as isize;
    if template_end < read1.len() as isize {
        read1.truncate_to(template_end.max(0) as usize);
        truncated += 1;
    }

    if alignment.offset < 0 {
        read2.trim_ends((-alignment.offset) as usize, 0);
        truncated += 1;
    }

    truncated
}
