//! In-memory FASTQ records.
//!
//! A [`FastqRecord`] owns a header, a normalized nucleotide sequence and a
//! vector of raw Phred scores. Quality offsets are removed at parse time and
//! applied again on encode, so every algorithm in the pipeline works on plain
//! scores. The invariant `sequence.len() == qualities.len()` holds for every
//! record the crate constructs.

use std::path::Path;

use crate::dna::{complement_base, normalize_base};
use crate::encoding::QualityEncoding;
use crate::errors::{PipelineError, Result};

/// A single FASTQ record with qualities stored as raw Phred scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    header: String,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
}

impl FastqRecord {
    /// Create a record from pre-normalized parts.
    ///
    /// Used by tests and the collapser; parsing from raw bytes goes through
    /// [`FastqRecord::parse`].
    ///
    /// # Panics
    ///
    /// Panics if sequence and quality lengths differ; all callers construct
    /// both vectors in lockstep.
    #[must_use]
    pub fn new(header: String, sequence: Vec<u8>, qualities: Vec<u8>) -> Self {
        assert_eq!(sequence.len(), qualities.len(), "sequence/quality length mismatch");
        Self { header, sequence, qualities }
    }

    /// Parse a record from the byte slices produced by the FASTQ tokenizer.
    ///
    /// The sequence is normalized to uppercase A/C/G/T/N (IUPAC ambiguity
    /// codes collapse to `N`); quality bytes are decoded against `encoding`.
    /// `path` names the input file for error messages.
    pub fn parse(
        path: &Path,
        head: &[u8],
        seq: &[u8],
        qual: &[u8],
        encoding: QualityEncoding,
    ) -> Result<Self> {
        if seq.len() != qual.len() {
            return Err(PipelineError::malformed(
                path,
                format!(
                    "sequence length ({}) does not match quality length ({})",
                    seq.len(),
                    qual.len()
                ),
            ));
        }

        let header = std::str::from_utf8(head)
            .map_err(|_| PipelineError::malformed(path, "read header is not valid UTF-8"))?
            .to_string();

        let mut sequence = Vec::with_capacity(seq.len());
        for &byte in seq {
            match normalize_base(byte) {
                Some(base) => sequence.push(base),
                None => {
                    return Err(PipelineError::malformed(
                        path,
                        format!("invalid nucleotide {:?} in read '{header}'", char::from(byte)),
                    ));
                }
            }
        }

        let mut qualities = Vec::with_capacity(qual.len());
        for &byte in qual {
            qualities.push(encoding.decode(byte)?);
        }

        Ok(Self { header, sequence, qualities })
    }

    /// The header line without the leading `@`.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The read name: the header up to the first whitespace.
    #[must_use]
    pub fn name(&self) -> &str {
        self.header.split_whitespace().next().unwrap_or("")
    }

    /// The nucleotide sequence (uppercase A/C/G/T/N).
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Raw Phred scores, one per base.
    #[must_use]
    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    /// Number of bases in the read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns true for a zero-length read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of no-call (`N`) bases.
    #[must_use]
    pub fn count_ns(&self) -> usize {
        self.sequence.iter().filter(|&&base| base == b'N').count()
    }

    /// Serialize the record as four FASTQ lines using `encoding` for the
    /// quality string.
    pub fn encode_into(&self, buffer: &mut Vec<u8>, encoding: QualityEncoding) {
        buffer.push(b'@');
        buffer.extend_from_slice(self.header.as_bytes());
        buffer.push(b'\n');
        buffer.extend_from_slice(&self.sequence);
        buffer.extend_from_slice(b"\n+\n");
        buffer.extend(self.qualities.iter().map(|&score| encoding.encode(score)));
        buffer.push(b'\n');
    }

    /// Reverse complement the record in place.
    ///
    /// The sequence is reversed and complemented; qualities are reversed so
    /// each score stays attached to its base. Applying this twice restores
    /// the record byte-for-byte.
    pub fn reverse_complement(&mut self) {
        self.sequence.reverse();
        for base in &mut self.sequence {
            *base = complement_base(*base);
        }
        self.qualities.reverse();
    }

    /// Prepend a prefix to the header, e.g. `M_` for collapsed reads.
    pub fn add_prefix_to_header(&mut self, prefix: &str) {
        self.header.insert_str(0, prefix);
    }

    /// Remove `left` bases from the start and `right` bases from the end.
    ///
    /// Counts exceeding the read length empty the read.
    pub fn trim_ends(&mut self, left: usize, right: usize) {
        let len = self.len();
        if left + right >= len {
            self.sequence.clear();
            self.qualities.clear();
            return;
        }

        self.sequence.truncate(len - right);
        self.qualities.truncate(len - right);
        self.sequence.drain(..left);
        self.qualities.drain(..left);
    }

    /// Shorten the read to at most `len` bases, dropping the 3' end.
    pub fn truncate_to(&mut self, len: usize) {
        if len < self.len() {
            self.sequence.truncate(len);
            self.qualities.truncate(len);
        }
    }

    /// Trim no-call and/or low-quality bases from both ends.
    ///
    /// From each end, bases are consumed while the base is `N` (when
    /// `trim_ns`) or its Phred score is at or below `low_quality` (when
    /// `trim_qualities`). Returns the number of bases removed from the
    /// (start, end). The read never grows.
    pub fn trim_low_quality(
        &mut self,
        trim_ns: bool,
        trim_qualities: bool,
        low_quality: u8,
    ) -> (usize, usize) {
        if !trim_ns && !trim_qualities {
            return (0, 0);
        }

        let is_poor = |base: u8, quality: u8| {
            (trim_ns && base == b'N') || (trim_qualities && quality <= low_quality)
        };

        let mut left = 0;
        while left < self.len() && is_poor(self.sequence[left], self.qualities[left]) {
            left += 1;
        }

        let mut right = 0;
        while left + right < self.len() {
            let index = self.len() - right - 1;
            if !is_poor(self.sequence[index], self.qualities[index]) {
                break;
            }
            right += 1;
        }

        self.trim_ends(left, right);
        (left, right)
    }

    /// Check that two records form a valid mate pair.
    ///
    /// Names must be identical, or differ only in a trailing
    /// `<separator>1` / `<separator>2` mate suffix with mate 1 carrying `1`
    /// and mate 2 carrying `2`.
    pub fn validate_paired(mate_1: &Self, mate_2: &Self, separator: char) -> Result<()> {
        let name_1 = mate_1.name();
        let name_2 = mate_2.name();

        if name_1 == name_2 {
            return Ok(());
        }

        if name_1.len() == name_2.len() && name_1.len() >= 2 {
            let (stem_1, tail_1) = name_1.split_at(name_1.len() - 2);
            let (stem_2, tail_2) = name_2.split_at(name_2.len() - 2);
            let expected_1 = format!("{separator}1");
            let expected_2 = format!("{separator}2");
            if stem_1 == stem_2 && tail_1 == expected_1 && tail_2 == expected_2 {
                return Ok(());
            }
        }

        Err(PipelineError::MatePairMismatch {
            name_1: name_1.to_string(),
            name_2: name_2.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: &str, qual: &[u8]) -> FastqRecord {
        FastqRecord::new("read1".to_string(), seq.as_bytes().to_vec(), qual.to_vec())
    }

    #[test]
    fn test_parse_and_encode_round_trip() {
        let path = Path::new("test.fq");
        let record =
            FastqRecord::parse(path, b"read1", b"ACGTN", b"IIII!", QualityEncoding::Phred33)
                .unwrap();
        assert_eq!(record.sequence(), b"ACGTN");
        assert_eq!(record.qualities(), &[40, 40, 40, 40, 0]);

        let mut buffer = Vec::new();
        record.encode_into(&mut buffer, QualityEncoding::Phred33);
        assert_eq!(buffer, b"@read1\nACGTN\n+\nIIII!\n");
    }

    #[test]
    fn test_parse_normalizes_iupac_codes() {
        let path = Path::new("test.fq");
        let record =
            FastqRecord::parse(path, b"r", b"acgtRy.", b"IIIIIII", QualityEncoding::Phred33)
                .unwrap();
        assert_eq!(record.sequence(), b"ACGTNNN");
    }

    #[test]
    fn test_parse_rejects_invalid_base() {
        let path = Path::new("test.fq");
        let result = FastqRecord::parse(path, b"r", b"AC*T", b"IIII", QualityEncoding::Phred33);
        assert!(matches!(result, Err(PipelineError::MalformedRecord { .. })));
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let path = Path::new("test.fq");
        let result = FastqRecord::parse(path, b"r", b"ACGT", b"III", QualityEncoding::Phred33);
        assert!(matches!(result, Err(PipelineError::MalformedRecord { .. })));
    }

    #[test]
    fn test_reverse_complement_is_involution() {
        let original = record("ACCGTN", &[1, 2, 3, 4, 5, 6]);
        let mut copy = original.clone();
        copy.reverse_complement();
        assert_eq!(copy.sequence(), b"NACGGT");
        assert_eq!(copy.qualities(), &[6, 5, 4, 3, 2, 1]);
        copy.reverse_complement();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_trim_ends() {
        let mut read = record("ACGTACGT", &[1, 2, 3, 4, 5, 6, 7, 8]);
        read.trim_ends(2, 3);
        assert_eq!(read.sequence(), b"GTA");
        assert_eq!(read.qualities(), &[3, 4, 5]);

        read.trim_ends(5, 0);
        assert!(read.is_empty());
    }

    #[test]
    fn test_trim_low_quality_both_ends() {
        let mut read = record("NNACGTNN", &[20, 20, 20, 20, 20, 20, 20, 20]);
        let trimmed = read.trim_low_quality(true, false, 2);
        assert_eq!(trimmed, (2, 2));
        assert_eq!(read.sequence(), b"ACGT");
    }

    #[test]
    fn test_trim_low_quality_by_score() {
        let mut read = record("ACGTACGT", &[30, 30, 30, 30, 2, 2, 2, 2]);
        let trimmed = read.trim_low_quality(false, true, 2);
        assert_eq!(trimmed, (0, 4));
        assert_eq!(read.len(), 4);
    }

    #[test]
    fn test_trim_disabled_is_noop() {
        let mut read = record("NNNN", &[0, 0, 0, 0]);
        assert_eq!(read.trim_low_quality(false, false, 2), (0, 0));
        assert_eq!(read.len(), 4);
    }

    #[test]
    fn test_trim_whole_read() {
        let mut read = record("NNNN", &[0, 0, 0, 0]);
        read.trim_low_quality(true, true, 2);
        assert!(read.is_empty());
    }

    #[test]
    fn test_add_prefix_to_header() {
        let mut read = record("ACGT", &[1, 2, 3, 4]);
        read.add_prefix_to_header("M_");
        assert_eq!(read.header(), "M_read1");
    }

    #[test]
    fn test_validate_paired_accepts_mate_suffixes() {
        let mate_1 = FastqRecord::new("frag/1".to_string(), b"A".to_vec(), vec![1]);
        let mate_2 = FastqRecord::new("frag/2".to_string(), b"A".to_vec(), vec![1]);
        assert!(FastqRecord::validate_paired(&mate_1, &mate_2, '/').is_ok());
    }

    #[test]
    fn test_validate_paired_accepts_identical_names() {
        let mate = FastqRecord::new("frag".to_string(), b"A".to_vec(), vec![1]);
        assert!(FastqRecord::validate_paired(&mate, &mate.clone(), '/').is_ok());
    }

    #[test]
    fn test_validate_paired_rejects_swapped_mates() {
        let mate_1 = FastqRecord::new("frag/2".to_string(), b"A".to_vec(), vec![1]);
        let mate_2 = FastqRecord::new("frag/1".to_string(), b"A".to_vec(), vec![1]);
        let result = FastqRecord::validate_paired(&mate_1, &mate_2, '/');
        assert!(matches!(result, Err(PipelineError::MatePairMismatch { .. })));
    }

    #[test]
    fn test_validate_paired_rejects_different_names() {
        let mate_1 = FastqRecord::new("fragA/1".to_string(), b"A".to_vec(), vec![1]);
        let mate_2 = FastqRecord::new("fragB/2".to_string(), b"A".to_vec(), vec![1]);
        assert!(FastqRecord::validate_paired(&mate_1, &mate_2, '/').is_err());
    }

    #[test]
    fn test_name_ignores_description() {
        let read = FastqRecord::new("read1 desc=x".to_string(), b"A".to_vec(), vec![1]);
        assert_eq!(read.name(), "read1");
    }
}
