//! Collapsing of overlapping mate pairs into consensus reads.
//!
//! Once a pair has been aligned and adapter-trimmed, the overlapping bases
//! represent the same template positions and are merged into a single
//! higher-confidence read covering the union of both mates.

use rand::Rng;
use rand::rngs::StdRng;

use crate::alignment::AlignmentInfo;
use crate::fastq::FastqRecord;

/// Merge an aligned, adapter-trimmed pair into one consensus read.
///
/// `read2` must still be in mate 1 orientation (reverse-complemented) and
/// both mates must already be truncated via the alignment. Per position:
///
/// - covered by one mate only: that base and quality are copied;
/// - both mates agree: the base is kept with quality `q1 + q2`, capped at
///   `max_quality`;
/// - both mates disagree: the higher-quality base wins with quality
///   `|q1 - q2|`; an exact quality tie is broken pseudo-randomly by the
///   per-worker RNG;
/// - a no-call on one side defers to the other; two no-calls stay `N` with
///   quality zero.
///
/// The consensus inherits mate 1's header; the `M_`/`MT_` prefix is applied
/// by the caller once it knows whether quality trimming shortened the result.
#[must_use]
pub fn collapse_paired_end(
    alignment: &AlignmentInfo,
    read1: &FastqRecord,
    read2: &FastqRecord,
    rng: &mut StdRng,
    max_quality: u8,
) -> FastqRecord {
    let offset = alignment.offset.max(0) as usize;
    let total = read1.len().max(offset + read2.len());

    let mut sequence = Vec::with_capacity(total);
    let mut qualities = Vec::with_capacity(total);

    for position in 0..total {
        let from_1 = (position < read1.len())
            .then(|| (read1.sequence()[position], read1.qualities()[position]));
        let from_2 = (position >= offset && position - offset < read2.len())
            .then(|| (read2.sequence()[position - offset], read2.qualities()[position - offset]));

        let (base, quality) = match (from_1, from_2) {
            (Some(only), None) | (None, Some(only)) => only,
            (Some((base1, qual1)), Some((base2, qual2))) => {
                consensus_base(base1, qual1, base2, qual2, rng, max_quality)
            }
            (None, None) => (b'N', 0),
        };

        sequence.push(base);
        qualities.push(quality);
    }

    FastqRecord::new(read1.header().to_string(), sequence, qualities)
}

fn consensus_base(
    base1: u8,
    qual1: u8,
    base2: u8,
    qual2: u8,
    rng: &mut StdRng,
    max_quality: u8,
) -> (u8, u8) {
    if base1 == b'N' || base2 == b'N' {
        if base1 == base2 {
            return (b'N', 0);
        }
        return if base1 == b'N' { (base2, qual2) } else { (base1, qual1) };
    }

    if base1 == base2 {
        let summed = u16::from(qual1) + u16::from(qual2);
        return (base1, summed.min(u16::from(max_quality)) as u8);
    }

    match qual1.cmp(&qual2) {
        std::cmp::Ordering::Greater => (base1, qual1 - qual2),
        std::cmp::Ordering::Less => (base2, qual2 - qual1),
        std::cmp::Ordering::Equal => {
            let base = if rng.random::<bool>() { base1 } else { base2 };
            (base, 0)
        }
    }
}
