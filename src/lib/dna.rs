//! DNA sequence utilities.
//!
//! This module provides common DNA sequence operations like base
//! complementation and normalization of IUPAC codes.

/// No-call base character.
pub const NO_CALL_BASE: u8 = b'N';

/// Complements a single DNA base.
///
/// Returns the Watson-Crick complement: A<->T, C<->G. `N` is its own
/// complement. The input is expected to already be normalized to uppercase
/// A/C/G/T/N.
#[inline]
#[must_use]
pub const fn complement_base(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        _ => NO_CALL_BASE,
    }
}

/// Normalizes a raw sequence byte to uppercase A/C/G/T/N.
///
/// IUPAC ambiguity codes and `.` collapse to `N`; anything else is rejected
/// so that corrupt input is never silently absorbed.
#[inline]
#[must_use]
pub const fn normalize_base(base: u8) -> Option<u8> {
    match base {
        b'A' | b'a' => Some(b'A'),
        b'C' | b'c' => Some(b'C'),
        b'G' | b'g' => Some(b'G'),
        b'T' | b't' => Some(b'T'),
        // IUPAC ambiguity codes carry no per-base information we can use
        b'N' | b'n' | b'.' | b'R' | b'r' | b'Y' | b'y' | b'S' | b's' | b'W' | b'w' | b'K'
        | b'k' | b'M' | b'm' | b'B' | b'b' | b'D' | b'd' | b'H' | b'h' | b'V' | b'v' => {
            Some(NO_CALL_BASE)
        }
        _ => None,
    }
}
