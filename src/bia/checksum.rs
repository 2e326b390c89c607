//! Two's-complement checksum shared by inbound and outbound frames.
//!
//! The checksum byte makes the 8-bit sum of the whole frame zero. Any single
//! corrupted byte changes that sum and is caught; several corrupted bytes whose
//! changes cancel modulo 256 are not.

use crate::error::BiaError;

/// Negated 8-bit sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte))
        .wrapping_neg()
}

/// True if the last byte of `frame` is the checksum of everything before it.
pub fn verify(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((last, body)) => checksum(body) == *last,
        None => false,
    }
}

/// Like [`verify`], but reports the carried and calculated values.
pub fn verify_frame(frame: &[u8]) -> Result<(), BiaError> {
    let (last, body) = frame.split_last().ok_or(BiaError::PrematureEnd {
        needed: 1,
        available: 0,
    })?;
    let calculated = checksum(body);
    if calculated != *last {
        return Err(BiaError::InvalidChecksum {
            expected: *last,
            calculated,
        });
    }
    Ok(())
}
