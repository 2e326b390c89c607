//! # BIA Frame
//!
//! A frame is `[header, length, command, payload.., checksum]`, where `length`
//! counts every byte including header and checksum. The device starts its
//! frames with `0xAA`, the host with `0x55`; both use the checksum in
//! [`checksum`](crate::bia::checksum).
//!
//! Response decoders address fields by their offset in the whole frame, so a
//! [`Frame`] keeps its raw bytes and offers offset-based reads that never
//! reach into the trailing checksum byte.
//!
//! Parsing a single frame from a byte slice:
//! ```rust
//! use bia_rs::bia::frame::{parse_frame, Frame};
//!
//! let bytes = [0xAA, 0x07, 0xE0, 0x00, 0x05, 0x01, 0x69, 0xFF];
//! let (rest, frame) = parse_frame(&bytes).unwrap();
//! assert_eq!(rest, &[0xFF]);
//! assert_eq!(frame.command(), 0xE0);
//! assert_eq!(frame.payload(), &[0x00, 0x05, 0x01]);
//! ```

use crate::bia::checksum;
use crate::constants::{
    BIA_FRAME_HEADER_INBOUND, BIA_FRAME_MIN_LENGTH, BIA_FRAME_OFFSET_COMMAND,
    BIA_FRAME_OFFSET_PAYLOAD,
};
use crate::error::BiaError;
use nom::bytes::complete::{tag, take};
use nom::error::ErrorKind;
use nom::number::complete::be_u8;
use nom::{Err as NomErr, IResult};

/// A complete inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Vec<u8>,
}

impl Frame {
    /// Wraps bytes the assembler has already checked for shape and checksum.
    pub(crate) fn from_validated(raw: Vec<u8>) -> Self {
        debug_assert!(raw.len() >= BIA_FRAME_MIN_LENGTH);
        Frame { raw }
    }

    /// Validates header, declared length and checksum of a single frame.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, BiaError> {
        let (rest, frame) =
            parse_frame(&raw).map_err(|e| BiaError::FrameParseError(format!("{e:?}")))?;
        if !rest.is_empty() {
            return Err(BiaError::InvalidLength {
                declared: frame.len(),
                actual: raw.len(),
            });
        }
        checksum::verify_frame(frame.as_bytes())?;
        Ok(frame)
    }

    pub fn command(&self) -> u8 {
        self.raw[BIA_FRAME_OFFSET_COMMAND]
    }

    /// Bytes between the command id and the checksum.
    pub fn payload(&self) -> &[u8] {
        &self.raw[BIA_FRAME_OFFSET_PAYLOAD..self.raw.len() - 1]
    }

    pub fn checksum(&self) -> u8 {
        self.raw[self.raw.len() - 1]
    }

    /// Total frame length, header and checksum included.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    /// Number of bytes before the checksum; the readable range for fields.
    pub fn body_len(&self) -> usize {
        self.raw.len() - 1
    }

    /// True if `width` bytes starting at `offset` lie before the checksum.
    pub fn has_range(&self, offset: usize, width: usize) -> bool {
        offset
            .checked_add(width)
            .is_some_and(|end| end <= self.body_len())
    }

    /// Single byte at frame offset `offset`.
    pub fn u8_at(&self, offset: usize) -> Option<u8> {
        self.has_range(offset, 1).then(|| self.raw[offset])
    }

    /// Little-endian u16 at frame offsets `offset` and `offset + 1`.
    pub fn u16_le_at(&self, offset: usize) -> Option<u16> {
        self.has_range(offset, 2)
            .then(|| u16::from_le_bytes([self.raw[offset], self.raw[offset + 1]]))
    }
}

/// Uses `nom` to split one inbound frame off the front of `input`.
///
/// Only the header byte and the declared length are checked; checksum
/// validation is left to the caller.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Frame> {
    let start = input;
    let (input, _) = tag(&[BIA_FRAME_HEADER_INBOUND][..])(input)?;
    let (input, length) = be_u8(input)?;
    let length = length as usize;
    if length < BIA_FRAME_MIN_LENGTH {
        return Err(NomErr::Error(nom::error::Error::new(
            input,
            ErrorKind::LengthValue,
        )));
    }
    let (rest, _) = take(length - 2)(input)?;
    Ok((
        rest,
        Frame {
            raw: start[..length].to_vec(),
        },
    ))
}
