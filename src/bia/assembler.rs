//! # Frame Assembler
//!
//! Turns the arbitrarily chunked byte stream coming from the transport into
//! complete, checksum-valid [`Frame`]s.
//!
//! Each pushed chunk is appended to the receive buffer, then as many frames as
//! are complete get drained from it:
//!
//! - a leading byte other than `0xAA` is dropped on its own (resync after noise)
//! - a declared length below 4 is treated the same way
//! - a frame whose declared length exceeds the buffered bytes waits for more data
//! - a complete candidate failing its checksum is discarded whole; its interior
//!   bytes are not rescanned
//!
//! The output depends only on the concatenated byte stream, never on how it was
//! chunked.

use crate::bia::checksum;
use crate::bia::frame::Frame;
use crate::constants::{BIA_FRAME_HEADER_INBOUND, BIA_FRAME_MIN_LENGTH, BIA_FRAME_OFFSET_LENGTH};
use crate::logging::{log_frame_hex, Direction};
use crate::util::hex::format_hex_compact;
use crate::util::IoBuffer;
use log::{debug, warn};

/// Counters kept by the assembler since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub bytes_received: u64,
    pub frames_emitted: u64,
    /// Bytes dropped because they were not a frame header
    pub bad_header_bytes: u64,
    /// Header bytes dropped because the declared length was below 4
    pub invalid_lengths: u64,
    pub checksum_failures: u64,
    /// Times the receive buffer was cleared to make room
    pub overflows: u64,
}

/// Accumulates inbound chunks and yields validated frames.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: IoBuffer,
    stats: AssemblerStats,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_capacity_limit(IoBuffer::DEFAULT_CAPACITY_LIMIT)
    }

    pub fn with_capacity_limit(limit: usize) -> Self {
        FrameAssembler {
            buffer: IoBuffer::with_limit(Some(limit)),
            stats: AssemblerStats::default(),
        }
    }

    /// Appends `chunk` and returns every frame it completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.stats.bytes_received += chunk.len() as u64;
        if !self.append(chunk) {
            return Vec::new();
        }

        let mut frames = Vec::new();
        while let Some(first) = self.buffer.get(0) {
            if first != BIA_FRAME_HEADER_INBOUND {
                self.buffer.consume(1);
                self.stats.bad_header_bytes += 1;
                debug!("bad header byte 0x{first:02X}, resynchronizing");
                continue;
            }

            let Some(declared) = self.buffer.get(BIA_FRAME_OFFSET_LENGTH) else {
                break;
            };
            let declared = declared as usize;
            if declared < BIA_FRAME_MIN_LENGTH {
                self.buffer.consume(1);
                self.stats.invalid_lengths += 1;
                warn!("frame declares length {declared}, below minimum; dropping header byte");
                continue;
            }

            if self.buffer.len() < declared {
                // Partial frame: wait for the next chunk.
                break;
            }

            let candidate = self.buffer.consume(declared);
            if !checksum::verify(&candidate) {
                self.stats.checksum_failures += 1;
                warn!(
                    "checksum mismatch, discarding frame: {}",
                    format_hex_compact(&candidate)
                );
                continue;
            }

            log_frame_hex(Direction::Rx, &candidate);
            self.stats.frames_emitted += 1;
            frames.push(Frame::from_validated(candidate));
        }
        frames
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    /// Drops any partial frame, e.g. after the link went down.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            debug!("discarding {} buffered bytes", self.buffer.len());
        }
        self.buffer.clear();
    }

    fn append(&mut self, chunk: &[u8]) -> bool {
        if self.buffer.write(chunk).is_ok() {
            return true;
        }
        warn!(
            "receive buffer overflow, clearing {} buffered bytes",
            self.buffer.len()
        );
        self.stats.overflows += 1;
        self.buffer.clear();
        match self.buffer.write(chunk) {
            Ok(_) => true,
            Err(e) => {
                warn!("dropping {}-byte chunk: {e}", chunk.len());
                false
            }
        }
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
