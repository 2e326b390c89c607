//! # IoBuffer - Receive Buffer
//!
//! Appendable byte buffer backing the frame assembler. Bytes arrive at the
//! back in whatever chunks the transport delivers and are consumed from the
//! front once a frame (or a garbage byte) has been dealt with.
//!
//! ## Usage
//!
//! ```rust
//! use bia_rs::util::IoBuffer;
//!
//! let mut buffer = IoBuffer::new();
//! buffer.write(&[0xAA, 0x05, 0xE0]).unwrap();
//!
//! assert_eq!(buffer.get(1), Some(0x05));
//! assert_eq!(buffer.consume(2), vec![0xAA, 0x05]);
//! ```

use std::collections::VecDeque;
use thiserror::Error;

/// Errors that can occur during IoBuffer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IoBufferError {
    #[error("Capacity limit exceeded: {limit}")]
    CapacityExceeded { limit: usize },
}

/// Byte accumulator with an optional capacity limit.
#[derive(Debug, Clone)]
pub struct IoBuffer {
    data: VecDeque<u8>,
    /// Maximum number of buffered bytes (None = unlimited)
    capacity_limit: Option<usize>,
}

impl IoBuffer {
    /// Default capacity limit, large enough for several maximum-length frames
    pub const DEFAULT_CAPACITY_LIMIT: usize = crate::constants::BIA_RECEIVE_BUFFER_LIMIT;

    /// Create a new IoBuffer with the default capacity limit
    pub fn new() -> Self {
        Self::with_limit(Some(Self::DEFAULT_CAPACITY_LIMIT))
    }

    /// Create a new IoBuffer with a custom limit
    pub fn with_limit(capacity_limit: Option<usize>) -> Self {
        Self {
            data: VecDeque::new(),
            capacity_limit,
        }
    }

    /// Check that `additional` bytes would fit under the limit
    pub fn try_reserve(&self, additional: usize) -> Result<(), IoBufferError> {
        if let Some(limit) = self.capacity_limit {
            if self.len() + additional > limit {
                return Err(IoBufferError::CapacityExceeded { limit });
            }
        }
        Ok(())
    }

    /// Append data to the back of the buffer.
    ///
    /// Nothing is written when the data would exceed the capacity limit.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, IoBufferError> {
        self.try_reserve(data.len())?;
        self.data.extend(data);
        Ok(data.len())
    }

    /// Consume and return up to `count` bytes from the front of the buffer
    pub fn consume(&mut self, count: usize) -> Vec<u8> {
        let to_consume = count.min(self.len());
        self.data.drain(..to_consume).collect()
    }

    /// Byte at `index` from the front, without consuming it
    pub fn get(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop everything currently buffered
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Default for IoBuffer {
    fn default() -> Self {
        Self::new()
    }
}
