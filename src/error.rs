//! # BIA Error Handling
//!
//! This module defines the BiaError enum, which represents the different error
//! types that can occur in the bia-rs crate, and the ProfileError enum used when
//! validating user anthropometrics before they are encoded.

use thiserror::Error;

/// Represents the different error types that can occur in the BIA crate.
#[derive(Debug, Error)]
pub enum BiaError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates an error when parsing a BIA frame.
    #[error("Error parsing BIA frame: {0}")]
    FrameParseError(String),

    /// Indicates a checksum mismatch.
    #[error("Invalid checksum: expected 0x{expected:02X}, calculated 0x{calculated:02X}")]
    InvalidChecksum { expected: u8, calculated: u8 },

    /// The declared frame length does not match the bytes supplied.
    #[error("Invalid frame length: declared {declared}, actual {actual}")]
    InvalidLength { declared: usize, actual: usize },

    /// Indicates a premature end of data.
    #[error("Premature end of data: need {needed} bytes, have {available}")]
    PrematureEnd { needed: usize, available: usize },

    /// A validated frame carried a command id this crate does not decode.
    #[error("Unknown command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// User anthropometrics failed validation.
    #[error("Invalid user profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    /// A numeric field does not fit its wire width.
    #[error("Value out of range for {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: f64 },

    /// The serial link was closed.
    #[error("Link closed")]
    LinkClosed,

    /// A catch-all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}

/// Validation failures for a [`UserProfile`](crate::bia::profile::UserProfile).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("height {0} cm outside 90..=220")]
    Height(u8),

    #[error("age {0} outside 6..=99")]
    Age(u8),

    #[error("weight {0} kg outside 10.0..=200.0")]
    Weight(f64),
}
