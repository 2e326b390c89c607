//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used for frame logging and for writing captured device traffic
//! into tests.
//!
//! ## Usage
//!
//! ```rust
//! use bia_rs::util::hex::{decode_hex, format_hex_compact};
//!
//! let frame = decode_hex("55 05 E0 00 C6").unwrap();
//! assert_eq!(frame, vec![0x55, 0x05, 0xE0, 0x00, 0xC6]);
//! assert_eq!(format_hex_compact(&frame), "55 05 E0 00 C6");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Decode a hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters. Whitespace is
/// stripped, so captured traces like `"AA 06 E0"` decode directly.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format bytes the way the device log shows them: `"AA 06 E0 00"`.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Helper for creating test data from hex strings.
///
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("Invalid hex in test data")
}
