//! # Utility Modules
//!
//! Common helpers used throughout the bia-rs crate: the receive buffer behind
//! the frame assembler and hex formatting for logs and tests.

pub mod hex;
pub mod iobuffer;

pub use hex::{decode_hex, format_hex_compact, hex_to_bytes};
pub use iobuffer::{IoBuffer, IoBufferError};
