//! BIA Protocol Constants
//!
//! This module defines the wire-level constants of the body-composition
//! analyzer protocol: frame markers, command ids, mode and frequency codes,
//! and the minimum frame lengths each response needs before it can be decoded.

// ----------------------------------------------------------------------------
// Frame layout
// ----------------------------------------------------------------------------

/// Start byte of every frame sent by the device
pub const BIA_FRAME_HEADER_INBOUND: u8 = 0xAA;

/// Start byte of every frame sent by the host
pub const BIA_FRAME_HEADER_OUTBOUND: u8 = 0x55;

/// Header, length, command id and checksum
pub const BIA_FRAME_MIN_LENGTH: usize = 4;

/// Largest frame the one-byte length field can describe
pub const BIA_FRAME_MAX_LENGTH: usize = 0xFF;

pub const BIA_FRAME_OFFSET_LENGTH: usize = 1;
pub const BIA_FRAME_OFFSET_COMMAND: usize = 2;
pub const BIA_FRAME_OFFSET_PAYLOAD: usize = 3;

// ----------------------------------------------------------------------------
// Command ids (shared by requests and their responses)
// ----------------------------------------------------------------------------

pub const BIA_CMD_GET_VERSION: u8 = 0xE0;
pub const BIA_CMD_SET_IMPEDANCE_MODE: u8 = 0xB0;
pub const BIA_CMD_QUERY_IMPEDANCE: u8 = 0xB1;
pub const BIA_CMD_RUN_ALGORITHM: u8 = 0xD2;

/// Get-version subsystem selector for the application firmware
pub const BIA_VERSION_SELECTOR_APP: u8 = 0x00;

/// Query-impedance selector: 50kHz, two-arm measurement
pub const BIA_QUERY_SELECTOR_50KHZ_TWO_ARMS: u8 = 0x51;

// ----------------------------------------------------------------------------
// Impedance mode and frequency codes
// ----------------------------------------------------------------------------

pub const BIA_MODE_STOP: u8 = 0x00;
pub const BIA_MODE_FOUR_ELECTRODE: u8 = 0x02;
pub const BIA_MODE_TWO_ARMS: u8 = 0x03;

pub const BIA_FREQ_20KHZ: u8 = 0x03;
pub const BIA_FREQ_50KHZ: u8 = 0x05;
pub const BIA_FREQ_100KHZ: u8 = 0x06;

// ----------------------------------------------------------------------------
// Response lengths (whole frame, checksum included)
// ----------------------------------------------------------------------------

pub const BIA_VERSION_FRAME_MIN: usize = 7;
pub const BIA_MODE_ACK_FRAME_MIN: usize = 5;
pub const BIA_IMPEDANCE_FRAME_MIN: usize = 13;
pub const BIA_ALGORITHM_FRAME_MIN: usize = 6;
pub const BIA_ALGORITHM_FRAME_FULL: usize = 86;

/// Offset of the error code in a run-algorithm response
pub const BIA_ALGORITHM_OFFSET_ERROR: usize = 4;

/// Offset of the packet byte in a run-algorithm response
pub const BIA_ALGORITHM_OFFSET_PACKET: usize = 3;

// ----------------------------------------------------------------------------
// Engine defaults
// ----------------------------------------------------------------------------

/// Receive buffer limit; a chunk that would overflow it clears the buffer
pub const BIA_RECEIVE_BUFFER_LIMIT: usize = 4096;

/// Plausible impedance bounds in ohms for a successful reading
pub const BIA_IMPEDANCE_MIN_OHMS: f64 = 10.0;
pub const BIA_IMPEDANCE_MAX_OHMS: f64 = 1200.0;

/// Electrode-contact retries before escalating to four-electrode mode
pub const BIA_MAX_RETRIES: u8 = 3;

/// Settle delay after a successful mode switch (milliseconds)
pub const BIA_SETTLE_DELAY_MS: u64 = 2000;

/// Delay between impedance polls (milliseconds)
pub const BIA_RETRY_DELAY_MS: u64 = 1000;

/// Polls answered with Idle/Measuring before the acquisition times out
pub const BIA_MAX_POLLS: u32 = 30;
