//! Logging setup and frame-trace helpers.
//!
//! The engine logs through the `log` facade; whichever logger the host
//! application installs is the log collector. `init_logger` installs
//! `env_logger` for binaries and tests that have nothing else.

use crate::util::hex::format_hex_compact;
use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
pub fn init_logger() {
    env_logger::init();
}

/// Initializes `env_logger` for tests; repeated calls are harmless.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Direction of a traced frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        }
    }
}

/// Logs raw frame bytes in hex at debug level.
pub fn log_frame_hex(direction: Direction, bytes: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!("{} [{}] {}", direction.label(), bytes.len(), format_hex_compact(bytes));
    }
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
