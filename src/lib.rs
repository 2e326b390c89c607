//! # bia-rs - A Rust Crate for BIA Body-Composition Analyzer Communication
//!
//! The bia-rs crate talks to a bioelectrical-impedance (BIA) analyzer over a
//! byte-oriented serial link. It frames and checksums commands, reassembles
//! responses from an arbitrarily chunked byte stream, runs the impedance
//! acquisition sequence, and decodes the body-composition record computed by
//! the device.
//!
//! ## Features
//!
//! - Frame assembly with byte-wise resynchronization after noise or bad checksums
//! - Encoders for get-version, set-impedance-mode, query-impedance and run-algorithm
//! - Decoders for version, mode acknowledgement, impedance status and the
//!   86-byte body-composition record
//! - A sans-io acquisition state machine with settle and retry timers and a
//!   fallback from two-arm to four-electrode mode
//! - An [`Engine`] over pluggable transport and timer capabilities, plus a
//!   tokio [`SerialLink`] that runs it against a real or simulated port
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bia-rs = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use bia_rs::{init_logger, EngineEvent, LinkCommand, SerialLink, Sex, UserProfile, UserType};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), bia_rs::BiaError> {
//! init_logger();
//! let link = SerialLink::open("/dev/ttyUSB0", 9600)?;
//! let (commands, command_rx) = mpsc::channel(8);
//! let (event_tx, mut events) = mpsc::channel(32);
//! tokio::spawn(link.run(command_rx, event_tx));
//!
//! let profile = UserProfile::new(Sex::Female, UserType::Normal, 165, 34, 58.2)?;
//! commands.send(LinkCommand::StartMeasurement(profile)).await.ok();
//! while let Some(event) = events.recv().await {
//!     if let EngineEvent::BodyComposition(record) = event {
//!         println!("{} metrics", record.populated());
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod bia;
pub mod constants;
pub mod error;
pub mod logging;
pub mod payload;
pub mod util;

pub use crate::error::{BiaError, ProfileError};
pub use crate::logging::{init_logger, log_info};

// Protocol core
pub use bia::{
    Acquisition, AcquisitionConfig, AcquisitionFailure, AcquisitionOutcome, Engine, EngineConfig,
    EngineEvent, Frame, FrameAssembler, ImpedanceMode, LinkCommand, OutboundCommand, Scheduler,
    SerialLink, SerialPort, Sex, TimerKind, Transport, UserProfile, UserType,
};

// Decoded responses
pub use payload::{
    decode_response, AlgorithmError, AlgorithmResult, AppType, BodyCompositionRecord, BodyType,
    FrequencyBand, ImpedanceReading, ImpedanceState, Metric, ModeSwitchResult, Response,
    VersionInfo,
};
