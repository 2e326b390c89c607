//! The bia module contains the protocol core: checksum, frame assembly and
//! encoding, the acquisition state machine, the engine that drives it, and
//! the async serial link.

pub mod acquisition;
pub mod assembler;
pub mod checksum;
pub mod command;
pub mod engine;
pub mod frame;
pub mod profile;
pub mod serial;
#[cfg(test)]
pub mod serial_mock;

pub use acquisition::{
    Acquisition, AcquisitionConfig, AcquisitionFailure, AcquisitionOutcome, AcquisitionState,
    Action,
};
pub use assembler::{AssemblerStats, FrameAssembler};
pub use command::{ImpedanceMode, OutboundCommand};
pub use engine::{Engine, EngineConfig, EngineEvent, Scheduler, TimerKind, Transport};
pub use frame::Frame;
pub use profile::{Sex, UserProfile, UserType};
pub use serial::{LinkCommand, Outbox, SerialLink, SerialPort, TimerTable};
