//! # BIA Engine
//!
//! Ties the pieces together for one analyzer connection: inbound chunks go
//! through the [`FrameAssembler`] and the response decoder, decoded responses
//! feed the [`Acquisition`] state machine, and the actions it returns are
//! carried out against a [`Transport`] and a [`Scheduler`].
//!
//! The engine owns all mutable state and is driven from its entry points
//! only; each returns the [`EngineEvent`]s it produced, in frame order.
//!
//! ```rust
//! use bia_rs::bia::engine::{Engine, Scheduler, TimerKind, Transport};
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Wire(Vec<Vec<u8>>);
//! impl Transport for Wire {
//!     fn write(&mut self, bytes: &[u8]) -> bool {
//!         self.0.push(bytes.to_vec());
//!         true
//!     }
//! }
//!
//! struct NoTimers;
//! impl Scheduler for NoTimers {
//!     fn schedule(&mut self, _: TimerKind, _: Duration) {}
//!     fn cancel(&mut self, _: TimerKind) {}
//! }
//!
//! let mut engine = Engine::new(Wire::default(), NoTimers);
//! engine.request_version();
//! assert_eq!(engine.transport().0[0], vec![0x55, 0x05, 0xE0, 0x00, 0xC6]);
//! ```

use crate::bia::acquisition::{
    Acquisition, AcquisitionConfig, AcquisitionFailure, AcquisitionOutcome, Action,
};
use crate::bia::assembler::{AssemblerStats, FrameAssembler};
use crate::bia::command::OutboundCommand;
use crate::bia::profile::UserProfile;
use crate::constants::BIA_RECEIVE_BUFFER_LIMIT;
use crate::error::BiaError;
use crate::logging::{log_frame_hex, log_warn, Direction};
use crate::payload::body_composition::{AlgorithmError, AlgorithmResult, BodyCompositionRecord};
use crate::payload::response::{
    decode_response, ImpedanceReading, ModeSwitchResult, Response, VersionInfo,
};
use crate::util::hex::format_hex_compact;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

pub use crate::bia::acquisition::TimerKind;

/// Outbound byte sink. Returns false if the bytes could not be written.
pub trait Transport {
    fn write(&mut self, bytes: &[u8]) -> bool;
}

/// One-shot timers keyed by kind; scheduling a kind again replaces it.
pub trait Scheduler {
    fn schedule(&mut self, timer: TimerKind, delay: Duration);
    fn cancel(&mut self, timer: TimerKind);
}

/// Something the host application should know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    Version(VersionInfo),
    ModeSwitch(ModeSwitchResult),
    Impedance(ImpedanceReading),
    Acquisition(AcquisitionOutcome),
    BodyComposition(BodyCompositionRecord),
    AlgorithmRejected(AlgorithmError),
    /// Name of the command that could not be written
    WriteFailed(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub acquisition: AcquisitionConfig,
    /// Receive buffer limit in bytes
    pub receive_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            acquisition: AcquisitionConfig::default(),
            receive_capacity: BIA_RECEIVE_BUFFER_LIMIT,
        }
    }
}

pub struct Engine<T: Transport, S: Scheduler> {
    transport: T,
    scheduler: S,
    assembler: FrameAssembler,
    acquisition: Acquisition,
    /// Profile of the running measurement, used for the run-algorithm step
    profile: Option<UserProfile>,
}

impl<T: Transport, S: Scheduler> Engine<T, S> {
    pub fn new(transport: T, scheduler: S) -> Self {
        Self::with_config(transport, scheduler, EngineConfig::default())
    }

    pub fn with_config(transport: T, scheduler: S, config: EngineConfig) -> Self {
        Engine {
            transport,
            scheduler,
            assembler: FrameAssembler::with_capacity_limit(config.receive_capacity),
            acquisition: Acquisition::new(config.acquisition),
            profile: None,
        }
    }

    /// Feeds one inbound chunk.
    pub fn on_bytes(&mut self, chunk: &[u8]) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for frame in self.assembler.push(chunk) {
            match decode_response(&frame) {
                Ok(response) => self.handle_response(response, &mut events),
                Err(e) => warn!(
                    "dropping frame {}: {e}",
                    format_hex_compact(frame.as_bytes())
                ),
            }
        }
        events
    }

    pub fn on_timer(&mut self, timer: TimerKind) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let actions = self.acquisition.on_timer(timer);
        self.run(actions, &mut events);
        events
    }

    /// Link loss: drops any partial frame and fails a running measurement.
    pub fn on_disconnect(&mut self) -> Vec<EngineEvent> {
        self.assembler.reset();
        let mut events = Vec::new();
        let actions = self.acquisition.on_disconnect();
        self.run(actions, &mut events);
        events
    }

    /// Validates `profile` and starts an impedance acquisition.
    ///
    /// On success the body-composition algorithm runs automatically with
    /// this profile and the measured impedance.
    pub fn start_measurement(&mut self, profile: UserProfile) -> Result<Vec<EngineEvent>, BiaError> {
        profile.validate()?;
        self.profile = Some(profile);
        let mut events = Vec::new();
        let actions = self.acquisition.start();
        self.run(actions, &mut events);
        Ok(events)
    }

    pub fn cancel_measurement(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let actions = self.acquisition.cancel();
        self.run(actions, &mut events);
        events
    }

    pub fn request_version(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        self.send(&OutboundCommand::GetVersion, &mut events);
        events
    }

    /// Sends run-algorithm for an impedance measured elsewhere.
    pub fn request_algorithm(
        &mut self,
        profile: UserProfile,
        impedance_ohms: f64,
    ) -> Result<Vec<EngineEvent>, BiaError> {
        let command = OutboundCommand::RunAlgorithm {
            profile,
            impedance_ohms,
        };
        let bytes = command.encode()?;
        let mut events = Vec::new();
        self.write(command.name(), &bytes, &mut events);
        Ok(events)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    pub fn assembler_stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    fn handle_response(&mut self, response: Response, events: &mut Vec<EngineEvent>) {
        match response {
            Response::Version(version) => {
                info!("device version {version}");
                events.push(EngineEvent::Version(version));
            }
            Response::ModeSwitch(result) => {
                info!("mode switch result {result:?}");
                events.push(EngineEvent::ModeSwitch(result));
                let actions = self.acquisition.on_mode_ack(result);
                self.run(actions, events);
            }
            Response::Impedance(reading) => {
                info!(
                    "impedance status {:?} band {:?} ohms {:?} phase {:?}",
                    reading.state, reading.frequency_band, reading.ohms, reading.phase_degrees
                );
                let actions = self.acquisition.on_impedance(&reading);
                events.push(EngineEvent::Impedance(reading));
                self.run(actions, events);
            }
            Response::Algorithm(AlgorithmResult::Record(record)) => {
                info!("body composition record with {} metrics", record.populated());
                events.push(EngineEvent::BodyComposition(record));
            }
            Response::Algorithm(AlgorithmResult::Rejected(error)) => {
                warn!("device rejected algorithm input: {error}");
                events.push(EngineEvent::AlgorithmRejected(error));
            }
        }
    }

    fn run(&mut self, actions: Vec<Action>, events: &mut Vec<EngineEvent>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Send(command) => {
                    if !self.send(&command, events) && self.acquisition.is_active() {
                        queue.extend(
                            self.acquisition
                                .abort(AcquisitionFailure::WriteFailed(command.name())),
                        );
                    }
                }
                Action::Schedule(timer, delay) => {
                    debug!("scheduling {timer:?} in {delay:?}");
                    self.scheduler.schedule(timer, delay);
                }
                Action::Cancel(timer) => self.scheduler.cancel(timer),
                Action::Finished(outcome) => {
                    info!("acquisition finished: {outcome:?}");
                    let ohms = match &outcome {
                        AcquisitionOutcome::Success(reading) => reading.ohms,
                        AcquisitionOutcome::Failed(_) => None,
                    };
                    events.push(EngineEvent::Acquisition(outcome));
                    if let Some(ohms) = ohms {
                        self.run_algorithm(ohms, events);
                    }
                }
            }
        }
    }

    fn run_algorithm(&mut self, ohms: f64, events: &mut Vec<EngineEvent>) {
        let Some(profile) = self.profile else {
            debug!("no profile stored, skipping run-algorithm");
            return;
        };
        self.send(
            &OutboundCommand::RunAlgorithm {
                profile,
                impedance_ohms: ohms,
            },
            events,
        );
    }

    fn send(&mut self, command: &OutboundCommand, events: &mut Vec<EngineEvent>) -> bool {
        match command.encode() {
            Ok(bytes) => self.write(command.name(), &bytes, events),
            Err(e) => {
                warn!("cannot encode {}: {e}", command.name());
                false
            }
        }
    }

    fn write(&mut self, name: &'static str, bytes: &[u8], events: &mut Vec<EngineEvent>) -> bool {
        log_frame_hex(Direction::Tx, bytes);
        if self.transport.write(bytes) {
            debug!("sent {name}");
            return true;
        }
        log_warn(&format!("write of {name} failed"));
        events.push(EngineEvent::WriteFailed(name));
        false
    }
}
