//! # Impedance Acquisition
//!
//! Drives one measurement from "start" to a terminal outcome:
//!
//! 1. Switch the analyzer to two-arm mode at 50 kHz.
//! 2. On a positive acknowledgement wait for the electrodes to settle.
//! 3. Poll the impedance status until the device reports a result.
//! 4. While the device is still checking electrode contact, retry after a
//!    delay; after three such reports fall back to four-electrode mode once.
//!
//! The machine performs no I/O. Every input returns the [`Action`]s the caller
//! has to carry out (send a command, arm or cancel a timer, publish the
//! outcome), which keeps it testable without a device or a clock.
//!
//! ```rust
//! use bia_rs::bia::acquisition::{Acquisition, AcquisitionConfig, Action};
//!
//! let mut acquisition = Acquisition::new(AcquisitionConfig::default());
//! let actions = acquisition.start();
//! assert!(matches!(actions.last(), Some(Action::Send(_))));
//! assert!(acquisition.is_active());
//! ```

use crate::bia::command::{ImpedanceMode, OutboundCommand};
use crate::constants::*;
use crate::payload::response::{FrequencyBand, ImpedanceReading, ImpedanceState, ModeSwitchResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

/// Timers the acquisition arms. At most one of each kind is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Delay between a confirmed mode switch and the first poll
    Settle,
    /// Delay before the next poll
    Retry,
}

/// Timing and plausibility limits for an acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    pub settle_delay: Duration,
    pub retry_delay: Duration,
    /// CheckingElectrodes reports tolerated before escalating
    pub max_retries: u8,
    /// Idle/Measuring reports tolerated before timing out
    pub max_polls: u32,
    /// Plausible impedance for a successful reading, inclusive
    pub ohms_range: RangeInclusive<f64>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        AcquisitionConfig {
            settle_delay: Duration::from_millis(BIA_SETTLE_DELAY_MS),
            retry_delay: Duration::from_millis(BIA_RETRY_DELAY_MS),
            max_retries: BIA_MAX_RETRIES,
            max_polls: BIA_MAX_POLLS,
            ohms_range: BIA_IMPEDANCE_MIN_OHMS..=BIA_IMPEDANCE_MAX_OHMS,
        }
    }
}

/// Why an acquisition ended without a reading.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum AcquisitionFailure {
    #[error("mode switch rejected: {0:?}")]
    ModeSwitch(ModeSwitchResult),
    #[error("impedance out of range: {0:?}")]
    ImpedanceOutOfRange(Option<f64>),
    #[error("no electrode contact after escalation")]
    ElectrodeContact,
    #[error("device reported {0:?}")]
    DeviceState(ImpedanceState),
    #[error("no result after {polls} polls")]
    Timeout { polls: u32 },
    #[error("link disconnected")]
    Disconnected,
    #[error("failed to send {0}")]
    WriteFailed(&'static str),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AcquisitionOutcome {
    Success(ImpedanceReading),
    Failed(AcquisitionFailure),
}

impl AcquisitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AcquisitionOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionState {
    Idle,
    /// Waiting for the set-impedance-mode acknowledgement
    SwitchingMode,
    /// Settle timer armed
    Settling,
    /// Query sent, waiting for the impedance status
    Polling,
    /// Retry timer armed
    Retrying,
    Done(AcquisitionOutcome),
}

/// Work for the caller resulting from one input.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(OutboundCommand),
    Schedule(TimerKind, Duration),
    Cancel(TimerKind),
    Finished(AcquisitionOutcome),
}

/// Per-measurement bookkeeping, reset by [`Acquisition::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSession {
    pub mode: ImpedanceMode,
    /// CheckingElectrodes reports so far
    pub retry_count: u8,
    /// Whether the fallback to four-electrode mode happened
    pub escalated: bool,
    /// Idle/Measuring reports so far
    pub polls: u32,
}

impl Default for AcquisitionSession {
    fn default() -> Self {
        AcquisitionSession {
            mode: ImpedanceMode::TwoArms,
            retry_count: 0,
            escalated: false,
            polls: 0,
        }
    }
}

/// Sans-io acquisition state machine.
#[derive(Debug)]
pub struct Acquisition {
    config: AcquisitionConfig,
    state: AcquisitionState,
    session: AcquisitionSession,
}

impl Acquisition {
    pub fn new(config: AcquisitionConfig) -> Self {
        Acquisition {
            config,
            state: AcquisitionState::Idle,
            session: AcquisitionSession::default(),
        }
    }

    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    pub fn session(&self) -> &AcquisitionSession {
        &self.session
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// True between `start` and the terminal outcome.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, AcquisitionState::Idle | AcquisitionState::Done(_))
    }

    /// Begins a new measurement, discarding any session in progress.
    pub fn start(&mut self) -> Vec<Action> {
        if self.is_active() {
            info!("restarting acquisition from {:?}", self.state);
        }
        self.session = AcquisitionSession::default();
        self.state = AcquisitionState::SwitchingMode;
        info!("acquisition started, switching to {:?}", self.session.mode);
        vec![
            Action::Cancel(TimerKind::Settle),
            Action::Cancel(TimerKind::Retry),
            Action::Send(set_mode(self.session.mode)),
        ]
    }

    pub fn on_mode_ack(&mut self, result: ModeSwitchResult) -> Vec<Action> {
        if self.state != AcquisitionState::SwitchingMode {
            debug!("ignoring mode acknowledgement {result:?} in {:?}", self.state);
            return Vec::new();
        }
        if !result.is_ok() {
            warn!("mode switch to {:?} rejected: {result:?}", self.session.mode);
            return self.finish(AcquisitionOutcome::Failed(AcquisitionFailure::ModeSwitch(result)));
        }
        self.state = AcquisitionState::Settling;
        vec![Action::Schedule(TimerKind::Settle, self.config.settle_delay)]
    }

    pub fn on_timer(&mut self, timer: TimerKind) -> Vec<Action> {
        match (&self.state, timer) {
            (AcquisitionState::Settling, TimerKind::Settle)
            | (AcquisitionState::Retrying, TimerKind::Retry) => {
                self.state = AcquisitionState::Polling;
                vec![Action::Send(OutboundCommand::QueryImpedance)]
            }
            _ => {
                debug!("ignoring {timer:?} timer in {:?}", self.state);
                Vec::new()
            }
        }
    }

    pub fn on_impedance(&mut self, reading: &ImpedanceReading) -> Vec<Action> {
        if self.state != AcquisitionState::Polling {
            debug!("ignoring impedance status {:?} in {:?}", reading.state, self.state);
            return Vec::new();
        }

        match reading.state {
            ImpedanceState::Success => match reading.ohms {
                Some(ohms) if self.config.ohms_range.contains(&ohms) => {
                    info!("impedance {ohms:.0} ohm accepted");
                    self.finish(AcquisitionOutcome::Success(reading.clone()))
                }
                ohms => {
                    warn!("implausible impedance {ohms:?}");
                    self.finish(AcquisitionOutcome::Failed(
                        AcquisitionFailure::ImpedanceOutOfRange(ohms),
                    ))
                }
            },
            ImpedanceState::CheckingElectrodes => self.on_checking_electrodes(),
            ImpedanceState::Idle | ImpedanceState::Measuring => {
                self.session.polls += 1;
                if self.session.polls > self.config.max_polls {
                    warn!("device still busy after {} polls", self.session.polls);
                    return self.finish(AcquisitionOutcome::Failed(AcquisitionFailure::Timeout {
                        polls: self.session.polls,
                    }));
                }
                self.schedule_retry()
            }
            other => {
                warn!("device ended measurement with {other:?}");
                self.finish(AcquisitionOutcome::Failed(AcquisitionFailure::DeviceState(other)))
            }
        }
    }

    fn on_checking_electrodes(&mut self) -> Vec<Action> {
        self.session.retry_count = self.session.retry_count.saturating_add(1);
        if self.session.retry_count < self.config.max_retries {
            debug!("electrode check {} of {}", self.session.retry_count, self.config.max_retries);
            return self.schedule_retry();
        }
        if !self.session.escalated {
            self.session.escalated = true;
            self.session.mode = ImpedanceMode::FourElectrode;
            self.state = AcquisitionState::SwitchingMode;
            info!("no electrode contact, escalating to {:?}", self.session.mode);
            return vec![Action::Send(set_mode(self.session.mode))];
        }
        warn!("no electrode contact in {:?}", self.session.mode);
        self.finish(AcquisitionOutcome::Failed(AcquisitionFailure::ElectrodeContact))
    }

    /// Link loss; a no-op unless a measurement is running.
    pub fn on_disconnect(&mut self) -> Vec<Action> {
        self.abort(AcquisitionFailure::Disconnected)
    }

    /// User stop: tells the device to stop and ends the session.
    pub fn cancel(&mut self) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        info!("acquisition cancelled in {:?}", self.state);
        let mut actions = vec![Action::Send(set_mode(ImpedanceMode::Stop))];
        actions.extend(self.finish(AcquisitionOutcome::Failed(AcquisitionFailure::Cancelled)));
        actions
    }

    /// Ends a running session with `failure`.
    pub fn abort(&mut self, failure: AcquisitionFailure) -> Vec<Action> {
        if !self.is_active() {
            return Vec::new();
        }
        warn!("acquisition aborted in {:?}: {failure}", self.state);
        self.finish(AcquisitionOutcome::Failed(failure))
    }

    fn schedule_retry(&mut self) -> Vec<Action> {
        self.state = AcquisitionState::Retrying;
        vec![Action::Schedule(TimerKind::Retry, self.config.retry_delay)]
    }

    fn finish(&mut self, outcome: AcquisitionOutcome) -> Vec<Action> {
        self.state = AcquisitionState::Done(outcome.clone());
        vec![
            Action::Cancel(TimerKind::Settle),
            Action::Cancel(TimerKind::Retry),
            Action::Finished(outcome),
        ]
    }
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::new(AcquisitionConfig::default())
    }
}

fn set_mode(mode: ImpedanceMode) -> OutboundCommand {
    OutboundCommand::SetImpedanceMode {
        mode,
        frequency: FrequencyBand::Khz50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(state: ImpedanceState, ohms: Option<f64>) -> ImpedanceReading {
        ImpedanceReading {
            frequency_band: Some(FrequencyBand::Khz50),
            state,
            data_type: 0,
            phase_degrees: ohms.map(|_| 15.0),
            ohms,
        }
    }

    /// Runs start, ack and settle so the machine waits for a status.
    fn polling() -> Acquisition {
        let mut acquisition = Acquisition::default();
        acquisition.start();
        acquisition.on_mode_ack(ModeSwitchResult::Ok);
        acquisition.on_timer(TimerKind::Settle);
        assert_eq!(acquisition.state(), &AcquisitionState::Polling);
        acquisition
    }

    fn finished(actions: &[Action]) -> Option<&AcquisitionOutcome> {
        actions.iter().find_map(|a| match a {
            Action::Finished(outcome) => Some(outcome),
            _ => None,
        })
    }

    #[test]
    fn test_start_sends_two_arm_mode() {
        let mut acquisition = Acquisition::default();
        let actions = acquisition.start();
        assert_eq!(
            actions.last(),
            Some(&Action::Send(OutboundCommand::SetImpedanceMode {
                mode: ImpedanceMode::TwoArms,
                frequency: FrequencyBand::Khz50,
            }))
        );
        assert_eq!(acquisition.state(), &AcquisitionState::SwitchingMode);
    }

    #[test]
    fn test_ack_schedules_settle_then_polls() {
        let mut acquisition = Acquisition::default();
        acquisition.start();
        assert_eq!(
            acquisition.on_mode_ack(ModeSwitchResult::Ok),
            vec![Action::Schedule(TimerKind::Settle, Duration::from_secs(2))]
        );
        assert_eq!(
            acquisition.on_timer(TimerKind::Settle),
            vec![Action::Send(OutboundCommand::QueryImpedance)]
        );
    }

    #[test]
    fn test_ack_error_fails() {
        let mut acquisition = Acquisition::default();
        acquisition.start();
        let actions = acquisition.on_mode_ack(ModeSwitchResult::FrequencyError);
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::ModeSwitch(
                ModeSwitchResult::FrequencyError
            )))
        );
        assert!(!acquisition.is_active());
    }

    #[test]
    fn test_success_within_range() {
        let mut acquisition = polling();
        let actions = acquisition.on_impedance(&reading(ImpedanceState::Success, Some(600.0)));
        assert!(finished(&actions).is_some_and(AcquisitionOutcome::is_success));
        assert_eq!(actions[0], Action::Cancel(TimerKind::Settle));
        assert_eq!(actions[1], Action::Cancel(TimerKind::Retry));
    }

    #[test]
    fn test_success_range_bounds() {
        for (ohms, ok) in [(9.9, false), (10.0, true), (1200.0, true), (1200.5, false)] {
            let mut acquisition = polling();
            let actions = acquisition.on_impedance(&reading(ImpedanceState::Success, Some(ohms)));
            assert_eq!(finished(&actions).unwrap().is_success(), ok, "{ohms}");
        }
    }

    #[test]
    fn test_success_without_value_fails() {
        let mut acquisition = polling();
        let actions = acquisition.on_impedance(&reading(ImpedanceState::Success, None));
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::ImpedanceOutOfRange(None)))
        );
    }

    #[test]
    fn test_checking_electrodes_retries_then_escalates_then_fails() {
        let mut acquisition = polling();
        let checking = reading(ImpedanceState::CheckingElectrodes, None);

        for attempt in 1..=2u8 {
            let actions = acquisition.on_impedance(&checking);
            assert_eq!(
                actions,
                vec![Action::Schedule(TimerKind::Retry, Duration::from_secs(1))]
            );
            assert_eq!(acquisition.session().retry_count, attempt);
            acquisition.on_timer(TimerKind::Retry);
        }

        let actions = acquisition.on_impedance(&checking);
        assert_eq!(
            actions,
            vec![Action::Send(OutboundCommand::SetImpedanceMode {
                mode: ImpedanceMode::FourElectrode,
                frequency: FrequencyBand::Khz50,
            })]
        );
        assert!(acquisition.session().escalated);
        assert_eq!(acquisition.session().retry_count, 3);

        acquisition.on_mode_ack(ModeSwitchResult::Ok);
        acquisition.on_timer(TimerKind::Settle);
        let actions = acquisition.on_impedance(&checking);
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::ElectrodeContact))
        );
    }

    #[test]
    fn test_busy_device_times_out() {
        let mut acquisition = polling();
        let busy = reading(ImpedanceState::Measuring, None);
        for _ in 0..30 {
            assert!(finished(&acquisition.on_impedance(&busy)).is_none());
            acquisition.on_timer(TimerKind::Retry);
        }
        let actions = acquisition.on_impedance(&busy);
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::Timeout { polls: 31 }))
        );
    }

    #[test]
    fn test_device_error_states_fail() {
        for state in [
            ImpedanceState::RangeError,
            ImpedanceState::RepeatError,
            ImpedanceState::UserExit,
            ImpedanceState::Unknown(0x7F),
        ] {
            let mut acquisition = polling();
            let actions = acquisition.on_impedance(&reading(state, None));
            assert_eq!(
                finished(&actions),
                Some(&AcquisitionOutcome::Failed(AcquisitionFailure::DeviceState(state)))
            );
        }
    }

    #[test]
    fn test_cancel_sends_stop() {
        let mut acquisition = polling();
        let actions = acquisition.cancel();
        assert_eq!(
            actions[0],
            Action::Send(OutboundCommand::SetImpedanceMode {
                mode: ImpedanceMode::Stop,
                frequency: FrequencyBand::Khz50,
            })
        );
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::Cancelled))
        );
        assert!(acquisition.cancel().is_empty());
    }

    #[test]
    fn test_disconnect_only_affects_active_session() {
        let mut acquisition = Acquisition::default();
        assert!(acquisition.on_disconnect().is_empty());

        acquisition.start();
        let actions = acquisition.on_disconnect();
        assert_eq!(
            finished(&actions),
            Some(&AcquisitionOutcome::Failed(AcquisitionFailure::Disconnected))
        );
        assert!(acquisition.on_disconnect().is_empty());
    }

    #[test]
    fn test_unexpected_inputs_are_ignored() {
        let mut acquisition = Acquisition::default();
        assert!(acquisition.on_mode_ack(ModeSwitchResult::Ok).is_empty());
        assert!(acquisition.on_timer(TimerKind::Settle).is_empty());
        assert!(acquisition
            .on_impedance(&reading(ImpedanceState::Success, Some(500.0)))
            .is_empty());

        acquisition.start();
        assert!(acquisition.on_timer(TimerKind::Retry).is_empty());
        assert_eq!(acquisition.state(), &AcquisitionState::SwitchingMode);
    }

    #[test]
    fn test_restart_resets_session() {
        let mut acquisition = polling();
        acquisition.on_impedance(&reading(ImpedanceState::CheckingElectrodes, None));
        assert_eq!(acquisition.session().retry_count, 1);

        acquisition.start();
        assert_eq!(acquisition.session(), &AcquisitionSession::default());
    }
}
