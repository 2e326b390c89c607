//! Async serial link driving an [`Engine`] over any [`SerialPort`].
//!
//! The link owns the port and the engine and runs a single `tokio::select!`
//! loop over three sources: bytes from the port, the earliest armed timer,
//! and [`LinkCommand`]s from the application. Outbound frames queued by the
//! engine are written with `write_all` and flushed after every step, and the
//! resulting [`EngineEvent`]s are forwarded on an mpsc channel.
//!
//! Opening and configuring the port (baud rate, parity) is left to the caller.

use crate::bia::engine::{Engine, EngineConfig, EngineEvent, Scheduler, TimerKind, Transport};
use crate::bia::profile::UserProfile;
use crate::error::BiaError;
use crate::logging::{log_error, log_info};
use log::{debug, warn};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_serial::SerialPortBuilderExt;

const READ_CHUNK: usize = 256;

/// Trait for serial port operations
#[async_trait::async_trait]
pub trait SerialPort: AsyncRead + AsyncWrite + Unpin + Send {
    async fn flush(&mut self) -> Result<(), std::io::Error>;
}

// Implement SerialPort for tokio_serial::SerialStream
#[async_trait::async_trait]
impl SerialPort for tokio_serial::SerialStream {
    async fn flush(&mut self) -> Result<(), std::io::Error> {
        AsyncWriteExt::flush(self).await
    }
}

// In-memory pipe, used to simulate a device end to end
#[async_trait::async_trait]
impl SerialPort for tokio::io::DuplexStream {
    async fn flush(&mut self) -> Result<(), std::io::Error> {
        AsyncWriteExt::flush(self).await
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl SerialPort for crate::bia::serial_mock::MockSerialPort {
    async fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
}

/// Requests from the application to the link task.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    StartMeasurement(UserProfile),
    CancelMeasurement,
    RequestVersion,
    RequestAlgorithm {
        profile: UserProfile,
        impedance_ohms: f64,
    },
    /// Stops a running measurement and ends the link task
    Shutdown,
}

/// [`Transport`] that queues frames until the link writes them out.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Vec<u8>>,
    closed: bool,
}

impl Outbox {
    pub fn take(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Refuses further writes, e.g. once the port failed.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }
}

impl Transport for Outbox {
    fn write(&mut self, bytes: &[u8]) -> bool {
        if self.closed {
            return false;
        }
        self.pending.push(bytes.to_vec());
        true
    }
}

/// [`Scheduler`] keeping one deadline per timer kind.
#[derive(Debug, Default)]
pub struct TimerTable {
    deadlines: HashMap<TimerKind, Instant>,
}

impl TimerTable {
    /// Earliest armed timer.
    pub fn next_due(&self) -> Option<(TimerKind, Instant)> {
        self.deadlines
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(kind, at)| (*kind, *at))
    }

    /// Disarms `timer`; false if it was not armed.
    pub fn fire(&mut self, timer: TimerKind) -> bool {
        self.deadlines.remove(&timer).is_some()
    }
}

impl Scheduler for TimerTable {
    fn schedule(&mut self, timer: TimerKind, delay: Duration) {
        self.deadlines.insert(timer, Instant::now() + delay);
    }

    fn cancel(&mut self, timer: TimerKind) {
        self.deadlines.remove(&timer);
    }
}

enum Wake {
    Read(std::io::Result<usize>),
    Timer(TimerKind),
    Command(Option<LinkCommand>),
}

/// An engine bound to a serial port.
pub struct SerialLink<P: SerialPort> {
    port: P,
    engine: Engine<Outbox, TimerTable>,
}

impl<P: SerialPort> SerialLink<P> {
    pub fn new(port: P) -> Self {
        Self::with_config(port, EngineConfig::default())
    }

    pub fn with_config(port: P, config: EngineConfig) -> Self {
        SerialLink {
            port,
            engine: Engine::with_config(Outbox::default(), TimerTable::default(), config),
        }
    }

    pub fn engine(&self) -> &Engine<Outbox, TimerTable> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<Outbox, TimerTable> {
        &mut self.engine
    }

    /// Runs until shutdown, a closed command channel, or link loss.
    ///
    /// EOF on the port ends with [`BiaError::LinkClosed`], a read or write
    /// error with [`BiaError::SerialPortError`]; in both cases a running
    /// measurement is failed first and its events are delivered.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<LinkCommand>,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), BiaError> {
        log_info("serial link started");
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let next_timer = self.engine.scheduler().next_due();
            let wake = tokio::select! {
                read = self.port.read(&mut buf) => Wake::Read(read),
                timer = wait_for(next_timer) => Wake::Timer(timer),
                command = commands.recv() => Wake::Command(command),
            };

            let mut produced = Vec::new();
            let mut exit = None;
            match wake {
                Wake::Read(Ok(0)) => {
                    warn!("serial port reached end of stream");
                    produced.extend(self.engine.on_disconnect());
                    exit = Some(Err(BiaError::LinkClosed));
                }
                Wake::Read(Ok(n)) => produced.extend(self.engine.on_bytes(&buf[..n])),
                Wake::Read(Err(e)) => {
                    log_error(&format!("serial read failed: {e}"));
                    produced.extend(self.engine.on_disconnect());
                    exit = Some(Err(BiaError::SerialPortError(e.to_string())));
                }
                Wake::Timer(timer) => {
                    self.engine.scheduler_mut().fire(timer);
                    produced.extend(self.engine.on_timer(timer));
                }
                Wake::Command(None) => {
                    debug!("command channel closed");
                    produced.extend(self.engine.cancel_measurement());
                    exit = Some(Ok(()));
                }
                Wake::Command(Some(LinkCommand::Shutdown)) => {
                    produced.extend(self.engine.cancel_measurement());
                    exit = Some(Ok(()));
                }
                Wake::Command(Some(command)) => produced.extend(self.handle_command(command)),
            }

            if !matches!(exit, Some(Err(_))) {
                if let Err(e) = self.flush_outbox().await {
                    log_error(&format!("serial write failed: {e}"));
                    self.engine.transport_mut().close();
                    produced.extend(self.engine.on_disconnect());
                    exit = Some(Err(e));
                }
            }

            for event in produced {
                if events.send(event).await.is_err() {
                    debug!("event receiver dropped");
                }
            }

            if let Some(result) = exit {
                log_info("serial link stopped");
                return result;
            }
        }
    }

    fn handle_command(&mut self, command: LinkCommand) -> Vec<EngineEvent> {
        match command {
            LinkCommand::StartMeasurement(profile) => {
                self.engine.start_measurement(profile).unwrap_or_else(|e| {
                    warn!("measurement not started: {e}");
                    Vec::new()
                })
            }
            LinkCommand::CancelMeasurement => self.engine.cancel_measurement(),
            LinkCommand::RequestVersion => self.engine.request_version(),
            LinkCommand::RequestAlgorithm {
                profile,
                impedance_ohms,
            } => self
                .engine
                .request_algorithm(profile, impedance_ohms)
                .unwrap_or_else(|e| {
                    warn!("algorithm request rejected: {e}");
                    Vec::new()
                }),
            // Handled by the run loop
            LinkCommand::Shutdown => Vec::new(),
        }
    }

    async fn flush_outbox(&mut self) -> Result<(), BiaError> {
        let frames = self.engine.transport_mut().take();
        if frames.is_empty() {
            return Ok(());
        }
        for frame in frames {
            self.port
                .write_all(&frame)
                .await
                .map_err(|e| BiaError::SerialPortError(e.to_string()))?;
        }
        SerialPort::flush(&mut self.port)
            .await
            .map_err(|e| BiaError::SerialPortError(e.to_string()))
    }
}

impl SerialLink<tokio_serial::SerialStream> {
    /// Opens `path` as 8N1 at `baud_rate` with the default engine settings.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, BiaError> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .open_native_async()
            .map_err(|e| BiaError::SerialPortError(e.to_string()))?;
        log_info(&format!("opened {path} at {baud_rate} baud"));
        Ok(Self::new(port))
    }
}

async fn wait_for(next: Option<(TimerKind, Instant)>) -> TimerKind {
    match next {
        Some((timer, at)) => {
            sleep_until(at).await;
            timer
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bia::acquisition::{AcquisitionFailure, AcquisitionOutcome};
    use crate::bia::command::encode_frame;
    use crate::bia::profile::{Sex, UserType};
    use crate::bia::serial_mock::MockSerialPort;
    use crate::constants::*;
    use crate::payload::response::{AppType, ImpedanceState};

    fn inbound(command: u8, payload: &[u8]) -> Vec<u8> {
        encode_frame(BIA_FRAME_HEADER_INBOUND, command, payload).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile::new(Sex::Male, UserType::Normal, 172, 23, 62.3).unwrap()
    }

    fn impedance_success(ohms: u32) -> Vec<u8> {
        let mut payload = vec![BIA_FREQ_50KHZ, 0x03, 0x00, 0x96, 0x00];
        payload.extend_from_slice(&ohms.to_le_bytes());
        inbound(BIA_CMD_QUERY_IMPEDANCE, &payload)
    }

    #[test]
    fn test_timer_table_orders_deadlines() {
        let mut timers = TimerTable::default();
        assert!(timers.next_due().is_none());
        timers.schedule(TimerKind::Settle, Duration::from_secs(2));
        timers.schedule(TimerKind::Retry, Duration::from_secs(1));
        assert_eq!(timers.next_due().map(|(kind, _)| kind), Some(TimerKind::Retry));

        timers.cancel(TimerKind::Retry);
        assert_eq!(timers.next_due().map(|(kind, _)| kind), Some(TimerKind::Settle));
        assert!(timers.fire(TimerKind::Settle));
        assert!(!timers.fire(TimerKind::Settle));
    }

    #[test]
    fn test_closed_outbox_refuses_writes() {
        let mut outbox = Outbox::default();
        assert!(outbox.write(&[0x55]));
        outbox.close();
        assert!(outbox.is_empty());
        assert!(!outbox.write(&[0x55]));
    }

    #[tokio::test]
    async fn test_version_round_trip() {
        let mock = MockSerialPort::new();
        mock.script_reply(BIA_CMD_GET_VERSION, inbound(BIA_CMD_GET_VERSION, &[0x00, 0x05, 0x01]));

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let link = tokio::spawn(SerialLink::new(mock.clone()).run(cmd_rx, event_tx));

        cmd_tx.send(LinkCommand::RequestVersion).await.unwrap();
        let event = event_rx.recv().await.unwrap();
        let EngineEvent::Version(version) = event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(version.app_type, AppType::Master);
        assert_eq!(version.to_string(), "Master v1.5");
        assert_eq!(mock.get_tx_data(), vec![0x55, 0x05, 0xE0, 0x00, 0xC6]);

        cmd_tx.send(LinkCommand::Shutdown).await.unwrap();
        assert!(link.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_measurement_runs_algorithm() {
        let mock = MockSerialPort::new();
        mock.script_reply(BIA_CMD_SET_IMPEDANCE_MODE, inbound(BIA_CMD_SET_IMPEDANCE_MODE, &[0x00]));
        mock.script_reply(BIA_CMD_QUERY_IMPEDANCE, impedance_success(758));
        mock.script_reply(BIA_CMD_RUN_ALGORITHM, inbound(BIA_CMD_RUN_ALGORITHM, &[0x01, 0x02]));

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let link = tokio::spawn(SerialLink::new(mock.clone()).run(cmd_rx, event_tx));

        cmd_tx.send(LinkCommand::StartMeasurement(profile())).await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = event_rx.recv().await {
            let done = matches!(event, EngineEvent::AlgorithmRejected(_));
            seen.push(event);
            if done {
                break;
            }
        }

        assert!(matches!(seen[0], EngineEvent::ModeSwitch(_)));
        assert!(matches!(
            &seen[1],
            EngineEvent::Impedance(reading) if reading.state == ImpedanceState::Success
        ));
        assert!(matches!(
            &seen[2],
            EngineEvent::Acquisition(outcome) if outcome.is_success()
        ));

        let tx = mock.get_tx_data();
        let algorithm = [0x55, 0x0C, 0xD2, 0x01, 0x00, 0xAC, 0x17, 0x6F, 0x02, 0xF6, 0x02, 0xA0];
        assert!(tx.ends_with(&algorithm));

        drop(cmd_tx);
        assert!(link.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_eof_fails_running_measurement() {
        let mock = MockSerialPort::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let link = tokio::spawn(SerialLink::new(mock.clone()).run(cmd_rx, event_tx));

        cmd_tx.send(LinkCommand::StartMeasurement(profile())).await.unwrap();
        // Wait for the set-mode frame before pulling the plug.
        while mock.get_tx_data().is_empty() {
            tokio::task::yield_now().await;
        }
        mock.close();

        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::Acquisition(AcquisitionOutcome::Failed(
                AcquisitionFailure::Disconnected
            )))
        );
        assert!(matches!(link.await.unwrap(), Err(BiaError::LinkClosed)));
    }

    #[tokio::test]
    async fn test_read_error_fails_running_measurement() {
        let mock = MockSerialPort::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let link = tokio::spawn(SerialLink::new(mock.clone()).run(cmd_rx, event_tx));

        cmd_tx.send(LinkCommand::StartMeasurement(profile())).await.unwrap();
        while mock.get_tx_data().is_empty() {
            tokio::task::yield_now().await;
        }
        mock.set_next_read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"));

        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::Acquisition(AcquisitionOutcome::Failed(
                AcquisitionFailure::Disconnected
            )))
        );
        assert!(matches!(link.await.unwrap(), Err(BiaError::SerialPortError(_))));
        // Only the set-mode frame went out; no stop after the failure.
        assert_eq!(mock.get_tx_data().len(), 6);
    }

    #[tokio::test]
    async fn test_write_error_closes_outbox_and_fails_measurement() {
        let mock = MockSerialPort::new();
        mock.set_next_write_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let link = tokio::spawn(SerialLink::new(mock.clone()).run(cmd_rx, event_tx));

        cmd_tx.send(LinkCommand::StartMeasurement(profile())).await.unwrap();

        assert_eq!(
            event_rx.recv().await,
            Some(EngineEvent::Acquisition(AcquisitionOutcome::Failed(
                AcquisitionFailure::Disconnected
            )))
        );
        assert!(matches!(link.await.unwrap(), Err(BiaError::SerialPortError(_))));
        assert!(event_rx.recv().await.is_none());
        assert!(mock.get_tx_data().is_empty());
    }

    #[test]
    fn test_closed_outbox_makes_engine_report_write_failures() {
        let mut link = SerialLink::new(MockSerialPort::new());
        link.engine_mut().transport_mut().close();
        assert_eq!(
            link.engine_mut().request_version(),
            vec![EngineEvent::WriteFailed("get-version")]
        );
        assert!(link.engine().transport().is_empty());
        assert!(link
            .engine_mut()
            .start_measurement(profile())
            .unwrap()
            .contains(&EngineEvent::Acquisition(AcquisitionOutcome::Failed(
                AcquisitionFailure::WriteFailed("set-impedance-mode")
            ))));
    }
}
