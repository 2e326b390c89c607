//! # Response Decoder
//!
//! Stateless dispatch over a validated [`Frame`]: the command id selects the
//! payload layout, and each layout is decoded into a typed value. Short frames
//! are reported as [`BiaError::PrematureEnd`], unknown ids as
//! [`BiaError::UnknownCommand`]; the caller logs and moves on.

use crate::bia::frame::Frame;
use crate::constants::*;
use crate::error::BiaError;
use crate::payload::body_composition::{decode_algorithm, AlgorithmResult};
use nom::number::complete::{be_u8, le_i16, le_u32};
use nom::sequence::tuple;
use nom::IResult;
use serde::Serialize;
use std::fmt;

/// Application reported by a get-version response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AppType {
    Master,
    Bia,
    Weight,
    Unknown(u8),
}

impl AppType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AppType::Master,
            1 => AppType::Bia,
            2 => AppType::Weight,
            other => AppType::Unknown(other),
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppType::Master => write!(f, "Master"),
            AppType::Bia => write!(f, "BIA"),
            AppType::Weight => write!(f, "Weight"),
            AppType::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub app_type: AppType,
    pub major: u8,
    pub minor: u8,
}

impl VersionInfo {
    /// `"{major}.{minor}"`
    pub fn version_string(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}.{}", self.app_type, self.major, self.minor)
    }
}

/// Result byte of a set-impedance-mode acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeSwitchResult {
    Ok,
    WorkingModeError,
    FrequencyError,
    Unknown(u8),
}

impl ModeSwitchResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ModeSwitchResult::Ok,
            1 => ModeSwitchResult::WorkingModeError,
            2 => ModeSwitchResult::FrequencyError,
            other => ModeSwitchResult::Unknown(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ModeSwitchResult::Ok)
    }
}

/// Measurement frequency. Codes: 0x03 20kHz, 0x05 50kHz, 0x06 100kHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrequencyBand {
    Khz20,
    Khz50,
    Khz100,
}

impl FrequencyBand {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            BIA_FREQ_20KHZ => Some(FrequencyBand::Khz20),
            BIA_FREQ_50KHZ => Some(FrequencyBand::Khz50),
            BIA_FREQ_100KHZ => Some(FrequencyBand::Khz100),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FrequencyBand::Khz20 => BIA_FREQ_20KHZ,
            FrequencyBand::Khz50 => BIA_FREQ_50KHZ,
            FrequencyBand::Khz100 => BIA_FREQ_100KHZ,
        }
    }
}

/// Device-side progress of an impedance measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImpedanceState {
    Idle,
    CheckingElectrodes,
    Measuring,
    Success,
    RangeError,
    RepeatError,
    UserExit,
    Unknown(u8),
}

impl ImpedanceState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => ImpedanceState::Idle,
            0x01 => ImpedanceState::CheckingElectrodes,
            0x02 => ImpedanceState::Measuring,
            0x03 => ImpedanceState::Success,
            0x04 => ImpedanceState::RangeError,
            0x05 => ImpedanceState::RepeatError,
            0x06 => ImpedanceState::UserExit,
            other => ImpedanceState::Unknown(other),
        }
    }
}

/// Decoded query-impedance status.
///
/// `phase_degrees` and `ohms` are only present for a `Success` state with a
/// recognized frequency code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpedanceReading {
    pub frequency_band: Option<FrequencyBand>,
    pub state: ImpedanceState,
    pub data_type: u8,
    pub phase_degrees: Option<f64>,
    pub ohms: Option<f64>,
}

/// Any decoded device response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Response {
    Version(VersionInfo),
    ModeSwitch(ModeSwitchResult),
    Impedance(ImpedanceReading),
    Algorithm(AlgorithmResult),
}

/// Dispatches on the command id of a validated frame.
pub fn decode_response(frame: &Frame) -> Result<Response, BiaError> {
    match frame.command() {
        BIA_CMD_GET_VERSION => decode_version(frame).map(Response::Version),
        BIA_CMD_SET_IMPEDANCE_MODE => decode_mode_switch(frame).map(Response::ModeSwitch),
        BIA_CMD_QUERY_IMPEDANCE => decode_impedance(frame).map(Response::Impedance),
        BIA_CMD_RUN_ALGORITHM => decode_algorithm(frame).map(Response::Algorithm),
        other => Err(BiaError::UnknownCommand(other)),
    }
}

fn require_len(frame: &Frame, needed: usize) -> Result<(), BiaError> {
    if frame.len() < needed {
        return Err(BiaError::PrematureEnd {
            needed,
            available: frame.len(),
        });
    }
    Ok(())
}

fn nom_error(e: nom::Err<nom::error::Error<&[u8]>>) -> BiaError {
    BiaError::FrameParseError(format!("{e:?}"))
}

/// `[appType, versionLow, versionHigh]` at offsets 3..=5.
pub fn decode_version(frame: &Frame) -> Result<VersionInfo, BiaError> {
    require_len(frame, BIA_VERSION_FRAME_MIN)?;
    let (_, (app, low, high)) = version_fields(frame.payload()).map_err(nom_error)?;
    Ok(VersionInfo {
        app_type: AppType::from_code(app),
        major: high,
        minor: low,
    })
}

fn version_fields(input: &[u8]) -> IResult<&[u8], (u8, u8, u8)> {
    tuple((be_u8, be_u8, be_u8))(input)
}

/// Result byte at offset 3.
pub fn decode_mode_switch(frame: &Frame) -> Result<ModeSwitchResult, BiaError> {
    require_len(frame, BIA_MODE_ACK_FRAME_MIN)?;
    let (_, result) = be_u8::<_, nom::error::Error<&[u8]>>(frame.payload()).map_err(nom_error)?;
    Ok(ModeSwitchResult::from_code(result))
}

/// frequency@3, state@4, dataType@5, phase i16le@6, impedance u32le@8.
pub fn decode_impedance(frame: &Frame) -> Result<ImpedanceReading, BiaError> {
    require_len(frame, BIA_IMPEDANCE_FRAME_MIN)?;
    let (_, (frequency, state, data_type, phase_raw, impedance_raw)) =
        impedance_fields(frame.payload()).map_err(nom_error)?;

    let frequency_band = FrequencyBand::from_code(frequency);
    let state = ImpedanceState::from_code(state);
    let measured = state == ImpedanceState::Success && frequency_band.is_some();

    Ok(ImpedanceReading {
        frequency_band,
        state,
        data_type,
        phase_degrees: measured.then(|| f64::from(phase_raw) / 10.0),
        ohms: measured.then(|| f64::from(impedance_raw)),
    })
}

fn impedance_fields(input: &[u8]) -> IResult<&[u8], (u8, u8, u8, i16, u32)> {
    tuple((be_u8, be_u8, be_u8, le_i16, le_u32))(input)
}
