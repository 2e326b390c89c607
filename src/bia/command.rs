//! # Command Encoder
//!
//! Builds host-to-device frames for the fixed command catalog:
//!
//! | Command            | Id   | Params                                            |
//! |--------------------|------|---------------------------------------------------|
//! | Get version        | 0xE0 | `[0x00]`                                          |
//! | Set impedance mode | 0xB0 | `[mode, frequency]`                               |
//! | Query impedance    | 0xB1 | `[0x51]`                                          |
//! | Run algorithm      | 0xD2 | `[sex, type, height, age, weight16le, ohms16le]`  |
//!
//! ```rust
//! use bia_rs::bia::command::OutboundCommand;
//!
//! let bytes = OutboundCommand::GetVersion.encode().unwrap();
//! assert_eq!(bytes, vec![0x55, 0x05, 0xE0, 0x00, 0xC6]);
//! ```

use crate::bia::checksum::checksum;
use crate::bia::profile::UserProfile;
use crate::constants::*;
use crate::error::BiaError;
use crate::payload::response::FrequencyBand;
use bytes::{BufMut, BytesMut};
use serde::Serialize;

/// Electrode configuration requested with a set-impedance-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImpedanceMode {
    Stop,
    FourElectrode,
    TwoArms,
}

impl ImpedanceMode {
    pub fn code(self) -> u8 {
        match self {
            ImpedanceMode::Stop => BIA_MODE_STOP,
            ImpedanceMode::FourElectrode => BIA_MODE_FOUR_ELECTRODE,
            ImpedanceMode::TwoArms => BIA_MODE_TWO_ARMS,
        }
    }
}

/// A command the host can send to the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    GetVersion,
    SetImpedanceMode {
        mode: ImpedanceMode,
        frequency: FrequencyBand,
    },
    QueryImpedance,
    RunAlgorithm {
        profile: UserProfile,
        impedance_ohms: f64,
    },
}

impl OutboundCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            OutboundCommand::GetVersion => BIA_CMD_GET_VERSION,
            OutboundCommand::SetImpedanceMode { .. } => BIA_CMD_SET_IMPEDANCE_MODE,
            OutboundCommand::QueryImpedance => BIA_CMD_QUERY_IMPEDANCE,
            OutboundCommand::RunAlgorithm { .. } => BIA_CMD_RUN_ALGORITHM,
        }
    }

    /// Short name used in logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::GetVersion => "get-version",
            OutboundCommand::SetImpedanceMode { .. } => "set-impedance-mode",
            OutboundCommand::QueryImpedance => "query-impedance",
            OutboundCommand::RunAlgorithm { .. } => "run-algorithm",
        }
    }

    /// Parameter bytes following the command id.
    pub fn params(&self) -> Result<Vec<u8>, BiaError> {
        match self {
            OutboundCommand::GetVersion => Ok(vec![BIA_VERSION_SELECTOR_APP]),
            OutboundCommand::SetImpedanceMode { mode, frequency } => {
                Ok(vec![mode.code(), frequency.code()])
            }
            OutboundCommand::QueryImpedance => Ok(vec![BIA_QUERY_SELECTOR_50KHZ_TWO_ARMS]),
            OutboundCommand::RunAlgorithm {
                profile,
                impedance_ohms,
            } => run_algorithm_params(profile, *impedance_ohms),
        }
    }

    /// Complete frame: header, length, id, params and checksum.
    pub fn encode(&self) -> Result<Vec<u8>, BiaError> {
        encode_frame(BIA_FRAME_HEADER_OUTBOUND, self.command_id(), &self.params()?)
    }
}

fn run_algorithm_params(profile: &UserProfile, impedance_ohms: f64) -> Result<Vec<u8>, BiaError> {
    profile.validate()?;

    let ohms = impedance_ohms.round();
    if !(0.0..=f64::from(u16::MAX)).contains(&ohms) {
        return Err(BiaError::ValueOutOfRange {
            field: "impedance",
            value: impedance_ohms,
        });
    }

    let mut params = BytesMut::with_capacity(8);
    params.put_u8(profile.sex.code());
    params.put_u8(profile.user_type.code());
    params.put_u8(profile.height_cm);
    params.put_u8(profile.age_years);
    params.put_u16_le(profile.weight_decikg());
    params.put_u16_le(ohms as u16);
    Ok(params.to_vec())
}

/// Frames `params` under `header` and `command`, appending the checksum.
///
/// Fails when the frame would not fit the one-byte length field.
pub fn encode_frame(header: u8, command: u8, params: &[u8]) -> Result<Vec<u8>, BiaError> {
    let total = params.len() + BIA_FRAME_MIN_LENGTH;
    let length = u8::try_from(total).map_err(|_| BiaError::ValueOutOfRange {
        field: "frame length",
        value: total as f64,
    })?;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u8(header);
    buf.put_u8(length);
    buf.put_u8(command);
    buf.put_slice(params);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    Ok(buf.to_vec())
}
