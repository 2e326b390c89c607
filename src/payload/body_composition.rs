//! # Body Composition Record
//!
//! Decoding of the run-algorithm (`0xD2`) response. After the header, length
//! and command bytes come a packet byte (offset 3) and an error code
//! (offset 4). A zero error code is followed by a fixed-layout block of
//! little-endian metrics described by [`LAYOUT`]; a complete frame is 86 bytes.
//!
//! Each metric is decoded only if its whole byte range lies before the
//! checksum, so a truncated frame still yields the metrics it does carry.

use crate::bia::frame::Frame;
use crate::constants::{
    BIA_ALGORITHM_FRAME_MIN, BIA_ALGORITHM_OFFSET_ERROR, BIA_ALGORITHM_OFFSET_PACKET,
};
use crate::error::BiaError;
use log::debug;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Number of metrics in a full record.
pub const METRIC_COUNT: usize = 44;

/// Metrics reported by the analyzer, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Metric {
    FatMass,
    FatPercent,
    StandardWeight,
    WeightControl,
    FatControl,
    ObesityLevel,
    Bmi,
    ObesityDegree,
    MuscleControl,
    Bmr,
    VisceralFatArea,
    PhysicalAge,
    LeanMass,
    SubcutaneousFatPercent,
    SubcutaneousFatMass,
    IntracellularWater,
    FatLevel,
    BodyScore,
    BodyType,
    BoneMass,
    ExtracellularWater,
    TotalBodyWater,
    MoisturePercent,
    SkeletalMusclePercent,
    FatFreeMassIndex,
    VisceralFatLevel,
    StandardMuscleMass,
    SkeletalMuscleMass,
    ProteinMass,
    NutritionStatus,
    ProteinPercent,
    MineralMass,
    MusclePercent,
    MuscleMass,
    BodyCellMass,
    SkeletalMuscleIndex,
    WalkingKcal,
    JoggingKcal,
    CyclingKcal,
    SwimmingKcal,
    ClimbingKcal,
    AerobicsKcal,
    TableTennisKcal,
    TennisKcal,
}

impl Metric {
    /// Key used when the record is serialized.
    pub fn name(self) -> &'static str {
        match self {
            Metric::FatMass => "fat_mass_kg",
            Metric::FatPercent => "fat_percent",
            Metric::StandardWeight => "standard_weight_kg",
            Metric::WeightControl => "weight_control_kg",
            Metric::FatControl => "fat_control_kg",
            Metric::ObesityLevel => "obesity_level",
            Metric::Bmi => "bmi",
            Metric::ObesityDegree => "obesity_degree_percent",
            Metric::MuscleControl => "muscle_control_kg",
            Metric::Bmr => "bmr_kcal",
            Metric::VisceralFatArea => "visceral_fat_area_cm2",
            Metric::PhysicalAge => "physical_age",
            Metric::LeanMass => "lean_mass_kg",
            Metric::SubcutaneousFatPercent => "subcutaneous_fat_percent",
            Metric::SubcutaneousFatMass => "subcutaneous_fat_mass_kg",
            Metric::IntracellularWater => "intracellular_water_kg",
            Metric::FatLevel => "fat_level",
            Metric::BodyScore => "body_score",
            Metric::BodyType => "body_type",
            Metric::BoneMass => "bone_mass_kg",
            Metric::ExtracellularWater => "extracellular_water_kg",
            Metric::TotalBodyWater => "total_body_water_kg",
            Metric::MoisturePercent => "moisture_percent",
            Metric::SkeletalMusclePercent => "skeletal_muscle_percent",
            Metric::FatFreeMassIndex => "fat_free_mass_index",
            Metric::VisceralFatLevel => "visceral_fat_level",
            Metric::StandardMuscleMass => "standard_muscle_mass_kg",
            Metric::SkeletalMuscleMass => "skeletal_muscle_mass_kg",
            Metric::ProteinMass => "protein_mass_kg",
            Metric::NutritionStatus => "nutrition_status",
            Metric::ProteinPercent => "protein_percent",
            Metric::MineralMass => "mineral_mass_kg",
            Metric::MusclePercent => "muscle_percent",
            Metric::MuscleMass => "muscle_mass_kg",
            Metric::BodyCellMass => "body_cell_mass_kg",
            Metric::SkeletalMuscleIndex => "skeletal_muscle_index",
            Metric::WalkingKcal => "walking_kcal_per_hour",
            Metric::JoggingKcal => "jogging_kcal_per_hour",
            Metric::CyclingKcal => "cycling_kcal_per_hour",
            Metric::SwimmingKcal => "swimming_kcal_per_hour",
            Metric::ClimbingKcal => "climbing_kcal_per_hour",
            Metric::AerobicsKcal => "aerobics_kcal_per_hour",
            Metric::TableTennisKcal => "table_tennis_kcal_per_hour",
            Metric::TennisKcal => "tennis_kcal_per_hour",
        }
    }

    /// Wire position of this metric.
    pub fn layout(self) -> &'static FieldLayout {
        &LAYOUT[self as usize]
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
        }
    }
}

/// Where a metric sits in the frame and how to scale its raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLayout {
    pub metric: Metric,
    /// Offset within the whole frame (header at 0)
    pub offset: usize,
    pub width: Width,
    pub divisor: f64,
}

impl FieldLayout {
    const fn new(metric: Metric, offset: usize, width: Width, divisor: f64) -> Self {
        FieldLayout {
            metric,
            offset,
            width,
            divisor,
        }
    }

    /// Scaled value, or `None` if the frame does not reach this field.
    pub fn read(&self, frame: &Frame) -> Option<f64> {
        let raw = match self.width {
            Width::One => frame.u8_at(self.offset).map(u16::from),
            Width::Two => frame.u16_le_at(self.offset),
        }?;
        Some(f64::from(raw) / self.divisor)
    }

    /// First offset past this field.
    pub fn end(&self) -> usize {
        self.offset + self.width.bytes()
    }
}

use Metric as M;
use Width::{One, Two};

/// Run-algorithm result layout, indexed by `Metric as usize`.
pub static LAYOUT: [FieldLayout; METRIC_COUNT] = [
    FieldLayout::new(M::FatMass, 5, Two, 10.0),
    FieldLayout::new(M::FatPercent, 7, Two, 10.0),
    FieldLayout::new(M::StandardWeight, 9, Two, 10.0),
    FieldLayout::new(M::WeightControl, 11, Two, 10.0),
    FieldLayout::new(M::FatControl, 13, Two, 10.0),
    FieldLayout::new(M::ObesityLevel, 15, One, 1.0),
    FieldLayout::new(M::Bmi, 16, Two, 10.0),
    FieldLayout::new(M::ObesityDegree, 18, Two, 10.0),
    FieldLayout::new(M::MuscleControl, 20, Two, 10.0),
    FieldLayout::new(M::Bmr, 22, Two, 1.0),
    FieldLayout::new(M::VisceralFatArea, 24, Two, 10.0),
    FieldLayout::new(M::PhysicalAge, 26, One, 1.0),
    FieldLayout::new(M::LeanMass, 27, Two, 10.0),
    FieldLayout::new(M::SubcutaneousFatPercent, 29, Two, 10.0),
    FieldLayout::new(M::SubcutaneousFatMass, 31, Two, 10.0),
    FieldLayout::new(M::IntracellularWater, 33, Two, 10.0),
    FieldLayout::new(M::FatLevel, 35, One, 1.0),
    FieldLayout::new(M::BodyScore, 36, One, 1.0),
    FieldLayout::new(M::BodyType, 37, One, 1.0),
    FieldLayout::new(M::BoneMass, 38, One, 10.0),
    FieldLayout::new(M::ExtracellularWater, 39, Two, 10.0),
    FieldLayout::new(M::TotalBodyWater, 41, Two, 10.0),
    FieldLayout::new(M::MoisturePercent, 43, Two, 10.0),
    FieldLayout::new(M::SkeletalMusclePercent, 45, Two, 10.0),
    FieldLayout::new(M::FatFreeMassIndex, 47, Two, 10.0),
    FieldLayout::new(M::VisceralFatLevel, 49, One, 1.0),
    FieldLayout::new(M::StandardMuscleMass, 50, Two, 10.0),
    FieldLayout::new(M::SkeletalMuscleMass, 52, Two, 10.0),
    FieldLayout::new(M::ProteinMass, 54, Two, 10.0),
    FieldLayout::new(M::NutritionStatus, 56, One, 1.0),
    FieldLayout::new(M::ProteinPercent, 57, Two, 10.0),
    FieldLayout::new(M::MineralMass, 59, Two, 10.0),
    FieldLayout::new(M::MusclePercent, 61, Two, 10.0),
    FieldLayout::new(M::MuscleMass, 63, Two, 10.0),
    FieldLayout::new(M::BodyCellMass, 65, Two, 10.0),
    FieldLayout::new(M::SkeletalMuscleIndex, 67, Two, 10.0),
    FieldLayout::new(M::WalkingKcal, 69, Two, 1.0),
    FieldLayout::new(M::JoggingKcal, 71, Two, 1.0),
    FieldLayout::new(M::CyclingKcal, 73, Two, 1.0),
    FieldLayout::new(M::SwimmingKcal, 75, Two, 1.0),
    FieldLayout::new(M::ClimbingKcal, 77, Two, 1.0),
    FieldLayout::new(M::AerobicsKcal, 79, Two, 1.0),
    FieldLayout::new(M::TableTennisKcal, 81, Two, 1.0),
    FieldLayout::new(M::TennisKcal, 83, Two, 1.0),
];

/// Body type classification carried in the `BodyType` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyType {
    HiddenObese,
    Obese,
    MuscularObese,
    UnderExercised,
    Standard,
    StandardMuscular,
    Thin,
    ThinMuscular,
    VeryMuscular,
    Unknown(u8),
}

impl BodyType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => BodyType::HiddenObese,
            2 => BodyType::Obese,
            3 => BodyType::MuscularObese,
            4 => BodyType::UnderExercised,
            5 => BodyType::Standard,
            6 => BodyType::StandardMuscular,
            7 => BodyType::Thin,
            8 => BodyType::ThinMuscular,
            9 => BodyType::VeryMuscular,
            other => BodyType::Unknown(other),
        }
    }
}

/// Metrics decoded from one run-algorithm response.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyCompositionRecord {
    packet: u8,
    values: [Option<f64>; METRIC_COUNT],
}

impl BodyCompositionRecord {
    /// Reads every layout field the frame fully contains.
    pub fn from_frame(frame: &Frame) -> Self {
        let mut values = [None; METRIC_COUNT];
        for field in LAYOUT.iter() {
            values[field.metric as usize] = field.read(frame);
        }
        BodyCompositionRecord {
            packet: frame.u8_at(BIA_ALGORITHM_OFFSET_PACKET).unwrap_or_default(),
            values,
        }
    }

    /// Packet byte of the response; carried but not interpreted.
    pub fn packet(&self) -> u8 {
        self.packet
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values[metric as usize]
    }

    pub fn body_type(&self) -> Option<BodyType> {
        self.get(Metric::BodyType)
            .map(|raw| BodyType::from_code(raw as u8))
    }

    /// Present metrics in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        LAYOUT
            .iter()
            .filter_map(|field| self.get(field.metric).map(|value| (field.metric, value)))
    }

    /// Number of metrics present.
    pub fn populated(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == METRIC_COUNT
    }
}

impl Serialize for BodyCompositionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.populated()))?;
        for (metric, value) in self.iter() {
            map.serialize_entry(metric.name(), &value)?;
        }
        map.end()
    }
}

/// Rejection codes reported by the device in place of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum AlgorithmError {
    #[error("age out of range")]
    WrongAge,
    #[error("height out of range")]
    WrongHeight,
    #[error("weight out of range")]
    WrongWeight,
    #[error("invalid gender")]
    WrongGender,
    #[error("invalid user type")]
    WrongUserType,
    #[error("hand impedance out of range")]
    WrongHandImpedance,
    #[error("body impedance out of range")]
    WrongBodyImpedance,
    #[error("unknown algorithm error code {0}")]
    Unknown(u8),
}

impl AlgorithmError {
    /// `None` for code 0, which means success.
    pub fn from_code(code: u8) -> Option<Self> {
        let error = match code {
            0 => return None,
            1 => AlgorithmError::WrongAge,
            2 => AlgorithmError::WrongHeight,
            3 => AlgorithmError::WrongWeight,
            4 => AlgorithmError::WrongGender,
            5 => AlgorithmError::WrongUserType,
            6 => AlgorithmError::WrongHandImpedance,
            7 => AlgorithmError::WrongBodyImpedance,
            other => AlgorithmError::Unknown(other),
        };
        Some(error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AlgorithmResult {
    Record(BodyCompositionRecord),
    Rejected(AlgorithmError),
}

/// Decodes a run-algorithm response.
///
/// Frames shorter than 6 bytes are an error; anything longer yields either a
/// rejection or a (possibly partial) record.
pub fn decode_algorithm(frame: &Frame) -> Result<AlgorithmResult, BiaError> {
    if frame.len() < BIA_ALGORITHM_FRAME_MIN {
        return Err(BiaError::PrematureEnd {
            needed: BIA_ALGORITHM_FRAME_MIN,
            available: frame.len(),
        });
    }

    let code = frame.u8_at(BIA_ALGORITHM_OFFSET_ERROR).unwrap_or_default();
    if let Some(error) = AlgorithmError::from_code(code) {
        return Ok(AlgorithmResult::Rejected(error));
    }

    let record = BodyCompositionRecord::from_frame(frame);
    if !record.is_complete() {
        debug!(
            "algorithm frame of {} bytes carries {}/{} metrics",
            frame.len(),
            record.populated(),
            METRIC_COUNT
        );
    }
    Ok(AlgorithmResult::Record(record))
}
