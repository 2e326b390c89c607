//! User anthropometrics fed into the run-algorithm command.

use crate::error::ProfileError;
use serde::Serialize;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Wire code: 1 for male, 0 for female.
    pub fn code(self) -> u8 {
        match self {
            Sex::Male => 0x01,
            Sex::Female => 0x00,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UserType {
    Normal,
    Athlete,
}

impl UserType {
    pub fn code(self) -> u8 {
        match self {
            UserType::Normal => 0x00,
            UserType::Athlete => 0x01,
        }
    }
}

/// Anthropometrics of the person being measured.
///
/// Construct through [`UserProfile::new`] to get range validation up front;
/// the fields stay public so a form can fill them in, and
/// [`validate`](UserProfile::validate) runs again before anything is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UserProfile {
    pub sex: Sex,
    pub user_type: UserType,
    pub height_cm: u8,
    pub age_years: u8,
    /// Body weight in kilograms, 0.1 kg resolution on the wire
    pub weight_kg: f64,
}

impl UserProfile {
    pub const HEIGHT_RANGE: RangeInclusive<u8> = 90..=220;
    pub const AGE_RANGE: RangeInclusive<u8> = 6..=99;
    pub const WEIGHT_RANGE: RangeInclusive<f64> = 10.0..=200.0;

    pub fn new(
        sex: Sex,
        user_type: UserType,
        height_cm: u8,
        age_years: u8,
        weight_kg: f64,
    ) -> Result<Self, ProfileError> {
        let profile = UserProfile {
            sex,
            user_type,
            height_cm,
            age_years,
            weight_kg,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !Self::HEIGHT_RANGE.contains(&self.height_cm) {
            return Err(ProfileError::Height(self.height_cm));
        }
        if !Self::AGE_RANGE.contains(&self.age_years) {
            return Err(ProfileError::Age(self.age_years));
        }
        // NaN fails `contains` as well.
        if !Self::WEIGHT_RANGE.contains(&self.weight_kg) {
            return Err(ProfileError::Weight(self.weight_kg));
        }
        Ok(())
    }

    /// Weight in 0.1 kg units, rounded to the nearest unit.
    pub fn weight_decikg(&self) -> u16 {
        // Validated range keeps this within 100..=2000.
        (self.weight_kg * 10.0).round() as u16
    }
}
