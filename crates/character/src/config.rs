use serde::{Deserialize, Serialize};
use strider_common::{Capsule, CollisionGroups};

use crate::error::CharacterError;

/// Capsule dimensions as they appear in config files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub radius: f32,
    /// Total height including both caps.
    pub height: f32,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        let capsule = Capsule::default();
        Self {
            radius: capsule.radius(),
            height: capsule.height(),
        }
    }
}

/// Character tuning: shape, mass and step/slope limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    pub shape: ShapeConfig,
    /// Mass used when the character pushes dynamic props.
    pub mass: f32,
    pub max_step_height: f32,
    /// Steepest walkable slope, in degrees.
    pub max_slope_angle: f32,
    pub groups: CollisionGroups,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            shape: ShapeConfig::default(),
            mass: 1.0,
            max_step_height: 0.2,
            max_slope_angle: 45.0,
            groups: CollisionGroups::character(),
        }
    }
}

impl CharacterConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, CharacterError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field and build the capsule.
    pub fn validate(&self) -> Result<Capsule, CharacterError> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(CharacterError::InvalidConfig(format!(
                "mass must be non-negative, got {}",
                self.mass
            )));
        }
        if !self.max_step_height.is_finite() || self.max_step_height < 0.0 {
            return Err(CharacterError::InvalidConfig(format!(
                "max_step_height must be non-negative, got {}",
                self.max_step_height
            )));
        }
        validate_slope(self.max_slope_angle)?;
        Ok(Capsule::new(self.shape.radius, self.shape.height)?)
    }
}

pub(crate) fn validate_slope(degrees: f32) -> Result<(), CharacterError> {
    if !(0.0..=90.0).contains(&degrees) {
        return Err(CharacterError::InvalidConfig(format!(
            "max_slope_angle must be within [0, 90] degrees, got {degrees}"
        )));
    }
    Ok(())
}
