//! Tuning constants for the hourglass.
//!
//! None of these carry meaning beyond visual pacing, so they all live in one
//! struct that can be overridden from a JSON file. Missing keys keep their
//! defaults.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

/// Upper bound on settling passes per tick.
pub const MAX_PHYSICS_SPEED: f32 = 16.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourglassConfig {
    /// Surface pixels per grid cell, on each axis.
    pub pixel_scale: u32,
    /// Mask pixels brighter than this (mean of r, g, b) are inside the glass.
    pub mask_threshold: u8,
    /// Fraction of the grid height where the top chamber ends and the neck row sits.
    pub chamber_split: f32,
    /// Fraction of the grid height that seeding and refilling may fill.
    pub seed_limit: f32,
    pub seed_density_top: f64,
    pub seed_density_neck: f64,
    /// Settling passes per tick; values below 1 slow the flow down.
    pub physics_speed: f32,
    pub refill_batch: usize,
    pub place_retries: usize,
    pub refill_top_floor: usize,
    pub refill_top_fraction: f32,
    pub refill_exit_ratio: f32,
    pub stall_floor: usize,
    pub static_fill_start: f32,
    pub static_fill_density: f64,
    pub overlay_alpha: f32,
    /// Ticks between diagnostic log lines. Zero turns them off.
    pub diagnostics_every: u64,
    pub sand_light: [u8; 3],
    pub sand_shadow: [u8; 3],
}

impl Default for HourglassConfig {
    fn default() -> Self {
        Self {
            pixel_scale: 2,
            mask_threshold: 200,
            chamber_split: 0.5,
            seed_limit: 0.46,
            seed_density_top: 0.68,
            seed_density_neck: 0.08,
            physics_speed: 0.1,
            refill_batch: 26,
            place_retries: 500,
            refill_top_floor: 100,
            refill_top_fraction: 0.25,
            refill_exit_ratio: 0.95,
            stall_floor: 50,
            static_fill_start: 0.55,
            static_fill_density: 0.62,
            overlay_alpha: 0.8,
            diagnostics_every: 60,
            sand_light: [0xe5, 0xd9, 0xc5],
            sand_shadow: [0xcb, 0xbf, 0xae],
        }
    }
}

impl HourglassConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixel_scale == 0 {
            return Err(ConfigError::Invalid("pixel_scale must be at least 1".into()));
        }
        let fractions = [
            ("chamber_split", self.chamber_split),
            ("seed_limit", self.seed_limit),
            ("refill_top_fraction", self.refill_top_fraction),
            ("refill_exit_ratio", self.refill_exit_ratio),
            ("static_fill_start", self.static_fill_start),
            ("overlay_alpha", self.overlay_alpha),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1, got {value}")));
            }
        }
        let densities = [
            ("seed_density_top", self.seed_density_top),
            ("seed_density_neck", self.seed_density_neck),
            ("static_fill_density", self.static_fill_density),
        ];
        for (name, value) in densities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1, got {value}")));
            }
        }
        if !(0.0..=MAX_PHYSICS_SPEED).contains(&self.physics_speed) {
            return Err(ConfigError::Invalid(format!(
                "physics_speed must be within 0..={MAX_PHYSICS_SPEED}, got {}",
                self.physics_speed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HourglassConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: HourglassConfig =
            serde_json::from_str(r#"{ "physics_speed": 0.5, "refill_batch": 10 }"#).unwrap();
        assert_eq!(config.physics_speed, 0.5);
        assert_eq!(config.refill_batch, 10);
        assert_eq!(config.stall_floor, HourglassConfig::default().stall_floor);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let config = HourglassConfig {
            chamber_split: 1.5,
            ..HourglassConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_scale_and_negative_speed() {
        let zero_scale = HourglassConfig {
            pixel_scale: 0,
            ..HourglassConfig::default()
        };
        assert!(zero_scale.validate().is_err());

        let backwards = HourglassConfig {
            physics_speed: -1.0,
            ..HourglassConfig::default()
        };
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn rejects_runaway_physics_speed() {
        let runaway = HourglassConfig {
            physics_speed: 1e9,
            ..HourglassConfig::default()
        };
        assert!(matches!(runaway.validate(), Err(ConfigError::Invalid(_))));

        let nan = HourglassConfig {
            physics_speed: f32::NAN,
            ..HourglassConfig::default()
        };
        assert!(nan.validate().is_err());

        let fastest = HourglassConfig {
            physics_speed: MAX_PHYSICS_SPEED,
            ..HourglassConfig::default()
        };
        assert!(fastest.validate().is_ok());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = HourglassConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
