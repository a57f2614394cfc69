use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::constants::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub max_horizontal_accuracy_m: f64,  // Fixes reporting worse accuracy are dropped
    pub min_sample_interval_secs: f64,   // Debounce: time since the last accepted sample
    pub min_sample_distance_m: f64,      // Debounce: movement since the last accepted sample
    pub max_path_points: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            max_horizontal_accuracy_m: MAX_HORIZONTAL_ACCURACY_M,
            min_sample_interval_secs: MIN_SAMPLE_INTERVAL_SECS,
            min_sample_distance_m: MIN_SAMPLE_DISTANCE_M,
            max_path_points: MAX_PATH_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub closure_tolerance_m: f64,
    pub min_points: usize,
    pub min_area_m2: f64,
    pub overlap_tolerance: f64,          // Allowed shared area as a share of the new claim (0.0-1.0)
    pub overlap_query_margin_m: f64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            closure_tolerance_m: CLOSURE_TOLERANCE_M,
            min_points: MIN_TERRITORY_POINTS,
            min_area_m2: MIN_TERRITORY_AREA_M2,
            overlap_tolerance: OVERLAP_TOLERANCE_RATIO,
            overlap_query_margin_m: OVERLAP_QUERY_MARGIN_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    pub threshold_m: f64,
    pub prompt_cooldown_secs: i64,
    pub catalog_query_radius_m: f64,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            threshold_m: POI_PROXIMITY_THRESHOLD_M,
            prompt_cooldown_secs: POI_PROMPT_COOLDOWN_SECS,
            catalog_query_radius_m: POI_CATALOG_QUERY_RADIUS_M,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimConfig {
    pub recorder: RecorderSettings,
    pub validation: ValidationSettings,
    pub proximity: ProximitySettings,
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(serde_json::Error),
    InvalidValue(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ClaimConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ClaimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.recorder;
        let v = &self.validation;
        let p = &self.proximity;

        let positive = [
            ("recorder.max_horizontal_accuracy_m", r.max_horizontal_accuracy_m),
            ("validation.closure_tolerance_m", v.closure_tolerance_m),
            ("proximity.threshold_m", p.threshold_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue(format!("{} must be positive, got {}", name, value)));
            }
        }

        let non_negative = [
            ("recorder.min_sample_interval_secs", r.min_sample_interval_secs),
            ("recorder.min_sample_distance_m", r.min_sample_distance_m),
            ("validation.min_area_m2", v.min_area_m2),
            ("validation.overlap_query_margin_m", v.overlap_query_margin_m),
            ("proximity.catalog_query_radius_m", p.catalog_query_radius_m),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue(format!("{} must not be negative, got {}", name, value)));
            }
        }

        if !(0.0..=1.0).contains(&v.overlap_tolerance) {
            return Err(ConfigError::InvalidValue(format!(
                "validation.overlap_tolerance must be within 0.0-1.0, got {}",
                v.overlap_tolerance
            )));
        }
        if v.min_points < 3 {
            return Err(ConfigError::InvalidValue(format!(
                "validation.min_points must be at least 3, got {}",
                v.min_points
            )));
        }
        if r.max_path_points < v.min_points {
            return Err(ConfigError::InvalidValue(format!(
                "recorder.max_path_points ({}) is below validation.min_points ({})",
                r.max_path_points, v.min_points
            )));
        }
        if p.prompt_cooldown_secs < 0 {
            return Err(ConfigError::InvalidValue(format!(
                "proximity.prompt_cooldown_secs must not be negative, got {}",
                p.prompt_cooldown_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClaimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.validation.min_points, 4);
        assert_eq!(config.recorder.max_path_points, 5_000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ClaimConfig::from_json(r#"{ "validation": { "min_area_m2": 100.0 } }"#).unwrap();
        assert_eq!(config.validation.min_area_m2, 100.0);
        assert_eq!(config.validation.closure_tolerance_m, CLOSURE_TOLERANCE_M);
        assert_eq!(config.recorder, RecorderSettings::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let result = ClaimConfig::from_json(r#"{ "validation": { "overlap_tolerance": 1.5 } }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = ClaimConfig::from_json(r#"{ "validation": { "min_points": 2 } }"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));

        let result = ClaimConfig::from_json("not json");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
