// TriageCrab - GPL-3.0-or-later
// This file is part of TriageCrab.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// TriageCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// TriageCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with TriageCrab.  If not, see <https://www.gnu.org/licenses/>.

use crate::parser::event::DimensionVector;
use crate::parser::subject::{SubjectClassifier, DEFAULT_ANONYMOUS_PATTERN, DEFAULT_MACHINE_SUFFIX};
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Severity score thresholds for the risk tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 3.0,
            high: 10.0,
            critical: 20.0,
        }
    }
}

/// Off-hours band in local time, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffHoursWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Offset of local time from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl OffHoursWindow {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
    }

    /// Whether a local wall-clock time falls in the band.
    /// A band with `start > end` wraps around midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

impl Default for OffHoursWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or(NaiveTime::MIN),
            utc_offset_minutes: 0,
        }
    }
}

/// All tunables of the analytical pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of oldest events per class forming the baseline; `None` uses the whole class
    pub baseline_window: Option<usize>,
    pub risk_thresholds: RiskThresholds,
    pub sigma_floor: f64,
    pub machine_clusters: usize,
    pub human_clusters: usize,
    /// Populations at least this large use the density strategy
    pub large_population_threshold: usize,
    pub density_eps: f64,
    pub density_min_samples: usize,
    pub dimension_weights: DimensionVector,
    pub forecast_horizon_days: u32,
    pub trend_dead_zone: f64,
    pub off_hours: OffHoursWindow,
    pub recent_window: usize,
    pub top_vectors: usize,
    pub anonymous_pattern: String,
    pub machine_suffix: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline_window: None,
            risk_thresholds: RiskThresholds::default(),
            sigma_floor: 1e-6,
            machine_clusters: 5,
            human_clusters: 4,
            large_population_threshold: 200,
            density_eps: 0.3,
            density_min_samples: 10,
            dimension_weights: DimensionVector::new(1.0, 1.5, 1.5, 1.5),
            forecast_horizon_days: 7,
            trend_dead_zone: 0.05,
            off_hours: OffHoursWindow::default(),
            recent_window: 100,
            top_vectors: 5,
            anonymous_pattern: DEFAULT_ANONYMOUS_PATTERN.to_string(),
            machine_suffix: DEFAULT_MACHINE_SUFFIX.to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Get the path to the user config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("triagecrab").join("config.json"))
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        tracing::info!("Loading analysis config from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user config, returning defaults if none exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::info!("No analysis config found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!("Saved analysis config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.risk_thresholds;
        if !(t.medium > 0.0 && t.medium < t.high && t.high < t.critical) {
            return Err(ConfigError::Invalid(format!(
                "risk thresholds must satisfy 0 < medium < high < critical, got {}/{}/{}",
                t.medium, t.high, t.critical
            )));
        }
        if !(self.sigma_floor > 0.0 && self.sigma_floor.is_finite()) {
            return Err(ConfigError::Invalid("sigma_floor must be positive".to_string()));
        }
        if self.machine_clusters == 0 || self.human_clusters == 0 {
            return Err(ConfigError::Invalid(
                "cluster counts must be at least 1".to_string(),
            ));
        }
        if self.baseline_window.is_some_and(|w| w < 2) {
            return Err(ConfigError::Invalid(
                "baseline_window must cover at least 2 events".to_string(),
            ));
        }
        if !(self.density_eps > 0.0) || self.density_min_samples == 0 {
            return Err(ConfigError::Invalid(
                "density_eps and density_min_samples must be positive".to_string(),
            ));
        }
        if self.dimension_weights.iter().any(|(_, w)| !(w > 0.0) || !w.is_finite()) {
            return Err(ConfigError::Invalid(
                "dimension weights must be positive".to_string(),
            ));
        }
        if self.forecast_horizon_days == 0 {
            return Err(ConfigError::Invalid(
                "forecast_horizon_days must be at least 1".to_string(),
            ));
        }
        if self.trend_dead_zone < 0.0 {
            return Err(ConfigError::Invalid(
                "trend_dead_zone must not be negative".to_string(),
            ));
        }
        if self.recent_window == 0 {
            return Err(ConfigError::Invalid(
                "recent_window must be at least 1".to_string(),
            ));
        }
        if self.off_hours.offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes out of range: {}",
                self.off_hours.utc_offset_minutes
            )));
        }
        self.subject_classifier()?;
        Ok(())
    }

    pub fn subject_classifier(&self) -> Result<SubjectClassifier, ConfigError> {
        SubjectClassifier::new(&self.anonymous_pattern, &self.machine_suffix)
            .map_err(|e| ConfigError::Invalid(format!("anonymous_pattern: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"forecast_horizon_days": 14, "recent_window": 50}"#).unwrap();
        assert_eq!(config.forecast_horizon_days, 14);
        assert_eq!(config.recent_window, 50);
        assert_eq!(config.machine_clusters, 5);
        assert_eq!(config.risk_thresholds, RiskThresholds::default());
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let config = AnalysisConfig {
            risk_thresholds: RiskThresholds {
                medium: 10.0,
                high: 3.0,
                critical: 20.0,
            },
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let config = AnalysisConfig {
            anonymous_pattern: "(unclosed".to_string(),
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_off_hours_band() {
        let band = OffHoursWindow::default();
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(band.contains(at(2, 0)));
        assert!(band.contains(at(3, 59)));
        assert!(band.contains(at(4, 0)));
        assert!(!band.contains(at(4, 1)));
        assert!(!band.contains(at(1, 59)));

        let wrapping = OffHoursWindow {
            start: at(23, 0),
            end: at(1, 0),
            utc_offset_minutes: 0,
        };
        assert!(wrapping.contains(at(23, 30)));
        assert!(wrapping.contains(at(0, 30)));
        assert!(!wrapping.contains(at(12, 0)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AnalysisConfig {
            baseline_window: Some(50),
            top_vectors: 3,
            ..AnalysisConfig::default()
        };
        config.save_to(&path).unwrap();
        let loaded = AnalysisConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
