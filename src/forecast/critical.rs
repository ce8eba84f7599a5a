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

//! Time-to-next-critical estimate from historical inter-arrival times.

use crate::error::{AnalysisError, AnalysisResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateConfidence {
    High,
    Medium,
    Low,
}

impl EstimateConfidence {
    /// Low dispersion of inter-arrivals means a regular, predictable cadence
    pub fn from_variation(coefficient: Option<f64>) -> Self {
        match coefficient {
            Some(cov) if cov < 0.5 => Self::High,
            Some(cov) if cov < 1.0 => Self::Medium,
            _ => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NextCritical {
    pub mean_interval_hours: f64,
    pub std_dev_hours: f64,
    /// σ/μ of the intervals; absent when the mean interval is zero
    pub coefficient_of_variation: Option<f64>,
    pub last_critical: DateTime<Utc>,
    pub expected_at: DateTime<Utc>,
    pub confidence: EstimateConfidence,
}

pub fn next_critical(timestamps: &[DateTime<Utc>]) -> AnalysisResult<NextCritical> {
    if timestamps.len() < 2 {
        return Err(AnalysisError::InsufficientHistory {
            subject: "critical inter-arrival",
            required: 2,
            available: timestamps.len(),
        });
    }
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let intervals: Vec<f64> = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / SECONDS_PER_HOUR)
        .collect();
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let std_dev = (intervals.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n).sqrt();
    let coefficient_of_variation = (mean > 0.0).then(|| std_dev / mean);

    let last_critical = sorted[sorted.len() - 1];
    let expected_at = last_critical
        + Duration::try_seconds((mean * SECONDS_PER_HOUR).round() as i64).unwrap_or_default();

    Ok(NextCritical {
        mean_interval_hours: mean,
        std_dev_hours: std_dev,
        coefficient_of_variation,
        last_critical,
        expected_at,
        confidence: EstimateConfidence::from_variation(coefficient_of_variation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hour(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap() + Duration::hours(i64::from(h))
    }

    #[test]
    fn test_regular_cadence_is_high_confidence() {
        let estimate = next_critical(&[hour(12), hour(0), hour(6), hour(18)]).unwrap();
        assert_eq!(estimate.mean_interval_hours, 6.0);
        assert_eq!(estimate.std_dev_hours, 0.0);
        assert_eq!(estimate.confidence, EstimateConfidence::High);
        assert_eq!(estimate.expected_at, hour(24));
    }

    #[test]
    fn test_irregular_cadence() {
        // Intervals 1h and 9h: mean 5, sigma 4, CoV 0.8
        let estimate = next_critical(&[hour(0), hour(1), hour(10)]).unwrap();
        assert_eq!(estimate.confidence, EstimateConfidence::Medium);
        let estimate = next_critical(&[hour(0), hour(0), hour(0), hour(30)]).unwrap();
        assert_eq!(estimate.confidence, EstimateConfidence::Low);
    }

    #[test]
    fn test_simultaneous_criticals_are_low_confidence() {
        let estimate = next_critical(&[hour(3), hour(3)]).unwrap();
        assert_eq!(estimate.coefficient_of_variation, None);
        assert_eq!(estimate.confidence, EstimateConfidence::Low);
    }

    #[test]
    fn test_needs_two_events() {
        assert!(matches!(
            next_critical(&[hour(1)]),
            Err(AnalysisError::InsufficientHistory { available: 1, .. })
        ));
    }
}
