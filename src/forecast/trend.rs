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

//! Least-squares trend lines and forward projection.

use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};

/// Confidence never drops below this floor
pub const MIN_CONFIDENCE: f64 = 0.5;
/// Confidence lost per projected day
pub const CONFIDENCE_DECAY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Mean of the fitted values
    pub mean: f64,
    pub samples: usize,
}

impl LinearFit {
    /// Closed-form OLS over `(index, value)` pairs
    pub fn fit(subject: &'static str, values: &[f64]) -> AnalysisResult<Self> {
        let n = values.len();
        if n < 2 {
            return Err(AnalysisError::InsufficientHistory {
                subject,
                required: 2,
                available: n,
            });
        }
        let count = n as f64;
        let mean_x = (count - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / count;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, &y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }
        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            mean: mean_y,
            samples: n,
        })
    }

    pub fn at(&self, index: f64) -> f64 {
        self.slope.mul_add(index, self.intercept)
    }

    /// Non-negative whole-count predictions for the `horizon` days after the history
    pub fn project(&self, horizon: u32) -> Vec<f64> {
        let last = (self.samples - 1) as f64;
        (1..=horizon)
            .map(|step| {
                let predicted = self.at(last + f64::from(step)).round();
                // Also normalizes -0.0
                if predicted > 0.0 {
                    predicted
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    /// Sign of the slope, with slopes within `dead_zone × max(mean, 1)` counted as flat
    pub fn classify(fit: &LinearFit, dead_zone: f64) -> Self {
        let tolerance = dead_zone * fit.mean.max(1.0);
        if fit.slope.abs() <= tolerance {
            Self::Stable
        } else if fit.slope > 0.0 {
            Self::Increasing
        } else {
            Self::Decreasing
        }
    }
}

/// `max(0.5, 1 − 0.05·step)` for the 1-based forecast distance
pub fn confidence(step: u32) -> f64 {
    CONFIDENCE_DECAY
        .mul_add(-f64::from(step), 1.0)
        .max(MIN_CONFIDENCE)
}

/// `(lower, upper)` band around a prediction
pub fn bounds(predicted: f64, confidence: f64) -> (f64, f64) {
    (predicted * confidence, predicted * (2.0 - confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_perfect_line() {
        let fit = LinearFit::fit("test", &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert_eq!(fit.project(2), vec![9.0, 11.0]);
        assert_eq!(Trend::classify(&fit, 0.05), Trend::Increasing);
    }

    #[test]
    fn test_rise_then_collapse_is_not_increasing() {
        let fit = LinearFit::fit("critical", &[2.0, 3.0, 5.0, 8.0, 13.0, 0.0, 0.0]).unwrap();
        // slope = -4/28
        assert!((fit.slope + 1.0 / 7.0).abs() < 1e-12);
        let trend = Trend::classify(&fit, 0.05);
        assert_ne!(trend, Trend::Increasing);
        assert_eq!(trend, Trend::Stable);
    }

    #[test]
    fn test_projection_clamps_at_zero() {
        let fit = LinearFit::fit("total", &[10.0, 6.0, 2.0]).unwrap();
        assert_eq!(fit.project(3), vec![0.0, 0.0, 0.0]);
        assert_eq!(Trend::classify(&fit, 0.05), Trend::Decreasing);
    }

    #[test]
    fn test_single_day_is_insufficient() {
        assert_eq!(
            LinearFit::fit("total", &[4.0]),
            Err(AnalysisError::InsufficientHistory {
                subject: "total",
                required: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_confidence_schedule() {
        assert!((confidence(1) - 0.95).abs() < 1e-12);
        assert!((confidence(7) - 0.65).abs() < 1e-12);
        assert_eq!(confidence(10), 0.5);
        assert_eq!(confidence(30), 0.5);
    }

    proptest! {
        #[test]
        fn confidence_non_increasing(step in 1u32..200) {
            prop_assert!(confidence(step) >= confidence(step + 1));
            prop_assert!(confidence(step) > 0.0 && confidence(step) <= 1.0);
        }

        #[test]
        fn bounds_bracket_prediction(
            values in proptest::collection::vec(0.0f64..500.0, 2..30),
            horizon in 1u32..30,
        ) {
            let fit = LinearFit::fit("total", &values).unwrap();
            for (i, predicted) in fit.project(horizon).into_iter().enumerate() {
                let (lower, upper) = bounds(predicted, confidence(i as u32 + 1));
                prop_assert!(predicted >= 0.0);
                prop_assert!(lower >= 0.0);
                prop_assert!(lower <= predicted && predicted <= upper);
            }
        }
    }
}
