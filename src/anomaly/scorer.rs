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

use crate::anomaly::baseline::BaselineTable;
use crate::config::RiskThresholds;
use crate::parser::event::{Dimension, DimensionVector, Event};
use crate::parser::subject::SubjectKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete severity bucket.
///
/// Variant order is severity order; `Unknown` sorts below everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Unknown,
    Normal,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Step function over the severity score
    pub fn from_score(score: f64, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.critical {
            Self::Critical
        } else if score >= thresholds.high {
            Self::High
        } else if score >= thresholds.medium {
            Self::Medium
        } else {
            Self::Normal
        }
    }

    /// Tier-derived investigation priority (1..=4)
    pub const fn base_priority(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Normal | Self::Unknown => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Normal => "Normal",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived scoring attached to a scored event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    pub dimension_z: DimensionVector,
    pub severity_score: f64,
}

impl Scoring {
    /// Severity is the maximum absolute deviation, so one extreme
    /// dimension dominates however normal the others look.
    pub fn from_z(dimension_z: DimensionVector) -> Self {
        let severity_score = dimension_z
            .iter()
            .map(|(_, z)| z.abs())
            .fold(0.0_f64, f64::max);
        Self {
            dimension_z,
            severity_score,
        }
    }

    /// Dimension with the largest absolute deviation (first on ties)
    pub fn dominant_dimension(&self) -> Dimension {
        let mut best = Dimension::Volume;
        for (dimension, z) in self.dimension_z.iter() {
            if z.abs() > self.dimension_z.get(best).abs() {
                best = dimension;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventScore {
    pub scoring: Option<Scoring>,
    pub risk_tier: RiskTier,
    /// Tier raised by the anonymous-access override
    pub overridden: bool,
}

/// Scores events against a finalized baseline table
pub struct SeverityScorer<'a> {
    baselines: &'a BaselineTable,
    thresholds: RiskThresholds,
}

impl<'a> SeverityScorer<'a> {
    pub const fn new(baselines: &'a BaselineTable, thresholds: RiskThresholds) -> Self {
        Self {
            baselines,
            thresholds,
        }
    }

    pub fn score(&self, event: &Event, subject: SubjectKind) -> EventScore {
        let scoring = if event.event_kind.is_recognized() {
            self.baselines
                .baseline(subject.account_class())
                .map(|baseline| Scoring::from_z(baseline.z_scores(&event.counters)))
        } else {
            None
        };
        let computed = scoring.map_or(RiskTier::Unknown, |s| {
            RiskTier::from_score(s.severity_score, &self.thresholds)
        });
        let (risk_tier, overridden) = apply_overrides(computed, subject);

        EventScore {
            scoring,
            risk_tier,
            overridden,
        }
    }
}

/// Overrides only ever raise the tier
fn apply_overrides(tier: RiskTier, subject: SubjectKind) -> (RiskTier, bool) {
    if subject.is_anonymous() && tier < RiskTier::Critical {
        (RiskTier::Critical, true)
    } else {
        (tier, false)
    }
}
