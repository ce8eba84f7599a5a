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

//! Likely next attack vectors from recent cluster frequency.

use crate::cluster::ClusterLabel;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackVector {
    pub label: ClusterLabel,
    pub count: usize,
    /// Share of the recent window
    pub probability: f64,
    pub recommended_action: &'static str,
}

/// Rank cluster labels over the most recent `window` entries of `labels`.
///
/// `labels` must be in time order. Probability is relative to the number of
/// events actually in the window, which is less than `window` on short
/// histories.
pub fn rank(labels: &[ClusterLabel], window: usize, top: usize) -> Vec<AttackVector> {
    let recent = &labels[labels.len().saturating_sub(window)..];
    let mut counts: BTreeMap<ClusterLabel, usize> = BTreeMap::new();
    for label in recent {
        *counts.entry(*label).or_default() += 1;
    }

    let mut ranked: Vec<(ClusterLabel, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    ranked
        .into_iter()
        .take(top)
        .map(|(label, count)| AttackVector {
            label,
            count,
            probability: count as f64 / recent.len() as f64,
            recommended_action: label.recommended_action(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_recent_window_counts() {
        let mut labels = vec![ClusterLabel::CriticalUserBreach; 50];
        labels.extend(vec![ClusterLabel::BaselineActivity; 6]);
        labels.extend(vec![ClusterLabel::NetworkReconnaissance; 4]);

        let ranked = rank(&labels, 10, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].label, ClusterLabel::BaselineActivity);
        assert!((ranked[0].probability - 0.6).abs() < 1e-12);
        assert!((ranked[1].probability - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ties_ordered_by_name_and_top_applied() {
        let labels = [
            ClusterLabel::ModerateRiskEvents,
            ClusterLabel::BaselineActivity,
            ClusterLabel::LateralMovementIndicators,
        ];
        let ranked = rank(&labels, 100, 2);
        let names: Vec<&str> = ranked.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(names, ["Baseline_Activity", "Lateral_Movement_Indicators"]);
    }

    #[test]
    fn test_empty() {
        assert!(rank(&[], 100, 5).is_empty());
    }
}
