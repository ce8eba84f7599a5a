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

//! The highest-severity events of a batch, with the context analysts ask for first.

use crate::anomaly::{RiskTier, Scoring};
use crate::cluster::ClusterLabel;
use crate::parser::event::{Dimension, Event, EventKind};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entries kept in the listing
pub const TOP_ANOMALY_LIMIT: usize = 10;

/// One assessed event as seen by the listing
#[derive(Debug, Clone, Copy)]
pub struct AnomalyCandidate<'a> {
    pub event: &'a Event,
    pub scoring: Option<&'a Scoring>,
    pub risk_tier: RiskTier,
    pub cluster: Option<ClusterLabel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopAnomaly {
    pub timestamp: DateTime<Utc>,
    pub subject_id: String,
    pub host_id: String,
    pub event_kind: EventKind,
    pub source_address: Option<String>,
    pub severity_score: f64,
    pub dominant_dimension: Dimension,
    pub risk_tier: RiskTier,
    pub cluster: Option<ClusterLabel>,
}

/// Scored events with severity at or above `critical`, most severe first.
/// Ties go to the earlier event, then to the subject name.
pub fn top_anomalies(candidates: &[AnomalyCandidate<'_>], critical: f64) -> Vec<TopAnomaly> {
    profiling::scope!("top_anomalies");
    let mut ranked: Vec<(&AnomalyCandidate<'_>, &Scoring)> = candidates
        .iter()
        .filter_map(|c| c.scoring.map(|s| (c, s)))
        .filter(|(_, s)| s.severity_score >= critical)
        .collect();
    ranked.sort_by(|(a, sa), (b, sb)| {
        sb.severity_score
            .total_cmp(&sa.severity_score)
            .then_with(|| a.event.timestamp.cmp(&b.event.timestamp))
            .then_with(|| a.event.subject_id.cmp(&b.event.subject_id))
    });
    ranked.truncate(TOP_ANOMALY_LIMIT);

    ranked
        .into_iter()
        .map(|(candidate, scoring)| TopAnomaly {
            timestamp: candidate.event.timestamp,
            subject_id: candidate.event.subject_id.clone(),
            host_id: candidate.event.host_id.clone(),
            event_kind: candidate.event.event_kind.clone(),
            source_address: candidate.event.source_address.clone(),
            severity_score: scoring.severity_score,
            dominant_dimension: scoring.dominant_dimension(),
            risk_tier: candidate.risk_tier,
            cluster: candidate.cluster,
        })
        .collect()
}
