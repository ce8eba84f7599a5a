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

//! Executive summary and tiered recommendations.

use super::trend::Trend;
use crate::anomaly::RiskTier;
use crate::cluster::{ClusterLabel, ClusterSummary};
use crate::core::hotspots::{HostExposure, ThreatActor};
use crate::parser::event::AccountClass;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Clusters above this size get a short-term review item
pub const LARGE_CLUSTER_EVENTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Moderate,
    Elevated,
    High,
    Critical,
}

impl Posture {
    pub const fn from_counts(critical: usize, high: usize) -> Self {
        if critical > 50 {
            Self::Critical
        } else if critical > 10 {
            Self::High
        } else if high > 100 {
            Self::Elevated
        } else {
            Self::Moderate
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Critical => "Immediate action required",
            Self::High => "Significant threats detected",
            Self::Elevated => "Multiple anomalies detected",
            Self::Moderate => "Standard security posture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    pub posture: Posture,
    pub posture_description: &'static str,
    pub total_events: usize,
    pub critical_events: usize,
    pub high_events: usize,
    /// Sum of predicted critical events over the horizon
    pub projected_critical: Option<f64>,
    pub total_trend: Option<Trend>,
    pub next_critical_expected: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub priority: u8,
    pub action: String,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub immediate: Vec<Recommendation>,
    pub short_term: Vec<Recommendation>,
    pub long_term: Vec<Recommendation>,
}

/// Critical event counts per account class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriticalCounts {
    pub machine: usize,
    pub human: usize,
}

pub fn recommend(
    critical: CriticalCounts,
    clusters: &[ClusterSummary],
    actors: &[ThreatActor],
    hosts: &[HostExposure],
) -> Recommendations {
    let mut out = Recommendations::default();

    if critical.machine > 0 {
        out.immediate.push(Recommendation {
            priority: 1,
            action: format!(
                "Investigate {} critical machine account anomalies",
                critical.machine
            ),
            details: format!(
                "Focus on {} and {} clusters",
                ClusterLabel::OutlierExtremeRisk,
                ClusterLabel::CriticalPersistentThreats
            ),
        });
    }
    if critical.human > 0 {
        let mut top_user: Option<&ThreatActor> = None;
        for actor in actors
            .iter()
            .filter(|a| a.class == AccountClass::Human && a.critical_events > 0)
        {
            if top_user.is_none_or(|best| actor.max_severity > best.max_severity) {
                top_user = Some(actor);
            }
        }
        if let Some(user) = top_user {
            out.immediate.push(Recommendation {
                priority: 1,
                action: format!(
                    "Investigate user '{}' with severity {:.2}",
                    user.subject_id, user.max_severity
                ),
                details: "Potential account compromise or insider threat".to_string(),
            });
        }
    }

    for cluster in clusters {
        if cluster.risk_level >= RiskTier::High && cluster.size > LARGE_CLUSTER_EVENTS {
            out.short_term.push(Recommendation {
                priority: 2,
                action: format!(
                    "Review {} {} cluster with {} events",
                    cluster.class, cluster.label, cluster.size
                ),
                details: format!("Average severity: {:.2}", cluster.mean_severity),
            });
        }
    }

    if let Some(host) = hosts.first() {
        out.long_term.push(Recommendation {
            priority: 3,
            action: format!("Harden host '{}'", host.host_id),
            details: format!(
                "Vulnerability score: {:.2}, critical events: {}",
                host.vulnerability_score, host.critical_events
            ),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::event::Dimension;

    #[test]
    fn test_posture_thresholds() {
        assert_eq!(Posture::from_counts(51, 0), Posture::Critical);
        assert_eq!(Posture::from_counts(50, 0), Posture::High);
        assert_eq!(Posture::from_counts(11, 0), Posture::High);
        assert_eq!(Posture::from_counts(10, 101), Posture::Elevated);
        assert_eq!(Posture::from_counts(10, 100), Posture::Moderate);
    }

    fn actor(subject: &str, class: AccountClass, critical: usize, severity: f64) -> ThreatActor {
        ThreatActor {
            subject_id: subject.to_string(),
            class,
            event_count: 3,
            critical_events: critical,
            max_severity: severity,
            unique_hosts: 1,
            threat_score: 0.0,
        }
    }

    #[test]
    fn test_recommendations() {
        let actors = [
            actor("SVC$", AccountClass::Machine, 2, 90.0),
            actor("alice", AccountClass::Human, 1, 25.0),
            actor("ANONYMOUS LOGON", AccountClass::Human, 1, 76.0),
            actor("bob", AccountClass::Human, 0, 99.0),
        ];
        let clusters = [ClusterSummary {
            class: AccountClass::Machine,
            cluster_id: 1,
            label: ClusterLabel::NetworkReconnaissance,
            size: 64,
            mean_severity: 6.5,
            max_severity: 9.0,
            min_severity: 3.1,
            dominant_dimension: Dimension::NetworkNovelty,
            unique_subjects: 4,
            unique_hosts: 2,
            risk_level: RiskTier::High,
        }];
        let hosts = [HostExposure {
            host_id: "dc-01".to_string(),
            event_count: 10,
            critical_events: 3,
            max_severity: 90.0,
            unique_subjects: 2,
            vulnerability_score: 58.0,
        }];

        let recs = recommend(
            CriticalCounts {
                machine: 2,
                human: 2,
            },
            &clusters,
            &actors,
            &hosts,
        );
        assert_eq!(recs.immediate.len(), 2);
        assert!(recs.immediate[1].action.contains("'ANONYMOUS LOGON'"));
        assert_eq!(recs.short_term.len(), 1);
        assert!(recs.short_term[0].action.contains("Network_Reconnaissance"));
        assert_eq!(recs.long_term[0].action, "Harden host 'dc-01'");
    }

    #[test]
    fn test_quiet_batch_has_no_immediate_actions() {
        let recs = recommend(CriticalCounts::default(), &[], &[], &[]);
        assert!(recs.immediate.is_empty());
        assert!(recs.long_term.is_empty());
    }
}
