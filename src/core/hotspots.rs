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

//! Rankings of the most threatening accounts and the most exposed hosts.

use crate::anomaly::RiskTier;
use crate::parser::event::AccountClass;
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Entries kept per ranking
pub const HOTSPOT_LIMIT: usize = 10;

/// One assessed event as seen by the rankings
#[derive(Debug, Clone, Copy)]
pub struct HotspotEvent<'a> {
    pub subject_id: &'a str,
    pub host_id: &'a str,
    pub class: AccountClass,
    pub risk_tier: RiskTier,
    /// Absent for unscored events
    pub severity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreatActor {
    pub subject_id: String,
    pub class: AccountClass,
    pub event_count: usize,
    pub critical_events: usize,
    pub max_severity: f64,
    pub unique_hosts: usize,
    pub threat_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostExposure {
    pub host_id: String,
    pub event_count: usize,
    pub critical_events: usize,
    pub max_severity: f64,
    pub unique_subjects: usize,
    pub vulnerability_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Hotspots {
    pub threat_actors: Vec<ThreatActor>,
    pub hosts: Vec<HostExposure>,
}

#[derive(Default)]
struct Tally<'a> {
    class: Option<AccountClass>,
    events: usize,
    critical: usize,
    max_severity: f64,
    peers: BTreeSet<&'a str>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, event: &HotspotEvent<'a>, peer: &'a str) {
        self.class.get_or_insert(event.class);
        self.events += 1;
        if event.risk_tier == RiskTier::Critical {
            self.critical += 1;
        }
        if let Some(severity) = event.severity {
            self.max_severity = self.max_severity.max(severity);
        }
        self.peers.insert(peer);
    }
}

impl Hotspots {
    pub fn rank(events: &[HotspotEvent<'_>]) -> Self {
        profiling::scope!("Hotspots::rank");
        let mut by_subject: IndexMap<&str, Tally<'_>> = IndexMap::new();
        let mut by_host: IndexMap<&str, Tally<'_>> = IndexMap::new();
        for event in events {
            by_subject
                .entry(event.subject_id)
                .or_default()
                .add(event, event.host_id);
            by_host
                .entry(event.host_id)
                .or_default()
                .add(event, event.subject_id);
        }

        let mut threat_actors: Vec<ThreatActor> = by_subject
            .into_iter()
            .map(|(subject, tally)| ThreatActor {
                subject_id: subject.to_string(),
                class: tally.class.unwrap_or(AccountClass::Human),
                event_count: tally.events,
                critical_events: tally.critical,
                max_severity: tally.max_severity,
                unique_hosts: tally.peers.len(),
                threat_score: 0.2f64.mul_add(
                    tally.peers.len() as f64,
                    0.5f64.mul_add(tally.max_severity, 0.3 * tally.events as f64),
                ),
            })
            .collect();
        threat_actors.sort_by(|a, b| {
            descending(a.threat_score, b.threat_score).then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        threat_actors.truncate(HOTSPOT_LIMIT);

        let mut hosts: Vec<HostExposure> = by_host
            .into_iter()
            .map(|(host, tally)| HostExposure {
                host_id: host.to_string(),
                event_count: tally.events,
                critical_events: tally.critical,
                max_severity: tally.max_severity,
                unique_subjects: tally.peers.len(),
                vulnerability_score: 0.1f64.mul_add(
                    tally.events as f64,
                    10.0f64.mul_add(tally.critical as f64, 0.3 * tally.max_severity),
                ),
            })
            .collect();
        hosts.sort_by(|a, b| {
            descending(a.vulnerability_score, b.vulnerability_score)
                .then_with(|| a.host_id.cmp(&b.host_id))
        });
        hosts.truncate(HOTSPOT_LIMIT);

        Self {
            threat_actors,
            hosts,
        }
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event<'a>(subject: &'a str, host: &'a str, tier: RiskTier, severity: f64) -> HotspotEvent<'a> {
        HotspotEvent {
            subject_id: subject,
            host_id: host,
            class: AccountClass::Human,
            risk_tier: tier,
            severity: Some(severity),
        }
    }

    #[test]
    fn test_scores() {
        let events = [
            event("alice", "ws-1", RiskTier::Normal, 1.0),
            event("alice", "ws-2", RiskTier::Critical, 30.0),
            event("bob", "ws-1", RiskTier::Normal, 2.0),
        ];
        let hotspots = Hotspots::rank(&events);

        let alice = &hotspots.threat_actors[0];
        assert_eq!(alice.subject_id, "alice");
        // 0.5*30 + 0.3*2 + 0.2*2
        assert!((alice.threat_score - 16.0).abs() < 1e-9);
        assert_eq!(alice.critical_events, 1);

        let top_host = &hotspots.hosts[0];
        assert_eq!(top_host.host_id, "ws-2");
        // 10*1 + 0.3*30 + 0.1*1
        assert!((top_host.vulnerability_score - 19.1).abs() < 1e-9);
        assert_eq!(hotspots.hosts[1].unique_subjects, 2);
    }

    #[test]
    fn test_ties_break_by_name() {
        let events = [
            event("zed", "h", RiskTier::Normal, 1.0),
            event("amy", "h", RiskTier::Normal, 1.0),
        ];
        let hotspots = Hotspots::rank(&events);
        assert_eq!(hotspots.threat_actors[0].subject_id, "amy");
    }

    #[test]
    fn test_unscored_events_count_without_severity() {
        let mut unscored = event("ANONYMOUS LOGON", "dc", RiskTier::Critical, 0.0);
        unscored.severity = None;
        let hotspots = Hotspots::rank(&[unscored]);
        assert_eq!(hotspots.threat_actors[0].max_severity, 0.0);
        assert_eq!(hotspots.hosts[0].critical_events, 1);
    }
}
