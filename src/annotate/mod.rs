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

//! Threat Annotator: attack stage, investigation priority and response
//! guidance for each scored and clustered event.

pub mod playbook;
pub mod rules;

pub use rules::{AttackStage, Rule, RULES};

use crate::anomaly::{EventScore, RiskTier, Scoring};
use crate::cluster::ClusterAssignment;
use crate::config::OffHoursWindow;
use crate::parser::event::Event;
use crate::parser::subject::SubjectKind;
use chrono::{NaiveTime, Offset, Utc};
use serde::Serialize;
use std::net::IpAddr;

/// Highest investigation priority
pub const MAX_PRIORITY: u8 = 5;

/// Per-dimension deviation reported as an indicator
pub const INDICATOR_Z: f64 = 5.0;

/// Severity above which the overall deviation is reported
pub const INDICATOR_SEVERITY: f64 = 10.0;

/// Everything the rules look at for one event
#[derive(Debug, Clone, Copy)]
pub struct AnnotationContext<'a> {
    pub event: &'a Event,
    pub subject: SubjectKind,
    pub risk_tier: RiskTier,
    pub scoring: Option<&'a Scoring>,
    pub cluster: Option<ClusterAssignment>,
    pub local_time: NaiveTime,
    pub off_hours: bool,
    pub external_source: Option<IpAddr>,
}

impl<'a> AnnotationContext<'a> {
    pub fn new(
        event: &'a Event,
        subject: SubjectKind,
        score: &'a EventScore,
        cluster: Option<ClusterAssignment>,
        window: &OffHoursWindow,
    ) -> Self {
        let offset = window.offset().unwrap_or_else(|| Utc.fix());
        let local_time = event.timestamp.with_timezone(&offset).time();
        Self {
            event,
            subject,
            risk_tier: score.risk_tier,
            scoring: score.scoring.as_ref(),
            cluster,
            local_time,
            off_hours: window.contains(local_time),
            external_source: event
                .source_address
                .as_deref()
                .and_then(|address| address.trim().parse().ok())
                .filter(is_external),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Analyst-facing name of the event kind
    pub event_description: &'static str,
    pub attack_stage: AttackStage,
    pub investigation_priority: u8,
    pub recommended_action: String,
    pub matched_rules: Vec<&'static str>,
    pub indicators: Vec<String>,
    pub techniques: &'static [&'static str],
}

/// Apply the rule table to one event.
///
/// Priority starts from the risk tier and is only ever raised by matching
/// rules. The stage comes from the first matching rule, then the cluster
/// label, then the event kind.
pub fn annotate(ctx: &AnnotationContext<'_>) -> Annotation {
    let mut priority = ctx.risk_tier.base_priority();
    let mut stage = None;
    let mut matched_rules = Vec::new();

    for rule in &RULES {
        if let Some(rule_stage) = (rule.matches)(ctx) {
            stage.get_or_insert(rule_stage);
            priority = priority.max(rule.priority_floor);
            matched_rules.push(rule.name);
        }
    }
    let priority = priority.min(MAX_PRIORITY);

    let attack_stage = stage
        .or_else(|| ctx.cluster.and_then(|c| AttackStage::from_cluster(c.label)))
        .or_else(|| AttackStage::from_event_kind(&ctx.event.event_kind))
        .unwrap_or(AttackStage::Detection);

    let playbook = playbook::for_kind(&ctx.event.event_kind);
    Annotation {
        event_description: playbook.name,
        attack_stage,
        investigation_priority: priority,
        recommended_action: recommended_action(ctx, priority, playbook),
        matched_rules,
        indicators: indicators(ctx),
        techniques: playbook.techniques,
    }
}

fn recommended_action(
    ctx: &AnnotationContext<'_>,
    priority: u8,
    playbook: &playbook::Playbook,
) -> String {
    let urgency = playbook::urgency(priority);
    if priority >= MAX_PRIORITY {
        return format!(
            "{urgency}: isolate host {} and disable account {} pending incident response",
            ctx.event.host_id, ctx.event.subject_id
        );
    }
    let guidance = ctx.cluster.map_or_else(
        || playbook.investigation_steps.first().copied().unwrap_or("Review the event"),
        |c| c.label.recommended_action(),
    );
    format!("{urgency}: {guidance}")
}

fn indicators(ctx: &AnnotationContext<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if ctx.subject.is_anonymous() {
        out.push("Anonymous access".to_string());
    }
    if ctx.subject == SubjectKind::Machine && ctx.event.event_kind.is_interactive_logon() {
        out.push("Service account performing interactive logon".to_string());
    }
    if ctx.off_hours {
        out.push(format!(
            "Activity during off-hours ({} local)",
            ctx.local_time.format("%H:%M")
        ));
    }
    if let Some(address) = ctx.external_source {
        out.push(format!("External source address {address}"));
    }
    if let Some(scoring) = ctx.scoring {
        for (dimension, z) in scoring.dimension_z.iter() {
            if z.abs() >= INDICATOR_Z {
                out.push(format!("{} deviation {z:.2}σ", dimension.label()));
            }
        }
        if scoring.severity_score > INDICATOR_SEVERITY {
            out.push(format!(
                "Maximum deviation {:.2}σ from baseline",
                scoring.severity_score
            ));
        }
    }
    out
}

/// Routable public address, outside private, loopback and link-local ranges
fn is_external(address: &IpAddr) -> bool {
    match address {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            let unique_local = (first & 0xfe00) == 0xfc00;
            let link_local = (first & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
