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

//! Ordered contextual rules of the annotator.
//!
//! Every rule is a predicate that may name an attack stage, plus the
//! priority floor it imposes when it matches. The first matching rule sets
//! the stage; all matching rules contribute their floor.

use super::AnnotationContext;
use crate::cluster::ClusterLabel;
use crate::parser::event::{Dimension, EventKind};
use crate::parser::subject::SubjectKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network deviation above which an external source address is suspicious
pub const EXTERNAL_NETWORK_Z: f64 = 5.0;

/// Coarse intrusion lifecycle stage, MITRE ATT&CK tactic names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttackStage {
    #[serde(rename = "Initial Access")]
    InitialAccess,
    Execution,
    Persistence,
    #[serde(rename = "Privilege Escalation")]
    PrivilegeEscalation,
    #[serde(rename = "Credential Access")]
    CredentialAccess,
    Discovery,
    #[serde(rename = "Lateral Movement")]
    LateralMovement,
    /// Anomalous but not attributable to a tactic
    Detection,
}

impl AttackStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialAccess => "Initial Access",
            Self::Execution => "Execution",
            Self::Persistence => "Persistence",
            Self::PrivilegeEscalation => "Privilege Escalation",
            Self::CredentialAccess => "Credential Access",
            Self::Discovery => "Discovery",
            Self::LateralMovement => "Lateral Movement",
            Self::Detection => "Detection",
        }
    }

    pub const fn from_cluster(label: ClusterLabel) -> Option<Self> {
        match label {
            ClusterLabel::LateralMovementIndicators => Some(Self::LateralMovement),
            ClusterLabel::NetworkReconnaissance => Some(Self::Discovery),
            ClusterLabel::CriticalPersistentThreats => Some(Self::Persistence),
            ClusterLabel::PrivilegeEscalationActivity => Some(Self::PrivilegeEscalation),
            ClusterLabel::SystemProcessAnomalies => Some(Self::Execution),
            ClusterLabel::HighRiskAuthentication | ClusterLabel::AuthenticationAnomalies => {
                Some(Self::CredentialAccess)
            }
            ClusterLabel::ModerateRiskEvents
            | ClusterLabel::BaselineActivity
            | ClusterLabel::OutlierExtremeRisk
            | ClusterLabel::CriticalUserBreach
            | ClusterLabel::HighRiskUserActivity
            | ClusterLabel::SuspiciousUserBehavior
            | ClusterLabel::SessionManagementIssues
            | ClusterLabel::BaselineUserBehavior
            | ClusterLabel::InsufficientData => None,
        }
    }

    pub const fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::ProcessStart | EventKind::ProcessStop => Some(Self::Execution),
            EventKind::PrivilegeAssigned => Some(Self::PrivilegeEscalation),
            EventKind::LogonSuccess | EventKind::LogonFailure => Some(Self::CredentialAccess),
            EventKind::Logoff | EventKind::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for AttackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Rule {
    pub name: &'static str,
    pub priority_floor: u8,
    pub matches: fn(&AnnotationContext<'_>) -> Option<AttackStage>,
}

pub const RULES: [Rule; 4] = [
    Rule {
        name: "anonymous-access",
        priority_floor: 5,
        matches: anonymous_access,
    },
    Rule {
        name: "service-account-interactive-logon",
        priority_floor: 4,
        matches: service_account_logon,
    },
    Rule {
        name: "off-hours-activity",
        priority_floor: 3,
        matches: off_hours,
    },
    Rule {
        name: "external-network-origin",
        priority_floor: 4,
        matches: external_origin,
    },
];

fn anonymous_access(ctx: &AnnotationContext<'_>) -> Option<AttackStage> {
    ctx.subject
        .is_anonymous()
        .then_some(AttackStage::InitialAccess)
}

fn service_account_logon(ctx: &AnnotationContext<'_>) -> Option<AttackStage> {
    if ctx.subject != SubjectKind::Machine {
        return None;
    }
    match ctx.event.event_kind {
        EventKind::LogonSuccess => Some(AttackStage::PrivilegeEscalation),
        EventKind::LogonFailure => Some(AttackStage::CredentialAccess),
        EventKind::Logoff
        | EventKind::PrivilegeAssigned
        | EventKind::ProcessStart
        | EventKind::ProcessStop
        | EventKind::Unrecognized(_) => None,
    }
}

fn off_hours(ctx: &AnnotationContext<'_>) -> Option<AttackStage> {
    ctx.off_hours.then_some(AttackStage::Persistence)
}

fn external_origin(ctx: &AnnotationContext<'_>) -> Option<AttackStage> {
    let network_z = ctx.scoring?.dimension_z.get(Dimension::NetworkNovelty);
    (ctx.external_source.is_some() && network_z >= EXTERNAL_NETWORK_Z)
        .then_some(AttackStage::InitialAccess)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "anonymous-access",
                "service-account-interactive-logon",
                "off-hours-activity",
                "external-network-origin"
            ]
        );
        assert!(RULES.iter().all(|r| (1..=5).contains(&r.priority_floor)));
    }

    #[test]
    fn test_stage_serializes_as_tactic_name() {
        assert_eq!(
            serde_json::to_string(&AttackStage::CredentialAccess).unwrap(),
            "\"Credential Access\""
        );
        assert_eq!(AttackStage::Execution.to_string(), "Execution");
    }

    #[test]
    fn test_fallback_stages() {
        assert_eq!(
            AttackStage::from_cluster(ClusterLabel::LateralMovementIndicators),
            Some(AttackStage::LateralMovement)
        );
        assert_eq!(AttackStage::from_cluster(ClusterLabel::BaselineActivity), None);
        assert_eq!(
            AttackStage::from_event_kind(&EventKind::PrivilegeAssigned),
            Some(AttackStage::PrivilegeEscalation)
        );
        assert_eq!(AttackStage::from_event_kind(&EventKind::Logoff), None);
    }
}
