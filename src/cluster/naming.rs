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

//! Controlled cluster vocabulary and the deterministic naming rules.

use crate::anomaly::RiskTier;
use crate::config::RiskThresholds;
use crate::parser::event::{AccountClass, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterLabel {
    // Machine accounts
    #[serde(rename = "Critical_Persistent_Threats")]
    CriticalPersistentThreats,
    #[serde(rename = "System_Process_Anomalies")]
    SystemProcessAnomalies,
    #[serde(rename = "Network_Reconnaissance")]
    NetworkReconnaissance,
    #[serde(rename = "Lateral_Movement_Indicators")]
    LateralMovementIndicators,
    #[serde(rename = "High_Risk_Authentication")]
    HighRiskAuthentication,
    #[serde(rename = "Privilege_Escalation_Activity")]
    PrivilegeEscalationActivity,
    #[serde(rename = "Moderate_Risk_Events")]
    ModerateRiskEvents,
    #[serde(rename = "Baseline_Activity")]
    BaselineActivity,
    #[serde(rename = "Outlier_Extreme_Risk")]
    OutlierExtremeRisk,
    // Human accounts
    #[serde(rename = "Critical_User_Breach")]
    CriticalUserBreach,
    #[serde(rename = "High_Risk_User_Activity")]
    HighRiskUserActivity,
    #[serde(rename = "Suspicious_User_Behavior")]
    SuspiciousUserBehavior,
    #[serde(rename = "Authentication_Anomalies")]
    AuthenticationAnomalies,
    #[serde(rename = "Session_Management_Issues")]
    SessionManagementIssues,
    #[serde(rename = "Baseline_User_Behavior")]
    BaselineUserBehavior,
    // Either class
    #[serde(rename = "Insufficient_Data")]
    InsufficientData,
}

impl ClusterLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CriticalPersistentThreats => "Critical_Persistent_Threats",
            Self::SystemProcessAnomalies => "System_Process_Anomalies",
            Self::NetworkReconnaissance => "Network_Reconnaissance",
            Self::LateralMovementIndicators => "Lateral_Movement_Indicators",
            Self::HighRiskAuthentication => "High_Risk_Authentication",
            Self::PrivilegeEscalationActivity => "Privilege_Escalation_Activity",
            Self::ModerateRiskEvents => "Moderate_Risk_Events",
            Self::BaselineActivity => "Baseline_Activity",
            Self::OutlierExtremeRisk => "Outlier_Extreme_Risk",
            Self::CriticalUserBreach => "Critical_User_Breach",
            Self::HighRiskUserActivity => "High_Risk_User_Activity",
            Self::SuspiciousUserBehavior => "Suspicious_User_Behavior",
            Self::AuthenticationAnomalies => "Authentication_Anomalies",
            Self::SessionManagementIssues => "Session_Management_Issues",
            Self::BaselineUserBehavior => "Baseline_User_Behavior",
            Self::InsufficientData => "Insufficient_Data",
        }
    }

    /// Name a cluster from its mean severity and dominant dimension
    pub fn from_statistics(
        class: AccountClass,
        mean_severity: f64,
        dominant: Dimension,
        thresholds: &RiskThresholds,
    ) -> Self {
        match class {
            AccountClass::Machine => {
                if mean_severity >= thresholds.critical {
                    Self::CriticalPersistentThreats
                } else if mean_severity >= thresholds.high {
                    match dominant {
                        Dimension::ProcessNovelty => Self::SystemProcessAnomalies,
                        Dimension::NetworkNovelty => Self::NetworkReconnaissance,
                        Dimension::HostNovelty => Self::LateralMovementIndicators,
                        Dimension::Volume => Self::HighRiskAuthentication,
                    }
                } else if mean_severity >= thresholds.medium {
                    match dominant {
                        Dimension::ProcessNovelty => Self::PrivilegeEscalationActivity,
                        Dimension::NetworkNovelty => Self::NetworkReconnaissance,
                        Dimension::HostNovelty => Self::LateralMovementIndicators,
                        Dimension::Volume => Self::ModerateRiskEvents,
                    }
                } else {
                    Self::BaselineActivity
                }
            }
            AccountClass::Human => {
                if mean_severity >= 2.0 * thresholds.critical {
                    Self::CriticalUserBreach
                } else if mean_severity >= thresholds.critical {
                    Self::HighRiskUserActivity
                } else if mean_severity >= thresholds.high {
                    Self::SuspiciousUserBehavior
                } else if mean_severity >= thresholds.medium {
                    match dominant {
                        Dimension::HostNovelty | Dimension::NetworkNovelty => {
                            Self::AuthenticationAnomalies
                        }
                        Dimension::Volume | Dimension::ProcessNovelty => {
                            Self::SessionManagementIssues
                        }
                    }
                } else {
                    Self::BaselineUserBehavior
                }
            }
        }
    }

    /// Risk implied by the label's wording, if any
    pub const fn keyword_risk(self) -> Option<RiskTier> {
        match self {
            Self::CriticalPersistentThreats
            | Self::OutlierExtremeRisk
            | Self::CriticalUserBreach => Some(RiskTier::Critical),
            Self::NetworkReconnaissance
            | Self::HighRiskAuthentication
            | Self::PrivilegeEscalationActivity
            | Self::HighRiskUserActivity
            | Self::SuspiciousUserBehavior => Some(RiskTier::High),
            Self::SystemProcessAnomalies
            | Self::LateralMovementIndicators
            | Self::ModerateRiskEvents
            | Self::BaselineActivity
            | Self::AuthenticationAnomalies
            | Self::SessionManagementIssues
            | Self::BaselineUserBehavior
            | Self::InsufficientData => None,
        }
    }

    /// Recommended response when this behaviour is expected next
    pub const fn recommended_action(self) -> &'static str {
        match self {
            Self::CriticalPersistentThreats => {
                "Isolate affected systems and start incident response for persistent compromise"
            }
            Self::OutlierExtremeRisk => {
                "Investigate immediately; behaviour is unlike any established pattern"
            }
            Self::SystemProcessAnomalies => {
                "Examine process execution history and check for unauthorized software"
            }
            Self::NetworkReconnaissance => {
                "Review firewall and proxy logs for scanning from the affected sources"
            }
            Self::LateralMovementIndicators => {
                "Audit remote logons between hosts and restrict administrative shares"
            }
            Self::HighRiskAuthentication => {
                "Review authentication volume and check for automated credential use"
            }
            Self::PrivilegeEscalationActivity => {
                "Verify privilege assignments against change records"
            }
            Self::ModerateRiskEvents => "Add affected accounts to the watch list",
            Self::BaselineActivity | Self::BaselineUserBehavior => {
                "No action; keep as baseline reference"
            }
            Self::CriticalUserBreach => {
                "Disable the account, reset credentials and open a breach investigation"
            }
            Self::HighRiskUserActivity => {
                "Contact the account owner and review recent sessions within one hour"
            }
            Self::SuspiciousUserBehavior => {
                "Check for concurrent sessions from different locations"
            }
            Self::AuthenticationAnomalies => {
                "Review authentication logs and recent password changes"
            }
            Self::SessionManagementIssues => "Review session lifetimes and logoff patterns",
            Self::InsufficientData => "Collect more events before drawing conclusions",
        }
    }
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_names() {
        let t = RiskThresholds::default();
        let name = |sev, dim| ClusterLabel::from_statistics(AccountClass::Machine, sev, dim, &t);
        assert_eq!(name(25.0, Dimension::Volume), ClusterLabel::CriticalPersistentThreats);
        assert_eq!(name(12.0, Dimension::HostNovelty), ClusterLabel::LateralMovementIndicators);
        assert_eq!(name(5.0, Dimension::Volume), ClusterLabel::ModerateRiskEvents);
        assert_eq!(name(0.4, Dimension::NetworkNovelty), ClusterLabel::BaselineActivity);
    }

    #[test]
    fn test_human_names() {
        let t = RiskThresholds::default();
        let name = |sev, dim| ClusterLabel::from_statistics(AccountClass::Human, sev, dim, &t);
        assert_eq!(name(76.0, Dimension::HostNovelty), ClusterLabel::CriticalUserBreach);
        assert_eq!(name(21.0, Dimension::HostNovelty), ClusterLabel::HighRiskUserActivity);
        assert_eq!(name(11.0, Dimension::Volume), ClusterLabel::SuspiciousUserBehavior);
        assert_eq!(name(4.0, Dimension::Volume), ClusterLabel::SessionManagementIssues);
        assert_eq!(name(1.0, Dimension::Volume), ClusterLabel::BaselineUserBehavior);
    }

    #[test]
    fn test_serialized_vocabulary() {
        assert_eq!(
            serde_json::to_string(&ClusterLabel::LateralMovementIndicators).unwrap(),
            "\"Lateral_Movement_Indicators\""
        );
        assert_eq!(ClusterLabel::InsufficientData.to_string(), "Insufficient_Data");
    }
}
