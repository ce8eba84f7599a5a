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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One security log record, immutable after ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub subject_id: String,
    pub host_id: String,
    pub event_kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
    pub counters: DimensionVector,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        subject_id: impl Into<String>,
        host_id: impl Into<String>,
        event_kind: EventKind,
        counters: DimensionVector,
    ) -> Self {
        Self {
            timestamp,
            subject_id: subject_id.into(),
            host_id: host_id.into(),
            event_kind,
            source_address: None,
            counters,
        }
    }

    #[must_use]
    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }
}

/// Windows security event kinds the pipeline understands.
///
/// Anything else is kept verbatim in `Unrecognized` so it can be passed
/// through to the output without entering baselines or clustering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawEventKind", into = "String")]
pub enum EventKind {
    LogonSuccess,
    LogonFailure,
    Logoff,
    PrivilegeAssigned,
    ProcessStart,
    ProcessStop,
    Unrecognized(String),
}

impl EventKind {
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    /// Interactive logon attempts, the "human pattern" actions
    pub const fn is_interactive_logon(&self) -> bool {
        matches!(self, Self::LogonSuccess | Self::LogonFailure)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::LogonSuccess => "logon-success",
            Self::LogonFailure => "logon-failure",
            Self::Logoff => "logoff",
            Self::PrivilegeAssigned => "privilege-assigned",
            Self::ProcessStart => "process-start",
            Self::ProcessStop => "process-stop",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Map a Windows security event ID
    pub fn from_event_id(id: u32) -> Self {
        match id {
            4624 => Self::LogonSuccess,
            4625 => Self::LogonFailure,
            4634 => Self::Logoff,
            4672 => Self::PrivilegeAssigned,
            4688 => Self::ProcessStart,
            4689 => Self::ProcessStop,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            return Self::from_event_id(id);
        }
        match trimmed.to_ascii_lowercase().replace('_', "-").as_str() {
            "logon-success" | "logged-in" | "logon" => Self::LogonSuccess,
            "logon-failure" | "logon-failed" | "failed-logon" => Self::LogonFailure,
            "logoff" | "logged-out" | "logout" => Self::Logoff,
            "privilege-assigned" | "special-privileges-assigned" => Self::PrivilegeAssigned,
            "process-start" | "created-process" | "process-created" => Self::ProcessStart,
            "process-stop" | "process-terminated" | "terminated-process" => Self::ProcessStop,
            _ => Self::Unrecognized(trimmed.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEventKind {
    Code(u32),
    Name(String),
}

impl From<RawEventKind> for EventKind {
    fn from(raw: RawEventKind) -> Self {
        match raw {
            RawEventKind::Code(id) => Self::from_event_id(id),
            RawEventKind::Name(name) => Self::from_name(&name),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Machine and human accounts are baselined and clustered independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
    Machine,
    Human,
}

impl AccountClass {
    pub const ALL: [Self; 2] = [Self::Machine, Self::Human];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-event counter dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Volume,
    HostNovelty,
    NetworkNovelty,
    ProcessNovelty,
}

impl Dimension {
    pub const ALL: [Self; 4] = [
        Self::Volume,
        Self::HostNovelty,
        Self::NetworkNovelty,
        Self::ProcessNovelty,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Volume => 0,
            Self::HostNovelty => 1,
            Self::NetworkNovelty => 2,
            Self::ProcessNovelty => 3,
        }
    }

    /// Analyst-facing name
    pub const fn label(self) -> &'static str {
        match self {
            Self::Volume => "Volume",
            Self::HostNovelty => "Host Behavior",
            Self::NetworkNovelty => "Network Pattern",
            Self::ProcessNovelty => "Process Behavior",
        }
    }
}

/// One value per [`Dimension`], used for raw counters, z-scores and weights
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionVector {
    #[serde(default, alias = "logcount")]
    pub volume: f64,
    #[serde(default, alias = "hostincrement")]
    pub host_novelty: f64,
    #[serde(default, alias = "ipincrement")]
    pub network_novelty: f64,
    #[serde(default, alias = "processincrement")]
    pub process_novelty: f64,
}

impl DimensionVector {
    pub const fn new(volume: f64, host_novelty: f64, network_novelty: f64, process_novelty: f64) -> Self {
        Self {
            volume,
            host_novelty,
            network_novelty,
            process_novelty,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Dimension) -> f64) -> Self {
        Self {
            volume: f(Dimension::Volume),
            host_novelty: f(Dimension::HostNovelty),
            network_novelty: f(Dimension::NetworkNovelty),
            process_novelty: f(Dimension::ProcessNovelty),
        }
    }

    pub const fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Volume => self.volume,
            Dimension::HostNovelty => self.host_novelty,
            Dimension::NetworkNovelty => self.network_novelty,
            Dimension::ProcessNovelty => self.process_novelty,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    pub const fn to_array(&self) -> [f64; 4] {
        [
            self.volume,
            self.host_novelty,
            self.network_novelty,
            self.process_novelty,
        ]
    }

    /// Counters must be finite and non-negative
    pub fn is_valid_counter(&self) -> bool {
        self.iter().all(|(_, v)| v.is_finite() && v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_from_id_and_name() {
        assert_eq!(EventKind::from_event_id(4624), EventKind::LogonSuccess);
        assert_eq!(EventKind::from_name("4689"), EventKind::ProcessStop);
        assert_eq!(EventKind::from_name("Logged-In"), EventKind::LogonSuccess);
        assert_eq!(
            EventKind::from_name("4769"),
            EventKind::Unrecognized("4769".to_string())
        );
        assert!(!EventKind::from_name("kerberos-ticket").is_recognized());
    }

    #[test]
    fn test_event_kind_serde() {
        let kind: EventKind = serde_json::from_str("4625").unwrap();
        assert_eq!(kind, EventKind::LogonFailure);
        let kind: EventKind = serde_json::from_str("\"privilege-assigned\"").unwrap();
        assert_eq!(kind, EventKind::PrivilegeAssigned);
        assert_eq!(
            serde_json::to_string(&EventKind::ProcessStart).unwrap(),
            "\"process-start\""
        );
    }

    #[test]
    fn test_counter_aliases() {
        let v: DimensionVector =
            serde_json::from_str(r#"{"logcount": 4.0, "hostincrement": 1.0, "ipincrement": 2.0}"#)
                .unwrap();
        assert_eq!(v, DimensionVector::new(4.0, 1.0, 2.0, 0.0));
    }

    #[test]
    fn test_counter_validity() {
        assert!(DimensionVector::new(0.0, 1.0, 2.0, 3.0).is_valid_counter());
        assert!(!DimensionVector::new(-1.0, 1.0, 2.0, 3.0).is_valid_counter());
        assert!(!DimensionVector::new(f64::NAN, 1.0, 2.0, 3.0).is_valid_counter());
    }
}
