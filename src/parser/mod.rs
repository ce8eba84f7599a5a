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

//! Event ingestion from JSON lines.
//!
//! One object per line. Field names follow the exported detection
//! columns (`username`, `hostname`, `event_id`, `source_ip`, `logcount`,
//! ...) as well as the canonical names of [`Event`].

pub mod event;
pub mod subject;

use chrono::{DateTime, Utc};
use event::{DimensionVector, Event, EventKind};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    Json {
        line: usize,
        source: serde_json::Error,
    },
    InvalidRecord {
        line: usize,
        reason: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json { line, source } => write!(f, "line {line}: malformed record: {source}"),
            Self::InvalidRecord { line, reason } => write!(f, "line {line}: {reason}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json { source, .. } => Some(source),
            Self::InvalidRecord { .. } => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Deserialize)]
struct RawEvent {
    timestamp: DateTime<Utc>,
    #[serde(alias = "username")]
    subject_id: String,
    #[serde(alias = "hostname")]
    host_id: String,
    #[serde(alias = "event_id")]
    event_kind: EventKind,
    #[serde(default, alias = "source_ip")]
    source_address: Option<String>,
    #[serde(flatten)]
    counters: DimensionVector,
}

/// Outcome of loading a batch: parsed events plus the lines that were skipped
#[derive(Debug, Default)]
pub struct LoadReport {
    pub events: Vec<Event>,
    pub rejected: Vec<ParseError>,
}

/// Parse a single JSON line into an [`Event`]
pub fn parse_event(raw: &str, line: usize) -> Result<Event, ParseError> {
    let record: RawEvent =
        serde_json::from_str(raw).map_err(|source| ParseError::Json { line, source })?;

    if !record.counters.is_valid_counter() {
        return Err(ParseError::InvalidRecord {
            line,
            reason: "counters must be finite and non-negative".to_string(),
        });
    }

    let source_address = record
        .source_address
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "-" && !s.eq_ignore_ascii_case("nan"));

    Ok(Event {
        timestamp: record.timestamp,
        subject_id: record.subject_id,
        host_id: record.host_id,
        event_kind: record.event_kind,
        source_address,
        counters: record.counters,
    })
}

/// Parse JSON lines from a reader, skipping blank and malformed lines
pub fn parse_events<R: BufRead>(reader: R) -> Result<LoadReport, ParseError> {
    profiling::scope!("parse_events");
    let mut report = LoadReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_event(trimmed, idx + 1) {
            Ok(event) => report.events.push(event),
            Err(err) => {
                tracing::warn!("Skipping record: {err}");
                report.rejected.push(err);
            }
        }
    }

    tracing::info!(
        "Parsed {} events ({} rejected)",
        report.events.len(),
        report.rejected.len()
    );
    Ok(report)
}

/// Load a JSON lines event file
pub fn load_events(path: &Path) -> Result<LoadReport, ParseError> {
    tracing::info!("Loading events from {}", path.display());
    let file = File::open(path)?;
    parse_events(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const LINE: &str = r#"{"timestamp":"2025-08-25T12:18:28.055000000Z","username":"WS-01$","hostname":"dc-01","event_id":4624,"source_ip":"-","logcount":12,"hostincrement":1,"ipincrement":0,"processincrement":2}"#;

    #[test]
    fn test_parse_export_columns() {
        let event = parse_event(LINE, 1).unwrap();
        assert_eq!(event.subject_id, "WS-01$");
        assert_eq!(event.host_id, "dc-01");
        assert_eq!(event.event_kind, EventKind::LogonSuccess);
        assert_eq!(event.source_address, None);
        assert_eq!(event.counters, DimensionVector::new(12.0, 1.0, 0.0, 2.0));
    }

    #[test]
    fn test_parse_canonical_names() {
        let raw = r#"{"timestamp":"2025-08-25T03:00:00Z","subject_id":"alice","host_id":"ws-7","event_kind":"process-start","source_address":"203.0.113.9","volume":1.5}"#;
        let event = parse_event(raw, 1).unwrap();
        assert_eq!(event.event_kind, EventKind::ProcessStart);
        assert_eq!(event.source_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(event.counters.volume, 1.5);
        assert_eq!(event.counters.process_novelty, 0.0);
    }

    #[test]
    fn test_negative_counter_rejected() {
        let raw = r#"{"timestamp":"2025-08-25T03:00:00Z","subject_id":"a","host_id":"h","event_kind":4624,"volume":-1}"#;
        assert!(matches!(
            parse_event(raw, 7),
            Err(ParseError::InvalidRecord { line: 7, .. })
        ));
    }

    #[test]
    fn test_parse_events_skips_bad_lines() {
        let input = format!("{LINE}\n\nnot json\n{LINE}\n");
        let report = parse_events(Cursor::new(input)).unwrap();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0], ParseError::Json { line: 3, .. }));
    }

    #[test]
    fn test_unrecognized_kind_is_kept() {
        let raw = LINE.replace("4624", "4769");
        let event = parse_event(&raw, 1).unwrap();
        assert_eq!(event.event_kind, EventKind::Unrecognized("4769".to_string()));
    }

    #[test]
    fn test_load_events_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{LINE}").unwrap();
        let report = load_events(file.path()).unwrap();
        assert_eq!(report.events.len(), 1);
    }
}
