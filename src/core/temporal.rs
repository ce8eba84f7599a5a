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

//! Day-by-day severity and the hour-of-day spread of high-severity events.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One event as seen by the temporal rollup
#[derive(Debug, Clone, Copy)]
pub struct TemporalEvent {
    pub timestamp: DateTime<Utc>,
    /// Absent for unscored events
    pub severity: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailySeverity {
    pub date: NaiveDate,
    pub event_count: usize,
    pub scored_count: usize,
    pub max_severity: Option<f64>,
    pub mean_severity: Option<f64>,
}

/// Dates and hours are local per the configured offset, like the off-hours band
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemporalProfile {
    pub daily: Vec<DailySeverity>,
    /// Hour (0..24) to count of events with severity at or above the high threshold
    pub high_severity_by_hour: BTreeMap<u32, usize>,
}

#[derive(Default)]
struct DayTally {
    events: usize,
    scored: usize,
    sum: f64,
    max: Option<f64>,
}

impl TemporalProfile {
    pub fn build(events: &[TemporalEvent], high: f64, offset: FixedOffset) -> Self {
        profiling::scope!("TemporalProfile::build");
        let mut days: BTreeMap<NaiveDate, DayTally> = BTreeMap::new();
        let mut high_severity_by_hour: BTreeMap<u32, usize> = BTreeMap::new();

        for event in events {
            let local = event.timestamp.with_timezone(&offset);
            let tally = days.entry(local.date_naive()).or_default();
            tally.events += 1;
            if let Some(severity) = event.severity {
                tally.scored += 1;
                tally.sum += severity;
                tally.max = Some(tally.max.map_or(severity, |max| max.max(severity)));
                if severity >= high {
                    *high_severity_by_hour.entry(local.hour()).or_default() += 1;
                }
            }
        }

        let daily = days
            .into_iter()
            .map(|(date, tally)| DailySeverity {
                date,
                event_count: tally.events,
                scored_count: tally.scored,
                max_severity: tally.max,
                mean_severity: (tally.scored > 0).then(|| tally.sum / tally.scored as f64),
            })
            .collect();

        Self {
            daily,
            high_severity_by_hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(day: u32, hour: u32, severity: Option<f64>) -> TemporalEvent {
        TemporalEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 8, day, hour, 30, 0).unwrap(),
            severity,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_daily_max_and_mean() {
        let events = [
            event(25, 9, Some(2.0)),
            event(25, 14, Some(12.0)),
            event(25, 14, None),
            event(26, 3, Some(25.0)),
        ];
        let profile = TemporalProfile::build(&events, 10.0, utc());

        assert_eq!(profile.daily.len(), 2);
        let first = &profile.daily[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 8, 25).unwrap());
        assert_eq!(first.event_count, 3);
        assert_eq!(first.scored_count, 2);
        assert_eq!(first.max_severity, Some(12.0));
        assert_eq!(first.mean_severity, Some(7.0));

        assert_eq!(
            profile.high_severity_by_hour,
            BTreeMap::from([(3, 1), (14, 1)])
        );
    }

    #[test]
    fn test_unscored_day_has_no_severity() {
        let profile = TemporalProfile::build(&[event(25, 9, None)], 10.0, utc());
        assert_eq!(profile.daily[0].max_severity, None);
        assert_eq!(profile.daily[0].mean_severity, None);
        assert!(profile.high_severity_by_hour.is_empty());
    }

    #[test]
    fn test_local_offset_shifts_day_and_hour() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let profile = TemporalProfile::build(&[event(25, 23, Some(15.0))], 10.0, offset);
        assert_eq!(profile.daily[0].date, NaiveDate::from_ymd_opt(2025, 8, 26).unwrap());
        assert_eq!(profile.high_severity_by_hour, BTreeMap::from([(1, 1)]));
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(TemporalProfile::build(&[], 10.0, utc()), TemporalProfile::default());
    }
}
