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

//! Daily rollups of the assessed events.

use crate::anomaly::RiskTier;
use crate::cluster::ClusterLabel;
use crate::parser::event::AccountClass;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The slice of an assessed event the forecast looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub risk_tier: RiskTier,
    pub class: AccountClass,
    pub cluster: Option<ClusterLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Total,
    Critical,
    Machine,
    Human,
}

impl Metric {
    pub const ALL: [Self; 4] = [Self::Total, Self::Critical, Self::Machine, Self::Human];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Critical => "critical",
            Self::Machine => "machine",
            Self::Human => "human",
        }
    }
}

/// One closed UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_count: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub machine_account_count: usize,
    pub human_account_count: usize,
}

impl DailyAggregate {
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_count: 0,
            critical_count: 0,
            high_count: 0,
            medium_count: 0,
            machine_account_count: 0,
            human_account_count: 0,
        }
    }

    fn add(&mut self, observation: &Observation) {
        self.total_count += 1;
        match observation.risk_tier {
            RiskTier::Critical => self.critical_count += 1,
            RiskTier::High => self.high_count += 1,
            RiskTier::Medium => self.medium_count += 1,
            RiskTier::Normal | RiskTier::Unknown => {}
        }
        match observation.class {
            AccountClass::Machine => self.machine_account_count += 1,
            AccountClass::Human => self.human_account_count += 1,
        }
    }

    pub const fn metric(&self, metric: Metric) -> usize {
        match metric {
            Metric::Total => self.total_count,
            Metric::Critical => self.critical_count,
            Metric::Machine => self.machine_account_count,
            Metric::Human => self.human_account_count,
        }
    }
}

/// Contiguous per-day series over the closed days before `as_of`.
///
/// Days without events inside the covered range appear as zero rows, so the
/// day index used for trend fitting is calendar distance.
pub fn daily_series(observations: &[Observation], as_of: DateTime<Utc>) -> Vec<DailyAggregate> {
    profiling::scope!("daily_series");
    let cutoff = as_of.date_naive();
    let mut by_day: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();
    for observation in observations {
        let date = observation.timestamp.date_naive();
        if date >= cutoff {
            continue;
        }
        by_day
            .entry(date)
            .or_insert_with(|| DailyAggregate::empty(date))
            .add(observation);
    }

    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| {
            by_day
                .get(&date)
                .copied()
                .unwrap_or_else(|| DailyAggregate::empty(date))
        })
        .collect()
}

/// Calendar day `offset` days after `date`
pub fn day_after(date: NaiveDate, offset: u64) -> NaiveDate {
    date.checked_add_days(Days::new(offset)).unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(day: u32, hour: u32, tier: RiskTier, class: AccountClass) -> Observation {
        Observation {
            timestamp: Utc.with_ymd_and_hms(2025, 8, day, hour, 0, 0).unwrap(),
            risk_tier: tier,
            class,
            cluster: None,
        }
    }

    #[test]
    fn test_series_fills_gaps_and_drops_open_day() {
        let observations = [
            obs(1, 10, RiskTier::Critical, AccountClass::Human),
            obs(1, 23, RiskTier::Normal, AccountClass::Machine),
            obs(3, 0, RiskTier::High, AccountClass::Machine),
            obs(4, 12, RiskTier::Medium, AccountClass::Human),
        ];
        let as_of = Utc.with_ymd_and_hms(2025, 8, 4, 18, 0, 0).unwrap();
        let series = daily_series(&observations, as_of);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].total_count, 2);
        assert_eq!(series[0].critical_count, 1);
        assert_eq!(series[0].machine_account_count, 1);
        assert_eq!(series[1], DailyAggregate::empty(NaiveDate::from_ymd_opt(2025, 8, 2).unwrap()));
        assert_eq!(series[2].high_count, 1);
        // The 4th is still open
        assert!(series.iter().all(|d| d.medium_count == 0));
    }

    #[test]
    fn test_empty_history() {
        let as_of = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        let observations = [obs(1, 10, RiskTier::Critical, AccountClass::Human)];
        assert!(daily_series(&observations, as_of).is_empty());
    }
}
