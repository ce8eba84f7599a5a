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

//! Forecasting Engine.
//!
//! A pure function of the assessed batch: daily rollups of closed days,
//! per-metric least-squares trends projected over the horizon, the next
//! expected critical event and the likeliest attack vectors. Anything that
//! lacks history comes back as [`Estimate::Insufficient`].

pub mod aggregate;
pub mod critical;
pub mod summary;
pub mod trend;
pub mod vectors;

pub use aggregate::{DailyAggregate, Metric, Observation};
pub use critical::{EstimateConfidence, NextCritical};
pub use summary::{ExecutiveSummary, Posture, Recommendation, Recommendations};
pub use trend::{LinearFit, Trend};
pub use vectors::AttackVector;

use crate::anomaly::RiskTier;
use crate::cluster::{ClusterLabel, ClusterSummary};
use crate::config::AnalysisConfig;
use crate::core::hotspots::{HostExposure, ThreatActor};
use crate::error::AnalysisResult;
use crate::parser::event::AccountClass;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A value that may be missing for lack of history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Estimate<T> {
    Available(T),
    Insufficient { reason: String },
}

impl<T> Estimate<T> {
    pub fn from_result(result: AnalysisResult<T>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(err) => Self::Insufficient {
                reason: err.to_string(),
            },
        }
    }

    pub const fn available(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Insufficient { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTrend {
    pub fit: LinearFit,
    pub trend: Trend,
    pub projected: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_total: f64,
    pub predicted_critical: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub as_of: DateTime<Utc>,
    pub horizon_days: u32,
    pub history: Vec<DailyAggregate>,
    pub trends: BTreeMap<Metric, Estimate<MetricTrend>>,
    pub points: Estimate<Vec<ForecastPoint>>,
    pub next_critical: Estimate<NextCritical>,
    pub attack_vectors: Estimate<Vec<AttackVector>>,
    pub summary: ExecutiveSummary,
    pub recommendations: Recommendations,
}

/// Everything upstream stages hand to the forecast
#[derive(Debug, Clone, Copy)]
pub struct ForecastInputs<'a> {
    pub observations: &'a [Observation],
    pub clusters: &'a [ClusterSummary],
    pub actors: &'a [ThreatActor],
    pub hosts: &'a [HostExposure],
}

pub struct ForecastEngine {
    horizon_days: u32,
    trend_dead_zone: f64,
    recent_window: usize,
    top_vectors: usize,
}

impl ForecastEngine {
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self {
            horizon_days: config.forecast_horizon_days,
            trend_dead_zone: config.trend_dead_zone,
            recent_window: config.recent_window,
            top_vectors: config.top_vectors,
        }
    }

    pub fn forecast(&self, inputs: &ForecastInputs<'_>, as_of: DateTime<Utc>) -> Forecast {
        profiling::scope!("ForecastEngine::forecast");
        let history = aggregate::daily_series(inputs.observations, as_of);
        tracing::debug!("Forecasting from {} closed days", history.len());

        let fitted: BTreeMap<Metric, AnalysisResult<MetricTrend>> = Metric::ALL
            .into_iter()
            .map(|metric| (metric, self.fit_metric(&history, metric)))
            .collect();
        let points = self.points(&history, &fitted);
        let trends: BTreeMap<Metric, Estimate<MetricTrend>> = fitted
            .into_iter()
            .map(|(metric, result)| {
                if let Err(err) = &result {
                    tracing::warn!("No {} trend: {err}", metric.as_str());
                }
                (metric, Estimate::from_result(result))
            })
            .collect();

        let cutoff = as_of.date_naive();
        let critical_times: Vec<DateTime<Utc>> = inputs
            .observations
            .iter()
            .filter(|o| o.risk_tier == RiskTier::Critical && o.timestamp.date_naive() < cutoff)
            .map(|o| o.timestamp)
            .collect();
        let next_critical = Estimate::from_result(critical::next_critical(&critical_times));

        let attack_vectors = self.attack_vectors(inputs.observations, as_of);
        let summary = self.summarize(inputs.observations, &trends, &next_critical);
        let recommendations = summary::recommend(
            critical_counts(inputs.observations),
            inputs.clusters,
            inputs.actors,
            inputs.hosts,
        );

        Forecast {
            as_of,
            horizon_days: self.horizon_days,
            history,
            trends,
            points,
            next_critical,
            attack_vectors,
            summary,
            recommendations,
        }
    }

    fn fit_metric(&self, history: &[DailyAggregate], metric: Metric) -> AnalysisResult<MetricTrend> {
        let values: Vec<f64> = history.iter().map(|d| d.metric(metric) as f64).collect();
        let fit = LinearFit::fit(metric.as_str(), &values)?;
        Ok(MetricTrend {
            fit,
            trend: Trend::classify(&fit, self.trend_dead_zone),
            projected: fit.project(self.horizon_days),
        })
    }

    fn points(
        &self,
        history: &[DailyAggregate],
        fitted: &BTreeMap<Metric, AnalysisResult<MetricTrend>>,
    ) -> Estimate<Vec<ForecastPoint>> {
        let (Some(Ok(total)), Some(Ok(critical)), Some(last)) = (
            fitted.get(&Metric::Total),
            fitted.get(&Metric::Critical),
            history.last(),
        ) else {
            return Estimate::Insufficient {
                reason: format!(
                    "{} closed day(s) of history, at least 2 required",
                    history.len()
                ),
            };
        };

        let points = (1..=self.horizon_days)
            .zip(total.projected.iter().zip(&critical.projected))
            .map(|(step, (&predicted_total, &predicted_critical))| {
                let confidence = trend::confidence(step);
                let (lower_bound, upper_bound) = trend::bounds(predicted_total, confidence);
                ForecastPoint {
                    date: aggregate::day_after(last.date, u64::from(step)),
                    predicted_total,
                    predicted_critical,
                    lower_bound,
                    upper_bound,
                    confidence,
                }
            })
            .collect();
        Estimate::Available(points)
    }

    fn attack_vectors(
        &self,
        observations: &[Observation],
        as_of: DateTime<Utc>,
    ) -> Estimate<Vec<AttackVector>> {
        let mut clustered: Vec<(DateTime<Utc>, ClusterLabel)> = observations
            .iter()
            .filter(|o| o.timestamp <= as_of)
            .filter_map(|o| o.cluster.map(|label| (o.timestamp, label)))
            .collect();
        if clustered.is_empty() {
            return Estimate::Insufficient {
                reason: "no clustered events before the forecast time".to_string(),
            };
        }
        // Stable, so input order breaks timestamp ties
        clustered.sort_by_key(|(timestamp, _)| *timestamp);
        let labels: Vec<ClusterLabel> = clustered.into_iter().map(|(_, label)| label).collect();
        Estimate::Available(vectors::rank(&labels, self.recent_window, self.top_vectors))
    }

    fn summarize(
        &self,
        observations: &[Observation],
        trends: &BTreeMap<Metric, Estimate<MetricTrend>>,
        next_critical: &Estimate<NextCritical>,
    ) -> ExecutiveSummary {
        let count = |tier| observations.iter().filter(|o| o.risk_tier == tier).count();
        let critical_events = count(RiskTier::Critical);
        let high_events = count(RiskTier::High);
        let posture = Posture::from_counts(critical_events, high_events);
        let trend_of = |metric| trends.get(&metric).and_then(Estimate::available);

        ExecutiveSummary {
            posture,
            posture_description: posture.description(),
            total_events: observations.len(),
            critical_events,
            high_events,
            projected_critical: trend_of(Metric::Critical)
                .map(|t| t.projected.iter().take(self.horizon_days as usize).sum::<f64>()),
            total_trend: trend_of(Metric::Total).map(|t| t.trend),
            next_critical_expected: next_critical.available().map(|n| n.expected_at),
        }
    }
}

fn critical_counts(observations: &[Observation]) -> summary::CriticalCounts {
    let mut counts = summary::CriticalCounts::default();
    for observation in observations {
        if observation.risk_tier == RiskTier::Critical {
            match observation.class {
                AccountClass::Machine => counts.machine += 1,
                AccountClass::Human => counts.human += 1,
            }
        }
    }
    counts
}
