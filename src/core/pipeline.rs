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

//! Batch orchestration of the analytical stages.
//!
//! Stages run strictly in order: subject classification, baselines,
//! scoring, per-class clustering, annotation, the batch rollups (hotspots,
//! temporal profile, top anomalies) and finally the forecast. Each stage only reads what earlier ones produced; the
//! per-event work inside a stage runs on the rayon pool and keeps input
//! order, so the output is identical across runs.

use crate::anomaly::{BaselineMember, BaselineTable, EventScore, RiskTier, Scoring, SeverityScorer};
use crate::annotate::{self, Annotation, AnnotationContext};
use crate::cluster::{self, ClassClustering, ClusterAssignment, ClusterMember};
use crate::config::{AnalysisConfig, ConfigError};
use crate::core::anomalies::{self, AnomalyCandidate, TopAnomaly};
use crate::core::hotspots::{HotspotEvent, Hotspots};
use crate::core::temporal::{TemporalEvent, TemporalProfile};
use crate::error::AnalysisError;
use crate::forecast::{Forecast, ForecastEngine, ForecastInputs, Observation};
use crate::parser::event::{AccountClass, Event};
use crate::parser::subject::{SubjectClassifier, SubjectKind};
use chrono::{DateTime, Offset, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

/// An input event with every derived field attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub subject_kind: SubjectKind,
    pub account_class: AccountClass,
    pub scoring: Option<Scoring>,
    pub risk_tier: RiskTier,
    /// Tier raised by the anonymous-access override
    pub tier_overridden: bool,
    pub cluster: Option<ClusterAssignment>,
    pub annotation: Annotation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub baselines: BaselineTable,
    pub events: Vec<AssessedEvent>,
    pub clusters: Vec<ClassClustering>,
    pub hotspots: Hotspots,
    pub temporal: TemporalProfile,
    pub top_anomalies: Vec<TopAnomaly>,
    pub forecast: Forecast,
}

/// Everything but the per-event records
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssessmentSummary<'a> {
    pub event_count: usize,
    pub baselines: &'a BaselineTable,
    pub clusters: &'a [ClassClustering],
    pub hotspots: &'a Hotspots,
    pub temporal: &'a TemporalProfile,
    pub top_anomalies: &'a [TopAnomaly],
    pub forecast: &'a Forecast,
}

impl Assessment {
    pub fn summary(&self) -> AssessmentSummary<'_> {
        AssessmentSummary {
            event_count: self.events.len(),
            baselines: &self.baselines,
            clusters: &self.clusters,
            hotspots: &self.hotspots,
            temporal: &self.temporal,
            top_anomalies: &self.top_anomalies,
            forecast: &self.forecast,
        }
    }
}

pub struct Pipeline {
    config: AnalysisConfig,
    classifier: SubjectClassifier,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = config.subject_classifier()?;
        Ok(Self { config, classifier })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Assess a batch, deriving baselines from the batch itself
    pub fn run(&self, events: Vec<Event>, as_of: DateTime<Utc>) -> Assessment {
        profiling::scope!("Pipeline::run");
        let subjects = self.classify_subjects(&events);
        let baselines = {
            profiling::scope!("baselines");
            let members: Vec<BaselineMember<'_>> = events
                .iter()
                .zip(&subjects)
                .filter(|(event, _)| event.event_kind.is_recognized())
                .map(|(event, subject)| BaselineMember {
                    class: subject.account_class(),
                    timestamp: event.timestamp,
                    counters: &event.counters,
                })
                .collect();
            BaselineTable::from_population(&members, self.config.baseline_window, self.config.sigma_floor)
        };
        self.assess(events, subjects, baselines, as_of)
    }

    /// Assess a batch against a baseline computed elsewhere
    pub fn run_with_baseline(
        &self,
        events: Vec<Event>,
        baselines: BaselineTable,
        as_of: DateTime<Utc>,
    ) -> Assessment {
        profiling::scope!("Pipeline::run_with_baseline");
        let subjects = self.classify_subjects(&events);
        self.assess(events, subjects, baselines, as_of)
    }

    fn classify_subjects(&self, events: &[Event]) -> Vec<SubjectKind> {
        profiling::scope!("classify_subjects");
        let subjects: Vec<SubjectKind> = events
            .par_iter()
            .map(|event| self.classifier.classify(&event.subject_id))
            .collect();

        let unrecognized: BTreeSet<&str> = events
            .iter()
            .filter(|e| !e.event_kind.is_recognized())
            .map(|e| e.event_kind.as_str())
            .collect();
        for kind in unrecognized {
            tracing::warn!(
                "{}; such events pass through unscored",
                AnalysisError::UnrecognizedEventKind(kind.to_string())
            );
        }
        subjects
    }

    fn assess(
        &self,
        events: Vec<Event>,
        subjects: Vec<SubjectKind>,
        baselines: BaselineTable,
        as_of: DateTime<Utc>,
    ) -> Assessment {
        tracing::info!("Assessing {} events as of {as_of}", events.len());

        let scores: Vec<EventScore> = {
            profiling::scope!("scoring");
            let scorer = SeverityScorer::new(&baselines, self.config.risk_thresholds);
            events
                .par_iter()
                .zip(subjects.par_iter())
                .map(|(event, &subject)| scorer.score(event, subject))
                .collect()
        };

        let (clusters, assignments) = self.cluster(&events, &subjects, &scores);

        let annotations: Vec<Annotation> = {
            profiling::scope!("annotation");
            events
                .par_iter()
                .enumerate()
                .map(|(i, event)| {
                    let ctx = AnnotationContext::new(
                        event,
                        subjects[i],
                        &scores[i],
                        assignments[i],
                        &self.config.off_hours,
                    );
                    annotate::annotate(&ctx)
                })
                .collect()
        };

        let hotspots = {
            let hotspot_events: Vec<HotspotEvent<'_>> = events
                .iter()
                .enumerate()
                .map(|(i, event)| HotspotEvent {
                    subject_id: &event.subject_id,
                    host_id: &event.host_id,
                    class: subjects[i].account_class(),
                    risk_tier: scores[i].risk_tier,
                    severity: scores[i].scoring.map(|s| s.severity_score),
                })
                .collect();
            Hotspots::rank(&hotspot_events)
        };

        let temporal = {
            let temporal_events: Vec<TemporalEvent> = events
                .iter()
                .zip(&scores)
                .map(|(event, score)| TemporalEvent {
                    timestamp: event.timestamp,
                    severity: score.scoring.map(|s| s.severity_score),
                })
                .collect();
            let offset = self.config.off_hours.offset().unwrap_or_else(|| Utc.fix());
            TemporalProfile::build(&temporal_events, self.config.risk_thresholds.high, offset)
        };

        let top_anomalies = {
            let candidates: Vec<AnomalyCandidate<'_>> = events
                .iter()
                .enumerate()
                .map(|(i, event)| AnomalyCandidate {
                    event,
                    scoring: scores[i].scoring.as_ref(),
                    risk_tier: scores[i].risk_tier,
                    cluster: assignments[i].map(|a| a.label),
                })
                .collect();
            anomalies::top_anomalies(&candidates, self.config.risk_thresholds.critical)
        };

        let forecast = {
            let observations: Vec<Observation> = events
                .iter()
                .enumerate()
                .map(|(i, event)| Observation {
                    timestamp: event.timestamp,
                    risk_tier: scores[i].risk_tier,
                    class: subjects[i].account_class(),
                    cluster: assignments[i].map(|a| a.label),
                })
                .collect();
            let summaries: Vec<cluster::ClusterSummary> = clusters
                .iter()
                .flat_map(|c| c.clusters.iter().cloned())
                .collect();
            let inputs = ForecastInputs {
                observations: &observations,
                clusters: &summaries,
                actors: &hotspots.threat_actors,
                hosts: &hotspots.hosts,
            };
            ForecastEngine::new(&self.config).forecast(&inputs, as_of)
        };

        let events: Vec<AssessedEvent> = events
            .into_iter()
            .zip(subjects)
            .zip(scores)
            .zip(assignments)
            .zip(annotations)
            .map(
                |((((event, subject), score), cluster), annotation)| AssessedEvent {
                    event,
                    subject_kind: subject,
                    account_class: subject.account_class(),
                    scoring: score.scoring,
                    risk_tier: score.risk_tier,
                    tier_overridden: score.overridden,
                    cluster,
                    annotation,
                },
            )
            .collect();

        let critical = events
            .iter()
            .filter(|e| e.risk_tier == RiskTier::Critical)
            .count();
        tracing::info!(
            "Assessment complete: {} events, {critical} critical, posture {:?}",
            events.len(),
            forecast.summary.posture
        );

        Assessment {
            baselines,
            events,
            clusters,
            hotspots,
            temporal,
            top_anomalies,
            forecast,
        }
    }

    /// Cluster each account class independently; unscored events get no cluster
    fn cluster(
        &self,
        events: &[Event],
        subjects: &[SubjectKind],
        scores: &[EventScore],
    ) -> (Vec<ClassClustering>, Vec<Option<ClusterAssignment>>) {
        profiling::scope!("clustering");
        let class_members = |class: AccountClass| -> (Vec<usize>, ClassClustering) {
            let (indices, members): (Vec<usize>, Vec<ClusterMember<'_>>) = events
                .iter()
                .enumerate()
                .filter(|(i, _)| subjects[*i].account_class() == class)
                .filter_map(|(i, event)| {
                    scores[i].scoring.as_ref().map(|scoring| {
                        (
                            i,
                            ClusterMember {
                                subject_id: &event.subject_id,
                                host_id: &event.host_id,
                                scoring,
                            },
                        )
                    })
                })
                .unzip();
            let clustering = cluster::classify_population(class, &members, &self.config);
            (indices, clustering)
        };

        let (machine, human) = rayon::join(
            || class_members(AccountClass::Machine),
            || class_members(AccountClass::Human),
        );

        let mut assignments = vec![None; events.len()];
        let mut clusterings = Vec::with_capacity(2);
        for (indices, clustering) in [machine, human] {
            for (&index, assignment) in indices.iter().zip(&clustering.assignments) {
                assignments[index] = Some(*assignment);
            }
            clusterings.push(clustering);
        }
        (clusterings, assignments)
    }
}
