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

//! Per-class grouping of scored events into named threat behaviours.
//!
//! Features are the z-score vectors of recognized, scored events, min-max
//! scaled within the class. Small populations go straight to k-means; large
//! ones first pass through a density filter. Isolated events at or above the
//! critical threshold are set aside as extreme outliers, the other isolated
//! events join their nearest dense group. Groups that end up with the same
//! label are merged.

pub mod density;
pub mod distance;
pub mod kmeans;
pub mod naming;

pub use naming::ClusterLabel;

use crate::anomaly::{RiskTier, Scoring};
use crate::config::AnalysisConfig;
use crate::parser::event::{AccountClass, Dimension};
use distance::{Point, WeightedEuclidean};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterStrategy {
    /// Density filter, then k-means over the dense points
    Density {
        eps: f64,
        min_samples: usize,
        k: usize,
    },
    Centroid {
        k: usize,
    },
    /// Fewer than two distinct feature vectors
    Degenerate,
}

impl ClusterStrategy {
    pub const fn for_population(class: AccountClass, population: usize, config: &AnalysisConfig) -> Self {
        let k = match class {
            AccountClass::Machine => config.machine_clusters,
            AccountClass::Human => config.human_clusters,
        };
        if population >= config.large_population_threshold {
            Self::Density {
                eps: config.density_eps,
                min_samples: config.density_min_samples,
                k,
            }
        } else {
            Self::Centroid { k }
        }
    }
}

/// Cluster reference attached to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cluster_id: usize,
    pub label: ClusterLabel,
}

/// What the classifier needs to know about one clusterable event
#[derive(Debug, Clone, Copy)]
pub struct ClusterMember<'a> {
    pub subject_id: &'a str,
    pub host_id: &'a str,
    pub scoring: &'a Scoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub class: AccountClass,
    pub cluster_id: usize,
    pub label: ClusterLabel,
    pub size: usize,
    pub mean_severity: f64,
    pub max_severity: f64,
    pub min_severity: f64,
    pub dominant_dimension: Dimension,
    pub unique_subjects: usize,
    pub unique_hosts: usize,
    pub risk_level: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassClustering {
    pub class: AccountClass,
    pub strategy: ClusterStrategy,
    /// Parallel to the members passed in
    #[serde(skip)]
    pub assignments: Vec<ClusterAssignment>,
    pub clusters: Vec<ClusterSummary>,
}

/// Cluster one account class.
///
/// The result depends only on the members and the config, in input order,
/// so identical inputs always produce identical ids and labels.
pub fn classify_population(
    class: AccountClass,
    members: &[ClusterMember<'_>],
    config: &AnalysisConfig,
) -> ClassClustering {
    profiling::scope!("classify_population");
    let points: Vec<Point> = members
        .iter()
        .map(|m| m.scoring.dimension_z.to_array())
        .collect();

    if distance::distinct_count(&points) < 2 {
        if !members.is_empty() {
            tracing::info!(
                "{} {class} events share one feature vector, not clustering",
                members.len()
            );
        }
        let assignments = vec![
            ClusterAssignment {
                cluster_id: 0,
                label: ClusterLabel::InsufficientData,
            };
            members.len()
        ];
        let clusters = summarize(class, members, &assignments, config);
        return ClassClustering {
            class,
            strategy: ClusterStrategy::Degenerate,
            assignments,
            clusters,
        };
    }

    let strategy = ClusterStrategy::for_population(class, members.len(), config);
    let metric = WeightedEuclidean::new(&config.dimension_weights);
    let scaled = distance::min_max_scale(&points);

    let grouping = match strategy {
        ClusterStrategy::Centroid { k } => kmeans::fit(&scaled, k, &metric)
            .assignments
            .into_iter()
            .map(Group::Regular)
            .collect(),
        ClusterStrategy::Density {
            eps,
            min_samples,
            k,
        } => {
            let severities: Vec<f64> = members.iter().map(|m| m.scoring.severity_score).collect();
            let extreme = config.risk_thresholds.critical;
            density_then_centroid(&scaled, &severities, extreme, eps, min_samples, k, &metric)
        }
        ClusterStrategy::Degenerate => vec![Group::Regular(0); members.len()],
    };

    let assignments = name_groups(class, members, &grouping, config);
    let clusters = summarize(class, members, &assignments, config);
    tracing::info!(
        "Clustered {} {class} events into {} clusters ({strategy:?})",
        members.len(),
        clusters.len()
    );
    ClassClustering {
        class,
        strategy,
        assignments,
        clusters,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Regular(usize),
    Outlier,
}

/// Fit k-means on the dense points, falling back to every non-extreme point
/// when no dense region exists. Sparse points below `extreme` join their
/// nearest centroid; only the remaining ones are outliers.
fn density_then_centroid(
    scaled: &[Point],
    severities: &[f64],
    extreme: f64,
    eps: f64,
    min_samples: usize,
    k: usize,
    metric: &WeightedEuclidean,
) -> Vec<Group> {
    let mask = density::dense_mask(scaled, eps, min_samples, metric);
    let mut basis: Vec<usize> = (0..scaled.len()).filter(|&i| mask[i]).collect();
    tracing::debug!(
        "Density pass kept {} of {} points",
        basis.len(),
        scaled.len()
    );
    if basis.is_empty() {
        basis = (0..scaled.len()).filter(|&i| severities[i] < extreme).collect();
    }

    let basis_points: Vec<Point> = basis.iter().map(|&i| scaled[i]).collect();
    let model = kmeans::fit(&basis_points, k, metric);

    let mut grouping = vec![Group::Outlier; scaled.len()];
    for (&index, &id) in basis.iter().zip(&model.assignments) {
        grouping[index] = Group::Regular(id);
    }
    if model.centroids.is_empty() {
        return grouping;
    }

    let mut joined = 0;
    for (index, group) in grouping.iter_mut().enumerate() {
        if *group == Group::Outlier && severities[index] < extreme {
            *group = Group::Regular(kmeans::nearest_centroid(&scaled[index], &model.centroids, metric));
            joined += 1;
        }
    }
    tracing::debug!("{joined} sparse points below {extreme} joined their nearest group");
    grouping
}

/// Turn raw groups into ids and labels.
///
/// Regular groups sharing a label are merged under one id, numbered by the
/// lowest raw group carrying that label. Outliers take the id after the last
/// regular one.
fn name_groups(
    class: AccountClass,
    members: &[ClusterMember<'_>],
    grouping: &[Group],
    config: &AnalysisConfig,
) -> Vec<ClusterAssignment> {
    let mut by_group: BTreeMap<usize, Vec<&Scoring>> = BTreeMap::new();
    for (member, group) in members.iter().zip(grouping) {
        if let Group::Regular(id) = group {
            by_group.entry(*id).or_default().push(member.scoring);
        }
    }

    let mut label_ids: BTreeMap<ClusterLabel, usize> = BTreeMap::new();
    let mut named: BTreeMap<usize, ClusterAssignment> = BTreeMap::new();
    for (group_id, scorings) in by_group {
        let (mean, dominant) = profile(&scorings);
        let label = ClusterLabel::from_statistics(class, mean, dominant, &config.risk_thresholds);
        let next_id = label_ids.len();
        let cluster_id = *label_ids.entry(label).or_insert(next_id);
        named.insert(group_id, ClusterAssignment { cluster_id, label });
    }
    let outlier = ClusterAssignment {
        cluster_id: label_ids.len(),
        label: ClusterLabel::OutlierExtremeRisk,
    };

    grouping
        .iter()
        .map(|group| match group {
            Group::Regular(id) => named.get(id).copied().unwrap_or(ClusterAssignment {
                cluster_id: *id,
                label: ClusterLabel::InsufficientData,
            }),
            Group::Outlier => outlier,
        })
        .collect()
}

/// Mean severity and the dimension with the largest mean |z| (first on ties)
fn profile(scorings: &[&Scoring]) -> (f64, Dimension) {
    let n = scorings.len().max(1) as f64;
    let mean = scorings.iter().map(|s| s.severity_score).sum::<f64>() / n;

    let mut dominant = Dimension::Volume;
    let mut dominant_value = f64::NEG_INFINITY;
    for dimension in Dimension::ALL {
        let value = scorings
            .iter()
            .map(|s| s.dimension_z.get(dimension).abs())
            .sum::<f64>()
            / n;
        if value > dominant_value {
            dominant = dimension;
            dominant_value = value;
        }
    }
    (mean, dominant)
}

fn summarize(
    class: AccountClass,
    members: &[ClusterMember<'_>],
    assignments: &[ClusterAssignment],
    config: &AnalysisConfig,
) -> Vec<ClusterSummary> {
    let mut groups: BTreeMap<usize, (ClusterLabel, Vec<&ClusterMember<'_>>)> = BTreeMap::new();
    for (member, assignment) in members.iter().zip(assignments) {
        groups
            .entry(assignment.cluster_id)
            .or_insert_with(|| (assignment.label, Vec::new()))
            .1
            .push(member);
    }

    groups
        .into_iter()
        .map(|(cluster_id, (label, group))| {
            let scorings: Vec<&Scoring> = group.iter().map(|m| m.scoring).collect();
            let (mean_severity, dominant_dimension) = profile(&scorings);
            let severities = scorings.iter().map(|s| s.severity_score);
            let max_severity = severities.clone().fold(f64::NEG_INFINITY, f64::max);
            let min_severity = severities.fold(f64::INFINITY, f64::min);
            let risk_level = label.keyword_risk().unwrap_or_else(|| {
                RiskTier::from_score(mean_severity, &config.risk_thresholds)
            });
            ClusterSummary {
                class,
                cluster_id,
                label,
                size: group.len(),
                mean_severity,
                max_severity,
                min_severity,
                dominant_dimension,
                unique_subjects: group.iter().map(|m| m.subject_id).collect::<BTreeSet<_>>().len(),
                unique_hosts: group.iter().map(|m| m.host_id).collect::<BTreeSet<_>>().len(),
                risk_level,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::event::DimensionVector;

    fn scorings(zs: &[[f64; 4]]) -> Vec<Scoring> {
        zs.iter()
            .map(|z| Scoring::from_z(DimensionVector::new(z[0], z[1], z[2], z[3])))
            .collect()
    }

    fn members(scorings: &[Scoring]) -> Vec<ClusterMember<'_>> {
        scorings
            .iter()
            .enumerate()
            .map(|(i, scoring)| ClusterMember {
                subject_id: if i % 2 == 0 { "alice" } else { "bob" },
                host_id: "ws-01",
                scoring,
            })
            .collect()
    }

    #[test]
    fn test_single_vector_is_insufficient_data() {
        let s = scorings(&[[0.5, 0.0, 0.0, 0.0]; 3]);
        let result = classify_population(AccountClass::Human, &members(&s), &AnalysisConfig::default());
        assert_eq!(result.strategy, ClusterStrategy::Degenerate);
        assert!(result
            .assignments
            .iter()
            .all(|a| a.label == ClusterLabel::InsufficientData));
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].size, 3);
        assert_eq!(result.clusters[0].unique_subjects, 2);
    }

    #[test]
    fn test_empty_population() {
        let result = classify_population(AccountClass::Machine, &[], &AnalysisConfig::default());
        assert!(result.assignments.is_empty());
        assert!(result.clusters.is_empty());
    }

    #[test]
    fn test_extreme_event_gets_its_own_named_cluster() {
        let mut zs = vec![[0.2, 0.1, 0.0, 0.1]; 8];
        zs.push([0.3, 0.0, 0.1, 0.0]);
        zs.push([1.0, 76.0, 2.0, 0.5]);
        let s = scorings(&zs);
        let config = AnalysisConfig {
            human_clusters: 2,
            ..AnalysisConfig::default()
        };
        let result = classify_population(AccountClass::Human, &members(&s), &config);

        let extreme = result.assignments[9];
        assert_eq!(extreme.label, ClusterLabel::CriticalUserBreach);
        assert!(result.assignments[..9]
            .iter()
            .all(|a| a.cluster_id != extreme.cluster_id
                && a.label == ClusterLabel::BaselineUserBehavior));

        let summary = result
            .clusters
            .iter()
            .find(|c| c.cluster_id == extreme.cluster_id)
            .unwrap();
        assert_eq!(summary.size, 1);
        assert_eq!(summary.dominant_dimension, Dimension::HostNovelty);
        assert_eq!(summary.risk_level, RiskTier::Critical);
    }

    #[test]
    fn test_large_population_uses_density_and_flags_outliers() {
        let mut zs: Vec<[f64; 4]> = (0..240)
            .map(|i| [f64::from(i % 4) * 0.01, f64::from(i % 3) * 0.01, 0.0, 0.0])
            .collect();
        zs.push([30.0, 30.0, 30.0, 30.0]);
        zs.push([0.0, 0.0, 0.0, 0.0]);
        let s = scorings(&zs);
        let result = classify_population(AccountClass::Machine, &members(&s), &AnalysisConfig::default());

        assert!(matches!(result.strategy, ClusterStrategy::Density { .. }));
        assert_eq!(result.assignments[240].label, ClusterLabel::OutlierExtremeRisk);
        assert!(result.assignments[..240]
            .iter()
            .all(|a| a.label != ClusterLabel::OutlierExtremeRisk));
        assert_ne!(result.assignments[241].label, ClusterLabel::OutlierExtremeRisk);
    }

    #[test]
    fn test_diffuse_large_population_has_no_extreme_outliers() {
        let spread = |i: u32, step: u32| f64::from((i * step + 7) % 101) / 25.0 - 2.0;
        let zs: Vec<[f64; 4]> = (0..300)
            .map(|i| [spread(i, 37), spread(i, 53), spread(i, 71), spread(i, 89)])
            .collect();
        let s = scorings(&zs);
        let result = classify_population(AccountClass::Human, &members(&s), &AnalysisConfig::default());

        assert!(matches!(result.strategy, ClusterStrategy::Density { .. }));
        assert!(result
            .assignments
            .iter()
            .all(|a| a.label != ClusterLabel::OutlierExtremeRisk));
        assert!(result
            .clusters
            .iter()
            .all(|c| c.risk_level < RiskTier::High));
        assert_eq!(result.clusters.iter().map(|c| c.size).sum::<usize>(), 300);
    }

    #[test]
    fn test_groups_with_the_same_label_are_merged() {
        let zs: Vec<[f64; 4]> = (0..40)
            .map(|i| {
                let x = f64::from(i);
                [(x % 5.0) * 0.5, (x % 7.0) * 0.3, (x % 3.0) * 0.4, 0.0]
            })
            .collect();
        let s = scorings(&zs);
        let result = classify_population(AccountClass::Human, &members(&s), &AnalysisConfig::default());

        assert_eq!(result.strategy, ClusterStrategy::Centroid { k: 4 });
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].cluster_id, 0);
        assert_eq!(result.clusters[0].label, ClusterLabel::BaselineUserBehavior);
        assert_eq!(result.clusters[0].size, 40);
        assert!(result.assignments.iter().all(|a| a.cluster_id == 0));
    }

    #[test]
    fn test_repeatable_labels() {
        let zs: Vec<[f64; 4]> = (0..50)
            .map(|i| {
                let x = f64::from(i);
                [x % 5.0, (x * 1.7) % 3.0, x % 2.0, 25.0 - x % 9.0]
            })
            .collect();
        let s = scorings(&zs);
        let config = AnalysisConfig::default();
        let a = classify_population(AccountClass::Machine, &members(&s), &config);
        let b = classify_population(AccountClass::Machine, &members(&s), &config);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
