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

//! Per-class baseline statistics and z-score normalization.
//!
//! The table is computed once, before any event is scored, and handed to
//! the scorer by reference.

use crate::error::{AnalysisError, AnalysisResult};
use crate::parser::event::{AccountClass, Dimension, DimensionVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// z-scores are rounded to this step so repeated runs serialize identically
pub const Z_EPSILON: f64 = 1e-6;

pub fn round_to_epsilon(value: f64) -> f64 {
    let rounded = (value / Z_EPSILON).round() * Z_EPSILON;
    // Avoid emitting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub mean: f64,
    /// Deviation used for normalization, already floored
    pub std_dev: f64,
    /// True when the raw deviation was below the floor
    pub floored: bool,
}

/// Mean and deviation per dimension for one reference population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBaseline {
    pub population: usize,
    pub stats: [DimensionStats; 4],
}

impl ClassBaseline {
    /// Population statistics (σ divides by n) over `counters`
    pub fn compute(
        class: Option<AccountClass>,
        counters: &[DimensionVector],
        sigma_floor: f64,
    ) -> AnalysisResult<Self> {
        let n = counters.len();
        if n < 2 {
            return Err(AnalysisError::DegenerateBaseline {
                class,
                population: n,
            });
        }

        let stats = Dimension::ALL.map(|dimension| {
            let mean = counters.iter().map(|c| c.get(dimension)).sum::<f64>() / n as f64;
            let variance = counters
                .iter()
                .map(|c| (c.get(dimension) - mean).powi(2))
                .sum::<f64>()
                / n as f64;
            let raw = variance.sqrt();
            DimensionStats {
                mean,
                std_dev: raw.max(sigma_floor),
                floored: raw < sigma_floor,
            }
        });

        Ok(Self {
            population: n,
            stats,
        })
    }

    pub const fn stats(&self, dimension: Dimension) -> &DimensionStats {
        &self.stats[dimension.index()]
    }

    /// Signed deviation count per dimension
    pub fn z_scores(&self, counters: &DimensionVector) -> DimensionVector {
        DimensionVector::from_fn(|dimension| {
            let stats = self.stats(dimension);
            round_to_epsilon((counters.get(dimension) - stats.mean) / stats.std_dev)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// The class's own population
    Class,
    /// Both classes pooled, used when the class alone is degenerate
    Combined,
    /// Provided by the caller
    Supplied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BaselineEntry {
    Ready {
        source: BaselineSource,
        baseline: ClassBaseline,
    },
    Unavailable {
        reason: String,
    },
}

/// A recognized event's contribution to the baseline
#[derive(Debug, Clone, Copy)]
pub struct BaselineMember<'a> {
    pub class: AccountClass,
    pub timestamp: DateTime<Utc>,
    pub counters: &'a DimensionVector,
}

/// Immutable μ/σ table, one entry per account class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineTable {
    entries: BTreeMap<AccountClass, BaselineEntry>,
}

impl BaselineTable {
    /// Build from caller-provided baselines; missing classes stay unavailable
    pub fn supplied(machine: Option<ClassBaseline>, human: Option<ClassBaseline>) -> Self {
        let mut entries = BTreeMap::new();
        for (class, baseline) in [
            (AccountClass::Machine, machine),
            (AccountClass::Human, human),
        ] {
            let entry = baseline.map_or_else(
                || BaselineEntry::Unavailable {
                    reason: format!("no baseline supplied for {class} accounts"),
                },
                |baseline| BaselineEntry::Ready {
                    source: BaselineSource::Supplied,
                    baseline,
                },
            );
            entries.insert(class, entry);
        }
        Self { entries }
    }

    /// Compute every class's baseline from the recognized population.
    ///
    /// With a `window`, only the N oldest members of each class contribute.
    /// A degenerate class falls back to the pooled population.
    pub fn from_population(
        members: &[BaselineMember<'_>],
        window: Option<usize>,
        sigma_floor: f64,
    ) -> Self {
        profiling::scope!("BaselineTable::from_population");
        let mut entries = BTreeMap::new();
        let pooled = || {
            let all: Vec<&BaselineMember<'_>> = members.iter().collect();
            ClassBaseline::compute(None, &windowed(all, window), sigma_floor)
        };

        for class in AccountClass::ALL {
            let in_class: Vec<&BaselineMember<'_>> =
                members.iter().filter(|m| m.class == class).collect();
            let own = ClassBaseline::compute(Some(class), &windowed(in_class, window), sigma_floor);

            let entry = match own {
                Ok(baseline) => BaselineEntry::Ready {
                    source: BaselineSource::Class,
                    baseline,
                },
                Err(class_err) => {
                    tracing::warn!("{class_err}; falling back to combined baseline");
                    match pooled() {
                        Ok(baseline) => BaselineEntry::Ready {
                            source: BaselineSource::Combined,
                            baseline,
                        },
                        Err(pooled_err) => {
                            tracing::warn!("{pooled_err}; {class} events stay unscored");
                            BaselineEntry::Unavailable {
                                reason: class_err.to_string(),
                            }
                        }
                    }
                }
            };

            if let BaselineEntry::Ready { source, baseline } = &entry {
                tracing::debug!(
                    "Baseline for {class} accounts from {:?} population of {}",
                    source,
                    baseline.population
                );
            }
            entries.insert(class, entry);
        }

        Self { entries }
    }

    pub fn entry(&self, class: AccountClass) -> Option<&BaselineEntry> {
        self.entries.get(&class)
    }

    pub fn baseline(&self, class: AccountClass) -> Option<&ClassBaseline> {
        match self.entries.get(&class) {
            Some(BaselineEntry::Ready { baseline, .. }) => Some(baseline),
            _ => None,
        }
    }
}

/// Order members by time (input order breaks ties) and keep the oldest `window`
fn windowed(mut members: Vec<&BaselineMember<'_>>, window: Option<usize>) -> Vec<DimensionVector> {
    if let Some(limit) = window {
        members.sort_by_key(|m| m.timestamp);
        members.truncate(limit);
    }
    members.iter().map(|m| *m.counters).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 25, 10, minute, 0).unwrap()
    }

    fn volumes(values: &[f64]) -> Vec<DimensionVector> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| DimensionVector::new(v, i as f64, (i * i) as f64, 1.0))
            .collect()
    }

    #[test]
    fn test_population_statistics() {
        let counters = volumes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let baseline = ClassBaseline::compute(Some(AccountClass::Human), &counters, 1e-6).unwrap();
        let volume = baseline.stats(Dimension::Volume);
        assert_eq!(volume.mean, 5.0);
        assert_eq!(volume.std_dev, 2.0);
        assert!(!volume.floored);
        // Constant dimension is floored
        assert!(baseline.stats(Dimension::ProcessNovelty).floored);
    }

    #[test]
    fn test_z_scores_have_zero_mean_unit_sigma() {
        let counters = volumes(&[1.0, 3.0, 8.0, 2.0, 11.0, 4.0, 6.0, 0.0, 9.0, 5.0]);
        let baseline = ClassBaseline::compute(Some(AccountClass::Machine), &counters, 1e-6).unwrap();
        let zs: Vec<DimensionVector> = counters.iter().map(|c| baseline.z_scores(c)).collect();

        for dimension in [Dimension::Volume, Dimension::HostNovelty, Dimension::NetworkNovelty] {
            let n = zs.len() as f64;
            let mean = zs.iter().map(|z| z.get(dimension)).sum::<f64>() / n;
            let var = zs.iter().map(|z| (z.get(dimension) - mean).powi(2)).sum::<f64>() / n;
            assert!(mean.abs() < 1e-4, "{dimension:?} mean {mean}");
            assert!((var.sqrt() - 1.0).abs() < 1e-4, "{dimension:?} sigma {}", var.sqrt());
        }
    }

    #[test]
    fn test_degenerate_population() {
        let counters = volumes(&[1.0]);
        let err = ClassBaseline::compute(Some(AccountClass::Human), &counters, 1e-6).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DegenerateBaseline {
                class: Some(AccountClass::Human),
                population: 1
            }
        );
    }

    #[test]
    fn test_constant_dimension_does_not_divide_by_zero() {
        let counters = vec![DimensionVector::new(3.0, 0.0, 0.0, 0.0); 4];
        let baseline = ClassBaseline::compute(None, &counters, 1e-6).unwrap();
        let z = baseline.z_scores(&DimensionVector::new(3.0, 0.0, 0.0, 0.0));
        assert_eq!(z, DimensionVector::default());
        assert!(z.volume.is_finite());
    }

    #[test]
    fn test_degenerate_class_falls_back_to_combined() {
        let machine = [DimensionVector::new(10.0, 0.0, 0.0, 0.0)];
        let human = volumes(&[1.0, 2.0, 3.0]);
        let mut members = vec![BaselineMember {
            class: AccountClass::Machine,
            timestamp: ts(0),
            counters: &machine[0],
        }];
        members.extend(human.iter().enumerate().map(|(i, c)| BaselineMember {
            class: AccountClass::Human,
            timestamp: ts(i as u32 + 1),
            counters: c,
        }));

        let table = BaselineTable::from_population(&members, None, 1e-6);
        assert!(matches!(
            table.entry(AccountClass::Machine),
            Some(BaselineEntry::Ready {
                source: BaselineSource::Combined,
                ..
            })
        ));
        assert_eq!(table.baseline(AccountClass::Machine).unwrap().population, 4);
        assert_eq!(table.baseline(AccountClass::Human).unwrap().population, 3);
    }

    #[test]
    fn test_unavailable_when_everything_degenerate() {
        let single = [DimensionVector::new(1.0, 0.0, 0.0, 0.0)];
        let members = [BaselineMember {
            class: AccountClass::Human,
            timestamp: ts(0),
            counters: &single[0],
        }];
        let table = BaselineTable::from_population(&members, None, 1e-6);
        assert!(table.baseline(AccountClass::Human).is_none());
        assert!(matches!(
            table.entry(AccountClass::Machine),
            Some(BaselineEntry::Unavailable { .. })
        ));
    }

    #[test]
    fn test_window_keeps_oldest_members() {
        let counters = volumes(&[100.0, 1.0, 3.0]);
        // The outlier is the newest event and must stay out of a 2-event window
        let stamps = [ts(30), ts(1), ts(2)];
        let members: Vec<BaselineMember<'_>> = counters
            .iter()
            .zip(stamps)
            .map(|(c, t)| BaselineMember {
                class: AccountClass::Human,
                timestamp: t,
                counters: c,
            })
            .collect();
        let table = BaselineTable::from_population(&members, Some(2), 1e-6);
        let baseline = table.baseline(AccountClass::Human).unwrap();
        assert_eq!(baseline.population, 2);
        assert_eq!(baseline.stats(Dimension::Volume).mean, 2.0);
    }

    #[test]
    fn test_round_to_epsilon() {
        assert_eq!(round_to_epsilon(-0.000_000_1), 0.0);
        assert!((round_to_epsilon(1.234_567_89) - 1.234_568).abs() < 1e-12);
    }
}
