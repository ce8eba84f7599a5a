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

//! Deterministic k-means with farthest-point seeding.

use super::distance::{Point, WeightedEuclidean};
use rayon::prelude::*;

pub const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    /// Centroid index per input point
    pub assignments: Vec<usize>,
    pub centroids: Vec<Point>,
    pub iterations: usize,
}

/// Partition `points` into at most `k` groups.
///
/// Seeding starts from the first point and repeatedly adds the point farthest
/// from every chosen centroid, so fewer than `k` groups come back when the
/// population has fewer distinct points. Ties always go to the lower index.
pub fn fit(points: &[Point], k: usize, metric: &WeightedEuclidean) -> KMeans {
    profiling::scope!("kmeans::fit");
    let mut centroids = seed(points, k, metric);
    if centroids.is_empty() {
        return KMeans {
            assignments: Vec::new(),
            centroids,
            iterations: 0,
        };
    }

    let mut assignments = assign(points, &centroids, metric);
    let mut iterations = 1;
    while iterations < MAX_ITERATIONS {
        update_centroids(points, &assignments, &mut centroids);
        let next = assign(points, &centroids, metric);
        iterations += 1;
        if next == assignments {
            break;
        }
        assignments = next;
    }

    tracing::trace!(
        "k-means converged after {iterations} iterations with {} centroids",
        centroids.len()
    );
    KMeans {
        assignments,
        centroids,
        iterations,
    }
}

fn seed(points: &[Point], k: usize, metric: &WeightedEuclidean) -> Vec<Point> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut centroids = vec![*first];
    let mut nearest: Vec<f64> = points.iter().map(|p| metric.squared(p, first)).collect();

    while centroids.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for (index, &distance) in nearest.iter().enumerate() {
            if distance > best.map_or(0.0, |(_, d)| d) {
                best = Some((index, distance));
            }
        }
        // Every remaining point coincides with a centroid
        let Some((index, _)) = best else {
            break;
        };
        let chosen = points[index];
        centroids.push(chosen);
        for (slot, point) in nearest.iter_mut().zip(points) {
            *slot = slot.min(metric.squared(point, &chosen));
        }
    }
    centroids
}

fn assign(points: &[Point], centroids: &[Point], metric: &WeightedEuclidean) -> Vec<usize> {
    points
        .par_iter()
        .map(|point| nearest_centroid(point, centroids, metric))
        .collect()
}

pub fn nearest_centroid(point: &Point, centroids: &[Point], metric: &WeightedEuclidean) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = metric.squared(point, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Empty clusters keep their previous centroid
fn update_centroids(points: &[Point], assignments: &[usize], centroids: &mut [Point]) {
    let mut sums = vec![[0.0; 4]; centroids.len()];
    let mut counts = vec![0_usize; centroids.len()];
    for (point, &cluster) in points.iter().zip(assignments) {
        counts[cluster] += 1;
        for (sum, value) in sums[cluster].iter_mut().zip(point) {
            *sum += value;
        }
    }
    for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
        if count > 0 {
            *centroid = sum.map(|s| s / count as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::event::DimensionVector;

    fn metric() -> WeightedEuclidean {
        WeightedEuclidean::new(&DimensionVector::new(1.0, 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_two_obvious_groups() {
        let points = [
            [0.0, 0.0, 0.0, 0.0],
            [0.1, 0.0, 0.0, 0.0],
            [0.0, 0.1, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
            [0.9, 1.0, 1.0, 1.0],
        ];
        let result = fit(&points, 2, &metric());
        assert_eq!(result.centroids.len(), 2);
        assert_eq!(result.assignments, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_k_capped_by_distinct_points() {
        let points = [[1.0; 4], [1.0; 4], [0.0; 4], [0.0; 4]];
        let result = fit(&points, 5, &metric());
        assert_eq!(result.centroids.len(), 2);
        assert_eq!(result.assignments, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_empty_population() {
        let result = fit(&[], 3, &metric());
        assert!(result.assignments.is_empty());
        assert!(result.centroids.is_empty());
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        let centroids = [[0.0; 4], [2.0, 0.0, 0.0, 0.0]];
        assert_eq!(nearest_centroid(&[1.0, 0.0, 0.0, 0.0], &centroids, &metric()), 0);
    }

    #[test]
    fn test_repeatable() {
        let points: Vec<Point> = (0..60)
            .map(|i| {
                let x = f64::from(i % 7);
                [x, f64::from(i % 3), x * 0.5, f64::from(i % 11)]
            })
            .collect();
        let a = fit(&points, 4, &metric());
        let b = fit(&points, 4, &metric());
        assert_eq!(a, b);
    }
}
