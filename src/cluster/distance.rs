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

//! Feature scaling and the weighted distance used by both cluster strategies.

use crate::parser::event::DimensionVector;

pub type Point = [f64; 4];

/// Euclidean distance with a per-dimension weight on the squared difference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEuclidean {
    weights: Point,
}

impl WeightedEuclidean {
    pub const fn new(weights: &DimensionVector) -> Self {
        Self {
            weights: weights.to_array(),
        }
    }

    pub fn distance(&self, a: &Point, b: &Point) -> f64 {
        self.squared(a, b).sqrt()
    }

    /// Squared distance, enough for nearest-centroid comparisons
    pub fn squared(&self, a: &Point, b: &Point) -> f64 {
        a.iter()
            .zip(b)
            .zip(&self.weights)
            .map(|((x, y), w)| w * (x - y).powi(2))
            .sum()
    }
}

/// Rescale every dimension to [0, 1] over the population.
/// A constant dimension maps to 0.
pub fn min_max_scale(points: &[Point]) -> Vec<Point> {
    let mut low = [f64::INFINITY; 4];
    let mut high = [f64::NEG_INFINITY; 4];
    for point in points {
        for (d, &value) in point.iter().enumerate() {
            low[d] = low[d].min(value);
            high[d] = high[d].max(value);
        }
    }

    points
        .iter()
        .map(|point| {
            std::array::from_fn(|d| {
                let range = high[d] - low[d];
                if range > 0.0 {
                    (point[d] - low[d]) / range
                } else {
                    0.0
                }
            })
        })
        .collect()
}

/// Number of bitwise-distinct points
pub fn distinct_count(points: &[Point]) -> usize {
    let mut keys: Vec<[u64; 4]> = points.iter().map(|p| p.map(f64::to_bits)).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_apply_to_squared_difference() {
        let metric = WeightedEuclidean::new(&DimensionVector::new(1.0, 4.0, 1.0, 1.0));
        let a = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(metric.distance(&a, &[1.0, 0.0, 0.0, 0.0]), 1.0);
        assert_eq!(metric.distance(&a, &[0.0, 1.0, 0.0, 0.0]), 2.0);
    }

    #[test]
    fn test_min_max_scale() {
        let scaled = min_max_scale(&[[0.0, 5.0, 1.0, 2.0], [10.0, 5.0, 3.0, 2.0], [5.0, 5.0, 2.0, 2.0]]);
        assert_eq!(scaled[0], [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(scaled[1], [1.0, 0.0, 1.0, 0.0]);
        assert_eq!(scaled[2], [0.5, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_distinct_count() {
        assert_eq!(distinct_count(&[]), 0);
        assert_eq!(distinct_count(&[[1.0; 4], [1.0; 4]]), 1);
        assert_eq!(distinct_count(&[[1.0; 4], [1.0, 1.0, 1.0, 2.0]]), 2);
    }
}
