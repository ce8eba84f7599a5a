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

//! Density pass separating isolated points from the dense population.

use super::distance::{Point, WeightedEuclidean};
use rayon::prelude::*;

/// Mark each point as dense (`true`) or isolated.
///
/// A core point has at least `min_samples` other points within `eps`.
/// Core points and every point within `eps` of one are dense; the rest are
/// outliers.
pub fn dense_mask(points: &[Point], eps: f64, min_samples: usize, metric: &WeightedEuclidean) -> Vec<bool> {
    profiling::scope!("density::dense_mask");
    let within = |a: &Point, b: &Point| metric.distance(a, b) <= eps;

    let core: Vec<bool> = points
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            points
                .iter()
                .enumerate()
                .filter(|&(j, other)| i != j && within(point, other))
                .count()
                >= min_samples
        })
        .collect();

    points
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            core[i]
                || points
                    .iter()
                    .zip(&core)
                    .any(|(other, &is_core)| is_core && within(point, other))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::event::DimensionVector;

    #[test]
    fn test_isolated_point_is_outlier() {
        let metric = WeightedEuclidean::new(&DimensionVector::new(1.0, 1.0, 1.0, 1.0));
        let mut points: Vec<Point> = (0..12).map(|i| [f64::from(i) * 0.01, 0.0, 0.0, 0.0]).collect();
        // Border point: near one core point but without enough neighbours itself
        points.push([0.35, 0.0, 0.0, 0.0]);
        points.push([1.0, 1.0, 1.0, 1.0]);

        let mask = dense_mask(&points, 0.3, 10, &metric);
        assert!(mask[..12].iter().all(|&dense| dense));
        assert!(mask[12]);
        assert!(!mask[13]);
    }
}
