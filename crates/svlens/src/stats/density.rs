//! Gaussian kernel density estimation.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::summary::{min_max, std_dev};

/// Grid size used when callers have no preference.
pub const DEFAULT_GRID_POINTS: usize = 512;

/// Fraction of the data range added on each side of the grid.
const GRID_PADDING: f64 = 0.1;

/// Density evaluated over an evenly spaced grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DensityCurve {
    pub grid: Vec<f64>,
    pub density: Vec<f64>,
    pub bandwidth: f64,
}

impl DensityCurve {
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }
}

/// Scott's rule, `1.06 * sigma * n^-0.2`, or 1 when the data has no spread.
pub fn scott_bandwidth(data: &[f64]) -> f64 {
    let n = data.iter().filter(|v| v.is_finite()).count();
    match std_dev(data) {
        Some(sigma) if n > 1 && sigma > 0.0 => 1.06 * sigma * (n as f64).powf(-0.2),
        _ => 1.0,
    }
}

/// Gaussian KDE of the finite values in `data`.
///
/// Without a usable bandwidth, Scott's rule is applied. The grid spans the
/// data range widened by 10% on each side (by one bandwidth when the range
/// is zero). Empty input yields an empty curve.
pub fn gaussian_kde(data: &[f64], bandwidth: Option<f64>, grid_points: usize) -> DensityCurve {
    let values: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    let Some((lo, hi)) = min_max(&values) else {
        return DensityCurve::default();
    };
    if grid_points == 0 {
        return DensityCurve::default();
    }

    let h = bandwidth
        .filter(|b| b.is_finite() && *b > 0.0)
        .unwrap_or_else(|| scott_bandwidth(&values));

    let span = hi - lo;
    let pad = if span > 0.0 { span * GRID_PADDING } else { h };
    let (start, end) = (lo - pad, hi + pad);

    let grid: Vec<f64> = if grid_points == 1 {
        vec![(start + end) / 2.0]
    } else {
        let step = (end - start) / (grid_points - 1) as f64;
        (0..grid_points).map(|i| start + step * i as f64).collect()
    };

    let norm = 1.0 / (values.len() as f64 * h * (2.0 * PI).sqrt());
    let density = grid
        .iter()
        .map(|x| {
            let sum: f64 = values
                .iter()
                .map(|xi| {
                    let z = (x - xi) / h;
                    (-0.5 * z * z).exp()
                })
                .sum();
            sum * norm
        })
        .collect();

    DensityCurve {
        grid,
        density,
        bandwidth: h,
    }
}
