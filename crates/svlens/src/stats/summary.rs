//! Order statistics and moments.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvLensError};

/// Five-number summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxplotStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Number of finite values summarized; zero means every field is zero.
    pub count: usize,
}

impl BoxplotStats {
    /// `[min, q1, median, q3, max]`.
    pub fn to_array(&self) -> [f64; 5] {
        [self.min, self.q1, self.median, self.q3, self.max]
    }
}

/// Finite values, sorted ascending.
fn sorted_finite(data: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear interpolation between order statistics at `h = (n - 1) * p`.
fn interpolate(sorted: &[f64], p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn check_probability(p: f64) -> Result<()> {
    if p.is_nan() {
        return Err(SvLensError::InvalidArgument(
            "quantile probability is NaN".to_string(),
        ));
    }
    Ok(())
}

/// Quantile of `data` at probability `p`.
///
/// Non-finite values are ignored and `p` is clamped to `[0, 1]`. The
/// quantile of an empty sample is undefined and returns
/// [`SvLensError::EmptyData`].
pub fn quantile(data: &[f64], p: f64) -> Result<f64> {
    check_probability(p)?;
    let sorted = sorted_finite(data);
    if sorted.is_empty() {
        return Err(SvLensError::EmptyData(
            "quantile of an empty sample is undefined".to_string(),
        ));
    }
    Ok(interpolate(&sorted, p))
}

/// Several quantiles from a single sort. Same rules as [`quantile`].
pub fn quantiles(data: &[f64], probabilities: &[f64]) -> Result<Vec<f64>> {
    for p in probabilities {
        check_probability(*p)?;
    }
    let sorted = sorted_finite(data);
    if sorted.is_empty() {
        return Err(SvLensError::EmptyData(
            "quantiles of an empty sample are undefined".to_string(),
        ));
    }
    Ok(probabilities.iter().map(|p| interpolate(&sorted, *p)).collect())
}

/// `[min, Q1, median, Q3, max]` of the finite values in `data`.
pub fn boxplot_stats(data: &[f64]) -> BoxplotStats {
    let sorted = sorted_finite(data);
    if sorted.is_empty() {
        return BoxplotStats::default();
    }
    BoxplotStats {
        min: sorted[0],
        q1: interpolate(&sorted, 0.25),
        median: interpolate(&sorted, 0.5),
        q3: interpolate(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
        count: sorted.len(),
    }
}

/// Smallest and largest finite values, by a single iterative scan.
pub fn min_max(data: &[f64]) -> Option<(f64, f64)> {
    let mut bounds: Option<(f64, f64)> = None;
    for &v in data.iter().filter(|v| v.is_finite()) {
        bounds = match bounds {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        };
    }
    bounds
}

/// Arithmetic mean of the finite values.
pub fn mean(data: &[f64]) -> Option<f64> {
    welford(data).map(|(_, mean, _)| mean)
}

/// Sample standard deviation (n - 1 denominator) of the finite values.
/// A single value has zero spread.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    welford(data).map(|(count, _, m2)| {
        if count < 2 {
            0.0
        } else {
            (m2 / (count - 1) as f64).sqrt()
        }
    })
}

/// Welford's online mean/variance: `(count, mean, m2)`.
fn welford(data: &[f64]) -> Option<(usize, f64, f64)> {
    let mut count = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for &value in data.iter().filter(|v| v.is_finite()) {
        count += 1;
        let delta = value - mean;
        mean += delta / count as f64;
        m2 += delta * (value - mean);
    }
    (count > 0).then_some((count, mean, m2))
}
