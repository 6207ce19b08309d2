//! Histogram binning over equal-width or caller-supplied edges.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SvLensError};

use super::summary::min_max;

/// How bin heights are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Raw counts.
    #[default]
    None,
    /// Share of the binned values, summing to 100.
    Percent,
    /// Share of the binned values, summing to 1.
    Probability,
}

impl Normalization {
    fn apply(&self, count: usize, total: usize) -> f64 {
        match self {
            Normalization::None => count as f64,
            _ if total == 0 => 0.0,
            Normalization::Percent => count as f64 / total as f64 * 100.0,
            Normalization::Probability => count as f64 / total as f64,
        }
    }
}

/// One histogram bin, `[start, end)` except the last which is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
    /// Height after normalization.
    pub value: f64,
}

/// Binned distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<Bin>,
    /// Values that fell into a bin.
    pub total: usize,
    pub normalization: Normalization,
}

impl Histogram {
    fn from_counts(edges: &[f64], counts: Vec<usize>, normalization: Normalization) -> Self {
        let total: usize = counts.iter().sum();
        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| Bin {
                start: edges[i],
                end: edges[i + 1],
                count,
                value: normalization.apply(count, total),
            })
            .collect();
        Self {
            bins,
            total,
            normalization,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bin edges, one more than the number of bins.
    pub fn edges(&self) -> Vec<f64> {
        let mut edges: Vec<f64> = self.bins.iter().map(|b| b.start).collect();
        if let Some(last) = self.bins.last() {
            edges.push(last.end);
        }
        edges
    }

    /// Normalized bin heights.
    pub fn values(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.value).collect()
    }
}

/// `count + 1` equal-width edges from `min` to `max`.
///
/// Depends only on its three arguments, so edges are reproducible. The last
/// edge is exactly `max`.
pub fn bin_edges(min: f64, max: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let width = (max - min) / count as f64;
    (0..=count)
        .map(|i| if i == count { max } else { min + width * i as f64 })
        .collect()
}

/// `count + 1` geometrically spaced edges from `min` to `max`.
/// Empty unless `0 < min < max`.
pub fn log_spaced_edges(min: f64, max: f64, count: usize) -> Vec<f64> {
    if count == 0 || !(min > 0.0 && max > min) || !max.is_finite() {
        return Vec::new();
    }
    let (lo, hi) = (min.log10(), max.log10());
    let step = (hi - lo) / count as f64;
    (0..=count)
        .map(|i| {
            if i == 0 {
                min
            } else if i == count {
                max
            } else {
                10f64.powf(lo + step * i as f64)
            }
        })
        .collect()
}

/// Equal-width histogram of the finite values in `data`.
///
/// All-equal input yields one bin `[v - 0.5, v + 0.5]`. Empty input or
/// zero bins yields no bins.
pub fn histogram(data: &[f64], num_bins: usize, normalization: Normalization) -> Histogram {
    let empty = Histogram {
        normalization,
        ..Histogram::default()
    };
    if num_bins == 0 {
        return empty;
    }
    let Some((lo, hi)) = min_max(data) else {
        return empty;
    };
    let finite = data.iter().copied().filter(|v| v.is_finite());

    if lo == hi {
        let count = finite.count();
        return Histogram::from_counts(&[lo - 0.5, lo + 0.5], vec![count], normalization);
    }

    let edges = bin_edges(lo, hi, num_bins);
    let width = (hi - lo) / num_bins as f64;
    let mut counts = vec![0usize; num_bins];
    for v in finite {
        let idx = (((v - lo) / width).floor() as usize).min(num_bins - 1);
        counts[idx] += 1;
    }
    Histogram::from_counts(&edges, counts, normalization)
}

/// Histogram of `|x|` over caller-supplied ascending edges.
///
/// Values outside the edges are not counted and normalization is relative
/// to the binned values.
pub fn histogram_log(data: &[f64], edges: &[f64], normalization: Normalization) -> Result<Histogram> {
    if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SvLensError::InvalidArgument(
            "histogram edges must be finite and strictly ascending".to_string(),
        ));
    }
    if edges.len() < 2 {
        return Ok(Histogram {
            normalization,
            ..Histogram::default()
        });
    }

    let first = edges[0];
    let last = edges[edges.len() - 1];
    let mut counts = vec![0usize; edges.len() - 1];
    for v in data.iter().filter(|v| v.is_finite()).map(|v| v.abs()) {
        if v < first || v > last {
            continue;
        }
        let idx = if v == last {
            counts.len() - 1
        } else {
            edges.partition_point(|e| *e <= v) - 1
        };
        counts[idx] += 1;
    }
    Ok(Histogram::from_counts(edges, counts, normalization))
}
