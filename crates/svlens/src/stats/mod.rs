//! Pure numeric helpers behind field metadata and chart data.
//!
//! Every function is stateless and ignores non-finite input values. Only
//! [`quantile`] and [`quantiles`] fail on empty input; everything else
//! returns an empty or zeroed structure.

mod counting;
mod density;
mod histogram;
mod summary;

pub use counting::value_counts;
pub use density::{DEFAULT_GRID_POINTS, DensityCurve, gaussian_kde, scott_bandwidth};
pub use histogram::{Bin, Histogram, Normalization, bin_edges, histogram, histogram_log, log_spaced_edges};
pub use summary::{BoxplotStats, boxplot_stats, mean, min_max, quantile, quantiles, std_dev};
