//! Chart-ready aggregates over a record set.
//!
//! Nothing here is persisted; every aggregate is recomputed from the
//! records it is given.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, HandlerRegistry};
use crate::input::VariantRecord;
use crate::stats::{
    DEFAULT_GRID_POINTS, DensityCurve, Histogram, Normalization, gaussian_kde, histogram,
    histogram_log, log_spaced_edges, quantiles, value_counts,
};

/// Bins used by distribution charts.
pub const DISTRIBUTION_BINS: usize = 50;

/// Percentile window applied before binning.
pub const PERCENTILE_WINDOW: (f64, f64) = (0.05, 0.95);

/// Records supporting each caller, counting a caller once per record.
/// Most frequent first.
pub fn count_callers<R: Borrow<VariantRecord>>(
    records: &[R],
    registry: &HandlerRegistry,
    dialect: Dialect,
) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in records {
        for caller in registry.callers(record.borrow(), dialect) {
            *counts.entry(caller).or_insert(0) += 1;
        }
    }
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts
}

/// Records grouped by how many callers support them, broken down by caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerCombinations {
    /// Every caller seen, most supporting records first.
    pub callers: Vec<String>,
    /// Number of callers per record to caller to record count.
    pub by_caller_count: BTreeMap<usize, IndexMap<String, usize>>,
}

impl CallerCombinations {
    /// Sum of the per-caller counts for one group.
    pub fn group_total(&self, caller_count: usize) -> usize {
        self.by_caller_count
            .get(&caller_count)
            .map_or(0, |row| row.values().sum())
    }
}

/// Build the caller-count × caller table.
///
/// Group size comes from the duplicate-preserving caller list, so a caller
/// reported twice on one record counts toward a larger group.
pub fn caller_combinations<R: Borrow<VariantRecord>>(
    records: &[R],
    registry: &HandlerRegistry,
    dialect: Dialect,
) -> CallerCombinations {
    let callers: Vec<String> = count_callers(records, registry, dialect).into_keys().collect();

    let mut by_caller_count: BTreeMap<usize, IndexMap<String, usize>> = BTreeMap::new();
    for record in records {
        let record = record.borrow();
        let raw = registry.callers_with_duplicates(record, dialect);
        if raw.is_empty() {
            continue;
        }
        let row = by_caller_count.entry(raw.len()).or_insert_with(|| {
            callers.iter().map(|c| (c.clone(), 0)).collect()
        });
        for caller in registry.callers(record, dialect) {
            *row.entry(caller).or_insert(0) += 1;
        }
    }

    CallerCombinations {
        callers,
        by_caller_count,
    }
}

/// Records per exact set of supporting callers, keyed by the sorted,
/// comma-joined set. Most frequent first.
pub fn exact_caller_sets<R: Borrow<VariantRecord>>(
    records: &[R],
    registry: &HandlerRegistry,
    dialect: Dialect,
) -> IndexMap<String, usize> {
    let mut sets: IndexMap<String, usize> = IndexMap::new();
    for record in records {
        let callers = registry.callers(record.borrow(), dialect);
        if callers.is_empty() {
            continue;
        }
        *sets.entry(callers.join(",")).or_insert(0) += 1;
    }
    sets.sort_by(|_, a, _, b| b.cmp(a));
    sets
}

/// Values inside the 5th–95th percentile window, with the window.
fn percentile_window(values: &[f64]) -> Option<((f64, f64), Vec<f64>)> {
    let bounds = quantiles(values, &[PERCENTILE_WINDOW.0, PERCENTILE_WINDOW.1]).ok()?;
    let (lower, upper) = (bounds[0], bounds[1]);
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect();
    Some(((lower, upper), kept))
}

/// SV length distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeDistribution {
    /// Percentile window applied, if any lengths were present.
    pub window: Option<(f64, f64)>,
    /// Lengths inside the window.
    pub count: usize,
    /// Equal-width percent histogram.
    pub histogram: Histogram,
    /// Percent histogram over log-spaced edges.
    pub log_histogram: Histogram,
}

/// Distribution of |SVLEN|, excluding zero-length translocations.
pub fn size_distribution<R: Borrow<VariantRecord>>(records: &[R]) -> SizeDistribution {
    let lengths: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            let r: &VariantRecord = r.borrow();
            let len = r.sv_len()?;
            let translocation = r.sv_type().is_some_and(|t| t == "TRA");
            (!(len == 0 && translocation)).then_some(len as f64)
        })
        .collect();

    let Some((window, kept)) = percentile_window(&lengths) else {
        return SizeDistribution::default();
    };

    let smallest_positive = kept
        .iter()
        .copied()
        .filter(|v| *v > 0.0)
        .fold(f64::INFINITY, f64::min);
    let edges = log_spaced_edges(smallest_positive, window.1, DISTRIBUTION_BINS);
    let log_histogram =
        histogram_log(&kept, &edges, Normalization::Percent).unwrap_or_default();

    SizeDistribution {
        window: Some(window),
        count: kept.len(),
        histogram: histogram(&kept, DISTRIBUTION_BINS, Normalization::Percent),
        log_histogram,
    }
}

/// QUAL distribution with an optional density overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub window: Option<(f64, f64)>,
    pub count: usize,
    pub histogram: Histogram,
    /// Density scaled to the histogram's percent axis; present only when
    /// more than one distinct value is inside the window.
    pub density: Option<DensityCurve>,
}

/// Distribution of QUAL inside the 5th–95th percentile window.
pub fn quality_distribution<R: Borrow<VariantRecord>>(records: &[R]) -> QualityDistribution {
    let qualities: Vec<f64> = records
        .iter()
        .filter_map(|r| r.borrow().quality)
        .collect();

    let Some((window, kept)) = percentile_window(&qualities) else {
        return QualityDistribution::default();
    };

    let hist = histogram(&kept, DISTRIBUTION_BINS, Normalization::Percent);
    let distinct = kept.iter().any(|v| *v != kept[0]);
    let density = (distinct && !kept.is_empty()).then(|| {
        let mut curve = gaussian_kde(&kept, None, DEFAULT_GRID_POINTS);
        let bin_width = (window.1 - window.0) / DISTRIBUTION_BINS as f64;
        for y in &mut curve.density {
            *y *= bin_width * 100.0;
        }
        curve
    });

    QualityDistribution {
        window: Some(window),
        count: kept.len(),
        histogram: hist,
        density,
    }
}

/// Every chart aggregate for one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub sv_types: IndexMap<String, usize>,
    pub caller_counts: IndexMap<String, usize>,
    pub caller_combinations: CallerCombinations,
    pub exact_caller_sets: IndexMap<String, usize>,
    pub size: SizeDistribution,
    pub quality: QualityDistribution,
}

impl ChartData {
    pub fn build<R: Borrow<VariantRecord>>(
        records: &[R],
        registry: &HandlerRegistry,
        dialect: Dialect,
    ) -> Self {
        let sv_types = value_counts(records.iter().filter_map(|r| {
            registry
                .sv_type(r.borrow(), dialect)
                .map(|t| t.into_owned())
        }));
        Self {
            sv_types,
            caller_counts: count_callers(records, registry, dialect),
            caller_combinations: caller_combinations(records, registry, dialect),
            exact_caller_sets: exact_caller_sets(records, registry, dialect),
            size: size_distribution(records),
            quality: quality_distribution(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VcfParser;

    const HEADER: &str = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tmerged\n";

    fn records(lines: &[&str]) -> Vec<VariantRecord> {
        let mut text = HEADER.to_string();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        VcfParser::new().parse_str(&text).unwrap().records
    }

    fn sample() -> Vec<VariantRecord> {
        records(&[
            "chr1\t100\t.\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;SVLEN=-500;SUPP_CALLERS=delly,manta\tGT\t0/1",
            "chr1\t900\t.\tN\t<DUP>\t45\tPASS\tSVTYPE=DUP;SVLEN=1200;SUPP_CALLERS=manta\tGT\t0/1",
            "chr2\t50\t.\tN\t<TRA>\t10\tPASS\tSVTYPE=TRA;SVLEN=0;SUPP_CALLERS=delly,delly,lumpy\tGT\t0/1",
            "chr3\t70\t.\tN\t<INS>\t60\tPASS\tSVTYPE=INS;SVLEN=80;SUPP_CALLERS=manta,delly\tGT\t1/1",
        ])
    }

    #[test]
    fn test_count_callers() {
        let registry = HandlerRegistry::new();
        let counts = count_callers(&sample(), &registry, Dialect::AggregateCaller);
        assert_eq!(counts["delly"], 3);
        assert_eq!(counts["manta"], 3);
        assert_eq!(counts["lumpy"], 1);
        assert_eq!(counts.get_index(2).unwrap().0, "lumpy");
    }

    #[test]
    fn test_caller_combinations_use_duplicates() {
        let registry = HandlerRegistry::new();
        let combos = caller_combinations(&sample(), &registry, Dialect::AggregateCaller);

        assert_eq!(combos.by_caller_count.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        // delly,delly,lumpy groups under three callers
        assert_eq!(combos.by_caller_count[&3]["delly"], 1);
        assert_eq!(combos.by_caller_count[&3]["lumpy"], 1);
        assert_eq!(combos.by_caller_count[&2]["manta"], 2);
        assert_eq!(combos.group_total(1), 1);
    }

    #[test]
    fn test_exact_caller_sets() {
        let registry = HandlerRegistry::new();
        let sets = exact_caller_sets(&sample(), &registry, Dialect::AggregateCaller);
        assert_eq!(sets["delly,manta"], 2);
        assert_eq!(sets["delly,lumpy"], 1);
        assert_eq!(sets.get_index(0).unwrap().0, "delly,manta");
    }

    #[test]
    fn test_size_distribution_skips_zero_translocations() {
        let dist = size_distribution(&sample());
        let (lower, upper) = dist.window.unwrap();
        assert!(lower >= 80.0 && upper <= 1200.0);
        assert!(dist.count >= 1);
        let sum: f64 = dist.histogram.values().iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_distribution_density() {
        let dist = quality_distribution(&sample());
        assert!(dist.window.is_some());
        assert!(dist.density.is_some());

        let flat = records(&[
            "chr1\t100\t.\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;SUPP_CALLERS=delly\tGT\t0/1",
            "chr1\t200\t.\tN\t<DEL>\t30\tPASS\tSVTYPE=DEL;SUPP_CALLERS=delly\tGT\t0/1",
        ]);
        assert!(quality_distribution(&flat).density.is_none());
    }

    #[test]
    fn test_chart_data_sv_types() {
        let data = ChartData::build(&sample(), &HandlerRegistry::new(), Dialect::AggregateCaller);
        assert_eq!(data.sv_types.len(), 4);
        assert_eq!(data.sv_types["DEL"], 1);
        assert_eq!(data.caller_counts.len(), 3);
    }

    #[test]
    fn test_distributions_empty() {
        let empty: Vec<VariantRecord> = Vec::new();
        assert_eq!(size_distribution(&empty), SizeDistribution::default());
        assert_eq!(quality_distribution(&empty), QualityDistribution::default());
    }
}
