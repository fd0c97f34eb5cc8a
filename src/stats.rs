use crate::models::{FeatureSeries, TimeKey};
use crate::store::LayerDataStore;
use serde::{Deserialize, Serialize};

/// Summary statistics of a feature's coloring scalar over its whole series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

/// Summarize the `average` values of one feature across all (year, timestamp) entries.
pub fn series_summary(series: &FeatureSeries) -> Summary {
    let mut vals: Vec<f64> = Vec::new();
    let mut missing = 0usize;
    for stamps in series.values() {
        for bundle in stamps.values() {
            match bundle.average.filter(|v| v.is_finite()) {
                Some(v) => vals.push(v),
                None => missing += 1,
            }
        }
    }

    vals.sort_by(|a, b| a.total_cmp(b));
    let count = vals.len();
    let min = vals.first().cloned();
    let max = vals.last().cloned();
    let mean = if count > 0 {
        Some(vals.iter().copied().sum::<f64>() / count as f64)
    } else {
        None
    };
    let median = if count == 0 {
        None
    } else if count % 2 == 1 {
        Some(vals[count / 2])
    } else {
        Some((vals[count / 2 - 1] + vals[count / 2]) / 2.0)
    };
    Summary {
        count,
        missing,
        min,
        max,
        mean,
        median,
    }
}

/// Min/max of the coloring scalar across every feature of a layer at `key`.
pub fn value_range(store: &LayerDataStore, key: &TimeKey) -> Option<(f64, f64)> {
    store
        .ids()
        .filter_map(|id| store.average(id, key))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
