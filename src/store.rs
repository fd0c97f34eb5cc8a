//! In-memory per-layer data: feature id -> time series, plus opaque metadata.

use crate::models::{FeatureId, FeatureSeries, StatBundle, TimeKey};
use ahash::RandomState;
use indexmap::IndexMap;
use serde_json::Value;

/// Feature id -> time series, in the order features were inserted.
///
/// A feature present in geometry but absent here simply has no data.
#[derive(Debug, Clone, Default)]
pub struct LayerDataStore {
    series: IndexMap<FeatureId, FeatureSeries, RandomState>,
}

impl LayerDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a feature's series. Replacing keeps the original position.
    pub fn insert(&mut self, id: impl Into<FeatureId>, series: FeatureSeries) {
        self.series.insert(id.into(), series);
    }

    pub fn get(&self, id: &str) -> Option<&FeatureSeries> {
        self.series.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.series.contains_key(id)
    }

    pub fn bundle(&self, id: &str, key: &TimeKey) -> Option<&StatBundle> {
        self.series.get(id)?.get(&key.year)?.get(&key.timestamp)
    }

    /// The coloring scalar (`average`) for a feature at a time, if any.
    pub fn average(&self, id: &str, key: &TimeKey) -> Option<f64> {
        self.bundle(id, key)?.average.filter(|v| v.is_finite())
    }

    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &FeatureSeries)> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Timestamp keys observed for `year`, first-seen order across features.
    pub fn timestamps_for_year(&self, year: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for series in self.series.values() {
            if let Some(stamps) = series.get(year) {
                for ts in stamps.keys() {
                    if !out.iter().any(|t| t == ts) {
                        out.push(ts.clone());
                    }
                }
            }
        }
        out
    }
}

/// Feature id -> metadata document, consumed verbatim by widgets.
pub type LayerMetadata = IndexMap<FeatureId, Value, RandomState>;
