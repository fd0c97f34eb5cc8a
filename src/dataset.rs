//! The loaded dataset: every overlay layer that resolved, frozen after load.
//!
//! Widgets receive it behind an `Arc` and can only read it.

use crate::color::ColorRule;
use crate::models::{FeatureId, OverlayLayer};
use crate::selection::LayerView;
use crate::store::{LayerDataStore, LayerMetadata};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct LoadedLayer {
    pub config: OverlayLayer,
    pub rule: Option<ColorRule>,
    pub feature_ids: Vec<FeatureId>,
    pub data: LayerDataStore,
    pub metadata: LayerMetadata,
    /// `(min_lat, min_lon, max_lat, max_lon)` from the data index.
    pub bounds: Option<(f64, f64, f64, f64)>,
    /// Features whose data or metadata could not be fetched.
    pub degraded: Vec<FeatureId>,
}

impl LoadedLayer {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn view(&self) -> LayerView<'_> {
        LayerView {
            name: &self.config.name,
            store: &self.data,
            rule: self.rule.as_ref(),
        }
    }
}

/// A layer that failed to load, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerFailure {
    pub layer: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Loaded shape layers, in configuration order.
    pub layers: Vec<LoadedLayer>,
    pub failed: Vec<LayerFailure>,
    /// Layers carried in configuration but not resolved (matrix layers).
    pub skipped: Vec<String>,
}

impl Dataset {
    pub fn layer(&self, name: &str) -> Option<&LoadedLayer> {
        self.layers.iter().find(|l| l.config.name == name)
    }

    pub fn layer_for_variable(&self, variable: &str) -> Option<&LoadedLayer> {
        self.layers
            .iter()
            .find(|l| l.config.variable.as_deref() == Some(variable))
    }

    /// Layer that defines the timeline: `declared` if it loaded, else the first loaded layer.
    pub fn timeline_layer(&self, declared: Option<&str>) -> Option<&LoadedLayer> {
        declared
            .and_then(|name| self.layer(name))
            .or_else(|| self.layers.first())
    }

    pub fn views(&self) -> impl Iterator<Item = LayerView<'_>> {
        self.layers.iter().map(LoadedLayer::view)
    }

    pub fn is_loaded(&self) -> bool {
        !self.layers.is_empty()
    }
}
