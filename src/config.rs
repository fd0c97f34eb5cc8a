//! Dashboard descriptor: loading and validation.
//!
//! ```no_run
//! # use geodash::config::DashboardConfig;
//! # use geodash::plugins::Registry;
//! let config = DashboardConfig::from_path("dashboard.json")?;
//! config.validate(&Registry::builtin())?;
//! # Ok::<(), geodash::DashError>(())
//! ```

use crate::color::ColorRule;
use crate::error::{DashError, DashResult};
use crate::models::{BaseLayer, LayerKind, OverlayLayer, PluginConfig, TimeKey};
use crate::plugins::Registry;
use crate::timeline::DEFAULT_STEPS_PER_SECOND;
use crate::widgets::legend::rule_from_plugin;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_SERVER_FILE_API_PATH: &str = "http://localhost:5000/files/";

fn default_server_path() -> String {
    DEFAULT_SERVER_FILE_API_PATH.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default)]
    pub base_layers: Vec<BaseLayer>,
    #[serde(default)]
    pub overlay_layers: Vec<OverlayLayer>,
    /// Inclusive `[startYear, endYear]`.
    pub year_range: (i32, i32),
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    pub plugin_index_url: Option<String>,
    #[serde(default = "default_server_path", alias = "serverFileAPIPath")]
    pub server_file_api_path: String,
    /// Declared initial cursor.
    pub timestamp: Option<TimeKey>,
    pub timestamps_per_second: Option<f64>,
    /// Layer whose observed timestamps define the timeline.
    pub timeline_layer: Option<String>,
}

impl DashboardConfig {
    pub fn from_json(text: &str) -> DashResult<Self> {
        serde_json::from_str(text).map_err(|e| DashError::decode("dashboard configuration", e))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> DashResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| DashError::decode(path.display().to_string(), e))
    }

    pub fn steps_per_second(&self) -> f64 {
        self.timestamps_per_second.unwrap_or(DEFAULT_STEPS_PER_SECOND)
    }

    pub fn active_base_layer(&self) -> Option<BaseLayer> {
        self.base_layers.first().copied()
    }

    pub fn shape_layers(&self) -> impl Iterator<Item = &OverlayLayer> {
        self.overlay_layers
            .iter()
            .filter(|l| l.kind == LayerKind::Shape)
    }

    /// Reject configurations that cannot run. Legends pointing at no layer only warn.
    pub fn validate(&self, registry: &Registry) -> DashResult<()> {
        let (start, end) = self.year_range;
        if start > end {
            return Err(DashError::InvalidConfig(format!(
                "yearRange start {start} is after end {end}"
            )));
        }
        if let Some(r) = self.timestamps_per_second {
            if !r.is_finite() || r <= 0.0 {
                return Err(DashError::InvalidRate(r));
            }
        }

        let mut names = HashSet::new();
        for layer in &self.overlay_layers {
            if !names.insert(layer.name.as_str()) {
                return Err(DashError::InvalidConfig(format!(
                    "duplicate overlay layer name `{}`",
                    layer.name
                )));
            }
            if layer.kind == LayerKind::Shape && layer.data_index_url.is_none() {
                return Err(DashError::InvalidConfig(format!(
                    "layer `{}` has no dataIndexUrl",
                    layer.name
                )));
            }
            ColorRule::from_layer(layer)?;
        }

        if let Some(t) = &self.timeline_layer {
            if !self.shape_layers().any(|l| &l.name == t) {
                return Err(DashError::InvalidConfig(format!(
                    "timelineLayer `{t}` is not a shape overlay layer"
                )));
            }
        }

        registry.validate(&self.plugins)?;

        for p in self.plugins.iter().filter(|p| p.name == "Legend") {
            rule_from_plugin(p)?;
            let has_own = p.options.contains_key("colorMap") || p.options.contains_key("valueColorPairs");
            let var = p.option_str("variable");
            let matched = var.is_some_and(|v| {
                self.overlay_layers
                    .iter()
                    .any(|l| l.variable.as_deref() == Some(v))
            });
            if !has_own && !matched {
                warn!(
                    "legend variable `{}` matches no overlay layer; it will render empty",
                    var.unwrap_or("?")
                );
            }
        }
        Ok(())
    }
}
