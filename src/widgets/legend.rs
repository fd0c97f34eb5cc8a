//! Legend for one variable's color rule.
//!
//! Rows come from the plugin's own `colorMap` / `valueColorPairs` when given,
//! otherwise from the overlay layer with the same `variable`. A legend that
//! matches nothing renders empty.

use super::{PropsSlot, Slices, Widget, WidgetProps, fmt_num};
use crate::color::{ColorRule, Rgba};
use crate::error::{DashError, DashResult};
use crate::models::{BucketSpec, PluginConfig};
use log::warn;
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub struct LegendRow {
    pub label: String,
    pub color: Rgba,
}

#[derive(Debug, Default)]
pub struct Legend {
    variable: Option<String>,
    /// Rule given directly in the plugin config, if any.
    own_rule: Option<ColorRule>,
    rows: Vec<LegendRow>,
    continuous: bool,
    slot: PropsSlot,
}

impl Legend {
    /// Fails with [`DashError::MalformedColorRule`] when the plugin's own rule does not compile.
    pub fn new(config: &PluginConfig) -> DashResult<Self> {
        Ok(Self {
            variable: config.option_str("variable").map(str::to_string),
            own_rule: rule_from_plugin(config)?,
            continuous: config.option_bool("continuous").unwrap_or(false),
            ..Self::default()
        })
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    pub fn rows(&self) -> &[LegendRow] {
        &self.rows
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    pub fn pushes(&self) -> u64 {
        self.slot.pushes()
    }

    fn rebuild_rows(&mut self) {
        let layer_rule = self.slot.get().and_then(|p| {
            let dataset = p.dataset.as_ref()?;
            let var = self.variable.as_deref()?;
            dataset.layer_for_variable(var)?.rule.clone()
        });
        let Some(rule) = self.own_rule.clone().or(layer_rule) else {
            if self.slot.pushes() == 1 {
                warn!(
                    "legend for `{}` has no matching overlay layer",
                    self.variable.as_deref().unwrap_or("?")
                );
            }
            self.rows.clear();
            return;
        };
        self.continuous |= rule.is_continuous();
        self.rows = rows_for(&rule);
    }
}

/// Compile a `colorMap` / `valueColorPairs` given directly on a plugin.
pub fn rule_from_plugin(config: &PluginConfig) -> DashResult<Option<ColorRule>> {
    let owner = format!("{} plugin", config.name);
    let malformed = |e: serde_json::Error| DashError::MalformedColorRule {
        layer: owner.clone(),
        reason: e.to_string(),
    };
    let color_map: Option<Vec<BucketSpec>> = config
        .options
        .get("colorMap")
        .map(|raw| serde_json::from_value(raw.clone()))
        .transpose()
        .map_err(malformed)?;
    let pairs: Option<Vec<(f64, String)>> = config
        .options
        .get("valueColorPairs")
        .map(|raw| serde_json::from_value(raw.clone()))
        .transpose()
        .map_err(malformed)?;
    ColorRule::compile(&owner, color_map.as_deref(), pairs.as_deref(), None)
}

/// One row per bucket (its label, else `"{min} to {max}"`) or per continuous stop.
pub fn rows_for(rule: &ColorRule) -> Vec<LegendRow> {
    match rule {
        ColorRule::Discrete { buckets } => buckets
            .iter()
            .map(|b| LegendRow {
                label: b
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("{} to {}", fmt_num(b.min), fmt_num(b.max))),
                color: b.color,
            })
            .collect(),
        ColorRule::Continuous(scale) => scale
            .stops
            .iter()
            .map(|s| LegendRow {
                label: fmt_num(s.value),
                color: s.color,
            })
            .collect(),
    }
}

impl Widget for Legend {
    fn plugin(&self) -> &str {
        "Legend"
    }

    fn slices(&self) -> Slices {
        Slices::DATA
    }

    fn receive(&mut self, props: WidgetProps) {
        self.slot.store(props);
        self.rebuild_rows();
    }

    fn render(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        let mut out = format!("{}\n", self.variable.as_deref().unwrap_or("Legend"));
        if self.continuous {
            out.push_str("(continuous)\n");
        }
        for row in &self.rows {
            out.push_str(&format!("[{}] {}\n", row.color, row.label));
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
