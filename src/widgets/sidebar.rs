//! Detail panel for the selected feature.
//!
//! Hosts nested sections: `SidebarMetadata` shows the feature's metadata document,
//! `SidebarLineChart` / `SidebarBarChart` summarize its series for the listed
//! variables.

use super::{EventKind, PropsSlot, Slices, Widget, WidgetEvent, WidgetProps, fmt_num};
use crate::dataset::Dataset;
use crate::error::DashResult;
use crate::models::{PluginConfig, TimeKey};
use crate::selection::Selection;
use crate::stats::{series_summary, value_range};
use std::any::Any;

const EMITS: &[EventKind] = &[
    EventKind::FeatureClicked,
    EventKind::SelectionCleared,
    EventKind::PinToggled,
];

pub const SECTIONS: &[&str] = &["SidebarMetadata", "SidebarLineChart", "SidebarBarChart"];

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Metadata,
    Chart {
        title: Option<String>,
        variables: Vec<String>,
    },
}

#[derive(Debug, Default)]
pub struct Sidebar {
    title: Option<String>,
    sections: Vec<Section>,
    slot: PropsSlot,
}

impl Sidebar {
    pub fn new(config: &PluginConfig) -> Self {
        let sections = config
            .plugins
            .iter()
            .filter_map(|p| match p.name.as_str() {
                "SidebarMetadata" => Some(Section::Metadata),
                "SidebarLineChart" | "SidebarBarChart" => Some(Section::Chart {
                    title: p.option_str("title").map(str::to_string),
                    variables: p.option_strings("variables"),
                }),
                _ => None,
            })
            .collect();
        Self {
            title: config.option_str("title").map(str::to_string),
            sections,
            slot: PropsSlot::default(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.slot.get()?.selection.as_ref()
    }

    pub fn pushes(&self) -> u64 {
        self.slot.pushes()
    }

    /// Select a feature by id alone; the controller finds its layer.
    pub fn select_id(&self, id: &str) -> DashResult<()> {
        self.slot.emit(WidgetEvent::FeatureClicked {
            layer: None,
            id: id.to_string(),
        })
    }

    pub fn close(&self) -> DashResult<()> {
        self.slot.emit(WidgetEvent::SelectionCleared)
    }

    /// Pin or unpin the current selection for comparison.
    /// Pin or unpin the selected feature. Does nothing when nothing is selected.
    pub fn toggle_pin(&self) -> DashResult<()> {
        let Some(sel) = self.selection() else {
            return Ok(());
        };
        self.slot.emit(WidgetEvent::PinToggled {
            layer: sel.layer.clone(),
            id: sel.id.clone(),
        })
    }

    fn render_chart(
        out: &mut String,
        dataset: &Dataset,
        sel: &Selection,
        now: Option<&TimeKey>,
        title: Option<&str>,
        variables: &[String],
    ) {
        out.push_str(&format!("## {}\n", title.unwrap_or("Chart")));
        for var in variables {
            let Some(layer) = dataset.layer_for_variable(var) else {
                out.push_str(&format!("{var}: no layer\n"));
                continue;
            };
            let Some(series) = layer.data.get(&sel.id) else {
                out.push_str(&format!("{var}: no data\n"));
                continue;
            };
            let s = series_summary(series);
            let current = now
                .and_then(|k| layer.data.average(&sel.id, k))
                .map_or_else(|| "NA".to_string(), fmt_num);
            out.push_str(&format!(
                "{var}: now={current} mean={} min={} max={} (n={}, missing={})\n",
                s.mean.map_or_else(|| "NA".to_string(), fmt_num),
                s.min.map_or_else(|| "NA".to_string(), fmt_num),
                s.max.map_or_else(|| "NA".to_string(), fmt_num),
                s.count,
                s.missing
            ));
        }
    }
}

impl Widget for Sidebar {
    fn plugin(&self) -> &str {
        "Sidebar"
    }

    fn slices(&self) -> Slices {
        Slices::DATA | Slices::SELECTION | Slices::TIME | Slices::PINS
    }

    fn emits(&self) -> &'static [EventKind] {
        EMITS
    }

    fn receive(&mut self, props: WidgetProps) {
        self.slot.store(props);
    }

    fn render(&self) -> String {
        let mut out = format!("{}\n", self.title.as_deref().unwrap_or("Sidebar"));
        let Some(props) = self.slot.get() else {
            return out;
        };
        let Some(sel) = props.selection.as_ref() else {
            out.push_str("No selection\n");
            return out;
        };
        out.push_str(&format!("Selected: {} / {}\n", sel.layer, sel.id));
        if props.pins.iter().any(|p| &p.selection == sel) {
            out.push_str("(pinned)\n");
        }
        let Some(dataset) = props.dataset.as_ref() else {
            return out;
        };
        let now = props.time.as_ref().and_then(|t| t.current());
        if let (Some(layer), Some(k)) = (dataset.layer(&sel.layer), now) {
            if let Some((lo, hi)) = value_range(&layer.data, k) {
                out.push_str(&format!("Layer range at {k}: {} to {}\n", fmt_num(lo), fmt_num(hi)));
            }
        }
        for section in &self.sections {
            match section {
                Section::Metadata => {
                    out.push_str("## Metadata\n");
                    let meta = dataset
                        .layer(&sel.layer)
                        .and_then(|l| l.metadata.get(&sel.id));
                    match meta {
                        Some(m) => out.push_str(&format!(
                            "{}\n",
                            serde_json::to_string_pretty(m).unwrap_or_default()
                        )),
                        None => out.push_str("no metadata\n"),
                    }
                }
                Section::Chart { title, variables } => {
                    Self::render_chart(&mut out, dataset, sel, now, title.as_deref(), variables)
                }
            }
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
