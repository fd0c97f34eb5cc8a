//! Location comparison across pinned features.

use super::{EventKind, PropsSlot, Slices, Widget, WidgetEvent, WidgetProps, fmt_num};
use crate::error::DashResult;
use crate::models::PluginConfig;
use crate::stats::series_summary;
use std::any::Any;

const EMITS: &[EventKind] = &[EventKind::PinToggled];

pub const SECTIONS: &[&str] = &["LongbarLineChart"];

#[derive(Debug, Default)]
pub struct Longbar {
    title: Option<String>,
    /// Variables compared by the nested `LongbarLineChart` sections.
    variables: Vec<String>,
    slot: PropsSlot,
}

impl Longbar {
    pub fn new(config: &PluginConfig) -> Self {
        let variables = config
            .plugins
            .iter()
            .filter(|p| p.name == "LongbarLineChart")
            .flat_map(|p| p.option_strings("variables"))
            .collect();
        Self {
            title: config.option_str("title").map(str::to_string),
            variables,
            slot: PropsSlot::default(),
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn pin_count(&self) -> usize {
        self.slot.get().map_or(0, |p| p.pins.len())
    }

    pub fn pushes(&self) -> u64 {
        self.slot.pushes()
    }

    pub fn is_pinned(&self, layer: &str, id: &str) -> bool {
        self.slot.get().is_some_and(|p| {
            p.pins
                .iter()
                .any(|pin| pin.selection.layer == layer && pin.selection.id == id)
        })
    }

    /// Request removal of a pin. Does nothing when `(layer, id)` is not pinned.
    pub fn unpin(&self, layer: &str, id: &str) -> DashResult<()> {
        if !self.is_pinned(layer, id) {
            return Ok(());
        }
        self.slot.emit(WidgetEvent::PinToggled {
            layer: layer.to_string(),
            id: id.to_string(),
        })
    }
}

impl Widget for Longbar {
    fn plugin(&self) -> &str {
        "Longbar"
    }

    fn slices(&self) -> Slices {
        Slices::DATA | Slices::PINS | Slices::TIME
    }

    fn emits(&self) -> &'static [EventKind] {
        EMITS
    }

    fn receive(&mut self, props: WidgetProps) {
        self.slot.store(props);
    }

    fn render(&self) -> String {
        let mut out = format!("{}\n", self.title.as_deref().unwrap_or("Comparison"));
        let Some(props) = self.slot.get() else {
            return out;
        };
        if props.pins.is_empty() {
            out.push_str("Nothing pinned\n");
            return out;
        }
        let now = props.time.as_ref().and_then(|t| t.current());
        for pin in props.pins.iter() {
            out.push_str(&format!(
                "[{}] {} / {}\n",
                pin.color, pin.selection.layer, pin.selection.id
            ));
            let Some(dataset) = props.dataset.as_ref() else {
                continue;
            };
            for var in &self.variables {
                let Some(series) = dataset
                    .layer_for_variable(var)
                    .and_then(|l| l.data.get(&pin.selection.id))
                else {
                    out.push_str(&format!("  {var}: no data\n"));
                    continue;
                };
                let current = now
                    .and_then(|k| series.get(&k.year)?.get(&k.timestamp)?.average)
                    .map_or_else(|| "NA".to_string(), fmt_num);
                let mean = series_summary(series)
                    .mean
                    .map_or_else(|| "NA".to_string(), fmt_num);
                out.push_str(&format!("  {var}: now={current} mean={mean}\n"));
            }
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
