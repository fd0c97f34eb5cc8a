//! Selection tracking and per-feature map styling.
//!
//! The coordinator owns one style per (layer, feature) and the draw order of each
//! layer. Styling is recomputed synchronously on every time or selection change,
//! in O(features across all layers).
//!
//! Selection is sticky: it stays until another feature is selected or it is
//! explicitly cleared. Features without a data bundle at the cursor get the
//! no-data fill (`fill_color == None`), never a leftover color from an earlier time.

use crate::color::{ColorRule, Rgba};
use crate::models::{FeatureId, TimeKey};
use crate::store::LayerDataStore;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

pub const DEFAULT_BORDER: Rgba = Rgba::rgb(0x33, 0x88, 0xff);
pub const HIGHLIGHT_BORDER: Rgba = Rgba::rgb(0xff, 0x00, 0x00);
pub const DEFAULT_FILL_OPACITY: f32 = 0.5;
pub const HIGHLIGHT_FILL_OPACITY: f32 = 0.8;

/// The single focused feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Selection {
    pub layer: String,
    pub id: FeatureId,
}

impl Selection {
    pub fn new(layer: impl Into<String>, id: impl Into<FeatureId>) -> Self {
        Self {
            layer: layer.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureStyle {
    /// `None` renders as "no data".
    pub fill_color: Option<Rgba>,
    pub border_color: Rgba,
    pub fill_opacity: f32,
}

impl FeatureStyle {
    pub fn is_highlighted(&self) -> bool {
        self.border_color == HIGHLIGHT_BORDER
    }

    fn apply_outline(&mut self, selected: bool) {
        if selected {
            self.border_color = HIGHLIGHT_BORDER;
            self.fill_opacity = HIGHLIGHT_FILL_OPACITY;
        } else {
            self.border_color = DEFAULT_BORDER;
            self.fill_opacity = DEFAULT_FILL_OPACITY;
        }
    }
}

impl Default for FeatureStyle {
    fn default() -> Self {
        Self {
            fill_color: None,
            border_color: DEFAULT_BORDER,
            fill_opacity: DEFAULT_FILL_OPACITY,
        }
    }
}

/// Styles and draw order of one rendered layer.
#[derive(Debug, Clone, Default)]
pub struct LayerStyles {
    styles: IndexMap<FeatureId, FeatureStyle>,
    /// Back-to-front; the last id is drawn on top.
    draw_order: Vec<FeatureId>,
}

impl LayerStyles {
    pub fn new(ids: impl IntoIterator<Item = FeatureId>) -> Self {
        let mut styles = IndexMap::new();
        for id in ids {
            styles.entry(id).or_insert_with(FeatureStyle::default);
        }
        let draw_order = styles.keys().cloned().collect();
        Self { styles, draw_order }
    }

    pub fn get(&self, id: &str) -> Option<&FeatureStyle> {
        self.styles.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureId, &FeatureStyle)> {
        self.styles.iter()
    }

    pub fn draw_order(&self) -> &[FeatureId] {
        &self.draw_order
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    fn bring_to_front(&mut self, id: &str) {
        if let Some(pos) = self.draw_order.iter().position(|f| f == id) {
            let f = self.draw_order.remove(pos);
            self.draw_order.push(f);
        }
    }
}

/// What the coordinator needs to know about a layer to color it.
#[derive(Debug, Clone, Copy)]
pub struct LayerView<'a> {
    pub name: &'a str,
    pub store: &'a LayerDataStore,
    pub rule: Option<&'a ColorRule>,
}

#[derive(Debug, Clone, Default)]
pub struct StyleCoordinator {
    layers: IndexMap<String, LayerStyles>,
    selection: Option<Selection>,
}

impl StyleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rendered layer with its geometry's feature ids. Re-registering
    /// replaces the layer's styles.
    pub fn register_layer(&mut self, name: impl Into<String>, ids: impl IntoIterator<Item = FeatureId>) {
        let name = name.into();
        let mut styles = LayerStyles::new(ids);
        if let Some(sel) = self.selection.as_ref().filter(|s| s.layer == name) {
            if let Some(style) = styles.styles.get_mut(&sel.id) {
                style.apply_outline(true);
                styles.bring_to_front(&sel.id);
            }
        }
        self.layers.insert(name, styles);
    }

    /// Drop every layer and the selection.
    pub fn reset(&mut self) {
        self.layers.clear();
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn layer(&self, name: &str) -> Option<&LayerStyles> {
        self.layers.get(name)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&String, &LayerStyles)> {
        self.layers.iter()
    }

    pub fn style(&self, layer: &str, id: &str) -> Option<&FeatureStyle> {
        self.layers.get(layer)?.get(id)
    }

    /// Name of the first registered layer whose geometry contains `id`.
    pub fn layer_containing(&self, id: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|(_, l)| l.styles.contains_key(id))
            .map(|(name, _)| name.as_str())
    }

    pub fn highlighted_count(&self) -> usize {
        self.layers
            .values()
            .flat_map(|l| l.styles.values())
            .filter(|s| s.is_highlighted())
            .count()
    }

    /// Select `(layer, id)` and restyle every feature of every layer.
    ///
    /// Returns `false` (selection untouched) when the feature is not rendered.
    pub fn on_feature_click(&mut self, layer: &str, id: &str) -> bool {
        let known = self
            .layers
            .get(layer)
            .is_some_and(|l| l.styles.contains_key(id));
        if !known {
            warn!("click on unknown feature {layer}/{id} ignored");
            return false;
        }
        self.selection = Some(Selection::new(layer, id));
        self.restyle_outlines();
        if let Some(l) = self.layers.get_mut(layer) {
            l.bring_to_front(id);
        }
        debug!("selected {layer}/{id}");
        true
    }

    /// Clear the selection. Returns whether anything was selected.
    pub fn clear_selection(&mut self) -> bool {
        if self.selection.take().is_none() {
            return false;
        }
        self.restyle_outlines();
        debug!("selection cleared");
        true
    }

    fn restyle_outlines(&mut self) {
        let selection = self.selection.clone();
        for (name, layer) in self.layers.iter_mut() {
            for (id, style) in layer.styles.iter_mut() {
                let selected = selection
                    .as_ref()
                    .is_some_and(|s| &s.layer == name && &s.id == id);
                style.apply_outline(selected);
            }
        }
    }

    /// Recompute fill colors for `key` across the given layers. Layers not listed keep
    /// their current fills.
    pub fn on_time_change<'a>(&mut self, key: &TimeKey, views: impl IntoIterator<Item = LayerView<'a>>) {
        for view in views {
            let Some(layer) = self.layers.get_mut(view.name) else {
                continue;
            };
            for (id, style) in layer.styles.iter_mut() {
                style.fill_color = match (view.store.average(id, key), view.rule) {
                    (Some(v), Some(rule)) => rule.color_for(v),
                    _ => None,
                };
            }
        }
    }
}
