//! The dashboard controller.
//!
//! `Dashboard` exclusively owns the canonical state: the loaded dataset, the time
//! cursor, the selection/styles, and the pinned features. Widgets and the map
//! surface only ever see snapshots and talk back through [`ControllerEvent`]s on
//! one channel, which the controller drains on its own thread.
//!
//! ```no_run
//! # use geodash::{Dashboard, config::DashboardConfig, plugins::Registry, api::Client};
//! let config = DashboardConfig::from_path("dashboard.json")?;
//! let client = Client::new(config.server_file_api_path.clone());
//! let mut dash = Dashboard::new(client, config, Registry::builtin())?;
//! dash.load()?;
//! dash.run()?; // until a Shutdown event arrives
//! # Ok::<(), geodash::DashError>(())
//! ```

use crate::api::JsonSource;
use crate::color::{ColorRule, PIN_PALETTE, Rgba};
use crate::config::DashboardConfig;
use crate::dataset::{Dataset, LayerFailure, LoadedLayer};
use crate::error::{DashError, DashResult};
use crate::models::{LayerKind, OverlayLayer, PluginConfig, PluginIndex};
use crate::plugins::{Registry, apply_index_filter};
use crate::resolver::{ResolvedLayer, resolve_layer};
use crate::selection::{FeatureStyle, Selection, StyleCoordinator};
use crate::timeline::{TimeCursor, Timeline};
use crate::widgets::{
    ControllerEvent, EventKind, EventSink, Pin, Slices, TimeSnapshot, Widget, WidgetEvent, WidgetProps,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Source name used by the map surface.
pub const MAP_SOURCE: &str = "map";
const MAP_EMITS: &[EventKind] = &[EventKind::FeatureClicked];

struct Mounted {
    key: String,
    config: Arc<PluginConfig>,
    widget: Box<dyn Widget>,
}

/// One row of the current frame: what the map shows for a feature right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub layer: String,
    pub feature_id: String,
    pub year: String,
    pub timestamp: String,
    pub average: Option<f64>,
    pub fill_color: Option<String>,
    pub selected: bool,
}

pub struct Dashboard<S: JsonSource> {
    source: S,
    config: DashboardConfig,
    registry: Registry,
    plugin_index: Arc<PluginIndex>,
    dataset: Arc<Dataset>,
    cursor: TimeCursor,
    styles: StyleCoordinator,
    pins: Arc<[Pin]>,
    widgets: Vec<Mounted>,
    tx: Sender<ControllerEvent>,
    rx: Receiver<ControllerEvent>,
}

impl<S: JsonSource> Dashboard<S> {
    /// Validate `config` against `registry` and set up an unloaded dashboard.
    pub fn new(source: S, config: DashboardConfig, registry: Registry) -> DashResult<Self> {
        config.validate(&registry)?;
        let (tx, rx) = mpsc::channel();
        let mut cursor = TimeCursor::new();
        let tick_tx = tx.clone();
        cursor.attach_ticker(Arc::new(move |generation| {
            tick_tx.send(ControllerEvent::Tick(generation)).is_ok()
        }));
        Ok(Self {
            source,
            config,
            registry,
            plugin_index: Arc::new(PluginIndex::new()),
            dataset: Arc::new(Dataset::default()),
            cursor,
            styles: StyleCoordinator::new(),
            pins: Arc::from(Vec::new()),
            widgets: Vec::new(),
            tx,
            rx,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn plugin_index(&self) -> &PluginIndex {
        &self.plugin_index
    }

    pub fn cursor(&self) -> &TimeCursor {
        &self.cursor
    }

    pub fn styles(&self) -> &StyleCoordinator {
        &self.styles
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.styles.selection()
    }

    pub fn feature_style(&self, layer: &str, id: &str) -> Option<&FeatureStyle> {
        self.styles.style(layer, id)
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Handle for feeding events (or `Shutdown`) from other threads.
    pub fn sender(&self) -> Sender<ControllerEvent> {
        self.tx.clone()
    }

    /// Event sink for the map surface: feature clicks only.
    pub fn map_events(&self) -> EventSink {
        EventSink::new(MAP_SOURCE, MAP_EMITS, self.tx.clone())
    }

    /// Mounted widgets as `(key, widget)`, keys like `"Legend#2"`.
    pub fn widgets(&self) -> impl Iterator<Item = (&str, &dyn Widget)> {
        self.widgets.iter().map(|m| (m.key.as_str(), m.widget.as_ref()))
    }

    pub fn widget(&self, key: &str) -> Option<&dyn Widget> {
        self.widgets
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.widget.as_ref())
    }

    /// First mounted widget of concrete type `T`.
    pub fn widget_of<T: 'static>(&self) -> Option<&T> {
        self.widgets
            .iter()
            .find_map(|m| m.widget.as_any().downcast_ref::<T>())
    }

    /// All mounted widgets of concrete type `T`, in mount order.
    pub fn widgets_of<T: 'static>(&self) -> Vec<&T> {
        self.widgets
            .iter()
            .filter_map(|m| m.widget.as_any().downcast_ref::<T>())
            .collect()
    }

    /// Replace the configuration and load it from scratch.
    pub fn reload(&mut self, config: DashboardConfig) -> DashResult<()> {
        config.validate(&self.registry)?;
        self.config = config;
        self.load()
    }

    /// Fetch everything, build the timeline, mount widgets and push initial props.
    ///
    /// Layer failures are logged and recorded in [`Dataset::failed`]; they never fail
    /// the load as a whole.
    pub fn load(&mut self) -> DashResult<()> {
        self.plugin_index = Arc::new(self.fetch_plugin_index());

        let (start, end) = self.config.year_range;
        let mut dataset = Dataset::default();
        for (layer, outcome) in self.resolve_all() {
            match outcome {
                Ok(resolved) => dataset.layers.push(loaded(layer, resolved)?),
                Err(e) => {
                    error!("layer `{}` failed to load: {e}", layer.name);
                    dataset.failed.push(LayerFailure {
                        layer: layer.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        for layer in self
            .config
            .overlay_layers
            .iter()
            .filter(|l| l.kind == LayerKind::Matrix)
        {
            info!("matrix layer `{}` carried without geometry", layer.name);
            dataset.skipped.push(layer.name.clone());
        }

        let timeline_store = dataset
            .timeline_layer(self.config.timeline_layer.as_deref())
            .map(|l| &l.data);
        let timeline = Timeline::build((start, end), timeline_store);
        self.cursor.load(timeline, self.config.timestamp.as_ref());
        self.cursor.set_steps_per_second(self.config.steps_per_second())?;

        self.styles.reset();
        for layer in &dataset.layers {
            self.styles
                .register_layer(layer.config.name.clone(), layer.feature_ids.iter().cloned());
        }
        self.pins = Arc::from(Vec::new());
        self.dataset = Arc::new(dataset);
        self.restyle_fills();

        self.mount_widgets()?;
        self.push(Slices::ALL);
        info!(
            "dashboard ready: {} layers loaded, {} failed, {} timeline entries",
            self.dataset.layers.len(),
            self.dataset.failed.len(),
            self.cursor.timeline().len()
        );
        Ok(())
    }

    fn fetch_plugin_index(&self) -> PluginIndex {
        let Some(url) = self.config.plugin_index_url.as_deref() else {
            return PluginIndex::new();
        };
        match self
            .source
            .get_json(url)
            .and_then(|v| serde_json::from_value(v).map_err(|e| DashError::decode(url, e)))
        {
            Ok(index) => index,
            Err(e) => {
                warn!("plugin index unavailable, continuing without it: {e}");
                PluginIndex::new()
            }
        }
    }

    /// Resolve every shape layer on its own scoped thread and join them all.
    /// Results come back in configuration order.
    fn resolve_all(&self) -> Vec<(OverlayLayer, DashResult<ResolvedLayer>)> {
        let source = &self.source;
        let layers: Vec<&OverlayLayer> = self.config.shape_layers().collect();
        thread::scope(|scope| {
            let handles: Vec<_> = layers
                .iter()
                .map(|layer| scope.spawn(move || resolve_layer(source, layer)))
                .collect();
            layers
                .iter()
                .zip(handles)
                .map(|(layer, h)| {
                    let outcome = h.join().unwrap_or_else(|_| {
                        Err(DashError::Fetch {
                            url: layer.data_index_url.clone().unwrap_or_default(),
                            reason: "loader thread panicked".into(),
                        })
                    });
                    ((*layer).clone(), outcome)
                })
                .collect()
        })
    }

    fn mount_widgets(&mut self) -> DashResult<()> {
        let mut mounted = Vec::with_capacity(self.config.plugins.len());
        for (i, plugin) in self.config.plugins.iter().enumerate() {
            let config = apply_index_filter(plugin, &self.plugin_index);
            let widget = self.registry.instantiate(&config)?;
            mounted.push(Mounted {
                key: format!("{}#{i}", plugin.name),
                config: Arc::new(config),
                widget,
            });
        }
        self.widgets = mounted;
        Ok(())
    }

    /// Apply one event from `source`. Returns the slices that changed.
    pub fn apply(&mut self, source: &str, event: WidgetEvent) -> DashResult<Slices> {
        let allowed = if source == MAP_SOURCE {
            MAP_EMITS
        } else {
            self.widgets
                .iter()
                .find(|m| m.key == source)
                .map(|m| m.widget.emits())
                .unwrap_or(&[])
        };
        if !allowed.contains(&event.kind()) {
            return Err(DashError::EventNotAllowed {
                widget: source.to_string(),
                event: event.kind().name(),
            });
        }
        debug!("{source} -> {event:?}");
        self.dispatch(event)
    }

    /// Host-side requests bypass the per-widget event restrictions.
    pub fn seek(&mut self, index: usize) -> DashResult<Slices> {
        self.dispatch(WidgetEvent::TimeChanged { index })
    }

    pub fn play(&mut self) -> Slices {
        self.dispatch(WidgetEvent::PlaybackToggled { playing: true })
            .unwrap_or(Slices::NONE)
    }

    pub fn pause(&mut self) -> Slices {
        self.dispatch(WidgetEvent::PlaybackToggled { playing: false })
            .unwrap_or(Slices::NONE)
    }

    pub fn set_steps_per_second(&mut self, steps_per_second: f64) -> DashResult<Slices> {
        self.dispatch(WidgetEvent::RateChanged { steps_per_second })
    }

    pub fn clear_selection(&mut self) -> Slices {
        self.dispatch(WidgetEvent::SelectionCleared)
            .unwrap_or(Slices::NONE)
    }

    fn dispatch(&mut self, event: WidgetEvent) -> DashResult<Slices> {
        let changed = match event {
            WidgetEvent::TimeChanged { index } => {
                self.cursor.seek(index)?;
                Slices::TIME
            }
            WidgetEvent::PlaybackToggled { playing } => {
                let changed = if playing {
                    self.cursor.play()
                } else {
                    self.cursor.pause()
                };
                if changed { Slices::PLAYBACK } else { Slices::NONE }
            }
            WidgetEvent::RateChanged { steps_per_second } => {
                self.cursor.set_steps_per_second(steps_per_second)?;
                Slices::PLAYBACK
            }
            WidgetEvent::FeatureClicked { layer, id } => {
                let layer = match layer {
                    Some(l) => Some(l),
                    None => self.styles.layer_containing(&id).map(str::to_string),
                };
                let selected = match layer {
                    Some(l) => self.styles.on_feature_click(&l, &id),
                    None => {
                        warn!("no layer renders feature `{id}`; selection unchanged");
                        false
                    }
                };
                if selected { Slices::SELECTION } else { Slices::NONE }
            }
            WidgetEvent::SelectionCleared => {
                if self.styles.clear_selection() {
                    Slices::SELECTION
                } else {
                    Slices::NONE
                }
            }
            WidgetEvent::PinToggled { layer, id } => {
                if self.styles.style(&layer, &id).is_some() {
                    self.toggle_pin(Selection::new(layer, id));
                    Slices::PINS
                } else {
                    warn!("pin toggle on unknown feature {layer}/{id} ignored");
                    Slices::NONE
                }
            }
        };
        self.after_change(changed);
        Ok(changed)
    }

    /// Map click on a rendered feature.
    pub fn click_feature(&mut self, layer: &str, id: &str) -> DashResult<Slices> {
        self.apply(
            MAP_SOURCE,
            WidgetEvent::FeatureClicked {
                layer: Some(layer.to_string()),
                id: id.to_string(),
            },
        )
    }

    /// Advance playback by one step as a timer tick would.
    pub fn tick(&mut self) -> Slices {
        let generation = self.cursor.timer_generation();
        self.on_tick(generation)
    }

    fn on_tick(&mut self, generation: Option<u64>) -> Slices {
        if self.cursor.tick(generation) {
            self.after_change(Slices::TIME);
            Slices::TIME
        } else {
            Slices::NONE
        }
    }

    fn toggle_pin(&mut self, selection: Selection) {
        let mut pins: Vec<Pin> = self.pins.to_vec();
        if let Some(pos) = pins.iter().position(|p| p.selection == selection) {
            pins.remove(pos);
        } else {
            let color = PIN_PALETTE
                .iter()
                .copied()
                .find(|c| !pins.iter().any(|p| p.color == *c))
                .unwrap_or(PIN_PALETTE[pins.len() % PIN_PALETTE.len()]);
            pins.push(Pin { selection, color });
        }
        self.pins = Arc::from(pins);
    }

    fn after_change(&mut self, changed: Slices) {
        if changed.is_empty() {
            return;
        }
        if changed.intersects(Slices::TIME) {
            self.restyle_fills();
        }
        self.push(changed);
    }

    fn restyle_fills(&mut self) {
        let Some(key) = self.cursor.current().cloned() else {
            return;
        };
        let dataset = Arc::clone(&self.dataset);
        self.styles.on_time_change(&key, dataset.views());
    }

    /// Re-derive and push props to every widget depending on `changed`.
    fn push(&mut self, changed: Slices) {
        let time = TimeSnapshot {
            entries: self.cursor.timeline().shared(),
            index: self.cursor.index(),
            playback: self.cursor.playback(),
        };
        for m in &mut self.widgets {
            let wants = m.widget.slices();
            if !wants.intersects(changed) {
                continue;
            }
            let props = WidgetProps {
                key: m.key.clone(),
                config: Arc::clone(&m.config),
                plugin_index: Arc::clone(&self.plugin_index),
                year_range: self.config.year_range,
                dataset: wants
                    .intersects(Slices::DATA)
                    .then(|| Arc::clone(&self.dataset)),
                time: wants
                    .intersects(Slices::TIME | Slices::PLAYBACK)
                    .then(|| time.clone()),
                selection: if wants.intersects(Slices::SELECTION) {
                    self.styles.selection().cloned()
                } else {
                    None
                },
                pins: if wants.intersects(Slices::PINS) {
                    Arc::clone(&self.pins)
                } else {
                    Arc::from(Vec::new())
                },
                events: EventSink::new(m.key.clone(), m.widget.emits(), self.tx.clone()),
            };
            m.widget.receive(props);
        }
    }

    /// Process one event. Returns `false` on `Shutdown`.
    ///
    /// Rejected widget requests are logged and dropped; they never stop the loop.
    pub fn handle(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::Widget { source, event } => {
                if let Err(e) = self.apply(&source, event) {
                    warn!("event from {source} rejected: {e}");
                }
                true
            }
            ControllerEvent::Tick(generation) => {
                self.on_tick(Some(generation));
                true
            }
            ControllerEvent::Shutdown => {
                self.cursor.pause();
                false
            }
        }
    }

    /// Drain every queued event without blocking. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut n = 0;
        loop {
            match self.rx.try_recv() {
                Ok(ev) => {
                    n += 1;
                    if !self.handle(ev) {
                        break;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        n
    }

    /// Block on the event loop until `Shutdown`.
    pub fn run(&mut self) -> DashResult<()> {
        loop {
            let ev = self.rx.recv().map_err(|_| DashError::ControllerGone)?;
            if !self.handle(ev) {
                return Ok(());
            }
        }
    }

    /// Run the event loop for at most `duration` (or until `Shutdown`).
    pub fn run_for(&mut self, duration: Duration) -> DashResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(ev) => {
                    if !self.handle(ev) {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(DashError::ControllerGone),
            }
        }
    }

    /// Everything the map currently shows, one row per rendered feature.
    pub fn frame(&self) -> Vec<FrameRow> {
        let Some(key) = self.cursor.current() else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for layer in &self.dataset.layers {
            for id in &layer.feature_ids {
                let style = self.styles.style(layer.name(), id);
                rows.push(FrameRow {
                    layer: layer.name().to_string(),
                    feature_id: id.clone(),
                    year: key.year.clone(),
                    timestamp: key.timestamp.clone(),
                    average: layer.data.average(id, key),
                    fill_color: style.and_then(|s| s.fill_color).map(|c: Rgba| c.to_css()),
                    selected: style.is_some_and(|s| s.is_highlighted()),
                });
            }
        }
        rows
    }

    /// Plain-text rendering of every mounted widget, keyed by widget key.
    pub fn render_widgets(&self) -> Vec<(String, String)> {
        self.widgets
            .iter()
            .map(|m| (m.key.clone(), m.widget.render()))
            .collect()
    }
}

fn loaded(config: OverlayLayer, resolved: ResolvedLayer) -> DashResult<LoadedLayer> {
    let rule = ColorRule::from_layer(&config)?;
    Ok(LoadedLayer {
        bounds: resolved.index.bounds(),
        rule,
        feature_ids: resolved.feature_ids,
        degraded: resolved.degraded,
        data: resolved.data,
        metadata: resolved.metadata,
        config,
    })
}
