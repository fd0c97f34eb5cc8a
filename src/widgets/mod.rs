//! Props-down / events-up synchronization between the controller and its widgets.
//!
//! Each widget declares the state [`Slices`] it reads and the [`EventKind`]s it may
//! raise. On every change the controller re-derives a fresh [`WidgetProps`] for each
//! widget whose slices intersect the change and pushes it; widgets never see the
//! canonical state and never talk to each other. Requests travel back as
//! [`WidgetEvent`]s through the widget's [`EventSink`].

pub mod legend;
pub mod longbar;
pub mod sidebar;
pub mod time_control;

use crate::color::Rgba;
use crate::dataset::Dataset;
use crate::error::{DashError, DashResult};
use crate::models::{FeatureId, PluginConfig, PluginIndex, TimeKey};
use crate::selection::Selection;
use crate::timeline::PlaybackState;
use std::any::Any;
use std::ops::BitOr;
use std::sync::Arc;
use std::sync::mpsc::Sender;

pub use legend::Legend;
pub use longbar::Longbar;
pub use sidebar::Sidebar;
pub use time_control::TimeControl;

/// Set of canonical state slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Slices(u8);

impl Slices {
    pub const NONE: Slices = Slices(0);
    /// Loaded layers, rules, data and metadata maps.
    pub const DATA: Slices = Slices(1);
    pub const TIME: Slices = Slices(1 << 1);
    pub const PLAYBACK: Slices = Slices(1 << 2);
    pub const SELECTION: Slices = Slices(1 << 3);
    pub const PINS: Slices = Slices(1 << 4);
    pub const ALL: Slices = Slices(0b1_1111);

    pub const fn union(self, other: Slices) -> Slices {
        Slices(self.0 | other.0)
    }

    pub const fn intersects(self, other: Slices) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Slices) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Slices {
    type Output = Slices;

    fn bitor(self, rhs: Slices) -> Slices {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TimeChanged,
    PlaybackToggled,
    RateChanged,
    FeatureClicked,
    SelectionCleared,
    PinToggled,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::TimeChanged => "TimeChanged",
            EventKind::PlaybackToggled => "PlaybackToggled",
            EventKind::RateChanged => "RateChanged",
            EventKind::FeatureClicked => "FeatureClicked",
            EventKind::SelectionCleared => "SelectionCleared",
            EventKind::PinToggled => "PinToggled",
        }
    }
}

/// A state-change request raised by a widget or the map surface.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// Move the cursor to an index of the timeline.
    TimeChanged { index: usize },
    PlaybackToggled { playing: bool },
    RateChanged { steps_per_second: f64 },
    /// `layer` may be omitted; the first layer rendering `id` is used.
    FeatureClicked { layer: Option<String>, id: FeatureId },
    SelectionCleared,
    PinToggled { layer: String, id: FeatureId },
}

impl WidgetEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WidgetEvent::TimeChanged { .. } => EventKind::TimeChanged,
            WidgetEvent::PlaybackToggled { .. } => EventKind::PlaybackToggled,
            WidgetEvent::RateChanged { .. } => EventKind::RateChanged,
            WidgetEvent::FeatureClicked { .. } => EventKind::FeatureClicked,
            WidgetEvent::SelectionCleared => EventKind::SelectionCleared,
            WidgetEvent::PinToggled { .. } => EventKind::PinToggled,
        }
    }
}

/// Everything the controller's event loop consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Widget { source: String, event: WidgetEvent },
    /// Playback timer tick, tagged with the timer generation.
    Tick(u64),
    Shutdown,
}

/// Outbound channel of one widget, restricted to the event kinds it owns.
#[derive(Debug, Clone)]
pub struct EventSink {
    source: String,
    allowed: &'static [EventKind],
    tx: Sender<ControllerEvent>,
}

impl EventSink {
    pub fn new(source: impl Into<String>, allowed: &'static [EventKind], tx: Sender<ControllerEvent>) -> Self {
        Self {
            source: source.into(),
            allowed,
            tx,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn allows(&self, kind: EventKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn emit(&self, event: WidgetEvent) -> DashResult<()> {
        let kind = event.kind();
        if !self.allows(kind) {
            return Err(DashError::EventNotAllowed {
                widget: self.source.clone(),
                event: kind.name(),
            });
        }
        self.tx
            .send(ControllerEvent::Widget {
                source: self.source.clone(),
                event,
            })
            .map_err(|_| DashError::ControllerGone)
    }
}

/// Read-only view of the time cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSnapshot {
    pub entries: Arc<[TimeKey]>,
    pub index: Option<usize>,
    pub playback: PlaybackState,
}

impl TimeSnapshot {
    pub fn current(&self) -> Option<&TimeKey> {
        self.entries.get(self.index?)
    }
}

/// A feature pinned for comparison, with its assigned color.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub selection: Selection,
    pub color: Rgba,
}

/// The immutable configuration object pushed to a widget.
///
/// Fields belonging to slices the widget does not depend on are left empty.
#[derive(Debug, Clone)]
pub struct WidgetProps {
    pub key: String,
    pub config: Arc<PluginConfig>,
    pub plugin_index: Arc<PluginIndex>,
    pub year_range: (i32, i32),
    pub dataset: Option<Arc<Dataset>>,
    pub time: Option<TimeSnapshot>,
    pub selection: Option<Selection>,
    pub pins: Arc<[Pin]>,
    pub events: EventSink,
}

pub trait Widget: Send {
    /// Registered plugin name, e.g. `"Legend"`.
    fn plugin(&self) -> &str;

    fn slices(&self) -> Slices;

    fn emits(&self) -> &'static [EventKind] {
        &[]
    }

    fn receive(&mut self, props: WidgetProps);

    /// Plain-text rendering of the widget's current props.
    fn render(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

/// Last props received plus a push counter; shared by the built-in widgets.
#[derive(Debug, Clone, Default)]
pub struct PropsSlot {
    props: Option<WidgetProps>,
    pushes: u64,
}

impl PropsSlot {
    pub fn store(&mut self, props: WidgetProps) {
        self.props = Some(props);
        self.pushes += 1;
    }

    pub fn get(&self) -> Option<&WidgetProps> {
        self.props.as_ref()
    }

    /// Number of props pushed so far.
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    pub(crate) fn emit(&self, event: WidgetEvent) -> DashResult<()> {
        match &self.props {
            Some(p) => p.events.emit(event),
            None => Err(DashError::ControllerGone),
        }
    }
}

/// Compact number formatting for labels: integers get thousands separators.
pub(crate) fn fmt_num(v: f64) -> String {
    use num_format::{Locale, ToFormattedString};
    if !v.is_finite() {
        return "NA".to_string();
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return (v as i64).to_formatted_string(&Locale::en);
    }
    // Format up to 4 decimals, then trim trailing zeros and trailing dot.
    let s = format!("{:.4}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
