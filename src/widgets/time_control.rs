//! Time slider with play/pause and a steps-per-second input.

use super::{EventKind, PropsSlot, Slices, Widget, WidgetEvent, WidgetProps};
use crate::error::{DashError, DashResult};
use crate::models::{OverlayLayer, PluginConfig, TimeKey};
use chrono::Month;
use std::any::Any;

const EMITS: &[EventKind] = &[
    EventKind::TimeChanged,
    EventKind::PlaybackToggled,
    EventKind::RateChanged,
];

#[derive(Debug, Default)]
pub struct TimeControl {
    granularity: String,
    slot: PropsSlot,
}

impl TimeControl {
    pub fn new(config: &PluginConfig) -> Self {
        Self {
            granularity: config
                .option_str("granularity")
                .unwrap_or(OverlayLayer::DEFAULT_GRANULARITY)
                .to_string(),
            slot: PropsSlot::default(),
        }
    }

    pub fn pushes(&self) -> u64 {
        self.slot.pushes()
    }

    pub fn props(&self) -> Option<&WidgetProps> {
        self.slot.get()
    }

    /// Slider length; valid positions are `0..len`.
    pub fn len(&self) -> usize {
        self.slot
            .get()
            .and_then(|p| p.time.as_ref())
            .map_or(0, |t| t.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> Option<usize> {
        self.slot.get()?.time.as_ref()?.index
    }

    pub fn current(&self) -> Option<&TimeKey> {
        self.slot.get()?.time.as_ref()?.current()
    }

    pub fn is_playing(&self) -> bool {
        self.slot
            .get()
            .and_then(|p| p.time.as_ref())
            .is_some_and(|t| t.playback.is_playing)
    }

    /// Slider input. Out-of-range positions are rejected before reaching the controller.
    pub fn slide_to(&self, index: usize) -> DashResult<()> {
        let len = self.len();
        if index >= len {
            return Err(DashError::InvalidSeekIndex { index, len });
        }
        self.slot.emit(WidgetEvent::TimeChanged { index })
    }

    pub fn press_play(&self) -> DashResult<()> {
        self.slot.emit(WidgetEvent::PlaybackToggled { playing: true })
    }

    pub fn press_pause(&self) -> DashResult<()> {
        self.slot.emit(WidgetEvent::PlaybackToggled { playing: false })
    }

    pub fn set_interval(&self, steps_per_second: f64) -> DashResult<()> {
        if !steps_per_second.is_finite() || steps_per_second <= 0.0 {
            return Err(DashError::InvalidRate(steps_per_second));
        }
        self.slot.emit(WidgetEvent::RateChanged { steps_per_second })
    }

    /// Human label for a timestamp; monthly data shows the month name.
    pub fn timestamp_label(&self, key: &TimeKey) -> String {
        if self.granularity == "monthly" {
            if let Some(m) = key
                .timestamp
                .parse::<u8>()
                .ok()
                .and_then(|i| i.checked_add(1))
                .and_then(|i| Month::try_from(i).ok())
            {
                return format!("{} ({})", key.timestamp, m.name());
            }
        }
        key.timestamp.clone()
    }
}

impl Widget for TimeControl {
    fn plugin(&self) -> &str {
        "TimeControl"
    }

    fn slices(&self) -> Slices {
        Slices::TIME | Slices::PLAYBACK
    }

    fn emits(&self) -> &'static [EventKind] {
        EMITS
    }

    fn receive(&mut self, props: WidgetProps) {
        self.slot.store(props);
    }

    fn render(&self) -> String {
        let mut out = String::from("Time Control\n");
        match self.current() {
            Some(k) => out.push_str(&format!(
                "Year: {}, Timestamp: {}\n",
                k.year,
                self.timestamp_label(k)
            )),
            None => out.push_str("Year: -, Timestamp: -\n"),
        }
        let pos = self.position().map_or(0, |p| p + 1);
        out.push_str(&format!("Step {} of {}\n", pos, self.len()));
        if let Some(t) = self.slot.get().and_then(|p| p.time.as_ref()) {
            out.push_str(&format!(
                "{} at {} steps/s\n",
                if t.playback.is_playing { "Playing" } else { "Paused" },
                super::fmt_num(t.playback.steps_per_second)
            ));
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
