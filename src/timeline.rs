//! Time cursor model and playback state machine.
//!
//! ```text
//! Uninitialized --load--> Ready --play--> Playing --pause--> Ready
//!                          ^  \__seek/rate__/  |
//!                          +------load---------+
//! ```
//!
//! The valid (year, timestamp) pairs are enumerated once per load. The cursor is
//! an index into that sequence, so it is always a member of it. Playback loops:
//! a tick on the last entry moves to index 0.

use crate::error::{DashError, DashResult};
use crate::models::TimeKey;
use crate::store::LayerDataStore;
use log::debug;
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

pub const DEFAULT_STEPS_PER_SECOND: f64 = 2.0;

/// Ordered sequence of every valid (year, timestamp) pair of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Arc<[TimeKey]>,
}

impl Timeline {
    /// For every year in `[start, end]`, append each timestamp observed in `source` for
    /// that year, in insertion order. Years without observations contribute nothing.
    ///
    /// If nothing at all is observed (no source, or an empty one) every year gets a
    /// single `"0"` entry so a loaded dataset never has an empty timeline.
    pub fn build(year_range: (i32, i32), source: Option<&LayerDataStore>) -> Self {
        let (start, end) = year_range;
        let mut entries = Vec::new();
        if let Some(store) = source {
            for year in start..=end {
                let y = year.to_string();
                for ts in store.timestamps_for_year(&y) {
                    entries.push(TimeKey::new(y.clone(), ts));
                }
            }
        }
        if entries.is_empty() {
            entries = (start..=end).map(|y| TimeKey::new(y.to_string(), "0")).collect();
        }
        Self {
            entries: entries.into(),
        }
    }

    pub fn from_entries(entries: Vec<TimeKey>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn entries(&self) -> &[TimeKey] {
        &self.entries
    }

    /// Cheap shared handle for snapshots.
    pub fn shared(&self) -> Arc<[TimeKey]> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimeKey> {
        self.entries.get(index)
    }

    pub fn position(&self, key: &TimeKey) -> Option<usize> {
        self.entries.iter().position(|k| k == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub steps_per_second: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CursorState {
    Uninitialized,
    Ready,
    Playing,
}

/// Delivers a tick tagged with the timer generation. Returns `false` once the
/// receiving side is gone, which stops the timer thread.
pub type TickFn = Arc<dyn Fn(u64) -> bool + Send + Sync>;

/// Background thread emitting ticks every `period` until dropped.
///
/// Dropping closes the stop channel, which wakes the thread immediately.
pub struct PlaybackTimer {
    generation: u64,
    _stop: mpsc::Sender<()>,
}

impl PlaybackTimer {
    pub fn start(period: Duration, generation: u64, on_tick: TickFn) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !on_tick(generation) {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            generation,
            _stop: stop_tx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for PlaybackTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackTimer")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Owns the timeline, the cursor and the playback state.
pub struct TimeCursor {
    state: CursorState,
    timeline: Timeline,
    index: Option<usize>,
    playback: PlaybackState,
    ticker: Option<TickFn>,
    timer: Option<PlaybackTimer>,
    generation: u64,
}

impl Default for TimeCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TimeCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeCursor")
            .field("state", &self.state)
            .field("index", &self.index)
            .field("len", &self.timeline.len())
            .field("playback", &self.playback)
            .finish()
    }
}

impl TimeCursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::Uninitialized,
            timeline: Timeline::default(),
            index: None,
            playback: PlaybackState::default(),
            ticker: None,
            timer: None,
            generation: 0,
        }
    }

    /// Route timer ticks somewhere. Without a ticker, `play` only flips state and
    /// ticks must be driven by calling [`TimeCursor::tick`] directly.
    pub fn attach_ticker(&mut self, ticker: TickFn) {
        self.ticker = Some(ticker);
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&TimeKey> {
        self.timeline.get(self.index?)
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    /// Generation of the running timer, if any.
    pub fn timer_generation(&self) -> Option<u64> {
        self.timer.as_ref().map(PlaybackTimer::generation)
    }

    /// Install a freshly built timeline and reset the cursor.
    ///
    /// The cursor goes to `initial` when it is in the timeline, else to
    /// `(first year, "0")`, else to the first entry. Any running playback stops.
    pub fn load(&mut self, timeline: Timeline, initial: Option<&TimeKey>) {
        self.stop_timer();
        self.playback.is_playing = false;
        let fallback = timeline
            .get(0)
            .map(|first| TimeKey::new(first.year.clone(), "0"));
        self.index = initial
            .and_then(|k| timeline.position(k))
            .or_else(|| fallback.and_then(|k| timeline.position(&k)))
            .or(if timeline.is_empty() { None } else { Some(0) });
        self.timeline = timeline;
        self.state = if self.index.is_some() {
            CursorState::Ready
        } else {
            CursorState::Uninitialized
        };
        debug!(
            "timeline loaded: {} entries, cursor {:?}",
            self.timeline.len(),
            self.current()
        );
    }

    /// Ready -> Playing. Returns whether the state changed.
    pub fn play(&mut self) -> bool {
        if self.state != CursorState::Ready {
            return false;
        }
        self.state = CursorState::Playing;
        self.playback.is_playing = true;
        self.start_timer();
        debug!("playback started at {} steps/s", self.playback.steps_per_second);
        true
    }

    /// Playing -> Ready. Pausing while not playing is a no-op.
    pub fn pause(&mut self) -> bool {
        if self.state != CursorState::Playing {
            return false;
        }
        self.stop_timer();
        self.state = CursorState::Ready;
        self.playback.is_playing = false;
        debug!("playback paused at {:?}", self.current());
        true
    }

    /// Move the cursor to `index`, keeping the playing/ready state.
    pub fn seek(&mut self, index: usize) -> DashResult<()> {
        if self.state == CursorState::Uninitialized || index >= self.timeline.len() {
            return Err(DashError::InvalidSeekIndex {
                index,
                len: self.timeline.len(),
            });
        }
        self.index = Some(index);
        Ok(())
    }

    /// Advance one step, wrapping to 0 after the last entry. Only while playing;
    /// ticks from a timer generation other than the current one are ignored.
    pub fn tick(&mut self, generation: Option<u64>) -> bool {
        if self.state != CursorState::Playing {
            return false;
        }
        if let (Some(g), Some(current)) = (generation, self.timer_generation()) {
            if g != current {
                return false;
            }
        }
        self.step();
        true
    }

    fn step(&mut self) {
        let len = self.timeline.len();
        if len == 0 {
            return;
        }
        let next = match self.index {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.index = Some(next);
    }

    /// Change the playback rate. A running timer restarts with the new period.
    pub fn set_steps_per_second(&mut self, steps_per_second: f64) -> DashResult<()> {
        if !steps_per_second.is_finite() || steps_per_second <= 0.0 {
            return Err(DashError::InvalidRate(steps_per_second));
        }
        self.playback.steps_per_second = steps_per_second;
        if self.state == CursorState::Playing {
            self.stop_timer();
            self.start_timer();
        }
        Ok(())
    }

    /// Period between ticks; always strictly positive.
    pub fn period(&self) -> Duration {
        let secs = 1.0 / self.playback.steps_per_second;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(Duration::MAX)
            .max(Duration::from_millis(1))
    }

    fn start_timer(&mut self) {
        if let Some(ticker) = &self.ticker {
            self.generation += 1;
            self.timer = Some(PlaybackTimer::start(
                self.period(),
                self.generation,
                Arc::clone(ticker),
            ));
        }
    }

    fn stop_timer(&mut self) {
        self.timer = None;
    }
}
