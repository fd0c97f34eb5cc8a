//! geodash
//!
//! A Rust library for time-varying map dashboards: it resolves overlay layers from a
//! file server (data index, GeoJSON geometry, per-feature statistics and metadata),
//! builds one shared timeline, colors features by configurable rules, and keeps a set
//! of widgets (time control, legend, sidebar, comparison bar) in sync with a single
//! controller. Pairs with the `geodash` CLI.
//!
//! ### Features
//! - Concurrent layer loading with per-layer and per-feature failure isolation
//! - Discrete (`colorMap`) and continuous (`valueColorPairs`) color rules
//! - Year/timestamp timeline with play, pause, seek and adjustable rate
//! - Exclusive feature selection with highlight outlines
//! - Props-down / events-up widget synchronization
//! - Export the current frame as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use geodash::{DirSource, Dashboard, DashboardConfig, Registry};
//!
//! let config = DashboardConfig::from_path("dashboard.json")?;
//! let mut dash = Dashboard::new(DirSource::new("./files"), config, Registry::builtin())?;
//! dash.load()?;
//! dash.click_feature("Sites", "1")?;
//! geodash::storage::save_frame_csv(&dash.frame(), "frame.csv")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod color;
pub mod config;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod models;
pub mod plugins;
pub mod resolver;
pub mod selection;
pub mod stats;
pub mod storage;
pub mod store;
pub mod timeline;
pub mod widgets;

pub use api::{Client, DirSource, JsonSource, MemorySource};
pub use color::{ColorRule, Rgba};
pub use config::DashboardConfig;
pub use controller::{Dashboard, FrameRow};
pub use error::{DashError, DashResult};
pub use models::{OverlayLayer, PluginConfig, TimeKey};
pub use plugins::Registry;
pub use selection::Selection;
pub use widgets::{ControllerEvent, Slices, Widget, WidgetEvent};
