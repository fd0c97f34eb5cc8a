//! Error taxonomy for the overlay engine.
//!
//! Only failures that abort an operation live here. Missing per-feature data and
//! legend/layer mismatches degrade silently (with a log line) instead.

use thiserror::Error;

pub type DashResult<T> = Result<T, DashError>;

#[derive(Debug, Error)]
pub enum DashError {
    /// Network failure or non-2xx response.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("could not decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Data index document lacks a field the resolver needs.
    #[error("data index {url} is missing `{field}`")]
    InvalidIndex { url: String, field: &'static str },

    #[error("malformed color rule on layer `{layer}`: {reason}")]
    MalformedColorRule { layer: String, reason: String },

    #[error("seek index {index} out of range (timeline has {len} entries)")]
    InvalidSeekIndex { index: usize, len: usize },

    #[error("steps per second must be a positive finite number, got {0}")]
    InvalidRate(f64),

    #[error("unknown plugin `{0}`")]
    UnknownPlugin(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A widget tried to raise an event kind it does not own.
    #[error("widget `{widget}` may not raise {event}")]
    EventNotAllowed { widget: String, event: &'static str },

    #[error("controller is no longer receiving events")]
    ControllerGone,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DashError {
    pub(crate) fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        DashError::Decode {
            what: what.into(),
            source,
        }
    }
}
