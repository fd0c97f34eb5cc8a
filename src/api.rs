//! Read-only JSON transport for index, geometry, data and metadata documents.
//!
//! Every resource the dashboard needs is a static JSON file addressed by a path
//! relative to a file-serving prefix. `JsonSource` is the seam: the HTTP
//! `Client` talks to a file server, `DirSource` reads the same layout from disk,
//! and `MemorySource` serves fixtures.
//!
//! Typical usage:
//! ```no_run
//! # use geodash::api::{Client, JsonSource};
//! let client = Client::new("http://localhost:5000/files/");
//! let index = client.get_json("public/data/sites/index.json")?;
//! # Ok::<(), geodash::DashError>(())
//! ```
use crate::error::{DashError, DashResult};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

/// Anything that can hand out JSON documents by relative path.
pub trait JsonSource: Send + Sync {
    fn get_json(&self, path: &str) -> DashResult<Value>;
}

impl<T: JsonSource + ?Sized> JsonSource for &T {
    fn get_json(&self, path: &str) -> DashResult<Value> {
        (**self).get_json(path)
    }
}

impl<T: JsonSource + ?Sized> JsonSource for Box<T> {
    fn get_json(&self, path: &str) -> DashResult<Value> {
        (**self).get_json(path)
    }
}

// Allow -, _, . unescaped in ids substituted into URL templates
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Percent-encode one path segment (a feature id or variable name).
pub fn encode_segment(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string()
}

/// Synchronous HTTP client against a static file server.
#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::new("http://localhost:5000/files/")
    }
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("geodash/", env!("CARGO_PKG_VERSION"))) // set user agent
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

impl JsonSource for Client {
    fn get_json(&self, path: &str) -> DashResult<Value> {
        let url = self.url_for(path);
        let fail = |reason: String| DashError::Fetch {
            url: url.clone(),
            reason,
        };

        // Small retry for transient failures (5xx / network errors)
        let mut last_err: Option<String> = None;
        for backoff_ms in [100u64, 300, 700] {
            match self.http.get(&url).send() {
                Ok(r) if r.status().is_success() => {
                    let body = r.text().map_err(|e| fail(e.to_string()))?;
                    return serde_json::from_str(&body)
                        .map_err(|e| DashError::decode(url.clone(), e));
                }
                Ok(r) if r.status().is_server_error() => {
                    last_err = Some(format!("HTTP {}", r.status()));
                }
                Ok(r) => return Err(fail(format!("HTTP {}", r.status()))),
                Err(e) => last_err = Some(e.to_string()),
            }
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        Err(fail(last_err.unwrap_or_else(|| "network error".into())))
    }
}

/// Serves relative paths from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    pub root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl JsonSource for DirSource {
    fn get_json(&self, path: &str) -> DashResult<Value> {
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
        let full = self.root.join(decoded.trim_start_matches('/'));
        let text = std::fs::read_to_string(&full).map_err(|e| DashError::Fetch {
            url: full.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| DashError::decode(full.display().to_string(), e))
    }
}

/// In-memory documents keyed by path. Unknown paths behave like a 404.
#[derive(Debug, Default)]
pub struct MemorySource {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<String>, doc: Value) -> Self {
        self.insert(path, doc);
        self
    }

    pub fn insert(&self, path: impl Into<String>, doc: Value) {
        if let Ok(mut docs) = self.docs.write() {
            docs.insert(path.into(), doc);
        }
    }

    pub fn remove(&self, path: &str) -> Option<Value> {
        self.docs.write().ok()?.remove(path)
    }
}

impl JsonSource for MemorySource {
    fn get_json(&self, path: &str) -> DashResult<Value> {
        let docs = self.docs.read().map_err(|_| DashError::Fetch {
            url: path.to_string(),
            reason: "document store poisoned".into(),
        })?;
        docs.get(path).cloned().ok_or_else(|| DashError::Fetch {
            url: path.to_string(),
            reason: "HTTP 404 Not Found".into(),
        })
    }
}
