use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths::PbossPaths;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Environment override for `backend_url`.
pub const BACKEND_URL_ENV: &str = "PBOSS_BACKEND_URL";

/// Typed view of `config.json`. Every field has a default, so a missing or
/// partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub poll_interval_secs: u64,
    pub persona_retry_delay_ms: u64,
    /// Per-request timeout. Unset leaves the transport default in place.
    pub request_timeout_secs: Option<u64>,
    /// `false` answers every notification permission request with "denied".
    pub notifications: bool,
    /// Raw channel list, decoded by `pboss-notify`.
    pub notify_channels: Option<serde_json::Value>,
    /// Command line used to spawn the backend. Empty means "already running".
    pub backend_command: Vec<String>,
    pub startup_timeout_secs: u64,
    pub startup_probe_interval_ms: u64,
    pub startup_connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            poll_interval_secs: 60,
            persona_retry_delay_ms: 1000,
            request_timeout_secs: None,
            notifications: true,
            notify_channels: None,
            backend_command: Vec::new(),
            startup_timeout_secs: 30,
            startup_probe_interval_ms: 250,
            startup_connect_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// Load from `config.json`, then apply environment overrides.
    /// An unreadable or malformed file falls back to defaults with a warning.
    pub fn load(paths: &PbossPaths) -> Self {
        let mut config = match read_map(&paths.config_json) {
            Ok(map) => Self::from_map(map),
            Err(e) => {
                tracing::warn!(path = %paths.config_json.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        };
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url.trim().to_string();
            }
        }
        config
    }

    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        match serde_json::from_value(serde_json::Value::Object(map)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "config has invalid values, using defaults");
                Self::default()
            }
        }
    }

    /// Poll period, never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn persona_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persona_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn startup_probe_interval(&self) -> Duration {
        Duration::from_millis(self.startup_probe_interval_ms.max(1))
    }

    pub fn startup_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_connect_timeout_ms.max(1))
    }
}

// ── Raw map access (used by `pboss config`) ──

/// Read `config.json` as a JSON object. Returns an empty map if the file doesn't exist.
pub fn read_map(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// Write `config.json` atomically.
pub fn write_map(
    path: &Path,
    config: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config)?;
    write_atomic(path, json.as_bytes())
}

/// Parse a CLI string into a JSON value: bool, number, JSON array/object, else string.
pub fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else if s.starts_with('[') || s.starts_with('{') {
                serde_json::from_str(s)
                    .unwrap_or_else(|_| serde_json::Value::String(s.to_string()))
            } else {
                serde_json::Value::String(s.to_string())
            }
        }
    }
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}
