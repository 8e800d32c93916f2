use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::channel::backoff::BackoffSchedule;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

// ─── ReconnectConfig ──────────────────────────────────────────────────────────

/// Live channel reconnect policy (`[reconnect]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Consecutive failed connection attempts tolerated before the channel
    /// gives up and reports itself lost.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds. Doubles per attempt.
    pub backoff_base_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl ReconnectConfig {
    pub fn backoff_schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            base_ms: self.backoff_base_ms,
            max_ms: self.backoff_max_ms,
            ..BackoffSchedule::default()
        }
    }
}

// ─── ClientConfig ─────────────────────────────────────────────────────────────

/// Client configuration: config.toml merged with CLI/env overrides.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for the task API (snapshot fetch + create mutation).
    pub api_base_url: String,
    /// Base URL for the live push endpoint. When unset, derived from
    /// `api_base_url` by swapping the scheme to ws/wss.
    pub ws_base_url: Option<String>,
    /// Timeout for one-shot HTTP calls, in seconds.
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            ws_base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a TOML config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("could not read config from {}: {e}", path.display()))?;
        let config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config in {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Effective push endpoint base URL.
    pub fn ws_base_url(&self) -> String {
        match &self.ws_base_url {
            Some(url) => url.clone(),
            None => self
                .api_base_url
                .replace("https://", "wss://")
                .replace("http://", "ws://"),
        }
    }
}
