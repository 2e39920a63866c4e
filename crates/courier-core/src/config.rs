//! Gateway configuration.
//!
//! TOML ファイルから読み込みます。欠けている項目はデフォルト値で埋まり、
//! 範囲外の値は拒否せずアクセサで clamp します。
//! 起動を止めるのは `api_key` / `base_url` が空のときだけです。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::intake::RelevanceFilter;
use crate::domain::ConfigError;

pub const MIN_PROBE_INTERVAL_SECS: u64 = 10;
pub const MAX_PROBE_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub probe_path: String,
    pub reply_path: String,
    pub our_phone_number: String,

    pub probe_interval_secs: u64,
    pub status_flush_interval_secs: u64,
    pub reply_flush_interval_secs: u64,
    pub reply_flush_min_secs: u64,
    pub reply_flush_max_secs: u64,
    pub reply_batch_size: usize,

    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub delivery_timeout_secs: u64,

    pub max_tracked_numbers: usize,
    pub correlation_window_secs: u64,
    pub max_log_entries: usize,
    pub logging_enabled: bool,
    pub relevance_filter: RelevanceFilter,

    pub state_dir: PathBuf,
    pub app_version: String,
    pub platform_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            probe_path: "/api/sms/probe".to_string(),
            reply_path: "/api/sms/replies".to_string(),
            our_phone_number: String::new(),
            probe_interval_secs: 60,
            status_flush_interval_secs: 10,
            reply_flush_interval_secs: 30,
            reply_flush_min_secs: 5,
            reply_flush_max_secs: 3600,
            reply_batch_size: 10,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 15_000,
            delivery_timeout_secs: 24 * 60 * 60,
            max_tracked_numbers: 100,
            correlation_window_secs: 24 * 60 * 60,
            max_log_entries: 100,
            logging_enabled: true,
            relevance_filter: RelevanceFilter::AcceptAll,
            state_dir: PathBuf::from("./courier-state"),
            app_version: "1.0.0".to_string(),
            platform_version: std::env::consts::OS.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Startup validation: credentials and endpoint must be present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn probe_url(&self) -> String {
        join_url(&self.base_url, &self.probe_path)
    }

    pub fn reply_url(&self) -> String {
        join_url(&self.base_url, &self.reply_path)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(
            self.probe_interval_secs
                .clamp(MIN_PROBE_INTERVAL_SECS, MAX_PROBE_INTERVAL_SECS),
        )
    }

    pub fn status_flush_interval(&self) -> Duration {
        Duration::from_secs(self.status_flush_interval_secs.max(1))
    }

    pub fn reply_flush_interval(&self) -> Duration {
        self.clamp_reply_interval(self.reply_flush_interval_secs)
    }

    /// Clamp a reply flush interval into `[reply_flush_min_secs, reply_flush_max_secs]`.
    pub fn clamp_reply_interval(&self, secs: u64) -> Duration {
        let min = self.reply_flush_min_secs.max(1);
        let max = self.reply_flush_max_secs.max(min);
        Duration::from_secs(secs.clamp(min, max))
    }

    pub fn reply_batch_size(&self) -> usize {
        self.reply_batch_size.max(1)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn correlation_window(&self) -> Duration {
        Duration::from_secs(self.correlation_window_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base, path.trim_start_matches('/'))
}
