use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sync.manager.trim().is_empty() {
            return Err(ReconcileError::configuration("sync.manager must not be empty"));
        }
        if self.sync.interval_secs == 0 {
            return Err(ReconcileError::configuration("sync.interval_secs must be > 0"));
        }
        if self.sync.lock_timeout_ms == Some(0) {
            return Err(ReconcileError::configuration(
                "sync.lock_timeout_ms must be > 0 when set",
            ));
        }
        if self.dispatch.channel_capacity == 0 {
            return Err(ReconcileError::configuration(
                "dispatch.channel_capacity must be > 0",
            ));
        }
        if let Err(err) = crate::observability::parse_filter(&self.logging.level) {
            return Err(ReconcileError::configuration(format!("logging.level: {err}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Manager name mixed into every scope key.
    #[serde(default = "default_manager")]
    pub manager: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

fn default_manager() -> String {
    "elasticcacheparameters".into()
}
fn default_interval_secs() -> u64 {
    300
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            manager: default_manager(),
            interval_secs: default_interval_secs(),
            lock_timeout_ms: None,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default = "default_true")]
    pub enforce_single_task: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    256
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            enforce_single_task: default_true(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Accepts a bare level or an `EnvFilter` directive list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::ReconcilerConfig;
    use crate::error::{ReconcileError, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "paramsync.toml";
    pub const ENV_PREFIX: &str = "PARAMSYNC";

    pub fn load_config(path: Option<&str>) -> Result<ReconcilerConfig> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        // Environment variable overrides, e.g., PARAMSYNC__SYNC__INTERVAL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ReconcileError::configuration(format!("config build error: {e}")))?;
        let merged: ReconcilerConfig = cfg
            .try_deserialize()
            .map_err(|e| ReconcileError::configuration(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
