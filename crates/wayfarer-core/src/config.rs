//! Configuration.
//!
//! The wire protocol treats profile bytes as opaque, but a running daemon
//! still needs a concrete shape to parse those bytes into. This module
//! plays that role, resolving environment variables, then a config file,
//! then field defaults, with a `#[serde(default)]`-heavy struct style.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SLEEP_MS: u64 = 60_000;
/// Sentinel meaning "use the default jitter".
pub const JITTER_DEFAULT_SENTINEL: i16 = -1;
pub const DEFAULT_JITTER: u8 = 10;
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 2048;
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 300;
/// Floor transport timeouts are derived from `sleep` with.
pub const MIN_TRANSPORT_TIMEOUT_SECS: u64 = 1;

fn default_sleep_ms() -> u64 {
    DEFAULT_SLEEP_MS
}

fn default_jitter() -> i16 {
    JITTER_DEFAULT_SENTINEL
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_job_retention() -> u64 {
    DEFAULT_JOB_RETENTION_SECS
}

/// Start/end/day-mask gate.
///
/// Weekday mask is bit-per-weekday starting Sunday (bit 0 = Sunday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHours {
    pub start_hour: u8,
    pub start_min: u8,
    pub end_hour: u8,
    pub end_min: u8,
    pub weekday_mask: u8,
}

impl WorkHours {
    pub fn allows_weekday(&self, sunday_based_weekday: u8) -> bool {
        self.weekday_mask & (1 << sunday_based_weekday) != 0
    }
}

/// The bundle of hosts, pacing, wrapper and transform selection that
/// defines how an agent talks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Ordered, non-empty host list. Validated non-empty by `Profile::new`
    /// in `wayfarer-session`, not here — this struct is a plain
    /// deserialization target and may transiently be empty mid-parse.
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default = "default_sleep_ms")]
    pub sleep_ms: u64,
    /// 0..=100, or [`JITTER_DEFAULT_SENTINEL`] for "use default".
    #[serde(default = "default_jitter")]
    pub jitter: i16,
    /// Unix seconds; absent means no expiry.
    #[serde(default)]
    pub kill_date: Option<u64>,
    #[serde(default)]
    pub work_hours: Option<WorkHours>,
    /// Name of a registered wrapper (e.g. "identity", "xor").
    #[serde(default = "default_wrapper_name")]
    pub wrapper: String,
    #[serde(default)]
    pub wrapper_key: Option<String>,
    /// Name of a registered transform; "none" for no transform.
    #[serde(default = "default_transform_name")]
    pub transform: String,
}

fn default_wrapper_name() -> String {
    "identity".to_string()
}

fn default_transform_name() -> String {
    "none".to_string()
}

impl Default for ProfileConfig {
    fn default() -> Self {
        ProfileConfig {
            hosts: Vec::new(),
            sleep_ms: DEFAULT_SLEEP_MS,
            jitter: JITTER_DEFAULT_SENTINEL,
            kill_date: None,
            work_hours: None,
            wrapper: default_wrapper_name(),
            wrapper_key: None,
            transform: default_transform_name(),
        }
    }
}

impl ProfileConfig {
    /// Resolve the jitter sentinel to a concrete percentage.
    pub fn effective_jitter(&self) -> u8 {
        if self.jitter == JITTER_DEFAULT_SENTINEL {
            DEFAULT_JITTER
        } else {
            self.jitter.clamp(0, 100) as u8
        }
    }
}

/// Server-side listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub bind: String,
    #[serde(default = "default_wrapper_name")]
    pub wrapper: String,
    #[serde(default)]
    pub wrapper_key: Option<String>,
    #[serde(default = "default_transform_name")]
    pub transform: String,
}

/// Named pipe migration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_migration_timeout")]
    pub timeout_secs: u64,
}

fn default_migration_timeout() -> u64 {
    5
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            timeout_secs: default_migration_timeout(),
        }
    }
}

/// Top-level configuration for both the agent and the server binaries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WayfarerConfig {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub listeners: Vec<ListenConfig>,
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
    #[serde(default = "default_job_retention")]
    pub job_retention_secs: u64,
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl WayfarerConfig {
    fn defaults_with_capacity() -> Self {
        WayfarerConfig {
            profile: ProfileConfig::default(),
            listeners: Vec::new(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            job_retention_secs: DEFAULT_JOB_RETENTION_SECS,
            migration: MigrationConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
}

fn dirs_or_home(xdg_var: &str, fallback_leaf: &str) -> Option<PathBuf> {
    if let Ok(v) = env::var(xdg_var) {
        if !v.is_empty() {
            return Some(PathBuf::from(v).join("wayfarer"));
        }
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(fallback_leaf).join("wayfarer"))
}

pub fn config_dir() -> Option<PathBuf> {
    dirs_or_home("XDG_CONFIG_HOME", ".config")
}

pub fn data_dir() -> Option<PathBuf> {
    dirs_or_home("XDG_DATA_HOME", ".local/share")
}

/// Resolve the config file path: `WAYFARER_CONFIG` env var overrides the
/// default `<config_dir>/config.toml`.
pub fn file_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("WAYFARER_CONFIG") {
        return Some(PathBuf::from(p));
    }
    config_dir().map(|d| d.join("config.toml"))
}

impl WayfarerConfig {
    /// Load configuration: environment variables → config file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match file_path() {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
                    path: path.clone(),
                    source: e,
                })?;
                toml::from_str(&text).map_err(|e| ConfigError::ParseFailed { path, source: e })?
            }
            _ => Self::defaults_with_capacity(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("WAYFARER_PROFILE__SLEEP_MS") {
            if let Ok(ms) = v.parse() {
                self.profile.sleep_ms = ms;
            }
        }
        if let Ok(v) = env::var("WAYFARER_PROFILE__JITTER") {
            if let Ok(j) = v.parse() {
                self.profile.jitter = j;
            }
        }
        if let Ok(v) = env::var("WAYFARER_EVENT_CHANNEL_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.event_channel_capacity = n;
            }
        }
    }

    pub fn write_default_if_missing(&self) -> Result<(), ConfigError> {
        let Some(path) = file_path() else {
            return Ok(());
        };
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed {
            path,
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_sentinel_resolves_to_default() {
        let p = ProfileConfig::default();
        assert_eq!(p.effective_jitter(), DEFAULT_JITTER);
    }

    #[test]
    fn jitter_clamped_to_range() {
        let mut p = ProfileConfig::default();
        p.jitter = 150;
        assert_eq!(p.effective_jitter(), 100);
    }

    #[test]
    fn work_hours_weekday_mask() {
        let wh = WorkHours {
            start_hour: 9,
            start_min: 0,
            end_hour: 17,
            end_min: 0,
            weekday_mask: 0b0111110, // Mon-Fri, Sunday=bit0
        };
        assert!(!wh.allows_weekday(0)); // Sunday
        assert!(wh.allows_weekday(1)); // Monday
        assert!(!wh.allows_weekday(6)); // Saturday
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = WayfarerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: WayfarerConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.profile.sleep_ms, cfg.profile.sleep_ms);
    }
}
