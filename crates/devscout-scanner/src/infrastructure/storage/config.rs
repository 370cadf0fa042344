//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config
//! file:
//! - Windows:  `%APPDATA%\devscout\config.toml`
//! - Linux:    `~/.config/devscout/config.toml`
//! - macOS:    `~/Library/Application Support/devscout/config.toml`
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the
//! return value of `some_fn()` when absent from the file, so the
//! application works on first run (before a config file exists) and
//! when upgrading from an older file that is missing newer fields.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::run_scan::ScanConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scan timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerConfig {
    /// Short-range scan window in seconds.
    #[serde(default = "default_scan_window_secs")]
    pub short_range_window_secs: u64,
    /// Local-network scan window in seconds.
    #[serde(default = "default_scan_window_secs")]
    pub local_network_window_secs: u64,
    /// Progress gauge tick interval in milliseconds.
    #[serde(default = "default_progress_tick_ms")]
    pub progress_tick_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`,
    /// `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// UDP announce prober settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// UDP port the announce broadcast targets.
    #[serde(default = "default_probe_port")]
    pub port: u16,
    /// Number of broadcast rounds per sweep.
    #[serde(default = "default_probe_rounds")]
    pub rounds: u32,
    /// Listening time per round in milliseconds.
    #[serde(default = "default_round_interval_ms")]
    pub round_interval_ms: u64,
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// Database file location; the platform data directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_scan_window_secs() -> u64 {
    15
}
fn default_progress_tick_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_probe_port() -> u16 {
    24816
}
fn default_probe_rounds() -> u32 {
    5
}
fn default_round_interval_ms() -> u64 {
    2_000
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            short_range_window_secs: default_scan_window_secs(),
            local_network_window_secs: default_scan_window_secs(),
            progress_tick_ms: default_progress_tick_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: default_probe_port(),
            rounds: default_probe_rounds(),
            round_interval_ms: default_round_interval_ms(),
        }
    }
}

impl ScannerConfig {
    /// The orchestrator timing settings this configuration describes.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            short_range_window: Duration::from_secs(self.short_range_window_secs),
            local_network_window: Duration::from_secs(self.local_network_window_secs),
            progress_tick: Duration::from_millis(self.progress_tick_ms.max(1)),
        }
    }
}

impl ProbeConfig {
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform
/// config base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory
/// cannot be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from disk, returning `AppConfig::default()` if
/// the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk.
///
/// Creates the config directory and file if they do not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    // Ensure directory exists before writing.
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("devscout"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("devscout"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/devscout
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("devscout")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        // Fallback for unsupported platforms.
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
