//! Configuration primitives for the workshop verifier.
//!
//! Stored in a machine-readable TOML file located at:
//!   $MODVERIFY_HOME/config.toml when the variable is set
//!   %APPDATA%/modverify/config.toml on Windows
//!   $XDG_CONFIG_HOME/modverify/config.toml on Linux
//!   ~/Library/Application Support/modverify/config.toml on macOS
//!
//! The config remembers where the manifest download tool lives and carries
//! the tuning knobs for acquisition and cache scanning.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifyConfig {
    /// Locations of external tools.
    #[serde(default)]
    pub paths: PathSettings,
    /// External acquisition behaviour (app id, timeouts, pacing).
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Cache lookup tuning for the manifest resolver.
    #[serde(default)]
    pub resolver: ResolverSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathSettings {
    /// Path to the DepotDownloader executable, remembered once discovered.
    #[serde(default)]
    pub depot_downloader: Option<PathBuf>,
}

/// Acquisition-related preferences tied to the local install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Steam application id whose workshop items are verified.
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Wall-clock limit for a single manifest download.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sleep after each successful download to stay under rate limits.
    #[serde(default = "default_pause_after_download_ms")]
    pub pause_after_download_ms: u64,
    /// Whether to confirm an item is still published before downloading it.
    #[serde(default = "default_existence_check")]
    pub existence_check: bool,
    #[serde(default = "default_existence_timeout_secs")]
    pub existence_timeout_secs: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            timeout_secs: default_timeout_secs(),
            pause_after_download_ms: default_pause_after_download_ms(),
            existence_check: default_existence_check(),
            existence_timeout_secs: default_existence_timeout_secs(),
        }
    }
}

fn default_app_id() -> String {
    "108600".into()
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_pause_after_download_ms() -> u64 {
    2_000
}

const fn default_existence_check() -> bool {
    true
}

const fn default_existence_timeout_secs() -> u64 {
    15
}

/// Manifest cache lookup parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Lines read from each manifest when scanning for a workshop id.
    #[serde(default = "default_scan_line_limit")]
    pub scan_line_limit: usize,
    /// Clock-skew allowance when deciding whether a manifest is fresh.
    #[serde(default = "default_mtime_tolerance_secs")]
    pub mtime_tolerance_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            scan_line_limit: default_scan_line_limit(),
            mtime_tolerance_secs: default_mtime_tolerance_secs(),
        }
    }
}

const fn default_scan_line_limit() -> usize {
    500
}

const fn default_mtime_tolerance_secs() -> u64 {
    5
}

/// Standard relative path to the config file (resolved per OS at runtime).
pub const CONFIG_FILE_NAME: &str = "config.toml";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;

/// Returns the directory holding the verifier configuration.
///
/// Order of precedence:
/// 1. `MODVERIFY_HOME` environment variable.
/// 2. OS-specific config directory via `directories::BaseDirs`.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(path) = env::var("MODVERIFY_HOME") {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS config directory")?;
    Ok(base_dirs.config_dir().join("modverify"))
}

/// Path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default() -> Result<VerifyConfig> {
    let path = config_file_path()?;
    if path.exists() {
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: VerifyConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(VerifyConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(config: &VerifyConfig) -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = config_file_path()?;
    let data = toml::to_string_pretty(config)?;
    fs::write(&path, data)?;
    Ok(())
}
