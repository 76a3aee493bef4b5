mod config;

pub use config::{
    config_dir, config_file_path, load_or_default, save, AcquisitionSettings, PathSettings,
    ResolverSettings, VerifyConfig, CONFIG_FILE_NAME,
};

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the workshop-id → manifest mapping kept inside each depot directory.
pub const MAPPING_FILE_NAME: &str = "manifest_mapping.json";

#[cfg(windows)]
const TOOL_FILE_NAME: &str = "DepotDownloader.exe";
#[cfg(not(windows))]
const TOOL_FILE_NAME: &str = "DepotDownloader";

/// Filesystem locations derived from the download tool and the app id.
#[derive(Debug, Clone)]
pub struct DepotLayout {
    pub tool_path: PathBuf,
    pub depot_dir: PathBuf,
}

impl DepotLayout {
    /// The tool writes manifests to `<tool dir>/depots/<app id>/<build>/`.
    pub fn new(tool_path: impl Into<PathBuf>, app_id: &str) -> Self {
        let tool_path = tool_path.into();
        let tool_dir = tool_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let depot_dir = tool_dir.join("depots").join(app_id);
        Self {
            tool_path,
            depot_dir,
        }
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.depot_dir.join(MAPPING_FILE_NAME)
    }

    /// Removes every cached manifest and the mapping file.
    pub fn clear_cache(&self) -> Result<()> {
        if self.depot_dir.exists() {
            fs::remove_dir_all(&self.depot_dir).with_context(|| {
                format!("Failed to remove depot directory {:?}", self.depot_dir)
            })?;
            info!("Cache cleared: {}", self.depot_dir.display());
        }
        Ok(())
    }
}

fn default_tool_paths() -> Vec<PathBuf> {
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    tool_paths_for_home(home.as_deref())
}

/// Install locations in search order; the home-directory `.exe` comes before
/// the system paths and the bare home binary is tried last.
fn tool_paths_for_home(home: Option<&Path>) -> Vec<PathBuf> {
    let home_tool_dir = home.map(|h| h.join("DepotDownloader"));
    let mut paths = vec![
        PathBuf::from("C:/DepotDownloader/DepotDownloader.exe"),
        PathBuf::from("C:/Program Files/DepotDownloader/DepotDownloader.exe"),
    ];
    paths.extend(home_tool_dir.as_ref().map(|dir| dir.join("DepotDownloader.exe")));
    paths.push(PathBuf::from("/usr/local/bin/DepotDownloader"));
    paths.push(PathBuf::from("/usr/bin/DepotDownloader"));
    paths.extend(home_tool_dir.map(|dir| dir.join("DepotDownloader")));
    paths
}

fn search_path_var() -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(TOOL_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Locates the DepotDownloader executable.
///
/// Checks the configured path, then well-known install locations, then `PATH`.
/// A path found by searching is written back to the config so later runs skip
/// the search.
pub fn locate_depot_downloader(config: &mut VerifyConfig) -> Result<Option<PathBuf>> {
    if let Some(path) = &config.paths.depot_downloader {
        if path.exists() {
            debug!("Using configured DepotDownloader: {}", path.display());
            return Ok(Some(path.clone()));
        }
    }

    let found = default_tool_paths()
        .into_iter()
        .find(|p| p.exists())
        .or_else(search_path_var);

    match found {
        Some(path) => {
            info!("Found DepotDownloader: {}", path.display());
            config.paths.depot_downloader = Some(path.clone());
            save(config)?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}
