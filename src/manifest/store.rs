use crate::depot::MAPPING_FILE_NAME;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File-backed workshop id → manifest mapping scoped to one depot directory.
///
/// Paths are stored relative to the depot directory. Every mutation is written
/// through to disk immediately. Only one writer per depot is supported.
pub struct ManifestStore {
    depot_dir: PathBuf,
    mapping_path: PathBuf,
    mapping: BTreeMap<String, String>,
}

impl ManifestStore {
    pub fn open(depot_dir: impl Into<PathBuf>) -> Self {
        let depot_dir = depot_dir.into();
        let mapping_path = depot_dir.join(MAPPING_FILE_NAME);
        let mapping = load_mapping(&mapping_path);
        Self {
            depot_dir,
            mapping_path,
            mapping,
        }
    }

    pub fn depot_dir(&self) -> &Path {
        &self.depot_dir
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Returns the mapped manifest if it still exists on disk.
    ///
    /// A mapping whose file has disappeared is removed (and persisted) and the
    /// lookup reports a miss.
    pub fn resolve(&mut self, workshop_id: &str) -> Result<Option<PathBuf>> {
        let Some(relative) = self.mapping.get(workshop_id) else {
            return Ok(None);
        };
        let path = self.depot_dir.join(relative);
        if path.is_file() {
            return Ok(Some(path));
        }
        debug!(
            "Mapped manifest for {} is gone ({}), invalidating",
            workshop_id,
            path.display()
        );
        self.invalidate(workshop_id)?;
        Ok(None)
    }

    /// Maps `workshop_id` to `path`, replacing any previous mapping.
    pub fn record(&mut self, workshop_id: &str, path: &Path) -> Result<()> {
        let relative = path.strip_prefix(&self.depot_dir).unwrap_or(path);
        self.mapping.insert(
            workshop_id.to_string(),
            relative.to_string_lossy().into_owned(),
        );
        self.persist()
    }

    /// Drops the mapping for `workshop_id`. Returns whether one existed.
    pub fn invalidate(&mut self, workshop_id: &str) -> Result<bool> {
        if self.mapping.remove(workshop_id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Scans the depot for a manifest mentioning `workshop_id` within its
    /// first `line_limit` lines. The first hit is recorded and returned.
    pub fn scan_for(&mut self, workshop_id: &str, line_limit: usize) -> Result<Option<PathBuf>> {
        for manifest in self.manifest_files() {
            match mentions_id(&manifest, workshop_id, line_limit) {
                Ok(true) => {
                    self.record(workshop_id, &manifest)?;
                    return Ok(Some(manifest));
                }
                Ok(false) => {}
                Err(err) => {
                    debug!("Skipping unreadable manifest {}: {}", manifest.display(), err);
                }
            }
        }
        Ok(None)
    }

    /// Lists `manifest_*.txt` files one build directory below the depot root.
    pub fn manifest_files(&self) -> Vec<PathBuf> {
        if !self.depot_dir.is_dir() {
            return Vec::new();
        }
        WalkDir::new(&self.depot_dir)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_manifest_file(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    fn persist(&self) -> Result<()> {
        fs::create_dir_all(&self.depot_dir)
            .with_context(|| format!("Failed to create depot directory {:?}", self.depot_dir))?;
        let data = serde_json::to_vec_pretty(&self.mapping)?;
        fs::write(&self.mapping_path, data)
            .with_context(|| format!("Failed to write manifest mapping {:?}", self.mapping_path))?;
        Ok(())
    }
}

fn load_mapping(path: &Path) -> BTreeMap<String, String> {
    if !path.exists() {
        return BTreeMap::new();
    }
    let parsed = fs::read(path)
        .map_err(anyhow::Error::from)
        .and_then(|data| serde_json::from_slice(&data).map_err(anyhow::Error::from));
    match parsed {
        Ok(mapping) => mapping,
        Err(err) => {
            warn!("Failed to load manifest mapping {:?}: {}", path, err);
            BTreeMap::new()
        }
    }
}

pub(crate) fn is_manifest_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("manifest_") && n.ends_with(".txt"))
        .unwrap_or(false)
}

fn mentions_id(path: &Path, workshop_id: &str, line_limit: usize) -> std::io::Result<bool> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut buf = Vec::new();
    for _ in 0..line_limit {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if String::from_utf8_lossy(&buf).contains(workshop_id) {
            return Ok(true);
        }
    }
    Ok(false)
}
