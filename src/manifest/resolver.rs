use super::{parse_manifest_detailed, ContentHashes, ManifestStore};
use crate::acquisition::{ExistenceCheck, ManifestAcquirer};
use crate::depot::VerifyConfig;
use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Knobs for cache lookups and acquisition.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub acquisition_timeout: Duration,
    pub scan_line_limit: usize,
    pub mtime_tolerance: Duration,
    pub pause_after_download: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from_config(&VerifyConfig::default())
    }
}

impl ResolverOptions {
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self {
            acquisition_timeout: Duration::from_secs(config.acquisition.timeout_secs),
            scan_line_limit: config.resolver.scan_line_limit,
            mtime_tolerance: Duration::from_secs(config.resolver.mtime_tolerance_secs),
            pause_after_download: Duration::from_millis(config.acquisition.pause_after_download_ms),
        }
    }
}

/// Where a resolved manifest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestSource {
    /// Mapping hit in the store.
    Cached,
    /// Found by scanning depot manifests for the workshop id.
    Scanned,
    /// Downloaded through the acquisition capability.
    Acquired,
}

#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub source: ManifestSource,
    pub path: PathBuf,
    pub hashes: ContentHashes,
}

/// Terminal state of resolving one workshop id.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedManifest),
    /// The item is no longer published; nothing was downloaded.
    Absent,
    /// Acquisition or reading failed; the reason is user-facing.
    Failed(String),
    /// Not in cache and acquisitions were halted by a stop request.
    Stopped,
}

impl Resolution {
    pub fn hashes(&self) -> Option<&ContentHashes> {
        match self {
            Resolution::Resolved(resolved) => Some(&resolved.hashes),
            _ => None,
        }
    }

    pub fn into_hashes(self) -> ContentHashes {
        match self {
            Resolution::Resolved(resolved) => resolved.hashes,
            _ => ContentHashes::new(),
        }
    }
}

/// Turns workshop ids into parsed hash sets, consulting the store first and
/// falling back to external acquisition.
pub struct ManifestResolver<'a> {
    store: ManifestStore,
    acquirer: &'a dyn ManifestAcquirer,
    existence: &'a dyn ExistenceCheck,
    options: ResolverOptions,
}

impl<'a> ManifestResolver<'a> {
    pub fn new(
        store: ManifestStore,
        acquirer: &'a dyn ManifestAcquirer,
        existence: &'a dyn ExistenceCheck,
        options: ResolverOptions,
    ) -> Self {
        Self {
            store,
            acquirer,
            existence,
            options,
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn acquirer(&self) -> &dyn ManifestAcquirer {
        self.acquirer
    }

    /// Convenience wrapper returning an empty set for every non-resolved state.
    pub fn resolve_hashes(&mut self, workshop_id: &str) -> Result<ContentHashes> {
        Ok(self.resolve(workshop_id)?.into_hashes())
    }

    /// Full resolution: store hit, depot scan, then existence check and
    /// acquisition. Only store persistence failures are returned as errors.
    pub fn resolve(&mut self, workshop_id: &str) -> Result<Resolution> {
        if let Some(resolution) = self.resolve_local(workshop_id)? {
            return Ok(resolution);
        }
        if !self.existence.exists(workshop_id) {
            info!("  [SKIP] {} removed from workshop", workshop_id);
            return Ok(Resolution::Absent);
        }
        self.acquire(workshop_id)
    }

    /// Resolution limited to what is already on disk.
    pub fn resolve_without_acquisition(&mut self, workshop_id: &str) -> Result<Resolution> {
        Ok(self
            .resolve_local(workshop_id)?
            .unwrap_or(Resolution::Stopped))
    }

    fn resolve_local(&mut self, workshop_id: &str) -> Result<Option<Resolution>> {
        if let Some(path) = self.store.resolve(workshop_id)? {
            info!("  [CACHED] {}", display_name(&path));
            return Ok(Some(load(path, ManifestSource::Cached)));
        }
        if let Some(path) = self
            .store
            .scan_for(workshop_id, self.options.scan_line_limit)?
        {
            info!("  [SCANNED] {}", display_name(&path));
            return Ok(Some(load(path, ManifestSource::Scanned)));
        }
        Ok(None)
    }

    fn acquire(&mut self, workshop_id: &str) -> Result<Resolution> {
        let known: HashSet<PathBuf> = self.store.manifest_files().into_iter().collect();
        let started = SystemTime::now();

        let acquired = match self
            .acquirer
            .acquire(workshop_id, self.options.acquisition_timeout)
        {
            Ok(acquired) => acquired,
            Err(err) => {
                warn!("  [ERROR] {}: {}", workshop_id, err);
                return Ok(Resolution::Failed(err.to_string()));
            }
        };

        let path = acquired
            .path
            .filter(|p| p.is_file())
            .or_else(|| self.freshest_manifest(&known, started));
        let Some(path) = path else {
            warn!("  [ERROR] {}: no new manifest in depot", workshop_id);
            return Ok(Resolution::Failed("Unknown error".into()));
        };

        self.store.record(workshop_id, &path)?;
        info!("  [DOWNLOADED] {}", display_name(&path));
        if !self.options.pause_after_download.is_zero() {
            thread::sleep(self.options.pause_after_download);
        }
        Ok(load(path, ManifestSource::Acquired))
    }

    /// Picks the most recently modified manifest that is either new since the
    /// snapshot or touched after acquisition started (minus the skew allowance).
    fn freshest_manifest(&self, known: &HashSet<PathBuf>, started: SystemTime) -> Option<PathBuf> {
        let threshold = started
            .checked_sub(self.options.mtime_tolerance)
            .unwrap_or(UNIX_EPOCH);
        self.store
            .manifest_files()
            .into_iter()
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                (!known.contains(&path) || modified >= threshold).then_some((modified, path))
            })
            .max_by_key(|(modified, _)| *modified)
            .map(|(_, path)| path)
    }
}

fn load(path: PathBuf, source: ManifestSource) -> Resolution {
    match fs::read(&path) {
        Ok(bytes) => {
            let parsed = parse_manifest_detailed(&String::from_utf8_lossy(&bytes));
            if !parsed.header_found {
                warn!("No column header in manifest {}", path.display());
            }
            debug!(
                "Parsed {}: {} hashes, {} rows skipped",
                path.display(),
                parsed.hashes.len(),
                parsed.rows_skipped
            );
            Resolution::Resolved(ResolvedManifest {
                source,
                path,
                hashes: parsed.hashes,
            })
        }
        Err(err) => {
            warn!("Failed to read manifest {}: {}", path.display(), err);
            Resolution::Failed(format!("Unreadable manifest: {err}"))
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
