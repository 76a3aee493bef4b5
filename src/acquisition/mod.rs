//! External collaborators the resolver calls out to on a cache miss.
//!
//! Both are traits so the engine can run against the real download tool and
//! Steam, or against scripted doubles in tests.

pub mod depot_downloader;
pub mod workshop_page;

pub use depot_downloader::DepotDownloader;
pub use workshop_page::WorkshopPageCheck;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a manifest could not be acquired for one workshop item.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Acquisition tool unavailable: {0}")]
    Unavailable(String),

    #[error("Not subscribed")]
    NotSubscribed,

    #[error("Login failed")]
    LoginFailed,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("No manifest reported by acquisition tool")]
    NoOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// What a successful acquisition run produced.
#[derive(Debug, Clone, Default)]
pub struct AcquiredManifest {
    /// Manifest location when the tool reports one explicitly. When absent the
    /// resolver inspects the depot for the freshest manifest.
    pub path: Option<PathBuf>,
}

/// Capability to download the manifest for a workshop item into the depot.
pub trait ManifestAcquirer {
    /// Fails when the capability cannot be used at all (e.g. tool missing).
    fn ensure_available(&self) -> Result<(), AcquisitionError> {
        Ok(())
    }

    fn acquire(
        &self,
        workshop_id: &str,
        timeout: Duration,
    ) -> Result<AcquiredManifest, AcquisitionError>;
}

/// Capability to confirm a workshop item is still published.
///
/// Implementations fail open: an inconclusive check reports `true`.
pub trait ExistenceCheck {
    fn exists(&self, workshop_id: &str) -> bool;
}

/// Existence check used when checking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeExists;

impl ExistenceCheck for AssumeExists {
    fn exists(&self, _workshop_id: &str) -> bool {
        true
    }
}
