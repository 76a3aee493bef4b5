pub mod acquisition;
pub mod depot;
pub mod logging;
pub mod manifest;
pub mod verification;

// Re-export commonly used types for convenience.
pub use acquisition::{AcquisitionError, ExistenceCheck, ManifestAcquirer};
pub use depot::{DepotLayout, VerifyConfig};
pub use manifest::{ContentHashes, ManifestResolver, ManifestStore, Resolution};
pub use verification::{Job, VerificationRunner, VerificationStatus, VerificationSummary};
