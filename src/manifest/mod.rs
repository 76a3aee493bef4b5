pub mod parser;
pub mod resolver;
pub mod store;

pub use parser::{parse_manifest, parse_manifest_detailed, ParsedManifest, RowOutcome, SkipReason};
pub use resolver::{
    ManifestResolver, ManifestSource, ResolvedManifest, Resolution, ResolverOptions,
};
pub use store::ManifestStore;

use std::collections::BTreeMap;

/// Lowercase 40-hex content hash → one representative filename.
///
/// Ordered so that iteration (and therefore sample selection) is stable
/// across runs.
pub type ContentHashes = BTreeMap<String, String>;
