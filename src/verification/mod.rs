pub mod compare;
pub mod job;
pub mod runner;
pub mod status;

pub use compare::{compare, match_percentage, Comparison, MatchBand, SAMPLE_LIMIT};
pub use job::{load_job, persist_job, DmcaEntry, Job, ModMatch, TrackedMod, Verification};
pub use runner::{RunOptions, VerificationRunner};
pub use status::{RunState, StatusSnapshot, VerificationStatus};

use serde::{Deserialize, Serialize};

/// Counts over the entries a run processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub none: usize,
    pub taken_down: usize,
}

impl VerificationSummary {
    /// Re-scans finished entries. Taken-down entries are counted before and
    /// apart from the similarity bands.
    pub fn from_entries<'e>(entries: impl IntoIterator<Item = &'e DmcaEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.total += 1;
            let Some(verification) = &entry.verification else {
                summary.unverified += 1;
                continue;
            };
            if verification.taken_down {
                summary.taken_down += 1;
                continue;
            }
            if !verification.verified {
                summary.unverified += 1;
                continue;
            }
            summary.verified += 1;
            let percentage = verification.match_percentage.unwrap_or(0.0);
            match MatchBand::from_percentage(percentage) {
                MatchBand::High => summary.high += 1,
                MatchBand::Medium => summary.medium += 1,
                MatchBand::Low => summary.low += 1,
                MatchBand::None => summary.none += 1,
            }
        }
        summary
    }
}
