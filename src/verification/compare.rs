use crate::manifest::ContentHashes;
use serde::{Deserialize, Serialize};

/// Number of matched filenames kept per mod in a verification record.
pub const SAMPLE_LIMIT: usize = 5;

/// Overlap of a suspect's hashes with one original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub matched: usize,
    pub total: usize,
    /// Original filenames of matched hashes, in hash order.
    pub matched_files: Vec<String>,
}

impl Comparison {
    pub fn percentage(&self) -> f64 {
        match_percentage(self.matched, self.total)
    }

    pub fn sample(&self) -> Vec<String> {
        self.matched_files.iter().take(SAMPLE_LIMIT).cloned().collect()
    }
}

/// Measures how much of `original` is present in `suspect`.
///
/// The total is always the original's size, so the result is asymmetric.
pub fn compare(original: &ContentHashes, suspect: &ContentHashes) -> Comparison {
    let matched_files: Vec<String> = original
        .iter()
        .filter(|(hash, _)| suspect.contains_key(*hash))
        .map(|(_, name)| name.clone())
        .collect();
    Comparison {
        matched: matched_files.len(),
        total: original.len(),
        matched_files,
    }
}

/// `matched / total` as a percentage rounded to one decimal; 0 when `total` is 0.
pub fn match_percentage(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = matched as f64 / total as f64 * 100.0;
    // rounds the exact binary value, not raw * 10
    format!("{raw:.1}").parse().unwrap_or(0.0)
}

/// Similarity bands used in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBand {
    High,
    Medium,
    Low,
    None,
}

impl MatchBand {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 75.0 {
            MatchBand::High
        } else if percentage >= 50.0 {
            MatchBand::Medium
        } else if percentage >= 25.0 {
            MatchBand::Low
        } else {
            MatchBand::None
        }
    }
}
