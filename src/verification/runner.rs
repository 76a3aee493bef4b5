use super::compare::{compare, match_percentage};
use super::job::{load_job, persist_job, DmcaEntry, Job, ModMatch, Verification};
use super::{VerificationStatus, VerificationSummary};
use crate::manifest::{ContentHashes, ManifestResolver, Resolution};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only verify entries that are neither filed nor taken down.
    pub pending_only: bool,
}

enum ItemRole<'j> {
    Original(&'j str),
    Suspect(&'j str),
}

/// Drives a whole verification job: resolve every needed manifest once,
/// compare each suspect against the mods it is accused of containing, and
/// write the annotated record back.
pub struct VerificationRunner<'a> {
    resolver: ManifestResolver<'a>,
    status: VerificationStatus,
    options: RunOptions,
}

impl<'a> VerificationRunner<'a> {
    pub fn new(
        resolver: ManifestResolver<'a>,
        status: VerificationStatus,
        options: RunOptions,
    ) -> Self {
        Self {
            resolver,
            status,
            options,
        }
    }

    pub fn resolver(&self) -> &ManifestResolver<'a> {
        &self.resolver
    }

    pub fn status(&self) -> &VerificationStatus {
        &self.status
    }

    /// Loads the job record at `path`, verifies it and overwrites it durably.
    ///
    /// Returns only after the record is flushed to disk. Per-entry failures
    /// land in the record; only job-level failures are returned as errors.
    pub fn run_file(&mut self, path: &Path) -> Result<VerificationSummary> {
        self.status.begin(0)?;
        match self.run_file_inner(path) {
            Ok(summary) => {
                self.status.complete(summary.clone());
                Ok(summary)
            }
            Err(err) => {
                self.status.fail(format!("{err:#}"));
                Err(err)
            }
        }
    }

    fn run_file_inner(&mut self, path: &Path) -> Result<VerificationSummary> {
        info!("Reading job record {}", path.display());
        let mut job = load_job(path)?;
        let summary = self.run(&mut job)?;

        info!("Writing results back to {}", path.display());
        persist_job(path, &job)?;
        log_summary(&summary);
        Ok(summary)
    }

    /// Verifies `job` in memory, attaching a `verification` to each selected entry.
    pub fn run(&mut self, job: &mut Job) -> Result<VerificationSummary> {
        if job.entries.is_empty() {
            anyhow::bail!("No DMCA entries provided");
        }
        self.resolver.acquirer().ensure_available()?;

        let selected: Vec<usize> = job
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !self.options.pending_only || e.is_pending())
            .map(|(idx, _)| idx)
            .collect();
        if self.options.pending_only {
            info!("Filtered to {} pending entries", selected.len());
        }

        let tracked: BTreeMap<&str, &str> = job
            .tracked_mods
            .iter()
            .filter(|m| m.is_complete())
            .map(|m| (m.mod_id.as_str(), m.workshop_id.as_str()))
            .collect();
        let needed: BTreeSet<&str> = selected
            .iter()
            .flat_map(|&idx| job.entries[idx].contains_mod_ids.iter().map(String::as_str))
            .collect();
        info!(
            "Found {} tracked mods, need {} for comparison",
            tracked.len(),
            needed.len()
        );

        let mut work: Vec<(&str, ItemRole)> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (mod_id, workshop_id) in &tracked {
            if needed.contains(mod_id) && seen.insert(*workshop_id) {
                work.push((*workshop_id, ItemRole::Original(*mod_id)));
            }
        }
        for &idx in &selected {
            let entry = &job.entries[idx];
            if seen.insert(entry.workshop_id.as_str()) {
                work.push((entry.workshop_id.as_str(), ItemRole::Suspect(entry.display_title())));
            }
        }

        let resolutions = self.resolve_all(&work)?;

        let originals: BTreeMap<&str, &ContentHashes> = tracked
            .iter()
            .filter(|(mod_id, _)| needed.contains(*mod_id))
            .filter_map(|(mod_id, workshop_id)| {
                let hashes = resolutions.get(*workshop_id)?.hashes()?;
                (!hashes.is_empty()).then_some((*mod_id, hashes))
            })
            .collect();

        info!("Comparing {} suspects", selected.len());
        let mut verifications = Vec::with_capacity(selected.len());
        for (n, &idx) in selected.iter().enumerate() {
            let entry = &job.entries[idx];
            info!("[{}/{}] {}", n + 1, selected.len(), entry.display_title());
            let verification =
                verify_entry(entry, resolutions.get(entry.workshop_id.as_str()), &originals);
            verifications.push((idx, verification));
        }

        for (idx, verification) in verifications {
            job.entries[idx].verification = Some(verification);
        }

        Ok(VerificationSummary::from_entries(
            selected.iter().map(|&idx| &job.entries[idx]),
        ))
    }

    fn resolve_all(&mut self, work: &[(&str, ItemRole)]) -> Result<HashMap<String, Resolution>> {
        info!("Processing {} workshop items", work.len());
        self.status.set_total(work.len());

        let mut resolutions = HashMap::with_capacity(work.len());
        let mut stopped = false;
        for (n, (workshop_id, role)) in work.iter().enumerate() {
            if !stopped && self.status.should_stop() {
                warn!("Stop requested, no further acquisitions");
                stopped = true;
            }
            match role {
                ItemRole::Original(mod_id) => info!(
                    "[{}/{}] ORIGINAL: {} ({})",
                    n + 1,
                    work.len(),
                    mod_id,
                    workshop_id
                ),
                ItemRole::Suspect(title) => info!(
                    "[{}/{}] SUSPECT: {} ({})",
                    n + 1,
                    work.len(),
                    title,
                    workshop_id
                ),
            }
            let resolution = if stopped {
                self.resolver.resolve_without_acquisition(workshop_id)?
            } else {
                self.resolver.resolve(workshop_id)?
            };
            if let Some(hashes) = resolution.hashes() {
                info!("  {}: {} files", workshop_id, hashes.len());
            }
            resolutions.insert(workshop_id.to_string(), resolution);
            self.status
                .progress(n + 1, format!("Resolved {} of {}", n + 1, work.len()));
        }
        Ok(resolutions)
    }
}

fn verify_entry(
    entry: &DmcaEntry,
    resolution: Option<&Resolution>,
    originals: &BTreeMap<&str, &ContentHashes>,
) -> Verification {
    let suspect = match resolution {
        Some(Resolution::Absent) => {
            info!("  SKIP: item removed");
            return Verification::taken_down();
        }
        Some(Resolution::Stopped) => {
            info!("  SKIP: stopped before acquisition");
            return Verification::unverifiable("Stopped before acquisition");
        }
        Some(Resolution::Failed(reason)) => {
            info!("  SKIP: {}", reason);
            return Verification::unverifiable(reason.clone());
        }
        Some(Resolution::Resolved(resolved)) if !resolved.hashes.is_empty() => &resolved.hashes,
        _ => {
            info!("  SKIP: no manifest found");
            return Verification::unverifiable("No manifest");
        }
    };

    let mut mod_results = BTreeMap::new();
    let mut total_matched = 0;
    let mut total_files = 0;
    let mut seen = HashSet::new();
    for mod_id in &entry.contains_mod_ids {
        if !seen.insert(mod_id.as_str()) {
            continue;
        }
        let Some(original) = originals.get(mod_id.as_str()) else {
            continue;
        };
        let comparison = compare(original, suspect);
        let percentage = comparison.percentage();
        info!(
            "  {}: {}% ({}/{})",
            mod_id, percentage, comparison.matched, comparison.total
        );
        total_matched += comparison.matched;
        total_files += comparison.total;
        mod_results.insert(
            mod_id.clone(),
            ModMatch {
                match_percentage: percentage,
                matched_files: comparison.matched,
                total_files: comparison.total,
                sample_matches: comparison.sample(),
            },
        );
    }

    // weighted by file count across mods, not an average of mod percentages
    let overall = match_percentage(total_matched, total_files);
    info!("  OVERALL: {}%", overall);
    Verification::verified(overall, total_matched, total_files, mod_results)
}

fn log_summary(summary: &VerificationSummary) {
    info!("VERIFICATION COMPLETE");
    info!("Verified:     {}/{}", summary.verified, summary.total);
    info!("High (75%+):  {}", summary.high);
    info!("Medium:       {}", summary.medium);
    info!("Low:          {}", summary.low);
    info!("None:         {}", summary.none);
    info!("Taken down:   {}", summary.taken_down);
}
