use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Exported unit of work: tracked originals plus suspect entries.
///
/// Fields the engine does not model are kept in `extra` so the record
/// survives the read-modify-write round trip intact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub tracked_mods: Vec<TrackedMod>,
    #[serde(default)]
    pub entries: Vec<DmcaEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedMod {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mod_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub workshop_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrackedMod {
    pub fn new(mod_id: impl Into<String>, workshop_id: impl Into<String>) -> Self {
        Self {
            mod_id: mod_id.into(),
            workshop_id: workshop_id.into(),
            extra: Map::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.mod_id.is_empty() && !self.workshop_id.is_empty()
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A suspect workshop item accused of containing tracked mods.
///
/// `filedDate`/`takenDownDate` stay in `extra`: the front-end distinguishes
/// `null` from a missing key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DmcaEntry {
    pub workshop_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub contains_mod_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DmcaEntry {
    pub fn new(workshop_id: impl Into<String>, contains_mod_ids: &[&str]) -> Self {
        Self {
            workshop_id: workshop_id.into(),
            contains_mod_ids: contains_mod_ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }

    /// Neither filed nor taken down yet.
    pub fn is_pending(&self) -> bool {
        !is_set(self.extra.get("filedDate")) && !is_set(self.extra.get("takenDownDate"))
    }
}

fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Per-mod breakdown of a suspect comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModMatch {
    pub match_percentage: f64,
    pub matched_files: usize,
    pub total_files: usize,
    pub sample_matches: Vec<String>,
}

/// Result the engine attaches to each processed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_results: Option<BTreeMap<String, ModMatch>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub taken_down: bool,
}

impl Verification {
    pub fn verified(
        match_percentage: f64,
        matched_files: usize,
        total_files: usize,
        mod_results: BTreeMap<String, ModMatch>,
    ) -> Self {
        Self {
            verified: true,
            match_percentage: Some(match_percentage),
            matched_files: Some(matched_files),
            total_files: Some(total_files),
            verified_date: Some(Utc::now()),
            mod_results: Some(mod_results),
            error: None,
            taken_down: false,
        }
    }

    pub fn unverifiable(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            match_percentage: None,
            matched_files: None,
            total_files: None,
            verified_date: None,
            mod_results: None,
            error: Some(reason.into()),
            taken_down: false,
        }
    }

    /// The suspect item is gone from the workshop.
    pub fn taken_down() -> Self {
        Self {
            taken_down: true,
            ..Self::unverifiable("Item removed")
        }
    }
}

/// Reads the job record. A missing or unparseable record is fatal.
pub fn load_job(path: &Path) -> Result<Job> {
    let data = fs::read(path).with_context(|| format!("Input file not found: {:?}", path))?;
    let job = serde_json::from_slice(&data)
        .with_context(|| format!("Failed parsing job record {:?}", path))?;
    Ok(job)
}

/// Overwrites the job record atomically and durably.
///
/// The JSON is written to a sibling temp file, synced, then renamed over the
/// original so readers never observe a partial record.
pub fn persist_job(path: &Path, job: &Job) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
    serde_json::to_writer_pretty(&mut tmp, job)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write job record {:?}", path))?;
    Ok(())
}
