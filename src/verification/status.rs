use super::VerificationSummary;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Lifecycle of a verification run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Complete,
    Failed,
}

/// Point-in-time view of the shared status record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub run_id: Option<Uuid>,
    pub state: RunState,
    pub message: Option<String>,
    pub processed: usize,
    pub total: usize,
    pub stop_requested: bool,
    pub summary: Option<VerificationSummary>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Cloneable handle to the status of the current (or last) run.
///
/// Shared between the runner and whatever front-end polls progress. Only the
/// runner moves the state; callers may request a stop.
#[derive(Debug, Clone, Default)]
pub struct VerificationStatus {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl VerificationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        // a panicked writer leaves plain data behind, keep serving it
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves to `Running`. Fails if a run is already in progress.
    pub fn begin(&self, total: usize) -> Result<Uuid> {
        let mut status = self.lock();
        if status.state == RunState::Running {
            anyhow::bail!("Verification already running");
        }
        let run_id = Uuid::new_v4();
        let now = Utc::now();
        *status = StatusSnapshot {
            run_id: Some(run_id),
            state: RunState::Running,
            message: Some("Verification started".into()),
            total,
            started_at: Some(now),
            updated_at: Some(now),
            ..StatusSnapshot::default()
        };
        Ok(run_id)
    }

    pub fn set_total(&self, total: usize) {
        let mut status = self.lock();
        status.total = total;
        status.updated_at = Some(Utc::now());
    }

    pub fn progress(&self, processed: usize, message: impl Into<String>) {
        let mut status = self.lock();
        status.processed = processed;
        status.message = Some(message.into());
        status.updated_at = Some(Utc::now());
    }

    pub fn complete(&self, summary: VerificationSummary) {
        let mut status = self.lock();
        status.state = RunState::Complete;
        status.processed = status.total;
        status.message = Some("Verification complete".into());
        status.summary = Some(summary);
        status.updated_at = Some(Utc::now());
    }

    pub fn fail(&self, error: impl Into<String>) {
        let mut status = self.lock();
        let error = error.into();
        status.state = RunState::Failed;
        status.message = Some(error.clone());
        status.error = Some(error);
        status.updated_at = Some(Utc::now());
    }

    pub fn request_stop(&self) {
        self.lock().stop_requested = true;
    }

    pub fn should_stop(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().clone()
    }
}
