//! Job record, status and scheduling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use lingoforge_core::{JobId, PathId};

/// Job execution status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its target date or for a processor to pick it up
    Pending,
    /// Claimed by a processor; never the resting state once an attempt ends
    Processing,
    /// Content generated and linked
    Ready,
    /// Retry budget exhausted
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

/// A unit of generation work: produce content for one day of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub parent_id: PathId,
    /// 1-based day number inside the parent path.
    pub item_index: u32,
    pub status: JobStatus,
    /// The job is not eligible before this instant.
    pub target_date: DateTime<Utc>,
    /// Attempts that followed a failure.
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(parent_id: PathId, item_index: u32, target_date: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            parent_id,
            item_index,
            status: JobStatus::Pending,
            target_date,
            retry_count: 0,
            last_error: None,
            last_processed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.target_date <= now
    }

    /// A pending job with a recorded error is waiting for a retry.
    pub fn follows_failure(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Target-date staggering for a batch of new jobs.
///
/// Day `n` becomes due at `start + (n - 1) * spacing`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobSchedule {
    pub start: DateTime<Utc>,
    pub spacing: ChronoDuration,
}

impl JobSchedule {
    pub fn new(start: DateTime<Utc>, spacing: ChronoDuration) -> Self {
        Self { start, spacing }
    }

    /// Every item is due at `start`.
    pub fn immediate(start: DateTime<Utc>) -> Self {
        Self::new(start, ChronoDuration::zero())
    }

    /// Staggered schedule from a std duration (as stored in configuration).
    pub fn from_spacing(start: DateTime<Utc>, spacing: std::time::Duration) -> Self {
        Self::new(start, ChronoDuration::from_std(spacing).unwrap_or_default())
    }

    pub fn target_date(&self, item_index: u32) -> DateTime<Utc> {
        let steps = i32::try_from(item_index.saturating_sub(1)).unwrap_or(i32::MAX);
        self.spacing
            .checked_mul(steps)
            .and_then(|offset| self.start.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Per-status counts for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub ready: usize,
    pub failed: usize,
    pub total: usize,
}

impl JobStats {
    pub(crate) fn count(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Ready => self.ready += 1,
            JobStatus::Failed => self.failed += 1,
        }
        self.total += 1;
    }
}

/// What `release_abandoned` did with the abandoned `processing` jobs it found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReleasedJobs {
    /// Returned to `pending`.
    pub requeued: usize,
    /// Out of retries, now `failed`.
    pub failed: usize,
}

impl ReleasedJobs {
    pub fn total(&self) -> usize {
        self.requeued + self.failed
    }
}
