//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use lingoforge_core::{JobId, PathId};

use super::types::{GenerationJob, JobSchedule, JobStats, JobStatus, ReleasedJobs};
use crate::error::StoreError;
use crate::retry::RetryPolicy;

/// Error text recorded on a `processing` job that was abandoned.
pub const ABANDONED_ATTEMPT: &str = "attempt abandoned while processing";

/// Job store abstraction.
///
/// Every transition is a single-record update keyed by id. Only
/// [`JobStore::mark_processing`] is conditional; it is the claim that keeps two
/// processors from running the same job.
pub trait JobStore: Send + Sync {
    /// Bulk-insert one pending job per item, with staggered target dates.
    ///
    /// Fails with `Conflict` if any item already has a non-terminal job for this parent.
    fn enqueue(
        &self,
        parent_id: PathId,
        items: &[u32],
        schedule: JobSchedule,
    ) -> Result<Vec<JobId>, StoreError>;

    fn get(&self, job_id: JobId) -> Result<Option<GenerationJob>, StoreError>;

    /// Pending jobs whose target date is not after `now`, oldest target date first.
    fn due_jobs(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<GenerationJob>, StoreError>;

    /// Claim a job for processing.
    ///
    /// Succeeds only if the job is still `pending` with `expected_retry_count`;
    /// returns `None` otherwise. On success the job is `processing`, stamped, and
    /// its `retry_count` is bumped if the previous attempt failed.
    fn mark_processing(
        &self,
        job_id: JobId,
        expected_retry_count: u32,
    ) -> Result<Option<GenerationJob>, StoreError>;

    fn mark_ready(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Terminal failure.
    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError>;

    /// Return the job to `pending`, immediately eligible again. The next claim
    /// counts the retry.
    fn reset_for_retry(&self, job_id: JobId, error: &str) -> Result<(), StoreError>;

    /// All jobs of a parent, by item index.
    fn jobs_for_parent(&self, parent_id: PathId) -> Result<Vec<GenerationJob>, StoreError>;

    /// Terminal failures, most recently processed first.
    fn failed_jobs(&self, limit: usize) -> Result<Vec<GenerationJob>, StoreError>;

    fn stats(&self) -> Result<JobStats, StoreError>;

    /// Remove every job of a deleted parent.
    fn delete_for_parent(&self, parent_id: PathId) -> Result<usize, StoreError>;

    /// Remove terminal jobs last processed before `cutoff`.
    fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Settle `processing` jobs last stamped before `cutoff`.
    ///
    /// The abandoned attempt counts as a failed one: a job with budget left goes
    /// back to `pending`, an exhausted one becomes `failed`.
    fn release_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<ReleasedJobs, StoreError>;

    /// Operator action: give a terminal failure a fresh retry budget.
    fn requeue_failed(&self, job_id: JobId) -> Result<GenerationJob, StoreError>;
}

/// In-memory job store for tests/dev and the CLI state file.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, GenerationJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_jobs(jobs: impl IntoIterator<Item = GenerationJob>) -> Self {
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|j| (j.id, j)).collect()),
        }
    }

    /// Insert a fully-formed job record as-is.
    pub fn insert(&self, job: GenerationJob) -> Result<JobId, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    /// Every job, oldest target date first.
    pub fn all(&self) -> Result<Vec<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = jobs.values().cloned().collect();
        all.sort_by_key(|j| (j.target_date, j.id));
        Ok(all)
    }

    fn update<F>(&self, job_id: JobId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut GenerationJob),
    {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;
        f(job);
        Ok(())
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(
        &self,
        parent_id: PathId,
        items: &[u32],
        schedule: JobSchedule,
    ) -> Result<Vec<JobId>, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;

        for (i, item) in items.iter().enumerate() {
            let live = jobs.values().any(|j| {
                j.parent_id == parent_id && j.item_index == *item && !j.status.is_terminal()
            });
            if live || items[..i].contains(item) {
                return Err(StoreError::Conflict(format!(
                    "path {parent_id} day {item} already has an active job"
                )));
            }
        }

        let ids = items
            .iter()
            .map(|&item| {
                let job = GenerationJob::new(parent_id, item, schedule.target_date(item));
                let id = job.id;
                jobs.insert(id, job);
                id
            })
            .collect();
        Ok(ids)
    }

    fn get(&self, job_id: JobId) -> Result<Option<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        Ok(jobs.get(&job_id).cloned())
    }

    fn due_jobs(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        let mut due: Vec<_> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.is_due(now))
            .cloned()
            .collect();

        // FIFO by due time; id breaks ties deterministically
        due.sort_by_key(|j| (j.target_date, j.id));
        due.truncate(limit);
        Ok(due)
    }

    fn mark_processing(
        &self,
        job_id: JobId,
        expected_retry_count: u32,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;

        if job.status != JobStatus::Pending || job.retry_count != expected_retry_count {
            return Ok(None);
        }

        job.retry_count = RetryPolicy::claimed_retry_count(job.retry_count, job.follows_failure());
        job.status = JobStatus::Processing;
        job.last_processed_at = Some(Utc::now());
        Ok(Some(job.clone()))
    }

    fn mark_ready(&self, job_id: JobId) -> Result<(), StoreError> {
        self.update(job_id, |job| {
            job.status = JobStatus::Ready;
            job.last_error = None;
            job.last_processed_at = Some(Utc::now());
        })
    }

    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.last_error = Some(error.to_string());
            job.last_processed_at = Some(Utc::now());
        })
    }

    fn reset_for_retry(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        self.update(job_id, |job| {
            job.status = JobStatus::Pending;
            job.last_error = Some(error.to_string());
            job.last_processed_at = Some(Utc::now());
        })
    }

    fn jobs_for_parent(&self, parent_id: PathId) -> Result<Vec<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.parent_id == parent_id)
            .cloned()
            .collect();
        result.sort_by_key(|j| (j.item_index, j.created_at));
        Ok(result)
    }

    fn failed_jobs(&self, limit: usize) -> Result<Vec<GenerationJob>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Failed)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.last_processed_at.cmp(&a.last_processed_at));
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        let jobs = self.jobs.read().map_err(|_| StoreError::poisoned())?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            stats.count(job.status);
        }
        Ok(stats)
    }

    fn delete_for_parent(&self, parent_id: PathId) -> Result<usize, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let before = jobs.len();
        jobs.retain(|_, j| j.parent_id != parent_id);
        Ok(before - jobs.len())
    }

    fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let before = jobs.len();
        jobs.retain(|_, j| {
            let expired = j.last_processed_at.is_none_or(|at| at < cutoff);
            !(j.status.is_terminal() && expired)
        });
        Ok(before - jobs.len())
    }

    fn release_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<ReleasedJobs, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let mut released = ReleasedJobs::default();
        for job in jobs.values_mut() {
            let abandoned = job.status == JobStatus::Processing
                && job.last_processed_at.is_none_or(|at| at < cutoff);
            if !abandoned {
                continue;
            }

            // retry_count was already bumped when the abandoned attempt was claimed
            job.last_error = Some(ABANDONED_ATTEMPT.to_string());
            if policy.is_exhausted(job.retry_count) {
                job.status = JobStatus::Failed;
                job.last_processed_at = Some(Utc::now());
                released.failed += 1;
            } else {
                job.status = JobStatus::Pending;
                released.requeued += 1;
            }
        }
        Ok(released)
    }

    fn requeue_failed(&self, job_id: JobId) -> Result<GenerationJob, StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| StoreError::poisoned())?;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("job {job_id}")))?;

        if job.status != JobStatus::Failed {
            return Err(StoreError::Conflict(format!(
                "job {job_id} is {:?}, only failed jobs can be requeued",
                job.status
            )));
        }

        job.status = JobStatus::Pending;
        job.retry_count = 0;
        job.last_error = None;
        Ok(job.clone())
    }
}

impl JobStore for Arc<InMemoryJobStore> {
    fn enqueue(
        &self,
        parent_id: PathId,
        items: &[u32],
        schedule: JobSchedule,
    ) -> Result<Vec<JobId>, StoreError> {
        (**self).enqueue(parent_id, items, schedule)
    }

    fn get(&self, job_id: JobId) -> Result<Option<GenerationJob>, StoreError> {
        (**self).get(job_id)
    }

    fn due_jobs(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<GenerationJob>, StoreError> {
        (**self).due_jobs(limit, now)
    }

    fn mark_processing(
        &self,
        job_id: JobId,
        expected_retry_count: u32,
    ) -> Result<Option<GenerationJob>, StoreError> {
        (**self).mark_processing(job_id, expected_retry_count)
    }

    fn mark_ready(&self, job_id: JobId) -> Result<(), StoreError> {
        (**self).mark_ready(job_id)
    }

    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        (**self).mark_failed(job_id, error)
    }

    fn reset_for_retry(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        (**self).reset_for_retry(job_id, error)
    }

    fn jobs_for_parent(&self, parent_id: PathId) -> Result<Vec<GenerationJob>, StoreError> {
        (**self).jobs_for_parent(parent_id)
    }

    fn failed_jobs(&self, limit: usize) -> Result<Vec<GenerationJob>, StoreError> {
        (**self).failed_jobs(limit)
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        (**self).stats()
    }

    fn delete_for_parent(&self, parent_id: PathId) -> Result<usize, StoreError> {
        (**self).delete_for_parent(parent_id)
    }

    fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).purge_terminal(cutoff)
    }

    fn release_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<ReleasedJobs, StoreError> {
        (**self).release_abandoned(cutoff, policy)
    }

    fn requeue_failed(&self, job_id: JobId) -> Result<GenerationJob, StoreError> {
        (**self).requeue_failed(job_id)
    }
}
