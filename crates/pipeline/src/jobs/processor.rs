//! Batch queue processor.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use lingoforge_core::JobId;

use super::procedure::{JobOutcome, run_job};
use super::store::JobStore;
use super::types::{GenerationJob, JobStatus, ReleasedJobs};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::paths::{Collaborators, PathRepository};
use crate::retry::RetryPolicy;

/// A failed attempt as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub job_id: JobId,
    pub error: String,
    /// Whether the job was returned to the queue.
    pub will_retry: bool,
}

/// Aggregate result of one `process_pending` call.
///
/// `succeeded + skipped + failed == processed`. `processed` counts every job
/// taken from the due list, so jobs skipped as not yet due or claimed
/// elsewhere are included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<JobFailure>,
    /// Jobs that became terminally `failed` during this call, including
    /// abandoned jobs that had no retries left.
    pub terminal_failures: usize,
}

impl BatchReport {
    pub fn has_terminal_failures(&self) -> bool {
        self.terminal_failures > 0
    }
}

/// Drains due jobs one at a time.
///
/// Generation calls are sequential, so a processor has at most one call in flight.
pub struct BatchQueueProcessor<S: JobStore> {
    store: S,
    paths: Arc<dyn PathRepository>,
    collab: Collaborators,
    config: PipelineConfig,
}

impl<S: JobStore> BatchQueueProcessor<S> {
    pub fn new(
        store: S,
        paths: Arc<dyn PathRepository>,
        collab: Collaborators,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            paths,
            collab,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process up to `limit` due jobs.
    ///
    /// Item-level failures are counted and reported; only store failures are
    /// returned as `Err`. A dry run selects and counts jobs without touching them.
    pub async fn process_pending(
        &self,
        limit: usize,
        dry_run: bool,
    ) -> Result<BatchReport, PipelineError> {
        let policy = self.config.retry_policy();
        let mut report = BatchReport::default();

        if !dry_run {
            report.terminal_failures += self.release_abandoned(&policy)?.failed;
        }

        let due = self.store.due_jobs(limit, Utc::now()).inspect_err(|e| {
            error!(error = %e, "failed to fetch due jobs");
        })?;
        info!(limit, dry_run, selected = due.len(), "batch started");

        for job in due {
            report.processed += 1;

            if !job.is_due(Utc::now()) {
                debug!(job_id = %job.id, target_date = %job.target_date, "job not due yet");
                report.skipped += 1;
                continue;
            }

            if dry_run {
                debug!(job_id = %job.id, "dry run");
                report.succeeded += 1;
                continue;
            }

            let span = info_span!(
                "generation_job",
                job_id = %job.id,
                path_id = %job.parent_id,
                day = job.item_index
            );
            self.attempt(&job, &policy, &mut report)
                .instrument(span)
                .await?;
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            terminal_failures = report.terminal_failures,
            "batch finished"
        );
        Ok(report)
    }

    async fn attempt(
        &self,
        job: &GenerationJob,
        policy: &RetryPolicy,
        report: &mut BatchReport,
    ) -> Result<(), PipelineError> {
        let result = run_job(
            &self.store,
            self.paths.as_ref(),
            &self.collab,
            job,
            self.config.generation_timeout,
        )
        .await;

        let err = match result {
            Ok(JobOutcome::NotClaimed) => {
                report.skipped += 1;
                return Ok(());
            }
            Ok(_) => {
                report.succeeded += 1;
                return Ok(());
            }
            Err(err) => err,
        };

        if err.is_fatal() {
            error!(error = %err, "store failure, aborting batch");
            self.release_after_store_failure(job.id, policy, &err.to_string());
            return Err(err);
        }

        let message = err.to_string();
        let retry_count = RetryPolicy::claimed_retry_count(job.retry_count, job.follows_failure());
        let will_retry = policy.should_retry(retry_count);
        warn!(error = %err, retry_count, will_retry, "generation attempt failed");

        if will_retry {
            self.store.reset_for_retry(job.id, &message)?;
        } else {
            self.store.mark_failed(job.id, &message)?;
            report.terminal_failures += 1;
        }

        report.failed += 1;
        report.errors.push(JobFailure {
            job_id: job.id,
            error: message,
            will_retry,
        });
        Ok(())
    }

    /// Best effort: a job the failed attempt left `processing` is settled the
    /// same way as any failed attempt. Jobs in any other state are left alone.
    fn release_after_store_failure(&self, job_id: JobId, policy: &RetryPolicy, message: &str) {
        let released = self.store.get(job_id).and_then(|current| match current {
            Some(job) if job.status == JobStatus::Processing => {
                if policy.should_retry(job.retry_count) {
                    self.store.reset_for_retry(job_id, message)
                } else {
                    self.store.mark_failed(job_id, message)
                }
            }
            _ => Ok(()),
        });
        if let Err(e) = released {
            warn!(error = %e, "could not release job after store failure");
        }
    }

    fn release_abandoned(&self, policy: &RetryPolicy) -> Result<ReleasedJobs, PipelineError> {
        let window = ChronoDuration::from_std(self.config.staleness_window)
            .unwrap_or(ChronoDuration::zero());
        let released = self.store.release_abandoned(Utc::now() - window, policy)?;
        if released.total() > 0 {
            info!(
                requeued = released.requeued,
                failed = released.failed,
                "settled abandoned jobs"
            );
        }
        Ok(released)
    }
}
