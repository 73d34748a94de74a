//! Single-job generation procedure.

use std::time::Duration;

use tracing::{debug, info};

use lingoforge_core::ContentId;

use super::store::JobStore;
use super::types::GenerationJob;
use crate::error::PipelineError;
use crate::paths::{Collaborators, ContentOwner, LearningPath, PathRepository, PathStatus};
use crate::retry::with_timeout;

/// How an attempt ended when it did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Content was generated, stored and linked.
    Generated { content_id: ContentId },
    /// The slot already had content; the generator was not called.
    AlreadyFulfilled { content_id: ContentId },
    /// Another processor claimed the job first, or it changed since it was selected.
    NotClaimed,
}

impl JobOutcome {
    pub fn content_id(&self) -> Option<ContentId> {
        match self {
            JobOutcome::Generated { content_id } | JobOutcome::AlreadyFulfilled { content_id } => {
                Some(*content_id)
            }
            JobOutcome::NotClaimed => None,
        }
    }
}

/// Run one attempt of `job` as it was observed by `due_jobs`.
///
/// On `Err` the job is left `processing`; the caller applies the retry policy.
pub async fn run_job<S>(
    store: &S,
    paths: &dyn PathRepository,
    collab: &Collaborators,
    job: &GenerationJob,
    timeout: Duration,
) -> Result<JobOutcome, PipelineError>
where
    S: JobStore + ?Sized,
{
    let Some(claimed) = store.mark_processing(job.id, job.retry_count)? else {
        debug!(job_id = %job.id, "job already claimed elsewhere");
        return Ok(JobOutcome::NotClaimed);
    };
    debug!(retry_count = claimed.retry_count, "claimed job");

    let path = paths
        .get(claimed.parent_id)?
        .ok_or_else(|| PipelineError::not_found(format!("path {}", claimed.parent_id)))?;

    let slot = path.slot(claimed.item_index).ok_or_else(|| {
        PipelineError::not_found(format!("path {} day {}", path.id, claimed.item_index))
    })?;

    if let Some(content_id) = slot.content_id {
        debug!(%content_id, "slot already fulfilled, skipping generation");
        // an earlier attempt may have linked the content and failed before activating
        activate_on_first_day(paths, &path, slot.day)?;
        store.mark_ready(claimed.id)?;
        return Ok(JobOutcome::AlreadyFulfilled { content_id });
    }

    let brief = collab.briefs.build(&slot.seed, path.mode, &path.language);
    let generated = with_timeout(timeout, collab.generator.generate(&brief)).await?;

    let owner = ContentOwner::PathDay {
        path_id: path.id,
        day: slot.day,
    };
    let content_id = collab.contents.create(owner, &generated)?;
    paths.link_content(path.id, slot.day, content_id)?;

    activate_on_first_day(paths, &path, slot.day)?;

    store.mark_ready(claimed.id)?;
    Ok(JobOutcome::Generated { content_id })
}

fn activate_on_first_day(
    paths: &dyn PathRepository,
    path: &LearningPath,
    day: u32,
) -> Result<(), PipelineError> {
    if day == 1 && path.status == PathStatus::Draft && paths.activate(path.id)? {
        info!(path_id = %path.id, "path activated by its first day");
    }
    Ok(())
}
