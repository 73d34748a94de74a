//! Per-group polling runner.

use chrono::Utc;
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use lingoforge_core::{ContentId, GroupId, TargetId};

use super::store::GroupStore;
use super::types::{GenerationGroup, GenerationTarget, GroupStatus};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, StoreError};
use crate::paths::{Collaborators, ContentOwner};
use crate::retry::{RetryPolicy, with_timeout};

/// Result of one `generate_next` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NextOutcome {
    /// No target is eligible: everything is done, in flight or out of retries.
    Idle,
    Generated {
        target_id: TargetId,
        content_id: ContentId,
    },
    Failed {
        target_id: TargetId,
        error: String,
        should_retry: bool,
    },
}

impl NextOutcome {
    /// `Idle` counts as success; it is the "nothing to do" sentinel.
    pub fn is_success(&self) -> bool {
        !matches!(self, NextOutcome::Failed { .. })
    }

    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            NextOutcome::Idle => None,
            NextOutcome::Generated { target_id, .. } | NextOutcome::Failed { target_id, .. } => {
                Some(*target_id)
            }
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, NextOutcome::Failed { should_retry: true, .. })
    }
}

/// Advances a group one target per call.
pub struct PollingJobRunner<S: GroupStore> {
    store: S,
    collab: Collaborators,
    config: PipelineConfig,
}

impl<S: GroupStore> PollingJobRunner<S> {
    pub fn new(store: S, collab: Collaborators, config: PipelineConfig) -> Self {
        Self {
            store,
            collab,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }

    pub fn status(&self, group_id: GroupId) -> Result<GroupStatus, PipelineError> {
        match self.store.status(group_id, &self.policy()) {
            Ok(status) => Ok(status),
            Err(StoreError::NotFound(what)) => Err(PipelineError::NotFound(what)),
            Err(e) => Err(e.into()),
        }
    }

    /// Claim and generate the next eligible target of `group_id`.
    pub async fn generate_next(&self, group_id: GroupId) -> Result<NextOutcome, PipelineError> {
        let group = self
            .store
            .get(group_id)?
            .ok_or_else(|| PipelineError::not_found(format!("group {group_id}")))?;

        let policy = self.policy();
        let claimed =
            self.store
                .claim_target(group_id, Utc::now(), self.config.staleness_window, &policy)?;
        let Some(target) = claimed else {
            debug!(%group_id, "no eligible targets");
            return Ok(NextOutcome::Idle);
        };

        let span = info_span!(
            "generation_target",
            group_id = %group_id,
            target_id = %target.target_id
        );
        self.attempt(&group, target, &policy).instrument(span).await
    }

    async fn attempt(
        &self,
        group: &GenerationGroup,
        target: GenerationTarget,
        policy: &RetryPolicy,
    ) -> Result<NextOutcome, PipelineError> {
        debug!(retry_count = target.retry_count, "claimed target");

        let brief = self.collab.briefs.build(&target.seed, group.mode, &group.language);
        let generated = with_timeout(
            self.config.generation_timeout,
            self.collab.generator.generate(&brief),
        )
        .await;

        let content = match generated {
            Ok(content) => content,
            Err(e) => {
                let error = PipelineError::from(e).to_string();
                let should_retry = policy.should_retry(target.retry_count);
                warn!(
                    %error,
                    retry_count = target.retry_count,
                    will_retry = should_retry,
                    "generation attempt failed"
                );
                self.store.record_failure(group.id, target.target_id, &error)?;
                return Ok(NextOutcome::Failed {
                    target_id: target.target_id,
                    error,
                    should_retry,
                });
            }
        };

        let owner = ContentOwner::GroupTarget {
            group_id: group.id,
            target_id: target.target_id,
        };
        let stored = self
            .collab
            .contents
            .create(owner, &content)
            .and_then(|content_id| {
                self.store
                    .record_success(group.id, target.target_id, content_id)
                    .map(|()| content_id)
            });

        match stored {
            Ok(content_id) => {
                debug!(%content_id, "target ready");
                Ok(NextOutcome::Generated {
                    target_id: target.target_id,
                    content_id,
                })
            }
            Err(e) => {
                error!(error = %e, "store failure after generation");
                let released = self
                    .store
                    .record_failure(group.id, target.target_id, &e.to_string());
                if let Err(release) = released {
                    warn!(error = %release, "could not release target after store failure");
                }
                Err(e.into())
            }
        }
    }

    pub async fn generate_all(&self, group_id: GroupId) -> Result<GroupStatus, PipelineError> {
        self.generate_all_with_progress(group_id, |_| {}).await
    }

    /// Call `generate_next` until the group is complete, nothing is eligible, or
    /// the attempt cap is hit. `on_progress` sees every status read.
    pub async fn generate_all_with_progress<F>(
        &self,
        group_id: GroupId,
        mut on_progress: F,
    ) -> Result<GroupStatus, PipelineError>
    where
        F: FnMut(&GroupStatus) + Send,
    {
        let mut attempts = 0u32;
        let mut idle = false;

        loop {
            let status = self.status(group_id)?;
            on_progress(&status);

            if status.is_complete {
                info!(%group_id, total = status.total, attempts, "group complete");
                return Ok(status);
            }
            if idle {
                info!(
                    %group_id,
                    ready = status.ready_count,
                    failed = status.failed_count,
                    attempts,
                    "group stopped with no eligible targets"
                );
                return Ok(status);
            }
            if attempts >= self.config.max_group_attempts {
                warn!(%group_id, attempts, "group attempt cap reached");
                return Ok(status);
            }

            attempts += 1;
            match self.generate_next(group_id).await? {
                NextOutcome::Idle => idle = true,
                NextOutcome::Generated { .. } => {
                    tokio::time::sleep(self.config.inter_generation_delay).await;
                }
                NextOutcome::Failed { .. } => {}
            }
        }
    }
}
