use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lingoforge_core::{ContentId, GroupId, TargetId};
use lingoforge_generation::{ContentSeed, GenerationMode};

use crate::retry::RetryPolicy;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    #[default]
    Pending,
    Generating,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTarget {
    pub target_id: TargetId,
    pub seed: ContentSeed,
    /// Set on success; the only source of truth for completion.
    #[serde(default)]
    pub content_id: Option<ContentId>,
    #[serde(default)]
    pub generation_status: TargetStatus,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl GenerationTarget {
    pub fn new(seed: ContentSeed) -> Self {
        Self {
            target_id: TargetId::new(),
            seed,
            content_id: None,
            generation_status: TargetStatus::Pending,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.content_id.is_some()
    }

    /// A `generating` target whose last attempt started more than `window` ago.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.generation_status != TargetStatus::Generating {
            return false;
        }
        match self.last_attempt_at {
            None => true,
            Some(at) => (now - at).to_std().is_ok_and(|age| age > window),
        }
    }

    /// Failed with no retry budget left.
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        !self.is_done()
            && self.generation_status == TargetStatus::Failed
            && policy.is_exhausted(self.retry_count)
    }

    pub fn is_selectable(&self, now: DateTime<Utc>, window: Duration, policy: &RetryPolicy) -> bool {
        if self.is_done() {
            return false;
        }
        match self.generation_status {
            TargetStatus::Generating => {
                self.is_stale(now, window) && policy.should_retry(self.retry_count)
            }
            TargetStatus::Failed => policy.should_retry(self.retry_count),
            TargetStatus::Pending | TargetStatus::Ready => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationGroup {
    pub id: GroupId,
    pub language: String,
    #[serde(default)]
    pub mode: GenerationMode,
    pub targets: Vec<GenerationTarget>,
}

impl GenerationGroup {
    pub fn new(language: impl Into<String>, seeds: impl IntoIterator<Item = ContentSeed>) -> Self {
        Self {
            id: GroupId::new(),
            language: language.into(),
            mode: GenerationMode::default(),
            targets: seeds.into_iter().map(GenerationTarget::new).collect(),
        }
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn target(&self, target_id: TargetId) -> Option<&GenerationTarget> {
        self.targets.iter().find(|t| t.target_id == target_id)
    }

    pub(crate) fn target_index(&self, target_id: TargetId) -> Option<usize> {
        self.targets.iter().position(|t| t.target_id == target_id)
    }

    /// Index of the first selectable target in stored order.
    pub fn next_selectable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        policy: &RetryPolicy,
    ) -> Option<usize> {
        self.targets
            .iter()
            .position(|t| t.is_selectable(now, window, policy))
    }

    pub fn status(&self, policy: &RetryPolicy) -> GroupStatus {
        let mut status = GroupStatus {
            group_id: self.id,
            total: self.targets.len(),
            ready_count: 0,
            pending_count: 0,
            failed_count: 0,
            generating_count: 0,
            is_complete: false,
            has_failures: false,
        };

        for target in &self.targets {
            if target.is_done() {
                status.ready_count += 1;
                continue;
            }
            match target.generation_status {
                TargetStatus::Pending | TargetStatus::Ready => status.pending_count += 1,
                TargetStatus::Generating => status.generating_count += 1,
                TargetStatus::Failed => status.failed_count += 1,
            }
            if target.is_exhausted(policy) {
                status.has_failures = true;
            }
        }

        status.is_complete = status.ready_count == status.total;
        status
    }
}

/// Per-group counts, derived from the targets on every read.
///
/// A target with content counts as ready whatever its status field says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group_id: GroupId,
    pub total: usize,
    pub ready_count: usize,
    pub pending_count: usize,
    pub failed_count: usize,
    pub generating_count: usize,
    pub is_complete: bool,
    pub has_failures: bool,
}
