//! Group storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use lingoforge_core::{ContentId, GroupId, TargetId};

use super::types::{GenerationGroup, GenerationTarget, GroupStatus, TargetStatus};
use crate::error::StoreError;
use crate::jobs::store::ABANDONED_ATTEMPT;
use crate::retry::RetryPolicy;

/// Group store abstraction.
///
/// Updates address one target inside one group and touch only that target's fields.
pub trait GroupStore: Send + Sync {
    fn get(&self, group_id: GroupId) -> Result<Option<GenerationGroup>, StoreError>;

    /// Select the next eligible target and mark it `generating`, atomically.
    ///
    /// The attempt counts as a retry when the target's previous attempt failed or
    /// was abandoned. A stale target with no budget left is marked `failed`
    /// instead of being selected. Returns the claimed target, or `None` when
    /// nothing is eligible.
    fn claim_target(
        &self,
        group_id: GroupId,
        now: DateTime<Utc>,
        staleness: Duration,
        policy: &RetryPolicy,
    ) -> Result<Option<GenerationTarget>, StoreError>;

    fn record_success(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        content_id: ContentId,
    ) -> Result<(), StoreError>;

    fn record_failure(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        error: &str,
    ) -> Result<(), StoreError>;

    fn status(&self, group_id: GroupId, policy: &RetryPolicy) -> Result<GroupStatus, StoreError> {
        self.get(group_id)?
            .map(|g| g.status(policy))
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGroupStore {
    groups: RwLock<HashMap<GroupId, GenerationGroup>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_groups(groups: impl IntoIterator<Item = GenerationGroup>) -> Self {
        Self {
            groups: RwLock::new(groups.into_iter().map(|g| (g.id, g)).collect()),
        }
    }

    pub fn insert(&self, group: GenerationGroup) -> Result<GroupId, StoreError> {
        let mut groups = self.groups.write().map_err(|_| StoreError::poisoned())?;
        if groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {} already exists", group.id)));
        }
        let id = group.id;
        groups.insert(id, group);
        Ok(id)
    }

    pub fn all(&self) -> Result<Vec<GenerationGroup>, StoreError> {
        let groups = self.groups.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = groups.values().cloned().collect();
        all.sort_by_key(|g| g.id);
        Ok(all)
    }

    fn update_target<F>(&self, group_id: GroupId, target_id: TargetId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut GenerationTarget),
    {
        let mut groups = self.groups.write().map_err(|_| StoreError::poisoned())?;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))?;
        let idx = group
            .target_index(target_id)
            .ok_or_else(|| StoreError::NotFound(format!("target {target_id} in group {group_id}")))?;
        f(&mut group.targets[idx]);
        Ok(())
    }
}

impl GroupStore for InMemoryGroupStore {
    fn get(&self, group_id: GroupId) -> Result<Option<GenerationGroup>, StoreError> {
        let groups = self.groups.read().map_err(|_| StoreError::poisoned())?;
        Ok(groups.get(&group_id).cloned())
    }

    fn claim_target(
        &self,
        group_id: GroupId,
        now: DateTime<Utc>,
        staleness: Duration,
        policy: &RetryPolicy,
    ) -> Result<Option<GenerationTarget>, StoreError> {
        let mut groups = self.groups.write().map_err(|_| StoreError::poisoned())?;
        let group = groups
            .get_mut(&group_id)
            .ok_or_else(|| StoreError::NotFound(format!("group {group_id}")))?;

        // abandoned attempts that used up the budget become terminal
        for target in group.targets.iter_mut() {
            if !target.is_done()
                && target.is_stale(now, staleness)
                && policy.is_exhausted(target.retry_count)
            {
                target.generation_status = TargetStatus::Failed;
                target.last_error = Some(ABANDONED_ATTEMPT.to_string());
            }
        }

        let Some(idx) = group.next_selectable(now, staleness, policy) else {
            return Ok(None);
        };

        let target = &mut group.targets[idx];
        let follows_failure = matches!(
            target.generation_status,
            TargetStatus::Failed | TargetStatus::Generating
        );
        target.retry_count = RetryPolicy::claimed_retry_count(target.retry_count, follows_failure);
        target.generation_status = TargetStatus::Generating;
        target.last_attempt_at = Some(now);
        Ok(Some(target.clone()))
    }

    fn record_success(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        content_id: ContentId,
    ) -> Result<(), StoreError> {
        self.update_target(group_id, target_id, |t| {
            t.content_id = Some(content_id);
            t.generation_status = TargetStatus::Ready;
            t.last_error = None;
        })
    }

    fn record_failure(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update_target(group_id, target_id, |t| {
            t.generation_status = TargetStatus::Failed;
            t.last_error = Some(error.to_string());
        })
    }
}

impl GroupStore for Arc<InMemoryGroupStore> {
    fn get(&self, group_id: GroupId) -> Result<Option<GenerationGroup>, StoreError> {
        (**self).get(group_id)
    }

    fn claim_target(
        &self,
        group_id: GroupId,
        now: DateTime<Utc>,
        staleness: Duration,
        policy: &RetryPolicy,
    ) -> Result<Option<GenerationTarget>, StoreError> {
        (**self).claim_target(group_id, now, staleness, policy)
    }

    fn record_success(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        content_id: ContentId,
    ) -> Result<(), StoreError> {
        (**self).record_success(group_id, target_id, content_id)
    }

    fn record_failure(
        &self,
        group_id: GroupId,
        target_id: TargetId,
        error: &str,
    ) -> Result<(), StoreError> {
        (**self).record_failure(group_id, target_id, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use lingoforge_generation::{ContentSeed, Difficulty};

    const WINDOW: Duration = Duration::from_secs(120);

    fn store_with(themes: &[&str]) -> (InMemoryGroupStore, GroupId) {
        let group = GenerationGroup::new(
            "de",
            themes.iter().map(|t| ContentSeed::new(*t, Difficulty::Beginner)),
        );
        let store = InMemoryGroupStore::new();
        let id = store.insert(group).unwrap();
        (store, id)
    }

    #[test]
    fn claim_marks_generating_and_stamps() {
        let (store, id) = store_with(&["a", "b"]);
        let now = Utc::now();

        let claimed = store
            .claim_target(id, now, WINDOW, &RetryPolicy::default())
            .unwrap()
            .unwrap();
        assert_eq!(claimed.generation_status, TargetStatus::Generating);
        assert_eq!(claimed.last_attempt_at, Some(now));
        assert_eq!(claimed.retry_count, 0);

        // the in-flight target is skipped by the next claim
        let next = store
            .claim_target(id, now, WINDOW, &RetryPolicy::default())
            .unwrap()
            .unwrap();
        assert_ne!(next.target_id, claimed.target_id);
    }

    #[test]
    fn retry_counted_on_attempt_after_failure() {
        let (store, id) = store_with(&["a"]);
        let policy = RetryPolicy::default();
        let now = Utc::now();

        let first = store.claim_target(id, now, WINDOW, &policy).unwrap().unwrap();
        store.record_failure(id, first.target_id, "boom").unwrap();
        let failed = store.get(id).unwrap().unwrap().targets[0].clone();
        assert_eq!(failed.retry_count, 0);
        assert_eq!(failed.generation_status, TargetStatus::Failed);

        let second = store.claim_target(id, now, WINDOW, &policy).unwrap().unwrap();
        assert_eq!(second.retry_count, 1);
    }

    #[test]
    fn success_sets_content_and_clears_error() {
        let (store, id) = store_with(&["a"]);
        let policy = RetryPolicy::default();
        let t = store.claim_target(id, Utc::now(), WINDOW, &policy).unwrap().unwrap();
        store.record_failure(id, t.target_id, "boom").unwrap();
        store.claim_target(id, Utc::now(), WINDOW, &policy).unwrap().unwrap();

        let content_id = ContentId::new();
        store.record_success(id, t.target_id, content_id).unwrap();

        let target = store.get(id).unwrap().unwrap().targets[0].clone();
        assert_eq!(target.content_id, Some(content_id));
        assert!(target.last_error.is_none());
        assert!(store.status(id, &policy).unwrap().is_complete);
        assert!(store.claim_target(id, Utc::now(), WINDOW, &policy).unwrap().is_none());
    }

    #[test]
    fn stale_generating_target_is_reclaimed() {
        let (store, id) = store_with(&["a"]);
        let policy = RetryPolicy::default();
        let started = Utc::now() - ChronoDuration::minutes(5);
        store.claim_target(id, started, WINDOW, &policy).unwrap().unwrap();

        let reclaimed = store
            .claim_target(id, Utc::now(), WINDOW, &policy)
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.retry_count, 1);
    }

    #[test]
    fn stale_target_without_budget_becomes_failed() {
        let (store, id) = store_with(&["a"]);
        let policy = RetryPolicy::new(1);
        let started = Utc::now() - ChronoDuration::minutes(5);
        store.claim_target(id, started, WINDOW, &policy).unwrap().unwrap();

        assert!(store.claim_target(id, Utc::now(), WINDOW, &policy).unwrap().is_none());
        let status = store.status(id, &policy).unwrap();
        assert!(status.has_failures);
        assert_eq!(status.failed_count, 1);
    }

    #[test]
    fn unknown_group_or_target_is_not_found() {
        let (store, id) = store_with(&["a"]);
        let policy = RetryPolicy::default();

        assert!(matches!(
            store.claim_target(GroupId::new(), Utc::now(), WINDOW, &policy),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.record_failure(id, TargetId::new(), "x"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.status(GroupId::new(), &policy), Err(StoreError::NotFound(_))));
    }
}
