//! Parent records and generated-content storage.
//!
//! A [`LearningPath`] owns one slot per day; each slot becomes fulfilled when a
//! content id is linked into it. [`PathRepository`] is both the loader used by
//! the single-job procedure and the parent updater that links content back and
//! activates a draft path.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lingoforge_core::{ContentId, GroupId, PathId, TargetId};
use lingoforge_generation::{
    BriefBuilder, ContentGenerator, ContentSeed, GeneratedContent, GenerationMode,
};

use crate::error::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSlot {
    /// 1-based item index.
    pub day: u32,
    pub seed: ContentSeed,
    #[serde(default)]
    pub content_id: Option<ContentId>,
}

impl PathSlot {
    pub fn new(day: u32, seed: ContentSeed) -> Self {
        Self {
            day,
            seed,
            content_id: None,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.content_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: PathId,
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub mode: GenerationMode,
    #[serde(default)]
    pub status: PathStatus,
    pub slots: Vec<PathSlot>,
}

impl LearningPath {
    /// A draft path with one slot per seed, numbered from day 1.
    pub fn draft(
        title: impl Into<String>,
        language: impl Into<String>,
        seeds: impl IntoIterator<Item = ContentSeed>,
    ) -> Self {
        let slots = seeds
            .into_iter()
            .zip(1u32..)
            .map(|(seed, day)| PathSlot::new(day, seed))
            .collect();
        Self {
            id: PathId::new(),
            title: title.into(),
            language: language.into(),
            mode: GenerationMode::default(),
            status: PathStatus::Draft,
            slots,
        }
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn slot(&self, day: u32) -> Option<&PathSlot> {
        self.slots.iter().find(|s| s.day == day)
    }

    pub fn days(&self) -> Vec<u32> {
        self.slots.iter().map(|s| s.day).collect()
    }
}

pub trait PathRepository: Send + Sync {
    fn get(&self, path_id: PathId) -> Result<Option<LearningPath>, StoreError>;

    /// Point the slot for `day` at `content_id`.
    fn link_content(&self, path_id: PathId, day: u32, content_id: ContentId)
    -> Result<(), StoreError>;

    /// Move a draft path to active. Returns whether a transition happened.
    fn activate(&self, path_id: PathId) -> Result<bool, StoreError>;
}

/// Where a content record came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentOwner {
    PathDay { path_id: PathId, day: u32 },
    GroupTarget { group_id: GroupId, target_id: TargetId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredContent {
    pub id: ContentId,
    pub owner: ContentOwner,
    pub content: GeneratedContent,
    pub created_at: DateTime<Utc>,
}

pub trait ContentRepository: Send + Sync {
    fn create(&self, owner: ContentOwner, content: &GeneratedContent)
    -> Result<ContentId, StoreError>;
}

/// External collaborators shared by both processors.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn ContentGenerator>,
    pub briefs: Arc<dyn BriefBuilder>,
    pub contents: Arc<dyn ContentRepository>,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// In-memory path repository for tests/dev and the CLI state file.
#[derive(Debug, Default)]
pub struct InMemoryPathRepository {
    paths: RwLock<HashMap<PathId, LearningPath>>,
}

impl InMemoryPathRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_paths(paths: impl IntoIterator<Item = LearningPath>) -> Self {
        Self {
            paths: RwLock::new(paths.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn insert(&self, path: LearningPath) -> Result<(), StoreError> {
        let mut paths = self.paths.write().map_err(|_| StoreError::poisoned())?;
        if paths.contains_key(&path.id) {
            return Err(StoreError::Conflict(format!("path {} already exists", path.id)));
        }
        paths.insert(path.id, path);
        Ok(())
    }

    pub fn remove(&self, path_id: PathId) -> Result<Option<LearningPath>, StoreError> {
        let mut paths = self.paths.write().map_err(|_| StoreError::poisoned())?;
        Ok(paths.remove(&path_id))
    }

    pub fn all(&self) -> Result<Vec<LearningPath>, StoreError> {
        let paths = self.paths.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = paths.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }
}

impl PathRepository for InMemoryPathRepository {
    fn get(&self, path_id: PathId) -> Result<Option<LearningPath>, StoreError> {
        let paths = self.paths.read().map_err(|_| StoreError::poisoned())?;
        Ok(paths.get(&path_id).cloned())
    }

    fn link_content(
        &self,
        path_id: PathId,
        day: u32,
        content_id: ContentId,
    ) -> Result<(), StoreError> {
        let mut paths = self.paths.write().map_err(|_| StoreError::poisoned())?;
        let path = paths
            .get_mut(&path_id)
            .ok_or_else(|| StoreError::NotFound(format!("path {path_id}")))?;
        let slot = path
            .slots
            .iter_mut()
            .find(|s| s.day == day)
            .ok_or_else(|| StoreError::NotFound(format!("path {path_id} day {day}")))?;
        slot.content_id = Some(content_id);
        Ok(())
    }

    fn activate(&self, path_id: PathId) -> Result<bool, StoreError> {
        let mut paths = self.paths.write().map_err(|_| StoreError::poisoned())?;
        let path = paths
            .get_mut(&path_id)
            .ok_or_else(|| StoreError::NotFound(format!("path {path_id}")))?;
        if path.status != PathStatus::Draft {
            return Ok(false);
        }
        path.status = PathStatus::Active;
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryContentRepository {
    contents: RwLock<HashMap<ContentId, StoredContent>>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_contents(contents: impl IntoIterator<Item = StoredContent>) -> Self {
        Self {
            contents: RwLock::new(contents.into_iter().map(|c| (c.id, c)).collect()),
        }
    }

    pub fn get(&self, id: ContentId) -> Result<Option<StoredContent>, StoreError> {
        let contents = self.contents.read().map_err(|_| StoreError::poisoned())?;
        Ok(contents.get(&id).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let contents = self.contents.read().map_err(|_| StoreError::poisoned())?;
        Ok(contents.len())
    }

    pub fn all(&self) -> Result<Vec<StoredContent>, StoreError> {
        let contents = self.contents.read().map_err(|_| StoreError::poisoned())?;
        let mut all: Vec<_> = contents.values().cloned().collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }
}

impl ContentRepository for InMemoryContentRepository {
    fn create(
        &self,
        owner: ContentOwner,
        content: &GeneratedContent,
    ) -> Result<ContentId, StoreError> {
        let mut contents = self.contents.write().map_err(|_| StoreError::poisoned())?;
        let id = ContentId::new();
        contents.insert(
            id,
            StoredContent {
                id,
                owner,
                content: content.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}
