//! JSON state snapshot backing the in-memory stores.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use lingoforge_pipeline::{
    GenerationGroup, GenerationJob, InMemoryContentRepository, InMemoryGroupStore,
    InMemoryJobStore, InMemoryPathRepository, LearningPath, StoredContent,
};

/// On-disk shape of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFile {
    pub paths: Vec<LearningPath>,
    pub jobs: Vec<GenerationJob>,
    pub groups: Vec<GenerationGroup>,
    pub contents: Vec<StoredContent>,
}

/// Live stores built from a [`StateFile`].
#[derive(Debug, Default)]
pub struct State {
    pub paths: Arc<InMemoryPathRepository>,
    pub jobs: Arc<InMemoryJobStore>,
    pub groups: Arc<InMemoryGroupStore>,
    pub contents: Arc<InMemoryContentRepository>,
}

impl State {
    /// Load the snapshot at `path`; a missing file is an empty state.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no state file, starting empty");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading state {}", path.display()))?;
        let file: StateFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing state {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: StateFile) -> Self {
        Self {
            paths: Arc::new(InMemoryPathRepository::from_paths(file.paths)),
            jobs: Arc::new(InMemoryJobStore::from_jobs(file.jobs)),
            groups: Arc::new(InMemoryGroupStore::from_groups(file.groups)),
            contents: Arc::new(InMemoryContentRepository::from_contents(file.contents)),
        }
    }

    pub fn snapshot(&self) -> anyhow::Result<StateFile> {
        Ok(StateFile {
            paths: self.paths.all()?,
            jobs: self.jobs.all()?,
            groups: self.groups.all()?,
            contents: self.contents.all()?,
        })
    }

    /// Write the snapshot next to `path` and rename it into place.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot()?)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}
