//! Test doubles and fixtures shared by the unit and integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lingoforge_core::{ContentId, GroupId, JobId, PathId};
use lingoforge_generation::{
    ContentGenerator, ContentSeed, Difficulty, GeneratedContent, GenerationBrief, GenerationError,
    TemplateBriefBuilder,
};

use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::groups::{GenerationGroup, InMemoryGroupStore, PollingJobRunner};
use crate::jobs::{
    BatchQueueProcessor, GenerationJob, InMemoryJobStore, JobSchedule, JobStats, JobStore,
    ReleasedJobs,
};
use crate::paths::{
    Collaborators, ContentOwner, ContentRepository, InMemoryContentRepository,
    InMemoryPathRepository, LearningPath, PathRepository,
};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy)]
enum Script {
    Fail,
    FailTimes(u32),
    Hang,
}

/// Generator whose behaviour is scripted per theme.
///
/// Themes without a script succeed with a title derived from the theme.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, theme: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(theme.to_string(), script);
        self
    }

    pub fn always_fail(self, theme: &str) -> Self {
        self.script(theme, Script::Fail)
    }

    /// Fail the first `times` calls for `theme`, then succeed.
    pub fn fail_times(self, theme: &str, times: u32) -> Self {
        self.script(theme, Script::FailTimes(times))
    }

    /// Never complete for `theme`.
    pub fn hang_on(self, theme: &str) -> Self {
        self.script(theme, Script::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_script(&self, brief: &GenerationBrief) -> Option<(String, Script)> {
        let mut scripts = self.scripts.lock().unwrap();
        let (theme, script) = scripts
            .iter_mut()
            .find(|(theme, _)| brief.brief.contains(&format!("\"{theme}\"")))?;

        let current = *script;
        if let Script::FailTimes(n) = script {
            if *n == 0 {
                return None;
            }
            *n -= 1;
        }
        Some((theme.clone(), current))
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, brief: &GenerationBrief) -> Result<GeneratedContent, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.next_script(brief) {
            Some((theme, Script::Fail | Script::FailTimes(_))) => {
                Err(GenerationError::Failed(format!("scripted failure for {theme}")))
            }
            Some((_, Script::Hang)) => std::future::pending().await,
            None => Ok(GeneratedContent::new(
                format!("{} ({})", brief.mode, brief.language_hint),
                brief.brief.lines().next().unwrap_or_default().to_string(),
            )),
        }
    }
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_inter_generation_delay(Duration::ZERO)
}

fn seeds(themes: &[&str]) -> Vec<ContentSeed> {
    themes
        .iter()
        .map(|t| ContentSeed::new(*t, Difficulty::Beginner))
        .collect()
}

fn collaborators(
    generator: Arc<ScriptedGenerator>,
    contents: Arc<InMemoryContentRepository>,
) -> Collaborators {
    Collaborators {
        generator,
        briefs: Arc::new(TemplateBriefBuilder),
        contents,
    }
}

/// A draft path with one job per day.
pub struct Fixture {
    pub jobs: Arc<InMemoryJobStore>,
    pub paths: Arc<InMemoryPathRepository>,
    pub contents: Arc<InMemoryContentRepository>,
    pub generator: Arc<ScriptedGenerator>,
    pub collab: Collaborators,
    pub path_id: PathId,
}

impl Fixture {
    /// Every day is due immediately.
    pub fn path(themes: &[&str], generator: ScriptedGenerator) -> Self {
        Self::scheduled(themes, generator, JobSchedule::immediate(Utc::now()))
    }

    pub fn scheduled(themes: &[&str], generator: ScriptedGenerator, schedule: JobSchedule) -> Self {
        let generator = Arc::new(generator);
        let contents = InMemoryContentRepository::arc();
        let paths = InMemoryPathRepository::arc();
        let jobs = InMemoryJobStore::arc();

        let path = LearningPath::draft("Test path", "es", seeds(themes));
        let path_id = path.id;
        let days = path.days();
        paths.insert(path).unwrap();
        jobs.enqueue(path_id, &days, schedule).unwrap();

        Self {
            collab: collaborators(generator.clone(), contents.clone()),
            jobs,
            paths,
            contents,
            generator,
            path_id,
        }
    }

    pub fn batch_processor(&self, config: PipelineConfig) -> BatchQueueProcessor<Arc<InMemoryJobStore>> {
        BatchQueueProcessor::new(
            self.jobs.clone(),
            self.paths.clone(),
            self.collab.clone(),
            config,
        )
    }
}

/// A single group of targets in an in-memory group store.
pub struct GroupFixture {
    pub groups: Arc<InMemoryGroupStore>,
    pub contents: Arc<InMemoryContentRepository>,
    pub generator: Arc<ScriptedGenerator>,
    pub collab: Collaborators,
    pub group_id: GroupId,
}

impl GroupFixture {
    pub fn new(themes: &[&str], generator: ScriptedGenerator) -> Self {
        let generator = Arc::new(generator);
        let contents = InMemoryContentRepository::arc();
        let groups = InMemoryGroupStore::arc();
        let group_id = groups
            .insert(GenerationGroup::new("it", seeds(themes)))
            .unwrap();

        Self {
            collab: collaborators(generator.clone(), contents.clone()),
            groups,
            contents,
            generator,
            group_id,
        }
    }

    pub fn runner(&self, config: PipelineConfig) -> PollingJobRunner<Arc<InMemoryGroupStore>> {
        PollingJobRunner::new(self.groups.clone(), self.collab.clone(), config)
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Storage(format!("{what} unavailable"))
}

/// Job store whose `mark_ready` fails until [`ReadyFailingStore::recover`] is called.
pub struct ReadyFailingStore {
    inner: Arc<InMemoryJobStore>,
    failing: AtomicBool,
}

impl ReadyFailingStore {
    pub fn new(inner: Arc<InMemoryJobStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(true),
        }
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

impl JobStore for ReadyFailingStore {
    fn enqueue(
        &self,
        parent_id: PathId,
        items: &[u32],
        schedule: JobSchedule,
    ) -> Result<Vec<JobId>, StoreError> {
        self.inner.enqueue(parent_id, items, schedule)
    }

    fn get(&self, job_id: JobId) -> Result<Option<GenerationJob>, StoreError> {
        self.inner.get(job_id)
    }

    fn due_jobs(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<GenerationJob>, StoreError> {
        self.inner.due_jobs(limit, now)
    }

    fn mark_processing(
        &self,
        job_id: JobId,
        expected_retry_count: u32,
    ) -> Result<Option<GenerationJob>, StoreError> {
        self.inner.mark_processing(job_id, expected_retry_count)
    }

    fn mark_ready(&self, job_id: JobId) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("job store"));
        }
        self.inner.mark_ready(job_id)
    }

    fn mark_failed(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        self.inner.mark_failed(job_id, error)
    }

    fn reset_for_retry(&self, job_id: JobId, error: &str) -> Result<(), StoreError> {
        self.inner.reset_for_retry(job_id, error)
    }

    fn jobs_for_parent(&self, parent_id: PathId) -> Result<Vec<GenerationJob>, StoreError> {
        self.inner.jobs_for_parent(parent_id)
    }

    fn failed_jobs(&self, limit: usize) -> Result<Vec<GenerationJob>, StoreError> {
        self.inner.failed_jobs(limit)
    }

    fn stats(&self) -> Result<JobStats, StoreError> {
        self.inner.stats()
    }

    fn delete_for_parent(&self, parent_id: PathId) -> Result<usize, StoreError> {
        self.inner.delete_for_parent(parent_id)
    }

    fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.purge_terminal(cutoff)
    }

    fn release_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<ReleasedJobs, StoreError> {
        self.inner.release_abandoned(cutoff, policy)
    }

    fn requeue_failed(&self, job_id: JobId) -> Result<GenerationJob, StoreError> {
        self.inner.requeue_failed(job_id)
    }
}

/// Path repository whose first `failures` activations fail.
pub struct FlakyActivatePaths {
    inner: Arc<InMemoryPathRepository>,
    failures: AtomicUsize,
}

impl FlakyActivatePaths {
    pub fn new(inner: Arc<InMemoryPathRepository>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

impl PathRepository for FlakyActivatePaths {
    fn get(&self, path_id: PathId) -> Result<Option<LearningPath>, StoreError> {
        self.inner.get(path_id)
    }

    fn link_content(
        &self,
        path_id: PathId,
        day: u32,
        content_id: ContentId,
    ) -> Result<(), StoreError> {
        self.inner.link_content(path_id, day, content_id)
    }

    fn activate(&self, path_id: PathId) -> Result<bool, StoreError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(unavailable("path store"));
        }
        self.inner.activate(path_id)
    }
}

/// Content store that rejects every write.
#[derive(Debug, Default)]
pub struct UnavailableContents;

impl ContentRepository for UnavailableContents {
    fn create(
        &self,
        _owner: ContentOwner,
        _content: &GeneratedContent,
    ) -> Result<ContentId, StoreError> {
        Err(unavailable("content store"))
    }
}
