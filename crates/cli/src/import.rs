//! Bulk creation of paths and groups from a JSON file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lingoforge_core::{DomainError, DomainResult, GroupId, PathId};
use lingoforge_generation::{ContentSeed, GenerationMode};
use lingoforge_pipeline::{
    GenerationGroup, JobSchedule, JobStore, LearningPath, PipelineConfig,
};

use crate::state::State;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathSpec {
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub mode: GenerationMode,
    pub days: Vec<ContentSeed>,
}

impl PathSpec {
    fn validate(&self) -> DomainResult<()> {
        if self.days.is_empty() {
            return Err(DomainError::validation(format!("path {:?} has no days", self.title)));
        }
        validate_seeds(&self.days)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupSpec {
    pub language: String,
    #[serde(default)]
    pub mode: GenerationMode,
    pub targets: Vec<ContentSeed>,
}

impl GroupSpec {
    fn validate(&self) -> DomainResult<()> {
        if self.targets.is_empty() {
            return Err(DomainError::validation(format!(
                "{} group has no targets",
                self.language
            )));
        }
        validate_seeds(&self.targets)
    }
}

fn validate_seeds(seeds: &[ContentSeed]) -> DomainResult<()> {
    match seeds.iter().position(|s| s.theme.trim().is_empty()) {
        Some(i) => Err(DomainError::validation(format!("item {} has an empty theme", i + 1))),
        None => Ok(()),
    }
}

/// ```json
/// { "paths": [{ "title": "...", "language": "es", "days": [{ "theme": "Greetings" }] }],
///   "groups": [{ "language": "fr", "targets": [{ "theme": "Colours" }] }] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImportFile {
    pub paths: Vec<PathSpec>,
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub paths: Vec<PathId>,
    pub jobs: usize,
    pub groups: Vec<GroupId>,
}

/// Create draft paths with one job per day, staggered by `job_spacing` from
/// `start`, and groups with all targets pending.
///
/// The whole file is validated before anything is created.
pub fn apply(
    state: &State,
    file: ImportFile,
    config: &PipelineConfig,
    start: DateTime<Utc>,
) -> anyhow::Result<ImportSummary> {
    file.paths.iter().try_for_each(PathSpec::validate)?;
    file.groups.iter().try_for_each(GroupSpec::validate)?;

    let mut summary = ImportSummary::default();

    for spec in file.paths {
        let path = LearningPath::draft(spec.title, spec.language, spec.days).with_mode(spec.mode);
        let path_id = path.id;
        let days = path.days();
        state.paths.insert(path)?;

        let schedule = JobSchedule::from_spacing(start, config.job_spacing);
        summary.jobs += state.jobs.enqueue(path_id, &days, schedule)?.len();
        summary.paths.push(path_id);
    }

    for spec in file.groups {
        let group = GenerationGroup::new(spec.language, spec.targets).with_mode(spec.mode);
        summary.groups.push(state.groups.insert(group)?);
    }

    tracing::info!(
        paths = summary.paths.len(),
        jobs = summary.jobs,
        groups = summary.groups.len(),
        "import applied"
    );
    Ok(summary)
}
