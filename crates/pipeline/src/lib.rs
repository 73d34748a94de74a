//! Content-generation job pipeline.
//!
//! Two processors share one state machine:
//!
//! - `jobs`: one row per unit of work, drained in bounded batches by
//!   [`BatchQueueProcessor`].
//! - `groups`: one record per group with an embedded, ordered set of targets,
//!   advanced one target at a time by [`PollingJobRunner`].
//!
//! Both call the external [`ContentGenerator`](lingoforge_generation::ContentGenerator)
//! under a per-attempt deadline and apply the same [`RetryPolicy`].

pub mod config;
pub mod error;
pub mod groups;
pub mod jobs;
pub mod paths;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, PipelineConfig};
pub use error::{PipelineError, PipelineResult, StoreError};
pub use groups::{
    GenerationGroup, GenerationTarget, GroupStatus, GroupStore, InMemoryGroupStore, NextOutcome,
    PollingJobRunner, TargetStatus,
};
pub use jobs::{
    BatchQueueProcessor, BatchReport, GenerationJob, InMemoryJobStore, JobFailure, JobOutcome,
    JobSchedule, JobStats, JobStatus, JobStore, ReleasedJobs,
};
pub use paths::{
    Collaborators, ContentOwner, ContentRepository, InMemoryContentRepository,
    InMemoryPathRepository, LearningPath, PathRepository, PathSlot, PathStatus, StoredContent,
};
pub use retry::{RetryPolicy, with_timeout};
