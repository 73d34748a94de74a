//! Batch-queue variant: one job per path day.
//!
//! ## Design
//!
//! - Jobs are created in bulk when a path is created, with staggered target dates
//! - A job becomes eligible once its target date has passed ("not before")
//! - Pickup is an atomic conditional claim, so two processors never run the same job
//! - Failures return the job to `pending` until the retry budget is spent
//!
//! ## Components
//!
//! - `GenerationJob`: the job record and its status
//! - `JobStore`: persistence and status transitions (in-memory implementation included)
//! - `BatchQueueProcessor`: drains due jobs sequentially and reports aggregate counts

pub mod procedure;
pub mod processor;
pub mod store;
pub mod types;

pub use procedure::JobOutcome;
pub use processor::{BatchQueueProcessor, BatchReport, JobFailure};
pub use store::{InMemoryJobStore, JobStore};
pub use types::{GenerationJob, JobSchedule, JobStats, JobStatus, ReleasedJobs};
