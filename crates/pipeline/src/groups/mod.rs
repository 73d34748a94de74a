//! Polling variant: one record per group, targets embedded in stored order.
//!
//! - A target with a `content_id` is done, whatever its status says
//! - A `generating` target is reclaimed once its last attempt is older than the staleness window
//! - A failed target with no retry budget left is never selected again
//! - Group status is derived from the targets on every read

pub mod runner;
pub mod store;
pub mod types;

pub use runner::{NextOutcome, PollingJobRunner};
pub use store::{GroupStore, InMemoryGroupStore};
pub use types::{GenerationGroup, GenerationTarget, GroupStatus, TargetStatus};
