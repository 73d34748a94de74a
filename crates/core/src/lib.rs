//! `lingoforge-core`: identifiers and the domain error model shared by every crate.
//!
//! This crate contains no I/O and no runtime concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ContentId, GroupId, JobId, PathId, TargetId};
