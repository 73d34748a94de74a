//! `lingoforge-generation`
//!
//! **Responsibility:** boundary to the external content generator (an LLM).
//!
//! This crate is intentionally storage-agnostic:
//! - It does not know about jobs, paths, or groups.
//! - It does not enforce timeouts; callers race generation against their own deadline.
//! - It turns a content seed into a brief and a brief into structured content.

pub mod brief;
pub mod content;
pub mod generator;
pub mod http;

pub use brief::{BriefBuilder, ContentSeed, Difficulty, GenerationBrief, GenerationMode, TemplateBriefBuilder};
pub use content::{GeneratedContent, GenerationError};
pub use generator::ContentGenerator;
pub use http::{HttpContentGenerator, HttpGeneratorConfig};
