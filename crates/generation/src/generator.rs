use std::sync::Arc;

use async_trait::async_trait;

use crate::brief::GenerationBrief;
use crate::content::{GeneratedContent, GenerationError};

/// The external generation call.
///
/// Implementations may hang; callers are expected to impose their own deadline.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, brief: &GenerationBrief) -> Result<GeneratedContent, GenerationError>;
}

#[async_trait]
impl<G: ContentGenerator + ?Sized> ContentGenerator for Arc<G> {
    async fn generate(&self, brief: &GenerationBrief) -> Result<GeneratedContent, GenerationError> {
        (**self).generate(brief).await
    }
}
