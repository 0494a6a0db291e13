//! Language model trait

use crate::{GenerateRequest, GenerateResponse, Result};
use async_trait::async_trait;

/// Generative text service
///
/// Output is free text and is not guaranteed to be
/// well-formed JSON.
#[async_trait]
pub trait LanguageModel: Send + Sync + 'static {
    /// Generate a completion for a single prompt
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
