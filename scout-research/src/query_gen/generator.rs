//! Language-generation collaborator interface

use crate::models::EnhancementType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub enhancement: EnhancementType,
    pub temperature: f32,
    pub top_p: f32,
    /// Upper bound on queries requested from the collaborator
    pub max_queries: u32,
}

/// Collaborator-reported metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub engine: String,
    pub model: String,
    pub token_usage: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub queries: Vec<String>,
    pub metadata: GenerationMetadata,
}

/// Generator errors
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    /// Timeout, connection failure, 429 or 5xx; worth retrying
    #[error("Transient generator failure: {0}")]
    Transient(String),

    /// Rejected request, bad credentials or unusable response
    #[error("Generator failure: {0}")]
    Permanent(String),
}

impl GeneratorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Produces candidate query texts from a prompt
#[async_trait]
pub trait LanguageGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, GeneratorError>;
}
