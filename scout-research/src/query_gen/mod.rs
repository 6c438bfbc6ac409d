//! Query generation
//!
//! Turns a research request into ranked web search queries, combining local
//! templates with a pluggable language generator.

pub mod engine;
pub mod generator;
pub mod http_generator;
pub mod templates;

pub use engine::{
    GenerationFailure, GenerationOptions, GenerationOutcome, GenerationStats, QueryEngine,
    QueryEngineConfig, QueryGenError, QueryScoreWeights,
};
pub use generator::{
    GenerationMetadata, GenerationOutput, GenerationParams, GeneratorError, LanguageGenerator,
};
pub use http_generator::{GeneratorConfig, HttpLanguageGenerator};
