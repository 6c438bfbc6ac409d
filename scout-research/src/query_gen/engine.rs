//! Query generation and scoring engine
//!
//! One research request in; a diversified, deduplicated, ranked query set out.
//!
//! Pipeline:
//! 1. Validate request and options (no collaborator call on failure)
//! 2. Generate per enhancement type: templates locally, other types through
//!    the [`LanguageGenerator`], with an optional diversity-boost call run
//!    concurrently with the base call
//! 3. Sanitize and collapse exact duplicates (base variant preferred)
//! 4. Score relevance and coverage, then walk in preliminary order scoring
//!    diversity and dropping near-duplicates
//! 5. Filter by confidence, sort by overall score, truncate, and compute
//!    similarity to the top query

use super::generator::{GenerationOutput, GenerationParams, GeneratorError, LanguageGenerator};
use super::templates::{build_prompt, template_queries};
use crate::models::{
    EnhancementType, GeneratedQuery, QueryMetadata, QueryScores, QueryVariant, ResearchRequest,
    ValidationError,
};
use crate::models::research_request::MAX_QUERIES_LIMIT;
use crate::scoring::{contains_phrase, overlap_ratio, text_similarity, tokenize, weighted_mean};
use crate::utils::{retry_with_backoff, RetryPolicy};
use scout_common::events::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Configuration and options
// ============================================================================

/// Weights of the three scored axes in `overall`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryScoreWeights {
    pub relevance: f64,
    pub diversity: f64,
    pub coverage: f64,
}

impl Default for QueryScoreWeights {
    fn default() -> Self {
        Self {
            relevance: 0.5,
            diversity: 0.2,
            coverage: 0.3,
        }
    }
}

/// `[query_engine]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryEngineConfig {
    pub weights: QueryScoreWeights,
    /// Candidates at or above this similarity to an accepted query are dropped
    pub similarity_threshold: f64,
    /// Share of relevance taken from seed-text overlap when a seed is given
    pub seed_weight: f64,
    pub base_temperature: f32,
    pub base_top_p: f32,
    pub boost_temperature: f32,
    pub boost_top_p: f32,
    pub min_query_chars: usize,
    pub max_query_chars: usize,
    pub retry: RetryPolicy,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            weights: QueryScoreWeights::default(),
            similarity_threshold: 0.8,
            seed_weight: 0.3,
            base_temperature: 0.7,
            base_top_p: 0.9,
            boost_temperature: 1.1,
            boost_top_p: 1.0,
            min_query_chars: 3,
            max_query_chars: 256,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub max_queries: u32,
    pub diversity_boost: bool,
    pub confidence_threshold: f64,
    /// Enhancement type names; unknown names are a validation error
    pub enhancement_types: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_queries: 10,
            diversity_boost: true,
            confidence_threshold: 0.5,
            enhancement_types: ["expansion", "refinement", "localization", "template"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GenerationOptions {
    /// Validate ranges and parse enhancement types (de-duplicated, in order)
    pub fn validate(&self) -> Result<Vec<EnhancementType>, ValidationError> {
        let mut errors = ValidationError::new();

        if self.max_queries == 0 || self.max_queries > MAX_QUERIES_LIMIT {
            errors.push(
                "maxQueries",
                format!("must be between 1 and {}", MAX_QUERIES_LIMIT),
            );
        }
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            errors.push("confidenceThreshold", "must be between 0 and 1");
        }

        let mut types = Vec::new();
        for name in &self.enhancement_types {
            match name.parse::<EnhancementType>() {
                Ok(t) if !types.contains(&t) => types.push(t),
                Ok(_) => {}
                Err(message) => errors.push("enhancementTypes", message),
            }
        }
        if self.enhancement_types.is_empty() {
            errors.push("enhancementTypes", "must list at least one type");
        }

        errors.into_result().map(|_| types)
    }
}

// ============================================================================
// Results and errors
// ============================================================================

/// A generation call that produced no candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub enhancement: EnhancementType,
    pub variant: QueryVariant,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub collaborator_calls: usize,
    pub raw_candidates: usize,
    pub sanitized_dropped: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
    pub below_confidence: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    /// Ordered by `scores.overall` descending
    pub queries: Vec<GeneratedQuery>,
    pub failures: Vec<GenerationFailure>,
    pub stats: GenerationStats,
}

#[derive(Debug, Clone, Error)]
pub enum QueryGenError {
    #[error("Invalid generation request: {0}")]
    Validation(ValidationError),

    #[error("Language generator failed on all {calls} calls: {last_error}")]
    CollaboratorExhausted { calls: usize, last_error: String },
}

impl QueryGenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::CollaboratorExhausted { .. } => ErrorCategory::CollaboratorExhausted,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

// ============================================================================
// Engine
// ============================================================================

struct RawQuery {
    text: String,
    query_type: EnhancementType,
    variant: QueryVariant,
    engine: String,
    model: String,
    processing_time_ms: u64,
    token_usage: Option<u32>,
}

struct ScoredQuery {
    raw: RawQuery,
    relevance: f64,
    coverage: f64,
    diversity: f64,
    overall: f64,
}

impl ScoredQuery {
    fn preliminary(&self) -> f64 {
        self.relevance + self.coverage
    }
}

/// Query generation engine
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct QueryEngine {
    generator: Arc<dyn LanguageGenerator>,
    config: QueryEngineConfig,
}

impl QueryEngine {
    pub fn new(generator: Arc<dyn LanguageGenerator>, config: QueryEngineConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &QueryEngineConfig {
        &self.config
    }

    /// Generate, score and rank queries for `request`
    pub async fn generate(
        &self,
        request: &ResearchRequest,
        seed_text: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<GenerationOutcome, QueryGenError> {
        request.validate().map_err(QueryGenError::Validation)?;
        let types = options.validate().map_err(QueryGenError::Validation)?;

        let mut pool = Vec::new();
        let mut failures = Vec::new();
        let mut stats = GenerationStats::default();
        let mut failed_calls = 0usize;
        let mut last_error = String::new();

        for enhancement in types {
            if !enhancement.uses_collaborator() {
                pool.extend(template_queries(request).into_iter().map(|text| RawQuery {
                    text,
                    query_type: enhancement,
                    variant: QueryVariant::Template,
                    engine: "template".to_string(),
                    model: "local".to_string(),
                    processing_time_ms: 0,
                    token_usage: None,
                }));
                continue;
            }

            let prompt = build_prompt(enhancement, request, seed_text, options.max_queries);
            let base = self.params(enhancement, QueryVariant::Base, options.max_queries);

            let results = if options.diversity_boost {
                let boosted =
                    self.params(enhancement, QueryVariant::DiversityBoost, options.max_queries);
                let (base_result, boost_result) =
                    tokio::join!(self.call(&prompt, &base), self.call(&prompt, &boosted));
                vec![
                    (QueryVariant::Base, base_result),
                    (QueryVariant::DiversityBoost, boost_result),
                ]
            } else {
                vec![(QueryVariant::Base, self.call(&prompt, &base).await)]
            };

            for (variant, result) in results {
                stats.collaborator_calls += 1;
                match result {
                    Ok((output, elapsed_ms)) => {
                        debug!(
                            enhancement = enhancement.as_str(),
                            variant = ?variant,
                            queries = output.queries.len(),
                            "Generator call succeeded"
                        );
                        let GenerationOutput { queries, metadata } = output;
                        pool.extend(queries.into_iter().map(|text| RawQuery {
                            text,
                            query_type: enhancement,
                            variant,
                            engine: metadata.engine.clone(),
                            model: metadata.model.clone(),
                            processing_time_ms: elapsed_ms,
                            token_usage: metadata.token_usage,
                        }));
                    }
                    Err(e) => {
                        warn!(
                            enhancement = enhancement.as_str(),
                            variant = ?variant,
                            error = %e,
                            "Generator call failed; type contributes no candidates"
                        );
                        failed_calls += 1;
                        last_error = e.to_string();
                        failures.push(GenerationFailure {
                            enhancement,
                            variant,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        if stats.collaborator_calls > 0 && failed_calls == stats.collaborator_calls {
            return Err(QueryGenError::CollaboratorExhausted {
                calls: stats.collaborator_calls,
                last_error,
            });
        }

        stats.raw_candidates = pool.len();
        let queries = self.rank(pool, request, seed_text, options, &mut stats);

        info!(
            topic = request.topic(),
            queries = queries.len(),
            failures = failures.len(),
            "Query generation finished"
        );

        Ok(GenerationOutcome {
            queries,
            failures,
            stats,
        })
    }

    fn params(
        &self,
        enhancement: EnhancementType,
        variant: QueryVariant,
        max_queries: u32,
    ) -> GenerationParams {
        let (temperature, top_p) = match variant {
            QueryVariant::DiversityBoost => {
                (self.config.boost_temperature, self.config.boost_top_p)
            }
            _ => (self.config.base_temperature, self.config.base_top_p),
        };
        GenerationParams {
            enhancement,
            temperature,
            top_p,
            max_queries,
        }
    }

    /// One generator call with retry; returns the output and elapsed time
    async fn call(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<(GenerationOutput, u64), GeneratorError> {
        let started = Instant::now();
        let operation = format!("generate {}", params.enhancement.as_str());
        let output = retry_with_backoff(
            &operation,
            &self.config.retry,
            GeneratorError::is_transient,
            || self.generator.generate(prompt, params),
        )
        .await?;
        Ok((output, started.elapsed().as_millis() as u64))
    }

    fn rank(
        &self,
        pool: Vec<RawQuery>,
        request: &ResearchRequest,
        seed_text: Option<&str>,
        options: &GenerationOptions,
        stats: &mut GenerationStats,
    ) -> Vec<GeneratedQuery> {
        // Sanitize and collapse exact duplicates
        let mut unique: Vec<RawQuery> = Vec::new();
        let mut index_by_key: HashMap<String, usize> = HashMap::new();

        for mut raw in pool {
            let Some(text) = self.sanitize(&raw.text) else {
                stats.sanitized_dropped += 1;
                continue;
            };
            raw.text = text;

            let key = crate::scoring::normalize_text(&raw.text);
            match index_by_key.get(&key) {
                Some(&existing) => {
                    stats.exact_duplicates += 1;
                    if raw.variant.preference() < unique[existing].variant.preference() {
                        unique[existing] = raw;
                    }
                }
                None => {
                    index_by_key.insert(key, unique.len());
                    unique.push(raw);
                }
            }
        }

        // Relevance and coverage do not depend on other candidates
        let mut scored: Vec<ScoredQuery> = unique
            .into_iter()
            .map(|raw| ScoredQuery {
                relevance: self.relevance(&raw.text, request, seed_text),
                coverage: coverage(&raw.text, request),
                diversity: 0.0,
                overall: 0.0,
                raw,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.preliminary()
                .total_cmp(&a.preliminary())
                .then_with(|| tie_break(a, b))
        });

        // Diversity relative to already-accepted queries; near-duplicates dropped
        let weights = &self.config.weights;
        let mut accepted: Vec<ScoredQuery> = Vec::new();
        for mut candidate in scored {
            let max_similarity = accepted
                .iter()
                .map(|a| text_similarity(&a.raw.text, &candidate.raw.text))
                .fold(0.0_f64, f64::max);

            if max_similarity >= self.config.similarity_threshold {
                stats.near_duplicates += 1;
                continue;
            }

            candidate.diversity = 1.0 - max_similarity;
            candidate.overall = weighted_mean(&[
                (candidate.relevance, weights.relevance),
                (candidate.diversity, weights.diversity),
                (candidate.coverage, weights.coverage),
            ]);
            accepted.push(candidate);
        }

        let before_filter = accepted.len();
        accepted.retain(|q| q.overall >= options.confidence_threshold);
        stats.below_confidence = before_filter - accepted.len();

        accepted.sort_by(|a, b| b.overall.total_cmp(&a.overall).then_with(|| tie_break(a, b)));
        accepted.truncate(options.max_queries as usize);

        let top_text = accepted.first().map(|q| q.raw.text.clone());
        accepted
            .into_iter()
            .enumerate()
            .map(|(rank, q)| {
                let similarity_score = match (&top_text, rank) {
                    (_, 0) => 1.0,
                    (Some(top), _) => text_similarity(top, &q.raw.text),
                    (None, _) => 0.0,
                };
                GeneratedQuery {
                    id: Uuid::new_v4(),
                    text: q.raw.text,
                    query_type: q.raw.query_type,
                    scores: QueryScores {
                        relevance: q.relevance,
                        diversity: q.diversity,
                        coverage: q.coverage,
                        overall: q.overall,
                    },
                    similarity_score,
                    metadata: QueryMetadata {
                        engine: q.raw.engine,
                        model: q.raw.model,
                        processing_time_ms: q.raw.processing_time_ms,
                        token_usage: q.raw.token_usage,
                        variant: q.raw.variant,
                    },
                }
            })
            .collect()
    }

    /// Trim list markers and wrapping quotes; reject too short or too long
    fn sanitize(&self, text: &str) -> Option<String> {
        let mut cleaned = text.trim();

        // "1.", "2)", "-", "*", "•" list markers
        cleaned = cleaned.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•');
        let digits = cleaned.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            let rest = &cleaned[digits..];
            if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
                cleaned = stripped;
            }
        }
        cleaned = cleaned.trim();

        let quoted = cleaned.len() >= 2
            && ((cleaned.starts_with('"') && cleaned.ends_with('"'))
                || (cleaned.starts_with('\'') && cleaned.ends_with('\'')));
        if quoted {
            cleaned = cleaned[1..cleaned.len() - 1].trim();
        }

        let length = cleaned.chars().count();
        if length < self.config.min_query_chars || length > self.config.max_query_chars {
            return None;
        }
        Some(cleaned.to_string())
    }

    fn relevance(&self, text: &str, request: &ResearchRequest, seed_text: Option<&str>) -> f64 {
        let topic = request.topic();
        let topic_score = if tokenize(topic).is_empty() {
            text_similarity(text, topic)
        } else {
            overlap_ratio(topic, text)
        };

        match seed_text.filter(|s| !tokenize(s).is_empty()) {
            Some(seed) => weighted_mean(&[
                (topic_score, 1.0 - self.config.seed_weight),
                (overlap_ratio(text, seed), self.config.seed_weight),
            ]),
            None => topic_score,
        }
    }
}

/// Fraction of requested criteria groups reflected in `text`; 1.0 when none
fn coverage(text: &str, request: &ResearchRequest) -> f64 {
    let region: Vec<String> = request.region.iter().cloned().collect();
    let groups: [&[String]; 4] = [
        &request.target_beats,
        &request.target_geo,
        &region,
        &request.languages,
    ];

    let requested: Vec<&[String]> = groups.into_iter().filter(|g| !g.is_empty()).collect();
    if requested.is_empty() {
        return 1.0;
    }
    let hits = requested
        .iter()
        .filter(|group| group.iter().any(|criterion| contains_phrase(text, criterion)))
        .count();
    hits as f64 / requested.len() as f64
}

/// Deterministic tie-break: preferred variant first, then text
fn tie_break(a: &ScoredQuery, b: &ScoredQuery) -> Ordering {
    a.raw
        .variant
        .preference()
        .cmp(&b.raw.variant.preference())
        .then_with(|| a.raw.text.cmp(&b.raw.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoCallGenerator;

    #[async_trait]
    impl LanguageGenerator for NoCallGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<GenerationOutput, GeneratorError> {
            panic!("generator must not be called");
        }
    }

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(NoCallGenerator), QueryEngineConfig::default())
    }

    #[test]
    fn sanitize_strips_markers_and_quotes() {
        let engine = engine();
        assert_eq!(engine.sanitize("1. AI policy reporters").as_deref(), Some("AI policy reporters"));
        assert_eq!(engine.sanitize("- \"EU AI Act\"").as_deref(), Some("EU AI Act"));
        assert_eq!(engine.sanitize("  ok "), None);
        assert_eq!(engine.sanitize(&"x".repeat(257)), None);
    }

    #[test]
    fn coverage_is_full_without_criteria() {
        let request = ResearchRequest::new("AI policy");
        assert_eq!(coverage("anything", &request), 1.0);
    }

    #[test]
    fn coverage_counts_groups() {
        let mut request = ResearchRequest::new("AI policy");
        request.target_beats = vec!["technology".to_string()];
        request.target_geo = vec!["Germany".to_string()];
        assert_eq!(coverage("technology AI policy reporter", &request), 0.5);
    }

    #[test]
    fn unknown_type_rejected() {
        let options = GenerationOptions {
            enhancement_types: vec!["expansion".to_string(), "paraphrase".to_string()],
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.has_field("enhancementTypes"));
    }

    #[tokio::test]
    async fn template_only_run_needs_no_collaborator() {
        let engine = engine();
        let mut request = ResearchRequest::new("AI policy");
        request.target_beats = vec!["technology".to_string()];
        let options = GenerationOptions {
            max_queries: 3,
            confidence_threshold: 0.0,
            enhancement_types: vec!["template".to_string()],
            ..Default::default()
        };

        let outcome = engine.generate(&request, None, &options).await.unwrap();

        assert!(!outcome.queries.is_empty());
        assert!(outcome.queries.len() <= 3);
        assert_eq!(outcome.stats.collaborator_calls, 0);
        assert_eq!(outcome.queries[0].similarity_score, 1.0);
        assert!(outcome
            .queries
            .iter()
            .all(|q| q.metadata.variant == QueryVariant::Template));
    }
}
