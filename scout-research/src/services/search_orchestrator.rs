//! Search orchestrator
//!
//! Runs one research request through the pipeline:
//!
//! | Stage              | State                | Work                                   |
//! |--------------------|----------------------|----------------------------------------|
//! | `query_generation` | `generating_queries` | Query engine                           |
//! | `harvesting`       | `harvesting`         | One harvester call per query           |
//! | `analysis`         | `analyzing`          | Heuristics batch                       |
//! | `ranking`          | `ranking`            | Threshold, sort, truncate              |
//! | `storage`          | `ranking`            | Persist ranked candidates              |
//!
//! Every state and stage change is saved and published. Cancellation is
//! cooperative and checked between steps; a collaborator result that arrives
//! after cancellation is discarded.

use super::harvester::{ContentHarvester, HarvestError};
use super::publisher::ProgressPublisher;
use super::registry::{AlreadyRunning, RunGuard, SearchRegistry};
use super::sink::ContactSink;
use crate::db::sessions::save_session;
use crate::heuristics::{normalize_url, AnalysisContext, HeuristicsEngine};
use crate::models::{
    BatchStats, ContactCandidate, ConsolidationGroup, GeneratedQuery, HarvestedRecord,
    HeuristicsAnalysis, ResearchRequest, SearchMode, SearchSession, SearchState, Stage,
};
use crate::query_gen::{GenerationOptions, QueryEngine};
use crate::utils::{retry_with_backoff, RetryPolicy};
use chrono::Utc;
use scout_common::events::{
    CompletionPayload, ErrorCategory, ErrorPayload, StageStatus, StageUpdate,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// `[search]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Query budget in precision mode
    pub default_max_queries: u32,
    /// Query budget in recall mode
    pub recall_max_queries: u32,
    pub precision_confidence: f64,
    pub recall_confidence: f64,
    /// Points subtracted from the contact score threshold in recall mode
    pub recall_threshold_relaxation: f64,
    pub diversity_boost: bool,
    pub enhancement_types: Vec<String>,
    pub harvest_retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_max_queries: 10,
            recall_max_queries: 20,
            precision_confidence: 0.5,
            recall_confidence: 0.3,
            recall_threshold_relaxation: 15.0,
            diversity_boost: true,
            enhancement_types: GenerationOptions::default().enhancement_types,
            harvest_retry: RetryPolicy::default(),
        }
    }
}

/// Mode-dependent parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub max_queries: u32,
    pub confidence_threshold: f64,
    pub score_threshold: f64,
}

// ============================================================================
// Errors and results
// ============================================================================

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    AlreadyRunning(#[from] AlreadyRunning),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] scout_common::Error),
}

/// Failure that ends a run in `failed`
struct StageFailure {
    stage: Stage,
    payload: ErrorPayload,
}

impl StageFailure {
    fn new(stage: Stage, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            stage,
            payload: ErrorPayload::new(category, message).at_stage(stage.id()),
        }
    }

    fn persistence(stage: Stage, err: scout_common::Error) -> Self {
        Self::new(stage, ErrorCategory::Internal, err.to_string())
    }
}

enum RunOutcome {
    Completed(Box<RunResults>),
    Cancelled,
}

/// Counters reported in the completion payload and stored on the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub mode: SearchMode,
    pub queries_generated: usize,
    pub generation_failures: usize,
    pub harvest_failures: usize,
    pub records_harvested: usize,
    pub unique_records: usize,
    pub batch: BatchStats,
    pub consolidation_groups: usize,
    pub below_threshold: usize,
    pub returned: usize,
    pub score_threshold: f64,
    pub duration_ms: u64,
}

/// Final results published with `completion`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub candidates: Vec<ContactCandidate>,
    pub analyses: Vec<HeuristicsAnalysis>,
    pub groups: Vec<ConsolidationGroup>,
    pub queries: Vec<GeneratedQuery>,
    pub recommendations: Vec<String>,
    #[serde(skip)]
    stats: RunStats,
    #[serde(skip)]
    warnings: Vec<String>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct SearchOrchestrator {
    db: SqlitePool,
    publisher: ProgressPublisher,
    registry: SearchRegistry,
    query_engine: QueryEngine,
    heuristics: HeuristicsEngine,
    harvester: Arc<dyn ContentHarvester>,
    sink: Arc<dyn ContactSink>,
    config: OrchestratorConfig,
}

impl SearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        publisher: ProgressPublisher,
        registry: SearchRegistry,
        query_engine: QueryEngine,
        heuristics: HeuristicsEngine,
        harvester: Arc<dyn ContentHarvester>,
        sink: Arc<dyn ContactSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            db,
            publisher,
            registry,
            query_engine,
            heuristics,
            harvester,
            sink,
            config,
        }
    }

    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Mode-dependent budget and thresholds for `request`
    pub fn plan(&self, request: &ResearchRequest) -> RunPlan {
        match request.mode {
            SearchMode::Precision => RunPlan {
                max_queries: request.max_queries.unwrap_or(self.config.default_max_queries),
                confidence_threshold: self.config.precision_confidence,
                score_threshold: request.score_threshold,
            },
            SearchMode::Recall => RunPlan {
                max_queries: request.max_queries.unwrap_or(self.config.recall_max_queries),
                confidence_threshold: self.config.recall_confidence,
                score_threshold: (request.score_threshold
                    - self.config.recall_threshold_relaxation)
                    .max(0.0),
            },
        }
    }

    /// Register and spawn a run for `session`
    ///
    /// Rejected while a run for the same search id is active.
    pub fn launch(
        self: &Arc<Self>,
        session: SearchSession,
    ) -> Result<JoinHandle<Result<SearchSession, SearchError>>, SearchError> {
        let guard = self.registry.register(session.search_id)?;
        Ok(self.launch_claimed(guard, session))
    }

    /// Spawn a run under a registration the caller already holds
    ///
    /// Callers claim the id before touching the stored session so a
    /// concurrent request is rejected without side effects.
    pub fn launch_claimed(
        self: &Arc<Self>,
        guard: RunGuard,
        session: SearchSession,
    ) -> JoinHandle<Result<SearchSession, SearchError>> {
        debug_assert_eq!(guard.search_id(), session.search_id);
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            let search_id = guard.search_id();
            let result = orchestrator.execute(session, guard.token()).await;
            if let Err(e) = &result {
                error!(search_id = %search_id, error = %e, "Search run aborted");
            }
            drop(guard);
            result
        })
    }

    /// Run the whole pipeline; returns the session in its terminal state
    ///
    /// Pipeline failures end the session in `failed` and still return `Ok`;
    /// `Err` means the terminal state could not be persisted.
    pub async fn execute(
        &self,
        mut session: SearchSession,
        token: CancellationToken,
    ) -> Result<SearchSession, SearchError> {
        let started = Instant::now();
        let plan = self.plan(&session.request);

        info!(
            search_id = %session.search_id,
            topic = session.request.topic(),
            mode = ?session.request.mode,
            attempt = session.attempt,
            max_queries = plan.max_queries,
            "Starting search run"
        );

        save_session(&self.db, &session).await?;
        self.publisher.progress(session.search_id, session.snapshot());

        match self.run_pipeline(&mut session, &plan, &token, started).await {
            Ok(RunOutcome::Completed(results)) => self.finish_completed(session, *results).await,
            Ok(RunOutcome::Cancelled) => self.finish_cancelled(session).await,
            Err(failure) => self.finish_failed(session, failure).await,
        }
    }

    async fn run_pipeline(
        &self,
        session: &mut SearchSession,
        plan: &RunPlan,
        token: &CancellationToken,
        started: Instant,
    ) -> Result<RunOutcome, StageFailure> {
        let request = session.request.clone();
        let mut stats = RunStats {
            mode: request.mode,
            score_threshold: plan.score_threshold,
            ..Default::default()
        };
        let mut warnings = Vec::new();

        // ====================================================================
        // Query generation
        // ====================================================================

        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        self.begin_stage(
            session,
            SearchState::GeneratingQueries,
            Stage::QueryGeneration,
            "Generating queries",
        )
        .await?;

        let options = GenerationOptions {
            max_queries: plan.max_queries,
            diversity_boost: self.config.diversity_boost,
            confidence_threshold: plan.confidence_threshold,
            enhancement_types: self.config.enhancement_types.clone(),
        };
        let generated = self.query_engine.generate(&request, None, &options).await;
        if token.is_cancelled() {
            debug!(
                search_id = %session.search_id,
                "Discarding query generation result after cancel"
            );
            return Ok(RunOutcome::Cancelled);
        }
        let outcome = generated.map_err(|e| {
            StageFailure::new(Stage::QueryGeneration, e.category(), e.to_string())
        })?;

        for failure in &outcome.failures {
            warnings.push(format!(
                "{} generation ({:?}) failed: {}",
                failure.enhancement, failure.variant, failure.message
            ));
        }
        stats.queries_generated = outcome.queries.len();
        stats.generation_failures = outcome.failures.len();
        let queries = outcome.queries;
        if queries.is_empty() {
            warnings.push("No query passed the confidence threshold".to_string());
        }

        self.complete_stage(
            session,
            Stage::QueryGeneration,
            format!("Generated {} queries", queries.len()),
        )
        .await?;

        // ====================================================================
        // Harvesting
        // ====================================================================

        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        self.begin_stage(
            session,
            SearchState::Harvesting,
            Stage::Harvesting,
            "Harvesting content",
        )
        .await?;

        let mut records: Vec<HarvestedRecord> = Vec::new();
        let mut last_error = String::new();

        for (index, query) in queries.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }

            let operation = format!("harvest query {}", index + 1);
            let result = retry_with_backoff(
                &operation,
                &self.config.harvest_retry,
                HarvestError::is_transient,
                || self.harvester.harvest(query, &request),
            )
            .await;

            if token.is_cancelled() {
                debug!(search_id = %session.search_id, "Discarding harvest result after cancel");
                return Ok(RunOutcome::Cancelled);
            }

            match result {
                Ok(batch) => {
                    debug!(
                        search_id = %session.search_id,
                        query = %query.text,
                        records = batch.len(),
                        "Query harvested"
                    );
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(
                        search_id = %session.search_id,
                        query = %query.text,
                        error = %e,
                        "Harvest failed; skipping query"
                    );
                    stats.harvest_failures += 1;
                    last_error = e.to_string();
                    warnings.push(format!("Harvest failed for \"{}\": {}", query.text, e));
                }
            }

            let progress = (index + 1) as f64 / queries.len() as f64 * 100.0;
            self.update_stage(session, Stage::Harvesting, |u| {
                u.progress(progress)
                    .message(format!("Harvested {} of {} queries", index + 1, queries.len()))
            })
            .await?;
        }

        if !queries.is_empty() && stats.harvest_failures == queries.len() {
            return Err(StageFailure::new(
                Stage::Harvesting,
                ErrorCategory::CollaboratorExhausted,
                format!("All {} harvest queries failed: {}", queries.len(), last_error),
            ));
        }

        stats.records_harvested = records.len();
        let records = dedupe_records(records);
        stats.unique_records = records.len();

        self.complete_stage(
            session,
            Stage::Harvesting,
            format!("Harvested {} records", records.len()),
        )
        .await?;

        // ====================================================================
        // Analysis
        // ====================================================================

        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        self.begin_stage(
            session,
            SearchState::Analyzing,
            Stage::Analysis,
            "Analyzing authors",
        )
        .await?;

        let context = AnalysisContext::for_request(&request, Utc::now());
        let batch = self.heuristics.analyze_batch(&records, &context);
        stats.batch = batch.stats;

        self.complete_stage(
            session,
            Stage::Analysis,
            format!("Found {} candidates", batch.candidates.len()),
        )
        .await?;

        // ====================================================================
        // Ranking
        // ====================================================================

        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        self.begin_stage(
            session,
            SearchState::Ranking,
            Stage::Ranking,
            "Ranking candidates",
        )
        .await?;

        let groups = batch.groups;
        stats.consolidation_groups = groups.len();

        let ranked = rank_candidates(
            batch.candidates,
            plan.score_threshold,
            request.max_contacts as usize,
            &mut stats,
        );

        let kept: HashSet<_> = ranked.iter().map(|c| c.id()).collect();
        let analyses: Vec<HeuristicsAnalysis> = batch
            .analyses
            .into_iter()
            .filter(|a| kept.contains(&a.contact_id))
            .collect();

        self.complete_stage(
            session,
            Stage::Ranking,
            format!("Ranked {} candidates", ranked.len()),
        )
        .await?;

        // ====================================================================
        // Storage
        // ====================================================================

        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        self.update_stage(session, Stage::Storage, |u| {
            u.status(StageStatus::InProgress).message("Storing candidates")
        })
        .await?;

        self.sink
            .store(session.search_id, &ranked)
            .await
            .map_err(|e| StageFailure::persistence(Stage::Storage, e))?;

        self.complete_stage(
            session,
            Stage::Storage,
            format!("Stored {} candidates", ranked.len()),
        )
        .await?;

        stats.duration_ms = started.elapsed().as_millis() as u64;

        Ok(RunOutcome::Completed(Box::new(RunResults {
            candidates: ranked,
            analyses,
            groups,
            queries,
            recommendations: batch.recommendations,
            stats,
            warnings,
        })))
    }

    // ========================================================================
    // Stage bookkeeping
    // ========================================================================

    /// Save and publish a session change
    async fn persist(&self, session: &SearchSession) -> Result<(), scout_common::Error> {
        save_session(&self.db, session).await?;
        self.publisher.progress(session.search_id, session.snapshot());
        Ok(())
    }

    async fn update_stage(
        &self,
        session: &mut SearchSession,
        stage: Stage,
        build: impl FnOnce(StageUpdate) -> StageUpdate,
    ) -> Result<(), StageFailure> {
        let update = build(StageUpdate::new(stage.id()));
        session.update_stage(&update);
        self.publisher.stage(session.search_id, update);
        self.persist(session)
            .await
            .map_err(|e| StageFailure::persistence(stage, e))
    }

    async fn begin_stage(
        &self,
        session: &mut SearchSession,
        state: SearchState,
        stage: Stage,
        message: &str,
    ) -> Result<(), StageFailure> {
        let transition = session.transition_to(state);
        debug!(
            search_id = %session.search_id,
            from = %transition.old_state,
            to = %transition.new_state,
            "State transition"
        );
        self.update_stage(session, stage, |u| {
            u.status(StageStatus::InProgress)
                .progress(0.0)
                .message(message)
        })
        .await
    }

    async fn complete_stage(
        &self,
        session: &mut SearchSession,
        stage: Stage,
        message: String,
    ) -> Result<(), StageFailure> {
        self.update_stage(session, stage, |u| {
            u.status(StageStatus::Completed)
                .progress(100.0)
                .message(message)
        })
        .await
    }

    // ========================================================================
    // Terminal states
    // ========================================================================

    async fn finish_completed(
        &self,
        mut session: SearchSession,
        results: RunResults,
    ) -> Result<SearchSession, SearchError> {
        let stats = serde_json::to_value(&results.stats).map_err(scout_common::Error::from)?;
        let payload = CompletionPayload {
            results: serde_json::to_value(&results).map_err(scout_common::Error::from)?,
            stats: stats.clone(),
            warnings: results.warnings.clone(),
            cancelled: false,
        };

        session.stats = Some(stats);
        session.message = format!("Completed with {} contacts", results.candidates.len());
        session.transition_to(SearchState::Completed);
        self.persist(&session).await?;
        self.publisher.completion(session.search_id, payload);

        info!(
            search_id = %session.search_id,
            contacts = results.candidates.len(),
            duration_ms = results.stats.duration_ms,
            warnings = results.warnings.len(),
            "Search run completed"
        );
        Ok(session)
    }

    async fn finish_cancelled(
        &self,
        mut session: SearchSession,
    ) -> Result<SearchSession, SearchError> {
        session.skip_unfinished_stages();
        session.message = "Cancelled".to_string();
        session.transition_to(SearchState::Cancelled);
        self.persist(&session).await?;
        self.publisher.cancelled(
            session.search_id,
            session.stats.clone().unwrap_or_default(),
        );

        info!(search_id = %session.search_id, "Search run cancelled");
        Ok(session)
    }

    async fn finish_failed(
        &self,
        mut session: SearchSession,
        failure: StageFailure,
    ) -> Result<SearchSession, SearchError> {
        let update = StageUpdate::new(failure.stage.id())
            .status(StageStatus::Failed)
            .message(failure.payload.message.clone());
        session.update_stage(&update);
        self.publisher.stage(session.search_id, update);

        session.skip_unfinished_stages();
        session.message = format!("Failed: {}", failure.payload.message);
        session.error = Some(failure.payload.clone());
        session.transition_to(SearchState::Failed);
        self.persist(&session).await?;
        self.publisher.error(session.search_id, failure.payload.clone());

        warn!(
            search_id = %session.search_id,
            stage = failure.stage.id(),
            category = %failure.payload.category,
            error = %failure.payload.message,
            "Search run failed"
        );
        Ok(session)
    }
}

/// Drop records whose normalized URL was already harvested by another query
fn dedupe_records(records: Vec<HarvestedRecord>) -> Vec<HarvestedRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(normalize_url(&r.content.url)))
        .collect()
}

/// Threshold, sort by score (ties by name) and truncate
fn rank_candidates(
    candidates: Vec<ContactCandidate>,
    score_threshold: f64,
    max_contacts: usize,
    stats: &mut RunStats,
) -> Vec<ContactCandidate> {
    let total = candidates.len();
    let mut ranked: Vec<ContactCandidate> = candidates
        .into_iter()
        .filter(|c| c.score() >= score_threshold)
        .collect();
    stats.below_threshold = total - ranked.len();

    ranked.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.name().cmp(b.name()))
    });
    ranked.truncate(max_contacts);
    stats.returned = ranked.len();
    ranked
}
