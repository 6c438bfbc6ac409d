//! Test doubles and builders shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use scout_common::events::EventBus;
use scout_research::db::init_memory_pool;
use scout_research::heuristics::{HeuristicsConfig, HeuristicsEngine};
use scout_research::models::{ContactCandidate, GeneratedQuery, HarvestedRecord, ResearchRequest};
use scout_research::query_gen::{
    GenerationMetadata, GenerationOutput, GenerationParams, GeneratorError, LanguageGenerator,
    QueryEngine, QueryEngineConfig,
};
use scout_research::services::{
    ContactSink, ContentHarvester, HarvestError, OrchestratorConfig, ProgressPublisher, SearchOrchestrator,
    SearchRegistry, SqliteContactSink,
};
use scout_research::utils::RetryPolicy;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Language generator doubles
// ============================================================================

/// Returns fixed lines for base calls and for diversity-boost calls
pub struct ScriptedGenerator {
    pub base: Vec<String>,
    pub boost: Vec<String>,
    pub boost_temperature: f32,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(base: &[&str], boost: &[&str]) -> Self {
        Self {
            base: base.iter().map(|s| s.to_string()).collect(),
            boost: boost.iter().map(|s| s.to_string()).collect(),
            boost_temperature: QueryEngineConfig::default().boost_temperature,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queries = if params.temperature >= self.boost_temperature {
            self.boost.clone()
        } else {
            self.base.clone()
        };
        Ok(GenerationOutput {
            queries,
            metadata: GenerationMetadata {
                engine: "scripted".to_string(),
                model: "test-model".to_string(),
                token_usage: Some(42),
            },
        })
    }
}

/// Fails every call with the given error
pub struct FailingGenerator {
    pub error: GeneratorError,
    pub calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn permanent() -> Self {
        Self {
            error: GeneratorError::Permanent("model not found".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn transient() -> Self {
        Self {
            error: GeneratorError::Transient("503 Service Unavailable".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageGenerator for FailingGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<GenerationOutput, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

pub fn policy_generator() -> ScriptedGenerator {
    ScriptedGenerator::new(
        &[
            "AI policy reporters Europe",
            "AI policy reporters regulation desk",
            "AI policy reporters newsroom",
        ],
        &[
            "AI policy reporters startup funding",
            "AI policy reporters ethics columnist",
            "AI policy reporters Europe",
            "AI policy reporters copyright lawsuits",
        ],
    )
}

/// Retry policy without delays
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay_ms: 1,
        multiplier: 1.0,
        max_delay_ms: 1,
    }
}

pub fn fast_engine_config() -> QueryEngineConfig {
    QueryEngineConfig {
        retry: fast_retry(3),
        ..Default::default()
    }
}

// ============================================================================
// Harvester doubles
// ============================================================================

/// Returns the same records for every query
pub struct StaticHarvester {
    pub records: Vec<HarvestedRecord>,
    pub calls: AtomicUsize,
}

impl StaticHarvester {
    pub fn new(records: Vec<HarvestedRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentHarvester for StaticHarvester {
    async fn harvest(
        &self,
        _query: &GeneratedQuery,
        _request: &ResearchRequest,
    ) -> Result<Vec<HarvestedRecord>, HarvestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Fails every harvest permanently
pub struct BrokenHarvester;

#[async_trait]
impl ContentHarvester for BrokenHarvester {
    async fn harvest(
        &self,
        _query: &GeneratedQuery,
        _request: &ResearchRequest,
    ) -> Result<Vec<HarvestedRecord>, HarvestError> {
        Err(HarvestError::Permanent("404 Not Found".to_string()))
    }
}

/// Cancels the run while the first harvest call is in flight
pub struct CancellingHarvester {
    pub token: CancellationToken,
    pub records: Vec<HarvestedRecord>,
}

#[async_trait]
impl ContentHarvester for CancellingHarvester {
    async fn harvest(
        &self,
        _query: &GeneratedQuery,
        _request: &ResearchRequest,
    ) -> Result<Vec<HarvestedRecord>, HarvestError> {
        self.token.cancel();
        Ok(self.records.clone())
    }
}

// ============================================================================
// Records
// ============================================================================

pub fn article(url: &str, byline: &str, title: &str, days_old: i64) -> HarvestedRecord {
    let mut record = HarvestedRecord::with_byline(url, byline);
    record.content.title = Some(title.to_string());
    record.content.section_path = Some("/technology/ai".to_string());
    record.content.published_at = Some(Utc::now() - Duration::days(days_old));
    record
}

/// Five records: four originals and one syndicated copy of the first
pub fn policy_records() -> Vec<HarvestedRecord> {
    let mut syndicated = article(
        "https://aggregator.net/feed/eu-ai-act",
        "By Jane Doe",
        "EU AI Act passes final vote",
        2,
    );
    syndicated.content.canonical_url = Some("https://paper.com/tech/eu-ai-act".to_string());

    vec![
        article(
            "https://paper.com/tech/eu-ai-act",
            "By Jane Doe",
            "EU AI Act passes final vote",
            2,
        ),
        article(
            "https://paper.com/tech/chip-export",
            "By Mark Lee",
            "Chip export rules tighten",
            10,
        ),
        article(
            "https://dailywire.org/technology/algorithm-audit",
            "By Priya Raman",
            "Algorithm audits become law",
            5,
        ),
        article(
            "https://techdesk.io/technology/model-licensing",
            "By Tomas Berg",
            "Model licensing debate heats up",
            30,
        ),
        syndicated,
    ]
}

// ============================================================================
// Sink doubles
// ============================================================================

/// Rejects every store call
pub struct RefusingSink;

#[async_trait]
impl ContactSink for RefusingSink {
    async fn store(
        &self,
        _search_id: Uuid,
        _candidates: &[ContactCandidate],
    ) -> scout_common::Result<()> {
        Err(scout_common::Error::Internal("disk full".to_string()))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Harness {
    pub db: SqlitePool,
    pub bus: EventBus,
    pub orchestrator: Arc<SearchOrchestrator>,
}

pub async fn harness(
    generator: Arc<dyn LanguageGenerator>,
    harvester: Arc<dyn ContentHarvester>,
) -> Harness {
    let db = init_memory_pool().await.expect("Failed to create in-memory database");
    let sink = Arc::new(SqliteContactSink::new(db.clone()));
    harness_with_sink(db, generator, harvester, sink)
}

pub fn harness_with_sink(
    db: SqlitePool,
    generator: Arc<dyn LanguageGenerator>,
    harvester: Arc<dyn ContentHarvester>,
    sink: Arc<dyn ContactSink>,
) -> Harness {
    let bus = EventBus::new(256);
    let config = OrchestratorConfig {
        harvest_retry: fast_retry(2),
        ..Default::default()
    };

    let orchestrator = Arc::new(SearchOrchestrator::new(
        db.clone(),
        ProgressPublisher::new(bus.clone()),
        SearchRegistry::new(),
        QueryEngine::new(generator, fast_engine_config()),
        HeuristicsEngine::new(HeuristicsConfig::default()),
        harvester,
        sink,
        config,
    ));

    Harness {
        db,
        bus,
        orchestrator,
    }
}

/// Request that keeps every candidate
pub fn open_request(topic: &str) -> ResearchRequest {
    let mut request = ResearchRequest::new(topic);
    request.score_threshold = 0.0;
    request.target_beats = vec!["technology".to_string()];
    request
}
