//! scout-research library interface
//!
//! Research microservice: query generation, contact heuristics, the search
//! orchestrator and its HTTP + WebSocket API. Exposed as a library for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod heuristics;
pub mod models;
pub mod query_gen;
pub mod scoring;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use scout_common::events::EventBus;
use services::{ProgressPublisher, SearchOrchestrator};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus feeding the push channel
    pub event_bus: EventBus,
    /// Pipeline runner; owns the active run registry
    pub orchestrator: Arc<SearchOrchestrator>,
    pub progress: config::ProgressConfig,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        orchestrator: Arc<SearchOrchestrator>,
        progress: config::ProgressConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            orchestrator,
            progress,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn publisher(&self) -> ProgressPublisher {
        ProgressPublisher::new(self.event_bus.clone())
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::search_routes())
        .route("/search/:id/ws", get(api::progress_socket))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
