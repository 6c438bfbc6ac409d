//! scout-research - Contact research microservice
//!
//! Accepts research requests over HTTP, runs query generation, harvesting
//! and contact heuristics in the background, and streams progress over a
//! per-search WebSocket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scout_common::config::{
    default_config_path, ensure_root_folder, load_toml_or_default, resolve_root_folder,
    ROOT_FOLDER_ENV,
};
use scout_common::events::EventBus;
use scout_common::logging::init_logging;
use tokio::signal;
use tracing::{info, warn};

use scout_research::config::{resolve_generation_api_key, ServiceConfig, MODULE_NAME};
use scout_research::db::{self, sessions::fail_interrupted_sessions};
use scout_research::heuristics::HeuristicsEngine;
use scout_research::query_gen::{HttpLanguageGenerator, QueryEngine};
use scout_research::services::{
    HttpHarvester, ProgressPublisher, SearchOrchestrator, SearchRegistry, SqliteContactSink,
};
use scout_research::AppState;

/// Command-line arguments for scout-research
#[derive(Parser, Debug)]
#[command(name = "scout-research")]
#[command(about = "Contact research microservice")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "SCOUT_RESEARCH_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file: a missing file falls back to defaults
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME))
        .unwrap_or_else(|| PathBuf::from(format!("{}.toml", MODULE_NAME)));
    let config: ServiceConfig = load_toml_or_default(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting {} v{}", MODULE_NAME, env!("CARGO_PKG_VERSION"));
    info!(path = %config_path.display(), "Config file");

    // Root folder: CLI → ENV → TOML → OS default
    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        Some(&config.toml_view()),
    );
    ensure_root_folder(&root_folder).context("Failed to initialize root folder")?;
    info!(root_folder = %root_folder.display(), "Root folder");

    let db_path = root_folder.join(db::DATABASE_FILE);
    let db_pool = db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!(path = %db_path.display(), "Database connection established");

    let interrupted = fail_interrupted_sessions(&db_pool).await?;
    if interrupted > 0 {
        warn!(count = interrupted, "Marked interrupted searches as failed");
    }

    // Collaborators
    let api_key = resolve_generation_api_key(&config.generation);
    let generator = HttpLanguageGenerator::new(config.generation.clone(), api_key)
        .context("Failed to build generation client")?;
    let harvester = HttpHarvester::new(config.harvester.clone())
        .context("Failed to build harvester client")?;
    info!(
        generator = %config.generation.base_url,
        model = %config.generation.model,
        harvester = %config.harvester.base_url,
        "Collaborators configured"
    );

    let event_bus = EventBus::new(config.progress.event_capacity);
    let registry = SearchRegistry::new();
    let orchestrator = Arc::new(SearchOrchestrator::new(
        db_pool.clone(),
        ProgressPublisher::new(event_bus.clone()),
        registry.clone(),
        QueryEngine::new(Arc::new(generator), config.query_engine.clone()),
        HeuristicsEngine::new(config.heuristics.clone()),
        Arc::new(harvester),
        Arc::new(SqliteContactSink::new(db_pool.clone())),
        config.search.clone(),
    ));

    let state = AppState::new(db_pool, event_bus, orchestrator, config.progress.clone());
    let app = scout_research::build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel active runs
async fn shutdown_signal(registry: SearchRegistry) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!(active = registry.active_count(), "Cancelling active searches");
    registry.cancel_all();
}
