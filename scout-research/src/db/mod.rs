//! Database access for scout-research
//!
//! SQLite database in the root folder holding run records and ranked
//! candidates.

pub mod candidates;
pub mod sessions;

use scout_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "scout.db";

/// Initialize database connection pool and create tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database
///
/// Every new connection to `sqlite::memory:` opens a separate database, so the
/// pool is capped at one connection.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS search_sessions (
            search_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            request TEXT NOT NULL,
            stages TEXT NOT NULL DEFAULT '{}',
            overall_progress REAL NOT NULL DEFAULT 0.0,
            current_stage TEXT,
            message TEXT NOT NULL DEFAULT '',
            error TEXT,
            stats TEXT,
            attempt INTEGER NOT NULL DEFAULT 1,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contact_candidates (
            search_id TEXT NOT NULL,
            rank INTEGER NOT NULL,
            candidate_id TEXT NOT NULL,
            name TEXT NOT NULL,
            outlet TEXT NOT NULL,
            score REAL NOT NULL,
            data TEXT NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (search_id, rank)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (search_sessions, contact_candidates)");

    Ok(())
}
