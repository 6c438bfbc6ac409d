//! Search session persistence
//!
//! Writes retry on transient SQLite lock contention.

use crate::models::{SearchSession, SearchState};
use crate::utils::{is_lock_error, retry_with_backoff, RetryPolicy};
use chrono::{DateTime, Utc};
use scout_common::events::{ErrorCategory, ErrorPayload};
use scout_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}

fn parse_time(text: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", what, e)))
}

/// Insert or update a session
pub async fn save_session(pool: &SqlitePool, session: &SearchSession) -> Result<()> {
    // Prepare all data before touching the database
    let search_id = session.search_id.to_string();
    let state = session.state.as_str().to_string();
    let request = to_json(&session.request, "request")?;
    let stages = to_json(&session.stages, "stages")?;
    let error = session
        .error
        .as_ref()
        .map(|e| to_json(e, "error"))
        .transpose()?;
    let stats = session
        .stats
        .as_ref()
        .map(|s| to_json(s, "stats"))
        .transpose()?;
    let started_at = session.started_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());

    retry_with_backoff(
        "save_session",
        &RetryPolicy::database(),
        is_lock_error,
        || async {
            sqlx::query(
                r#"
                INSERT INTO search_sessions (
                    search_id, state, request, stages, overall_progress,
                    current_stage, message, error, stats, attempt,
                    started_at, ended_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(search_id) DO UPDATE SET
                    state = excluded.state,
                    stages = excluded.stages,
                    overall_progress = excluded.overall_progress,
                    current_stage = excluded.current_stage,
                    message = excluded.message,
                    error = excluded.error,
                    stats = excluded.stats,
                    attempt = excluded.attempt,
                    started_at = excluded.started_at,
                    ended_at = excluded.ended_at
                "#,
            )
            .bind(&search_id)
            .bind(&state)
            .bind(&request)
            .bind(&stages)
            .bind(session.overall_progress)
            .bind(&session.current_stage)
            .bind(&session.message)
            .bind(&error)
            .bind(&stats)
            .bind(i64::from(session.attempt))
            .bind(&started_at)
            .bind(&ended_at)
            .execute(pool)
            .await
            .map_err(Error::Database)?;

            Ok(())
        },
    )
    .await
}

fn row_to_session(row: &SqliteRow) -> Result<SearchSession> {
    let search_id: String = row.get("search_id");
    let search_id = Uuid::parse_str(&search_id)
        .map_err(|e| Error::Internal(format!("Invalid search_id: {}", e)))?;

    let state: String = row.get("state");
    let state: SearchState = state.parse().map_err(Error::Internal)?;

    let request: String = row.get("request");
    let stages: String = row.get("stages");
    let error: Option<String> = row.get("error");
    let stats: Option<String> = row.get("stats");
    let started_at: String = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");
    let attempt: i64 = row.get("attempt");

    Ok(SearchSession {
        search_id,
        state,
        request: from_json(&request, "request")?,
        stages: from_json(&stages, "stages")?,
        overall_progress: row.get("overall_progress"),
        current_stage: row.get("current_stage"),
        message: row.get("message"),
        error: error.map(|e| from_json(&e, "error")).transpose()?,
        stats: stats.map(|s| from_json(&s, "stats")).transpose()?,
        attempt: u32::try_from(attempt).unwrap_or(1),
        started_at: parse_time(&started_at, "started_at")?,
        ended_at: ended_at
            .map(|e| parse_time(&e, "ended_at"))
            .transpose()?,
    })
}

/// Load a session by id
pub async fn load_session(pool: &SqlitePool, search_id: Uuid) -> Result<Option<SearchSession>> {
    let row = sqlx::query(
        r#"
        SELECT search_id, state, request, stages, overall_progress,
               current_stage, message, error, stats, attempt,
               started_at, ended_at
        FROM search_sessions
        WHERE search_id = ?
        "#,
    )
    .bind(search_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_session).transpose()
}

/// Mark sessions left running by a previous process as failed
///
/// Returns the number of sessions updated.
pub async fn fail_interrupted_sessions(pool: &SqlitePool) -> Result<usize> {
    let rows = sqlx::query(
        r#"
        SELECT search_id, state, request, stages, overall_progress,
               current_stage, message, error, stats, attempt,
               started_at, ended_at
        FROM search_sessions
        WHERE state NOT IN ('completed', 'cancelled', 'failed')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut updated = 0;
    for row in &rows {
        let mut session = row_to_session(row)?;
        session.skip_unfinished_stages();
        session.error = Some(ErrorPayload::new(
            ErrorCategory::Internal,
            "Run interrupted by service restart",
        ));
        session.message = "Interrupted".to_string();
        session.transition_to(SearchState::Failed);
        save_session(pool, &session).await?;
        updated += 1;
    }

    if updated > 0 {
        tracing::warn!(count = updated, "Marked interrupted searches as failed");
    }
    Ok(updated)
}
