//! Ranked candidate persistence
//!
//! Storing replaces the previous result set of a search in one transaction,
//! so a retried run never mixes old and new candidates.

use crate::models::ContactCandidate;
use scout_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Replace the stored candidates of `search_id`; list order is the rank
pub async fn store_candidates(
    pool: &SqlitePool,
    search_id: Uuid,
    candidates: &[ContactCandidate],
) -> Result<()> {
    let search_id = search_id.to_string();
    let stored_at = chrono::Utc::now().to_rfc3339();

    let mut rows = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let data = serde_json::to_string(candidate)
            .map_err(|e| Error::Internal(format!("Failed to serialize candidate: {}", e)))?;
        rows.push((candidate, data));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM contact_candidates WHERE search_id = ?")
        .bind(&search_id)
        .execute(&mut *tx)
        .await?;

    for (rank, (candidate, data)) in rows.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO contact_candidates (
                search_id, rank, candidate_id, name, outlet, score, data, stored_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&search_id)
        .bind(rank as i64)
        .bind(candidate.id().to_string())
        .bind(candidate.name())
        .bind(candidate.outlet())
        .bind(candidate.score())
        .bind(data)
        .bind(&stored_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(search_id = %search_id, count = candidates.len(), "Stored candidates");
    Ok(())
}

/// Stored candidates of `search_id`, best first
pub async fn load_candidates(pool: &SqlitePool, search_id: Uuid) -> Result<Vec<ContactCandidate>> {
    let rows = sqlx::query(
        "SELECT data FROM contact_candidates WHERE search_id = ? ORDER BY rank ASC",
    )
    .bind(search_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let data: String = row.get("data");
            serde_json::from_str(&data)
                .map_err(|e| Error::Internal(format!("Failed to deserialize candidate: {}", e)))
        })
        .collect()
}
