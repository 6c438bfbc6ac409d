//! Persistence sink for ranked candidates

use crate::db::candidates::store_candidates;
use crate::models::ContactCandidate;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

#[async_trait]
pub trait ContactSink: Send + Sync {
    async fn store(
        &self,
        search_id: Uuid,
        candidates: &[ContactCandidate],
    ) -> scout_common::Result<()>;
}

/// Stores candidates in the service database
pub struct SqliteContactSink {
    pool: SqlitePool,
}

impl SqliteContactSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactSink for SqliteContactSink {
    async fn store(
        &self,
        search_id: Uuid,
        candidates: &[ContactCandidate],
    ) -> scout_common::Result<()> {
        store_candidates(&self.pool, search_id, candidates).await
    }
}
