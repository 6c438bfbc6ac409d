//! Active run registry
//!
//! At most one run per search id. Registering returns a [`RunGuard`] whose
//! drop removes the entry, so a finished or panicked run never blocks a retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Search {0} already has an active run")]
pub struct AlreadyRunning(pub Uuid);

type RunMap = HashMap<Uuid, CancellationToken>;

#[derive(Clone, Default)]
pub struct SearchRegistry {
    runs: Arc<Mutex<RunMap>>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunMap> {
        // A panic while holding the lock leaves the map itself consistent
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `search_id`; rejected while another run holds it
    pub fn register(&self, search_id: Uuid) -> Result<RunGuard, AlreadyRunning> {
        let mut runs = self.lock();
        if runs.contains_key(&search_id) {
            return Err(AlreadyRunning(search_id));
        }
        let token = CancellationToken::new();
        runs.insert(search_id, token.clone());
        Ok(RunGuard {
            search_id,
            token,
            runs: Arc::clone(&self.runs),
        })
    }

    /// Signal cancellation; returns whether a run was active
    pub fn cancel(&self, search_id: Uuid) -> bool {
        match self.lock().get(&search_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, search_id: Uuid) -> bool {
        self.lock().contains_key(&search_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Cancel every active run (shutdown)
    pub fn cancel_all(&self) {
        for token in self.lock().values() {
            token.cancel();
        }
    }
}

/// Registration of one active run
pub struct RunGuard {
    search_id: Uuid,
    token: CancellationToken,
    runs: Arc<Mutex<RunMap>>,
}

impl RunGuard {
    pub fn search_id(&self) -> Uuid {
        self.search_id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        runs.remove(&self.search_id);
    }
}
