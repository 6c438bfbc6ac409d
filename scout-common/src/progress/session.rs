//! Client-side view of one research run's progress

use crate::events::{
    CompletionPayload, ErrorPayload, ProgressSnapshot, StageData, StageUpdate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Connection state of a progress channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect attempts exhausted; only a caller-initiated retry leaves this state
    Error,
}

/// Progress state for one `search_id`
///
/// Owned by the channel worker task; callers observe clones through
/// [`super::ProgressChannel::session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSession {
    pub search_id: Uuid,
    pub connection_status: ConnectionStatus,
    pub stages: BTreeMap<String, StageData>,
    pub progress: Option<ProgressSnapshot>,
    pub last_update: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub is_cancelled: bool,
    pub results: Option<CompletionPayload>,
    pub last_error: Option<ErrorPayload>,
}

impl ProgressSession {
    pub fn new(search_id: Uuid) -> Self {
        Self {
            search_id,
            connection_status: ConnectionStatus::Disconnected,
            stages: BTreeMap::new(),
            progress: None,
            last_update: None,
            is_completed: false,
            is_cancelled: false,
            results: None,
            last_error: None,
        }
    }

    /// Replace the progress snapshot
    ///
    /// Stages carried by the snapshot overwrite the locally known ones;
    /// stages the snapshot does not mention are kept.
    pub fn apply_progress(&mut self, snapshot: ProgressSnapshot) {
        for (stage_id, data) in &snapshot.stages {
            self.stages.insert(stage_id.clone(), data.clone());
        }
        self.progress = Some(snapshot);
        self.touch();
    }

    /// Merge a stage delta and return the merged stage
    pub fn apply_stage_update(&mut self, update: &StageUpdate) -> StageData {
        let stage = self.stages.entry(update.stage_id.clone()).or_default();
        stage.merge(update);
        let merged = stage.clone();

        if let Some(progress) = self.progress.as_mut() {
            progress.stages.insert(update.stage_id.clone(), merged.clone());
        }
        self.touch();
        merged
    }

    pub fn record_error(&mut self, error: ErrorPayload) {
        self.last_error = Some(error);
        self.touch();
    }

    pub fn complete(&mut self, results: CompletionPayload) {
        if results.cancelled {
            self.is_cancelled = true;
        } else {
            self.is_completed = true;
        }
        self.results = Some(results);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_update = Some(Utc::now());
    }
}
