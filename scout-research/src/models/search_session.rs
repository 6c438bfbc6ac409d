//! Research run state machine
//!
//! A run moves through:
//! SUBMITTED → GENERATING_QUERIES → HARVESTING → ANALYZING → RANKING → COMPLETED
//!
//! and may end early in CANCELLED or FAILED from any non-terminal state.

use super::research_request::ResearchRequest;
use chrono::{DateTime, Utc};
use scout_common::events::{ErrorPayload, ProgressSnapshot, StageData, StageStatus, StageUpdate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Submitted,
    GeneratingQueries,
    Harvesting,
    Analyzing,
    Ranking,
    Completed,
    Cancelled,
    Failed,
}

impl SearchState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::GeneratingQueries => "generating_queries",
            Self::Harvesting => "harvesting",
            Self::Analyzing => "analyzing",
            Self::Ranking => "ranking",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SearchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Submitted,
            Self::GeneratingQueries,
            Self::Harvesting,
            Self::Analyzing,
            Self::Ranking,
            Self::Completed,
            Self::Cancelled,
            Self::Failed,
        ]
        .into_iter()
        .find(|state| state.as_str() == s)
        .ok_or_else(|| format!("unknown search state '{}'", s))
    }
}

/// Pipeline stages reported over the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    QueryGeneration,
    Harvesting,
    Analysis,
    Ranking,
    Storage,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::QueryGeneration,
        Stage::Harvesting,
        Stage::Analysis,
        Stage::Ranking,
        Stage::Storage,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::QueryGeneration => "query_generation",
            Self::Harvesting => "harvesting",
            Self::Analysis => "analysis",
            Self::Ranking => "ranking",
            Self::Storage => "storage",
        }
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub search_id: Uuid,
    pub old_state: SearchState,
    pub new_state: SearchState,
    pub transitioned_at: DateTime<Utc>,
}

/// Server-side record of one research run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSession {
    pub search_id: Uuid,
    pub state: SearchState,
    pub request: ResearchRequest,
    pub stages: BTreeMap<String, StageData>,
    /// Percentage complete (0.0 - 100.0), mean of stage progress
    pub overall_progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
    /// Summary statistics of the last finished run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
    /// 1 for the first run, incremented on every retry
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SearchSession {
    pub fn new(request: ResearchRequest) -> Self {
        Self {
            search_id: Uuid::new_v4(),
            state: SearchState::Submitted,
            request,
            stages: pending_stages(),
            overall_progress: 0.0,
            current_stage: None,
            message: "Submitted".to_string(),
            error: None,
            stats: None,
            attempt: 1,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: SearchState) -> StateTransition {
        let transition = StateTransition {
            search_id: self.search_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
            self.current_stage = None;
        }

        transition
    }

    /// Merge a stage delta and return the merged stage
    pub fn update_stage(&mut self, update: &StageUpdate) -> StageData {
        let stage = self.stages.entry(update.stage_id.clone()).or_default();
        stage.merge(update);
        let merged = stage.clone();

        if merged.status == StageStatus::InProgress {
            self.current_stage = Some(update.stage_id.clone());
        }
        if let Some(message) = &update.message {
            self.message = message.clone();
        }
        self.recompute_progress();
        merged
    }

    /// Mark every stage that has not finished as skipped
    pub fn skip_unfinished_stages(&mut self) {
        for stage in self.stages.values_mut() {
            if !stage.status.is_finished() {
                stage.status = StageStatus::Skipped;
            }
        }
        self.recompute_progress();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether `POST /search/{id}/retry` may restart this run
    pub fn can_retry(&self) -> bool {
        matches!(self.state, SearchState::Failed | SearchState::Cancelled)
    }

    /// Reset for another attempt with the stored request
    pub fn restart(&mut self) -> StateTransition {
        self.attempt += 1;
        self.stages = pending_stages();
        self.overall_progress = 0.0;
        self.error = None;
        self.stats = None;
        self.message = format!("Retry attempt {}", self.attempt);
        self.started_at = Utc::now();
        self.ended_at = None;
        self.transition_to(SearchState::Submitted)
    }

    /// Snapshot published as `progress_update`
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            overall_progress: self.overall_progress,
            current_stage: self.current_stage.clone(),
            state: self.state.as_str().to_string(),
            message: self.message.clone(),
            stages: self.stages.clone(),
        }
    }

    /// Rough duration estimate in seconds for a submit response
    pub fn estimated_duration_secs(&self, query_budget: u32) -> u64 {
        10 + u64::from(query_budget) * 3
    }

    fn recompute_progress(&mut self) {
        if self.stages.is_empty() {
            self.overall_progress = 0.0;
            return;
        }
        let total: f64 = self
            .stages
            .values()
            .map(|s| match s.status {
                StageStatus::Completed | StageStatus::Skipped => 100.0,
                _ => s.progress,
            })
            .sum();
        self.overall_progress = total / self.stages.len() as f64;
    }
}

fn pending_stages() -> BTreeMap<String, StageData> {
    Stage::ALL
        .iter()
        .map(|s| (s.id().to_string(), StageData::default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_all_stages_pending() {
        let session = SearchSession::new(ResearchRequest::new("AI policy"));
        assert_eq!(session.state, SearchState::Submitted);
        assert_eq!(session.stages.len(), 5);
        assert!(session
            .stages
            .values()
            .all(|s| s.status == StageStatus::Pending));
        assert_eq!(session.attempt, 1);
    }

    #[test]
    fn terminal_transition_stamps_end_time() {
        let mut session = SearchSession::new(ResearchRequest::new("AI policy"));
        let transition = session.transition_to(SearchState::GeneratingQueries);
        assert_eq!(transition.old_state, SearchState::Submitted);
        assert!(session.ended_at.is_none());

        session.transition_to(SearchState::Failed);
        assert!(session.ended_at.is_some());
        assert!(session.can_retry());
    }

    #[test]
    fn stage_progress_feeds_overall() {
        let mut session = SearchSession::new(ResearchRequest::new("AI policy"));
        session.update_stage(
            &StageUpdate::new(Stage::QueryGeneration.id()).status(StageStatus::Completed),
        );
        session.update_stage(
            &StageUpdate::new(Stage::Harvesting.id())
                .status(StageStatus::InProgress)
                .progress(50.0),
        );

        assert_eq!(session.overall_progress, 30.0);
        assert_eq!(session.current_stage.as_deref(), Some("harvesting"));
    }

    #[test]
    fn restart_increments_attempt() {
        let mut session = SearchSession::new(ResearchRequest::new("AI policy"));
        session.transition_to(SearchState::Cancelled);
        session.restart();

        assert_eq!(session.attempt, 2);
        assert_eq!(session.state, SearchState::Submitted);
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn snapshot_reports_state_name() {
        let mut session = SearchSession::new(ResearchRequest::new("AI policy"));
        session.transition_to(SearchState::Harvesting);
        assert_eq!(session.snapshot().state, "harvesting");
    }
}
