//! Payload types carried by push channel messages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of one pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage not yet started
    Pending,
    /// Stage currently running
    InProgress,
    /// Stage finished successfully
    Completed,
    /// Stage failed
    Failed,
    /// Stage not run (cancelled before reaching it)
    Skipped,
}

impl StageStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Current state of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageData {
    pub status: StageStatus,
    /// Percentage complete (0.0 - 100.0)
    pub progress: f64,
    pub message: String,
}

impl Default for StageData {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            progress: 0.0,
            message: String::new(),
        }
    }
}

impl StageData {
    /// Merge a partial update into this stage
    ///
    /// Fields absent from the update keep their current value.
    pub fn merge(&mut self, update: &StageUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.clamp(0.0, 100.0);
        }
        if let Some(message) = &update.message {
            self.message = message.clone();
        }
    }
}

/// Partial update for a single named stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub stage_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageUpdate {
    pub fn new(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: StageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Full progress snapshot of a research run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Overall percentage complete (0.0 - 100.0)
    pub overall_progress: f64,
    /// Stage currently running, if any
    #[serde(default)]
    pub current_stage: Option<String>,
    /// Run state name as reported by the server (e.g. "harvesting")
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stages: BTreeMap<String, StageData>,
}

/// Error taxonomy shared by the pipeline and the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed request; never retried
    Validation,
    /// Collaborator call failed but may succeed on retry
    CollaboratorTransient,
    /// Collaborator retries exhausted; the run ended cleanly
    CollaboratorExhausted,
    /// Progress channel dropped; handled by the reconnect policy
    ChannelNetwork,
    /// Reconnect attempts exhausted; caller must retry manually
    ChannelTerminal,
    /// Persistence or serialization fault
    Internal,
}

impl ErrorCategory {
    /// Whether retrying the failed operation is sensible
    pub fn is_retryable(self) -> bool {
        match self {
            Self::Validation | Self::Internal => false,
            Self::CollaboratorTransient
            | Self::CollaboratorExhausted
            | Self::ChannelNetwork
            | Self::ChannelTerminal => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::CollaboratorTransient => "collaborator_transient",
            Self::CollaboratorExhausted => "collaborator_exhausted",
            Self::ChannelNetwork => "channel_network",
            Self::ChannelTerminal => "channel_terminal",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized error reported over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retryable: category.is_retryable(),
            stage_id: None,
        }
    }

    pub fn at_stage(mut self, stage_id: impl Into<String>) -> Self {
        self.stage_id = Some(stage_id.into());
        self
    }
}

/// Final results of a research run
///
/// `results` and `stats` stay as JSON values: the channel is generic and
/// does not depend on the research service's domain types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    #[serde(default)]
    pub results: serde_json::Value,
    #[serde(default)]
    pub stats: serde_json::Value,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Run ended by cancellation; `results` holds no candidates
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl CompletionPayload {
    /// Terminal frame for a cancelled run
    pub fn cancelled(stats: serde_json::Value) -> Self {
        Self {
            results: serde_json::json!({ "candidates": [] }),
            stats,
            warnings: Vec::new(),
            cancelled: true,
        }
    }
}
