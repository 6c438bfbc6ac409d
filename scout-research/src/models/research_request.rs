//! Research request submitted by a caller

use super::validation::ValidationError;
use serde::{Deserialize, Serialize};

pub const TOPIC_MIN_LEN: usize = 3;
pub const TOPIC_MAX_LEN: usize = 500;
pub const MAX_CONTACTS_LIMIT: u32 = 200;
pub const MAX_QUERIES_LIMIT: u32 = 50;

/// Search mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Fewer, higher-confidence queries; request threshold applies as-is
    #[default]
    Precision,
    /// Wider query budget and a relaxed contact threshold
    Recall,
}

/// Free-text research request
///
/// Immutable once submitted; the session stores its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub target_geo: Vec<String>,
    #[serde(default)]
    pub target_beats: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_max_contacts")]
    pub max_contacts: u32,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Query budget override (1-50); the mode default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queries: Option<u32>,
}

fn default_max_contacts() -> u32 {
    30
}

fn default_score_threshold() -> f64 {
    70.0
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            region: None,
            mode: SearchMode::default(),
            target_geo: Vec::new(),
            target_beats: Vec::new(),
            languages: Vec::new(),
            max_contacts: default_max_contacts(),
            score_threshold: default_score_threshold(),
            max_queries: None,
        }
    }

    /// Validate every field, collecting all errors
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        let topic_len = self.topic.trim().chars().count();
        if topic_len < TOPIC_MIN_LEN {
            errors.push(
                "topic",
                format!("must be at least {} characters", TOPIC_MIN_LEN),
            );
        } else if topic_len > TOPIC_MAX_LEN {
            errors.push("topic", format!("must be at most {} characters", TOPIC_MAX_LEN));
        }

        if self.max_contacts == 0 || self.max_contacts > MAX_CONTACTS_LIMIT {
            errors.push(
                "maxContacts",
                format!("must be between 1 and {}", MAX_CONTACTS_LIMIT),
            );
        }

        if !self.score_threshold.is_finite() || !(0.0..=100.0).contains(&self.score_threshold) {
            errors.push("scoreThreshold", "must be between 0 and 100");
        }

        if let Some(max_queries) = self.max_queries {
            if max_queries == 0 || max_queries > MAX_QUERIES_LIMIT {
                errors.push(
                    "maxQueries",
                    format!("must be between 1 and {}", MAX_QUERIES_LIMIT),
                );
            }
        }

        if self.target_beats.iter().any(|b| b.trim().is_empty()) {
            errors.push("targetBeats", "must not contain empty entries");
        }
        if self.target_geo.iter().any(|g| g.trim().is_empty()) {
            errors.push("targetGeo", "must not contain empty entries");
        }

        errors.into_result()
    }

    pub fn topic(&self) -> &str {
        self.topic.trim()
    }
}
