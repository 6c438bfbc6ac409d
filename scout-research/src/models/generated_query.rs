//! Generated search queries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Query enhancement strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementType {
    /// Broaden the topic with related terms
    Expansion,
    /// Narrow the topic to sharper phrasings
    Refinement,
    /// Anchor the topic to target regions and languages
    Localization,
    /// Fixed local templates; no collaborator call
    Template,
}

impl EnhancementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expansion => "expansion",
            Self::Refinement => "refinement",
            Self::Localization => "localization",
            Self::Template => "template",
        }
    }

    /// Whether this type calls the language generator
    pub fn uses_collaborator(self) -> bool {
        !matches!(self, Self::Template)
    }
}

impl fmt::Display for EnhancementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnhancementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expansion" => Ok(Self::Expansion),
            "refinement" => Ok(Self::Refinement),
            "localization" => Ok(Self::Localization),
            "template" => Ok(Self::Template),
            other => Err(format!("unknown enhancement type '{}'", other)),
        }
    }
}

/// Which generation pass produced a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryVariant {
    Base,
    DiversityBoost,
    Template,
}

impl QueryVariant {
    /// Preference when two variants produce the same text; lower wins
    pub fn preference(self) -> u8 {
        match self {
            Self::Base => 0,
            Self::Template => 1,
            Self::DiversityBoost => 2,
        }
    }
}

/// Per-axis query scores, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryScores {
    pub relevance: f64,
    pub diversity: f64,
    pub coverage: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub engine: String,
    pub model: String,
    pub processing_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u32>,
    pub variant: QueryVariant,
}

/// One accepted query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuery {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub query_type: EnhancementType,
    pub scores: QueryScores,
    /// Similarity to the top-ranked query (the top query itself has 1.0)
    pub similarity_score: f64,
    pub metadata: QueryMetadata,
}
