//! Scored contact candidates
//!
//! A [`ContactCandidate`] can only be obtained through [`ContactCandidate::build`],
//! which checks the invariants once:
//! - `sources` is never empty
//! - `score` equals the sum of `score_breakdown`
//! - `score` lies in [0, 100]
//!
//! Fields are read-only afterwards; re-scoring builds a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const MAX_SCORE: f64 = 100.0;

/// Float slack allowed when summing component points
const SCORE_EPSILON: f64 = 1e-9;

/// Contact channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Email,
    Social,
    Phone,
    ContactForm,
    Website,
}

/// One way to reach a contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactChannel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub value: String,
    pub source_url: String,
    /// Confidence the channel belongs to the contact (0-1)
    pub confidence: f64,
    /// Publicly listed for professional contact
    pub policy_compliant: bool,
}

/// Per-signal score points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub beat_match: f64,
    pub channel_score: f64,
    pub corroboration: f64,
    pub geo_match: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.recency + self.beat_match + self.channel_score + self.corroboration + self.geo_match
    }

    fn components(&self) -> [f64; 5] {
        [
            self.recency,
            self.beat_match,
            self.channel_score,
            self.corroboration,
            self.geo_match,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("Candidate name is empty")]
    MissingName,

    #[error("Candidate {0} has no sources")]
    NoSources(String),

    #[error("Score component for {name} is negative or not finite")]
    InvalidComponent { name: String },

    #[error("Score {score} for {name} exceeds 100")]
    ScoreOutOfRange { name: String, score: f64 },
}

/// Unscored candidate fields
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDraft {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
    pub outlet: String,
    pub author_pages: Vec<String>,
    pub channels: Vec<ContactChannel>,
    pub beats: Vec<String>,
    pub sources: Vec<String>,
    pub freshness: DateTime<Utc>,
}

/// Scored, provenance-tracked contact proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CandidateWire")]
pub struct ContactCandidate {
    id: Uuid,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    outlet: String,
    author_pages: Vec<String>,
    channels: Vec<ContactChannel>,
    beats: Vec<String>,
    sources: Vec<String>,
    freshness: DateTime<Utc>,
    score: f64,
    score_breakdown: ScoreBreakdown,
}

impl ContactCandidate {
    /// Build a candidate, enforcing every invariant
    pub fn build(draft: CandidateDraft, breakdown: ScoreBreakdown) -> Result<Self, CandidateError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(CandidateError::MissingName);
        }

        let sources: Vec<String> = draft
            .sources
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if sources.is_empty() {
            return Err(CandidateError::NoSources(name));
        }

        if breakdown.components().iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(CandidateError::InvalidComponent { name });
        }

        let score = breakdown.total();
        if score > MAX_SCORE + SCORE_EPSILON {
            return Err(CandidateError::ScoreOutOfRange { name, score });
        }

        Ok(Self {
            id: draft.id,
            name,
            role: draft.role,
            outlet: draft.outlet,
            author_pages: draft.author_pages,
            channels: draft.channels,
            beats: draft.beats,
            sources,
            freshness: draft.freshness,
            score,
            score_breakdown: breakdown,
        })
    }

    /// Same candidate with a new breakdown
    pub fn rescored(&self, breakdown: ScoreBreakdown) -> Result<Self, CandidateError> {
        Self::build(self.to_draft(), breakdown)
    }

    pub fn to_draft(&self) -> CandidateDraft {
        CandidateDraft {
            id: self.id,
            name: self.name.clone(),
            role: self.role.clone(),
            outlet: self.outlet.clone(),
            author_pages: self.author_pages.clone(),
            channels: self.channels.clone(),
            beats: self.beats.clone(),
            sources: self.sources.clone(),
            freshness: self.freshness,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn outlet(&self) -> &str {
        &self.outlet
    }

    pub fn author_pages(&self) -> &[String] {
        &self.author_pages
    }

    pub fn channels(&self) -> &[ContactChannel] {
        &self.channels
    }

    pub fn beats(&self) -> &[String] {
        &self.beats
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn freshness(&self) -> DateTime<Utc> {
        self.freshness
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn score_breakdown(&self) -> &ScoreBreakdown {
        &self.score_breakdown
    }
}

/// Wire form; deserialized candidates go back through `build`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateWire {
    id: Uuid,
    name: String,
    #[serde(default)]
    role: Option<String>,
    outlet: String,
    #[serde(default)]
    author_pages: Vec<String>,
    #[serde(default)]
    channels: Vec<ContactChannel>,
    #[serde(default)]
    beats: Vec<String>,
    #[serde(default)]
    sources: Vec<String>,
    freshness: DateTime<Utc>,
    score_breakdown: ScoreBreakdown,
}

impl TryFrom<CandidateWire> for ContactCandidate {
    type Error = CandidateError;

    fn try_from(wire: CandidateWire) -> Result<Self, Self::Error> {
        // `score` on the wire is ignored; it is always recomputed
        ContactCandidate::build(
            CandidateDraft {
                id: wire.id,
                name: wire.name,
                role: wire.role,
                outlet: wire.outlet,
                author_pages: wire.author_pages,
                channels: wire.channels,
                beats: wire.beats,
                sources: wire.sources,
                freshness: wire.freshness,
            },
            wire.score_breakdown,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(sources: Vec<&str>) -> CandidateDraft {
        CandidateDraft {
            id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            role: Some("Technology reporter".to_string()),
            outlet: "example-news.com".to_string(),
            author_pages: vec![],
            channels: vec![],
            beats: vec!["technology".to_string()],
            sources: sources.into_iter().map(String::from).collect(),
            freshness: Utc::now(),
        }
    }

    fn breakdown() -> ScoreBreakdown {
        ScoreBreakdown {
            recency: 25.0,
            beat_match: 20.0,
            channel_score: 10.0,
            corroboration: 7.5,
            geo_match: 5.0,
        }
    }

    #[test]
    fn score_is_sum_of_breakdown() {
        let candidate =
            ContactCandidate::build(draft(vec!["https://example-news.com/a"]), breakdown()).unwrap();
        assert_eq!(candidate.score(), candidate.score_breakdown().total());
        assert_eq!(candidate.score(), 67.5);
    }

    #[test]
    fn rejects_empty_sources() {
        let err = ContactCandidate::build(draft(vec!["  "]), breakdown()).unwrap_err();
        assert!(matches!(err, CandidateError::NoSources(_)));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let mut over = breakdown();
        over.recency = 80.0;
        assert!(matches!(
            ContactCandidate::build(draft(vec!["u"]), over),
            Err(CandidateError::ScoreOutOfRange { .. })
        ));

        let mut negative = breakdown();
        negative.geo_match = -1.0;
        assert!(matches!(
            ContactCandidate::build(draft(vec!["u"]), negative),
            Err(CandidateError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn deserialize_recomputes_score() {
        let candidate =
            ContactCandidate::build(draft(vec!["https://example-news.com/a"]), breakdown()).unwrap();
        let mut value = serde_json::to_value(&candidate).unwrap();
        value["score"] = serde_json::json!(99.0);

        let decoded: ContactCandidate = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.score(), 67.5);
    }

    #[test]
    fn deserialize_rejects_missing_sources() {
        let candidate =
            ContactCandidate::build(draft(vec!["https://example-news.com/a"]), breakdown()).unwrap();
        let mut value = serde_json::to_value(&candidate).unwrap();
        value["sources"] = serde_json::json!([]);

        assert!(serde_json::from_value::<ContactCandidate>(value).is_err());
    }
}
