//! Heuristics engine output types

use super::contact_candidate::ContactCandidate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerProfile {
    pub is_freelancer: bool,
    /// Distinct outlet domains, in first-seen order
    pub outlets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_outlet: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Mailbox derived from the person's name
    Personal,
    /// Team, desk or other shared mailbox
    Alias,
    /// Generic newsroom function (news@, tips@, editor@)
    Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_type: Option<EmailType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatSources {
    pub section_based: Vec<String>,
    pub keyword_based: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatAnalysis {
    /// Section beats first, then keyword beats, de-duplicated
    pub primary_beats: Vec<String>,
    pub sources: BeatSources,
}

/// Per-candidate analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicsAnalysis {
    pub contact_id: Uuid,
    pub freelancer_profile: FreelancerProfile,
    pub email_analysis: EmailAnalysis,
    pub beat_analysis: BeatAnalysis,
    pub overall_score: f64,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationKind {
    /// Same person writing for several outlets; merge with multi-outlet association
    FreelancerGroup,
    /// Several entries under one name at one outlet; merge or drop
    TrueDuplicate,
    /// Similar but distinct names at one outlet; flagged for review only
    PossibleDuplicate,
}

/// Cluster of candidates that refer to the same person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationGroup {
    pub kind: ConsolidationKind,
    /// Normalized name of the first member
    pub name: String,
    pub candidate_ids: Vec<Uuid>,
    pub outlets: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_records: usize,
    pub syndicated_filtered: usize,
    pub skipped_invalid: usize,
    pub authors_found: usize,
    pub candidates: usize,
    pub freelancers_detected: usize,
}

/// Result of one heuristics batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub candidates: Vec<ContactCandidate>,
    pub analyses: Vec<HeuristicsAnalysis>,
    pub stats: BatchStats,
    pub recommendations: Vec<String>,
    pub groups: Vec<ConsolidationGroup>,
}

impl BatchAnalysis {
    pub fn analysis_for(&self, contact_id: Uuid) -> Option<&HeuristicsAnalysis> {
        self.analyses.iter().find(|a| a.contact_id == contact_id)
    }
}
