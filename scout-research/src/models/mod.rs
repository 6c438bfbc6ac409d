//! Data models for scout-research

pub mod contact_candidate;
pub mod generated_query;
pub mod harvested_record;
pub mod heuristics_analysis;
pub mod research_request;
pub mod search_session;
pub mod validation;

pub use contact_candidate::{
    CandidateDraft, CandidateError, ChannelType, ContactCandidate, ContactChannel, ScoreBreakdown,
};
pub use generated_query::{
    EnhancementType, GeneratedQuery, QueryMetadata, QueryScores, QueryVariant,
};
pub use harvested_record::{AuthorIdentity, HarvestedContent, HarvestedRecord};
pub use heuristics_analysis::{
    BatchAnalysis, BatchStats, BeatAnalysis, BeatSources, ConsolidationGroup, ConsolidationKind,
    EmailAnalysis, EmailType, FreelancerProfile, HeuristicsAnalysis,
};
pub use research_request::{ResearchRequest, SearchMode};
pub use search_session::{SearchSession, SearchState, Stage, StateTransition};
pub use validation::{FieldError, ValidationError};
