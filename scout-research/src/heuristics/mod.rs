//! Contact heuristics and quality scoring
//!
//! Turns harvested (content, byline) records into scored, de-duplicated
//! contact candidates with per-candidate analyses.

pub mod authors;
pub mod beats;
pub mod consolidation;
pub mod email;
pub mod engine;
pub mod freelancer;
pub mod rules;
pub mod scorer;
pub mod syndication;

pub use consolidation::{consolidate, Consolidation};
pub use engine::{AnalysisContext, HeuristicsConfig, HeuristicsEngine};
pub use scorer::ScoreMaxima;
pub use syndication::normalize_url;
