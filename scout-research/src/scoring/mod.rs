//! Similarity and scoring utilities
//!
//! Pure functions shared by the query engine and the heuristics engine.

pub mod recency;
pub mod similarity;
pub mod text;

pub use recency::{age_days, recency_score};
pub use similarity::{name_similarity, overlap_ratio, text_similarity, token_jaccard};
pub use text::{contains_phrase, normalize_name, normalize_text, tokenize};

/// Weighted mean of `(value, weight)` pairs, clamped to [0, 1]
///
/// Non-positive weights are ignored; zero total weight yields 0.
pub fn weighted_mean(values: &[(f64, f64)]) -> f64 {
    let (sum, total_weight) = values
        .iter()
        .filter(|(_, w)| *w > 0.0)
        .fold((0.0, 0.0), |(sum, total), (v, w)| (sum + v * w, total + w));

    if total_weight <= 0.0 {
        return 0.0;
    }
    (sum / total_weight).clamp(0.0, 1.0)
}
