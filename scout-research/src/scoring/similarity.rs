//! Symmetric text and name similarity in [0, 1]

use super::text::{normalize_name, normalize_text, tokenize};
use std::collections::HashSet;

/// Jaccard index of the two token sets
///
/// Two texts without any tokens are identical (1.0).
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = tokenize(a).into_iter().collect();
    let b: HashSet<String> = tokenize(b).into_iter().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    intersection / union
}

/// Share of `needle` tokens that also occur in `haystack`
///
/// Not symmetric; 0.0 when `needle` has no tokens.
pub fn overlap_ratio(needle: &str, haystack: &str) -> f64 {
    let needle: Vec<String> = tokenize(needle);
    if needle.is_empty() {
        return 0.0;
    }
    let haystack: HashSet<String> = tokenize(haystack).into_iter().collect();
    let hits = needle.iter().filter(|t| haystack.contains(*t)).count() as f64;
    hits / needle.len() as f64
}

/// `max(token_jaccard, normalized_levenshtein)` over normalized text
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    if na == nb {
        return 1.0;
    }
    let edit = strsim::normalized_levenshtein(&na, &nb);
    token_jaccard(a, b).max(edit).clamp(0.0, 1.0)
}

/// Jaro-Winkler similarity of normalized person names
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na == nb {
        return 1.0;
    }
    strsim::jaro_winkler(&na, &nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        assert_eq!(text_similarity("AI policy reporters", "ai  policy, reporters"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let pairs = [
            ("AI policy reporters", "AI regulation journalists"),
            ("EU AI Act coverage", "AI Act Brussels correspondent"),
            ("", "something"),
        ];
        for (a, b) in pairs {
            let ab = text_similarity(a, b);
            let ba = text_similarity(b, a);
            assert!((ab - ba).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn near_duplicate_queries_score_high() {
        assert!(text_similarity("AI policy reporters Europe", "AI policy reporter Europe") >= 0.8);
        assert!(text_similarity("AI policy reporters", "climate finance desk") < 0.5);
    }

    #[test]
    fn overlap_ratio_counts_needle_tokens() {
        assert_eq!(overlap_ratio("AI policy", "policy on AI and chips"), 1.0);
        assert_eq!(overlap_ratio("AI policy", "chips"), 0.0);
        assert_eq!(overlap_ratio("the of", "anything"), 0.0);
    }

    #[test]
    fn name_similarity_ignores_titles() {
        assert_eq!(name_similarity("Dr. Jane Doe", "jane doe"), 1.0);
        assert!(name_similarity("Jon Smith", "John Smith") > 0.92);
        assert!(name_similarity("Jane Doe", "Mark Lee") < 0.7);
    }
}
