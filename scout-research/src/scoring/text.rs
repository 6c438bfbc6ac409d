//! Text and name normalization

/// English stopwords removed by [`tokenize`]
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "an", "and", "are", "as", "at", "be", "been", "but", "by",
    "can", "do", "for", "from", "has", "have", "how", "in", "into", "is", "it", "its", "more",
    "new", "not", "of", "on", "or", "our", "over", "so", "than", "that", "the", "their", "them",
    "there", "these", "they", "this", "to", "up", "was", "we", "what", "when", "which", "who",
    "why", "will", "with", "would", "you", "your",
];

/// Titles and honorifics stripped from person names
const HONORIFICS: &[&str] = &[
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "professor", "sir", "dame", "rev", "jr",
    "sr",
];

/// Lowercase, map punctuation to spaces, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Normalized tokens without stopwords
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(' ')
        .filter(|t| !t.is_empty() && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Normalize a person name for grouping
///
/// Strips a leading "by", honorifics and punctuation:
/// `"By Dr. Jane O'Neil"` becomes `"jane o neil"`.
pub fn normalize_name(name: &str) -> String {
    let normalized = normalize_text(name);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

    if tokens.first() == Some(&"by") {
        tokens.remove(0);
    }
    tokens.retain(|t| !HONORIFICS.contains(t));
    tokens.join(" ")
}

/// Whether `phrase` occurs in `text` on token boundaries (both normalized)
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let phrase = normalize_text(phrase);
    if phrase.is_empty() {
        return false;
    }
    let text = normalize_text(text);
    format!(" {} ", text).contains(&format!(" {} ", phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_punctuation() {
        assert_eq!(normalize_text("  AI-Policy:  Reporters!! "), "ai policy reporters");
    }

    #[test]
    fn tokenize_drops_stopwords() {
        assert_eq!(
            tokenize("The reporters of the EU AI Act"),
            vec!["reporters", "eu", "ai", "act"]
        );
    }

    #[test]
    fn normalize_name_strips_by_and_titles() {
        assert_eq!(normalize_name("By Dr. Jane O'Neil"), "jane o neil");
        assert_eq!(normalize_name("JANE DOE"), "jane doe");
    }

    #[test]
    fn phrase_match_respects_token_boundaries() {
        assert!(contains_phrase("EU AI policy reporter", "ai policy"));
        assert!(!contains_phrase("email policy", "ai"));
        assert!(!contains_phrase("anything", "  "));
    }
}
