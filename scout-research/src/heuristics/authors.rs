//! Author extraction from harvested records

use crate::models::{ContactChannel, HarvestedRecord};
use crate::scoring::normalize_name;

/// Words marking a byline fragment as an organization rather than a person
const NON_PERSON_WORDS: &[&str] = &[
    "staff", "team", "desk", "newsroom", "editors", "editorial", "reporters", "wire", "agency",
    "press", "bureau", "contributors", "correspondents",
];

const MIN_NAME_WORDS: usize = 2;
const MAX_NAME_WORDS: usize = 4;

/// Author attributed to one record
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAuthor {
    /// Display name as written
    pub name: String,
    /// Normalized name used for grouping
    pub key: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub author_page: Option<String>,
    pub channels: Vec<ContactChannel>,
}

impl ExtractedAuthor {
    fn from_name(name: String) -> Option<Self> {
        let key = normalize_name(&name);
        if key.is_empty() {
            return None;
        }
        Some(Self {
            name,
            key,
            role: None,
            email: None,
            author_page: None,
            channels: Vec::new(),
        })
    }
}

/// Authors of a record: the structured identity when present, else the byline
pub fn extract_authors(record: &HarvestedRecord) -> Vec<ExtractedAuthor> {
    if let Some(identity) = &record.author {
        let name = clean_name(&identity.name);
        if let Some(mut author) = ExtractedAuthor::from_name(name) {
            author.role = identity.role.clone().filter(|r| !r.trim().is_empty());
            author.email = identity.email.clone().filter(|e| e.contains('@'));
            author.author_page = identity.author_page.clone().filter(|p| !p.trim().is_empty());
            author.channels = identity.channels.clone();
            return vec![author];
        }
    }

    record
        .content
        .byline
        .as_deref()
        .map(parse_byline)
        .unwrap_or_default()
        .into_iter()
        .filter_map(ExtractedAuthor::from_name)
        .collect()
}

/// Split a byline into person names
///
/// `"By Jane Doe and John Roe, Reuters"` yields `["Jane Doe", "John Roe"]`:
/// single words and organization fragments are dropped.
pub fn parse_byline(byline: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for part in byline.split([',', ';', '|', '&']) {
        let mut fragment: Vec<&str> = Vec::new();
        for word in part.split_whitespace() {
            if word.eq_ignore_ascii_case("and") {
                push_name(&mut names, &fragment);
                fragment.clear();
            } else {
                fragment.push(word);
            }
        }
        push_name(&mut names, &fragment);
    }

    names
}

fn push_name(names: &mut Vec<String>, words: &[&str]) {
    let candidate = clean_name(&words.join(" "));
    let key = normalize_name(&candidate);
    let word_count = key.split(' ').filter(|w| !w.is_empty()).count();

    if !(MIN_NAME_WORDS..=MAX_NAME_WORDS).contains(&word_count) {
        return;
    }
    if key.split(' ').any(|w| NON_PERSON_WORDS.contains(&w)) {
        return;
    }
    if names.iter().any(|n| normalize_name(n) == key) {
        return;
    }
    names.push(candidate);
}

/// Trim, collapse whitespace and drop a leading "By"
fn clean_name(raw: &str) -> String {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let start = match words.first() {
        Some(first) if first.eq_ignore_ascii_case("by") || first.eq_ignore_ascii_case("by:") => 1,
        _ => 0,
    };
    words[start..].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorIdentity;

    #[test]
    fn byline_with_several_authors() {
        assert_eq!(
            parse_byline("By Jane Doe and John Roe, Reuters"),
            vec!["Jane Doe".to_string(), "John Roe".to_string()]
        );
        assert_eq!(
            parse_byline("Ana Lima & Tom Berg; Staff Reporters"),
            vec!["Ana Lima".to_string(), "Tom Berg".to_string()]
        );
    }

    #[test]
    fn organization_bylines_are_dropped() {
        assert!(parse_byline("By Technology Desk").is_empty());
        assert!(parse_byline("AP").is_empty());
    }

    #[test]
    fn identity_wins_over_byline() {
        let mut record = HarvestedRecord::with_byline("https://a.example/x", "By Someone Else");
        record.author = Some(AuthorIdentity {
            name: "Dr. Maria Silva".to_string(),
            email: Some("maria.silva@a.example".to_string()),
            ..Default::default()
        });

        let authors = extract_authors(&record);
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].key, "maria silva");
        assert_eq!(authors[0].email.as_deref(), Some("maria.silva@a.example"));
    }

    #[test]
    fn record_without_names_yields_nothing() {
        let record = HarvestedRecord::with_byline("https://a.example/x", "  ");
        assert!(extract_authors(&record).is_empty());
    }
}
