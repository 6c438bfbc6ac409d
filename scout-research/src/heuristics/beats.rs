//! Beat inference from section paths and keywords
//!
//! Section-path beats are trusted more than keyword beats and are listed
//! first in `primary_beats`.

use crate::models::{BeatAnalysis, BeatSources, HarvestedContent};
use crate::scoring::{normalize_text, tokenize};

struct BeatDefinition {
    beat: &'static str,
    sections: &'static [&'static str],
    keywords: &'static [&'static str],
}

const TAXONOMY: &[BeatDefinition] = &[
    BeatDefinition {
        beat: "politics",
        sections: &["politics", "government", "election", "elections"],
        keywords: &["election", "parliament", "senate", "minister", "congress", "campaign", "vote", "lawmakers"],
    },
    BeatDefinition {
        beat: "business",
        sections: &["business", "economy", "markets", "finance", "money"],
        keywords: &["market", "markets", "earnings", "investors", "economy", "inflation", "shares", "profit"],
    },
    BeatDefinition {
        beat: "technology",
        sections: &["technology", "tech", "digital", "innovation"],
        keywords: &["ai", "software", "startup", "algorithm", "chip", "cyber", "internet", "platform", "data"],
    },
    BeatDefinition {
        beat: "science",
        sections: &["science", "research"],
        keywords: &["scientists", "study", "researchers", "physics", "biology", "space", "nasa"],
    },
    BeatDefinition {
        beat: "health",
        sections: &["health", "medicine", "wellness"],
        keywords: &["health", "hospital", "patients", "vaccine", "disease", "doctors", "medical"],
    },
    BeatDefinition {
        beat: "climate",
        sections: &["climate", "environment", "energy"],
        keywords: &["climate", "emissions", "carbon", "renewable", "warming", "energy", "environmental"],
    },
    BeatDefinition {
        beat: "sports",
        sections: &["sport", "sports"],
        keywords: &["match", "league", "coach", "championship", "season", "tournament"],
    },
    BeatDefinition {
        beat: "culture",
        sections: &["culture", "arts", "entertainment", "books", "film", "music"],
        keywords: &["film", "album", "festival", "artist", "novel", "museum"],
    },
    BeatDefinition {
        beat: "world",
        sections: &["world", "international", "foreign", "global"],
        keywords: &["diplomats", "embassy", "sanctions", "treaty", "diplomatic", "foreign"],
    },
    BeatDefinition {
        beat: "education",
        sections: &["education", "schools"],
        keywords: &["school", "schools", "students", "teachers", "university", "curriculum"],
    },
    BeatDefinition {
        beat: "legal",
        sections: &["law", "legal", "courts", "crime", "justice"],
        keywords: &["court", "judge", "lawsuit", "prosecutors", "trial", "ruling"],
    },
];

/// Keyword points needed before a keyword beat is reported
const KEYWORD_THRESHOLD: usize = 2;
const TITLE_WEIGHT: usize = 2;

/// Beats named by the section path, in taxonomy order
pub fn section_beats(section_path: &str) -> Vec<String> {
    let segments: Vec<String> = section_path
        .split('/')
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .collect();

    TAXONOMY
        .iter()
        .filter(|def| {
            segments.iter().any(|segment| {
                segment
                    .split(' ')
                    .any(|token| def.sections.contains(&token))
            })
        })
        .map(|def| def.beat.to_string())
        .collect()
}

/// Beats suggested by keywords, strongest first
pub fn keyword_beats(title: &str, body: &str) -> Vec<String> {
    let title_tokens = tokenize(title);
    let body_tokens = tokenize(body);

    let mut scored: Vec<(usize, usize, &'static str)> = TAXONOMY
        .iter()
        .enumerate()
        .map(|(order, def)| {
            let hits = |tokens: &[String]| {
                tokens
                    .iter()
                    .filter(|t| def.keywords.contains(&t.as_str()))
                    .count()
            };
            let points = hits(title_tokens.as_slice()) * TITLE_WEIGHT + hits(body_tokens.as_slice());
            (points, order, def.beat)
        })
        .filter(|(points, _, _)| *points >= KEYWORD_THRESHOLD)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, beat)| beat.to_string()).collect()
}

/// Beat analysis of one piece of content
pub fn analyze_content(content: &HarvestedContent) -> BeatAnalysis {
    let section_based = content
        .section_path
        .as_deref()
        .map(section_beats)
        .unwrap_or_default();
    let keyword_based = keyword_beats(
        content.title.as_deref().unwrap_or_default(),
        content.body.as_deref().unwrap_or_default(),
    );

    let mut analysis = BeatAnalysis {
        primary_beats: Vec::new(),
        sources: BeatSources {
            section_based,
            keyword_based,
        },
    };
    refresh_primary(&mut analysis);
    analysis
}

/// Fold `other` into `into`, keeping first-seen order per source
pub fn merge(into: &mut BeatAnalysis, other: &BeatAnalysis) {
    extend_unique(&mut into.sources.section_based, &other.sources.section_based);
    extend_unique(&mut into.sources.keyword_based, &other.sources.keyword_based);
    refresh_primary(into);
}

fn refresh_primary(analysis: &mut BeatAnalysis) {
    let mut primary = Vec::new();
    extend_unique(&mut primary, &analysis.sources.section_based);
    extend_unique(&mut primary, &analysis.sources.keyword_based);
    analysis.primary_beats = primary;
}

fn extend_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}
