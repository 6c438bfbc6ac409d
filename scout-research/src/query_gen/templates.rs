//! Prompts for the language generator and local query templates

use crate::models::{EnhancementType, ResearchRequest};

/// Build the prompt for one enhancement type
pub fn build_prompt(
    enhancement: EnhancementType,
    request: &ResearchRequest,
    seed_text: Option<&str>,
    max_queries: u32,
) -> String {
    let instruction = match enhancement {
        EnhancementType::Expansion => {
            "Broaden the topic with related terms, synonyms and adjacent subjects."
        }
        EnhancementType::Refinement => {
            "Narrow the topic into sharper, more specific phrasings a newsroom search would use."
        }
        EnhancementType::Localization => {
            "Anchor the topic to the target regions and languages listed below."
        }
        EnhancementType::Template => "Fill the topic into common journalist search patterns.",
    };

    let mut prompt = format!(
        "You write web search queries that find journalists and subject-matter experts.\n\
         Task ({}): {}\n\
         Topic: {}\n",
        enhancement.as_str(),
        instruction,
        request.topic()
    );

    if let Some(region) = request.region.as_deref() {
        prompt.push_str(&format!("Region: {}\n", region));
    }
    if !request.target_beats.is_empty() {
        prompt.push_str(&format!("Beats: {}\n", request.target_beats.join(", ")));
    }
    if !request.target_geo.is_empty() {
        prompt.push_str(&format!("Geography: {}\n", request.target_geo.join(", ")));
    }
    if !request.languages.is_empty() {
        prompt.push_str(&format!("Languages: {}\n", request.languages.join(", ")));
    }
    if let Some(seed) = seed_text.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("Context: {}\n", seed.trim()));
    }

    prompt.push_str(&format!(
        "Return at most {} queries, one per line, without numbering or commentary.",
        max_queries
    ));
    prompt
}

/// Queries produced locally from fixed templates
///
/// Deterministic for a given request; never calls a collaborator.
pub fn template_queries(request: &ResearchRequest) -> Vec<String> {
    let topic = request.topic();
    let mut queries = vec![
        format!("{} journalist", topic),
        format!("{} reporter byline", topic),
        format!("\"{}\" correspondent", topic),
    ];

    for beat in request.target_beats.iter().take(2) {
        queries.push(format!("{} {} reporter", beat.trim(), topic));
    }
    for geo in request.target_geo.iter().take(2) {
        queries.push(format!("{} journalist {}", topic, geo.trim()));
    }
    if let Some(region) = request.region.as_deref() {
        queries.push(format!("{} news {}", topic, region.trim()));
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_criteria() {
        let mut request = ResearchRequest::new("AI policy");
        request.target_beats = vec!["technology".to_string()];
        request.region = Some("EU".to_string());

        let prompt = build_prompt(EnhancementType::Localization, &request, Some("Brussels"), 5);

        assert!(prompt.contains("Task (localization)"));
        assert!(prompt.contains("Topic: AI policy"));
        assert!(prompt.contains("Beats: technology"));
        assert!(prompt.contains("Region: EU"));
        assert!(prompt.contains("Context: Brussels"));
        assert!(prompt.contains("at most 5 queries"));
    }

    #[test]
    fn templates_use_beats_and_geo() {
        let mut request = ResearchRequest::new("AI policy");
        request.target_beats = vec!["technology".to_string()];
        request.target_geo = vec!["Germany".to_string()];

        let queries = template_queries(&request);
        assert!(queries.contains(&"technology AI policy reporter".to_string()));
        assert!(queries.contains(&"AI policy journalist Germany".to_string()));
    }
}
