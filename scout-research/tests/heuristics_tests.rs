//! Integration tests for the contact heuristics engine

mod helpers;

use chrono::Utc;
use helpers::{article, policy_records};
use scout_research::heuristics::{AnalysisContext, HeuristicsConfig, HeuristicsEngine};
use scout_research::models::{AuthorIdentity, ConsolidationKind, HarvestedRecord};

fn engine() -> HeuristicsEngine {
    HeuristicsEngine::new(HeuristicsConfig::default())
}

fn tech_context() -> AnalysisContext {
    AnalysisContext {
        target_beats: vec!["technology".to_string()],
        target_geo: vec![],
        region: None,
        now: Utc::now(),
    }
}

#[test]
fn test_syndicated_copy_produces_no_candidate() {
    let batch = engine().analyze_batch(&policy_records(), &tech_context());

    assert_eq!(batch.stats.total_records, 5);
    assert_eq!(batch.stats.syndicated_filtered, 1);
    assert_eq!(batch.candidates.len(), 4);
    assert_eq!(batch.analyses.len(), 4);
    assert!(batch
        .candidates
        .iter()
        .all(|c| c.outlet() != "aggregator.net"));
}

#[test]
fn test_score_invariants_hold() {
    let batch = engine().analyze_batch(&policy_records(), &tech_context());

    for candidate in &batch.candidates {
        let b = candidate.score_breakdown();
        let sum = b.recency + b.beat_match + b.channel_score + b.corroboration + b.geo_match;
        assert!((candidate.score() - sum).abs() < 1e-6);
        assert!((0.0..=100.0).contains(&candidate.score()));
        assert!(!candidate.sources().is_empty());

        let analysis = batch.analysis_for(candidate.id()).expect("analysis per candidate");
        assert_eq!(analysis.overall_score, candidate.score());
    }
}

#[test]
fn test_fresher_article_scores_higher_recency() {
    let batch = engine().analyze_batch(&policy_records(), &tech_context());

    let recency = |name: &str| {
        batch
            .candidates
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.score_breakdown().recency)
            .unwrap()
    };
    // Jane Doe published 2 days ago, Tomas Berg 30 days ago
    assert!(recency("Jane Doe") > recency("Tomas Berg"));
}

#[test]
fn test_author_at_two_outlets_is_freelancer() {
    let records = vec![
        article("https://paper.com/tech/a", "By Jane Doe", "AI rules", 3),
        article("https://paper.com/tech/b", "By Jane Doe", "AI audits", 4),
        article("https://techdesk.io/technology/c", "By Jane Doe", "AI chips", 5),
    ];

    let batch = engine().analyze_batch(&records, &tech_context());

    assert_eq!(batch.candidates.len(), 2);
    assert_eq!(batch.stats.freelancers_detected, 1);
    for candidate in &batch.candidates {
        let profile = &batch.analysis_for(candidate.id()).unwrap().freelancer_profile;
        assert!(profile.is_freelancer);
        assert_eq!(profile.outlets.len(), 2);
        assert_eq!(profile.primary_outlet.as_deref(), Some("paper.com"));
    }

    assert_eq!(batch.groups.len(), 1);
    assert_eq!(batch.groups[0].kind, ConsolidationKind::FreelancerGroup);
}

#[test]
fn test_author_at_one_outlet_is_not_freelancer() {
    let records = vec![
        article("https://paper.com/tech/a", "By Mark Lee", "AI rules", 3),
        article("https://paper.com/tech/b", "By Mark Lee", "AI audits", 4),
    ];

    let batch = engine().analyze_batch(&records, &tech_context());

    assert_eq!(batch.candidates.len(), 1);
    assert_eq!(batch.stats.freelancers_detected, 0);
    let analysis = batch.analysis_for(batch.candidates[0].id()).unwrap();
    assert!(!analysis.freelancer_profile.is_freelancer);
    assert_eq!(batch.candidates[0].sources().len(), 2);
}

#[test]
fn test_similar_names_at_one_outlet_stay_separate_contacts() {
    for (first, second) in [("Mark Jones", "Mary Jones"), ("Chris Wong", "Chris Wang")] {
        let records = vec![
            article("https://paper.com/tech/a", &format!("By {}", first), "AI rules", 2),
            article("https://paper.com/tech/b", &format!("By {}", second), "AI audits", 3),
        ];

        let batch = engine().analyze_batch(&records, &tech_context());

        let mut names: Vec<&str> = batch.candidates.iter().map(|c| c.name()).collect();
        names.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(names, expected);
        assert_eq!(batch.analyses.len(), 2);
        assert_eq!(batch.groups.len(), 1);
        assert_eq!(batch.groups[0].kind, ConsolidationKind::PossibleDuplicate);
        assert_eq!(batch.groups[0].candidate_ids.len(), 2);
    }
}

#[test]
fn test_records_without_author_are_skipped() {
    let records = vec![
        HarvestedRecord::with_byline("https://paper.com/a", ""),
        HarvestedRecord::with_byline("", "By Jane Doe"),
        article("https://paper.com/tech/c", "By Mark Lee", "AI rules", 1),
    ];

    let batch = engine().analyze_batch(&records, &tech_context());

    assert_eq!(batch.stats.skipped_invalid, 2);
    assert_eq!(batch.candidates.len(), 1);
}

#[test]
fn test_role_email_warns_and_recommends() {
    let mut record = article("https://paper.com/tech/a", "", "AI rules", 1);
    record.author = Some(AuthorIdentity {
        name: "Jane Doe".to_string(),
        email: Some("newsdesk@paper.com".to_string()),
        ..Default::default()
    });
    let mut personal = article("https://techdesk.io/technology/b", "", "AI chips", 1);
    personal.author = Some(AuthorIdentity {
        name: "Mark Lee".to_string(),
        email: Some("mark.lee@techdesk.io".to_string()),
        ..Default::default()
    });

    let batch = engine().analyze_batch(&[record, personal], &tech_context());

    let score_of = |name: &str| {
        batch
            .candidates
            .iter()
            .find(|c| c.name() == name)
            .unwrap()
            .score_breakdown()
            .channel_score
    };
    assert!(score_of("Mark Lee") > score_of("Jane Doe"));

    let jane = batch.candidates.iter().find(|c| c.name() == "Jane Doe").unwrap();
    let analysis = batch.analysis_for(jane.id()).unwrap();
    assert!(!analysis.warnings.is_empty());
    assert!(!analysis.recommendations.is_empty());
}

#[test]
fn test_empty_batch_recommends_broader_queries() {
    let batch = engine().analyze_batch(&[], &tech_context());

    assert!(batch.candidates.is_empty());
    assert_eq!(batch.recommendations.len(), 1);
}
