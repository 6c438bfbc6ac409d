//! Heuristics engine
//!
//! Synchronous batch transform from harvested records to scored candidates.
//! Invalid records are counted and skipped; nothing in a batch is fatal.

use super::authors::extract_authors;
use super::beats;
use super::consolidation::{consolidate, DEFAULT_NAME_THRESHOLD};
use super::email::{classify_email, find_email};
use super::freelancer::FreelancerIndex;
use super::rules::{evaluate, RuleInput};
use super::scorer::{score_candidate, ScoreMaxima, ScoringInput};
use super::syndication::{outlet_domain, SyndicationFilter};
use crate::models::{
    BatchAnalysis, BatchStats, BeatAnalysis, CandidateDraft, ChannelType, ContactCandidate,
    ContactChannel, EmailAnalysis, HarvestedRecord, HeuristicsAnalysis, ResearchRequest,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// `[heuristics]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub maxima: ScoreMaxima,
    pub half_life_days: f64,
    pub stale_after_days: i64,
    /// Distinct sources at which corroboration is full
    pub corroboration_saturation: usize,
    /// Share of the recency maximum given when no date is known
    pub missing_date_share: f64,
    pub name_similarity_threshold: f64,
    /// Confidence of an email taken from a structured author identity
    pub identity_email_confidence: f64,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            maxima: ScoreMaxima::default(),
            half_life_days: 30.0,
            stale_after_days: 180,
            corroboration_saturation: 4,
            missing_date_share: 0.5,
            name_similarity_threshold: DEFAULT_NAME_THRESHOLD,
            identity_email_confidence: 0.8,
        }
    }
}

/// Request-derived targets and the reference time for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub target_beats: Vec<String>,
    pub target_geo: Vec<String>,
    pub region: Option<String>,
    pub now: DateTime<Utc>,
}

impl AnalysisContext {
    pub fn for_request(request: &ResearchRequest, now: DateTime<Utc>) -> Self {
        Self {
            target_beats: request.target_beats.clone(),
            target_geo: request.target_geo.clone(),
            region: request.region.clone(),
            now,
        }
    }

    /// Target geography plus the region, when given
    pub fn geo_targets(&self) -> Vec<String> {
        let mut targets = self.target_geo.clone();
        if let Some(region) = self.region.as_deref().filter(|r| !r.trim().is_empty()) {
            targets.push(region.to_string());
        }
        targets
    }
}

/// Everything known about one (author, outlet) pair
struct AuthorAccumulator {
    author_key: String,
    name: String,
    outlet: String,
    role: Option<String>,
    email: Option<String>,
    author_pages: Vec<String>,
    channels: Vec<ContactChannel>,
    beats: BeatAnalysis,
    sources: Vec<String>,
    freshness: Option<DateTime<Utc>>,
    geo_signals: Vec<String>,
    records: usize,
}

pub struct HeuristicsEngine {
    config: HeuristicsConfig,
}

impl HeuristicsEngine {
    pub fn new(config: HeuristicsConfig) -> Self {
        if config.maxima.total() > 100.0 {
            warn!(
                total = config.maxima.total(),
                "Score maxima exceed 100; scaling down proportionally"
            );
        }
        Self { config }
    }

    pub fn config(&self) -> &HeuristicsConfig {
        &self.config
    }

    pub fn analyze_batch(
        &self,
        records: &[HarvestedRecord],
        context: &AnalysisContext,
    ) -> BatchAnalysis {
        let mut stats = BatchStats {
            total_records: records.len(),
            ..Default::default()
        };

        // ====================================================================
        // Syndication filter and author extraction
        // ====================================================================

        let mut filter = SyndicationFilter::new(records);
        let mut accumulators: Vec<AuthorAccumulator> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();

        for record in records {
            if let Some(reason) = filter.check(record) {
                debug!(url = %record.content.url, ?reason, "Syndicated record filtered");
                stats.syndicated_filtered += 1;
                continue;
            }

            let Some(outlet) = outlet_domain(&record.content.url) else {
                stats.skipped_invalid += 1;
                continue;
            };
            let authors = extract_authors(record);
            if authors.is_empty() {
                stats.skipped_invalid += 1;
                continue;
            }

            let record_beats = beats::analyze_content(&record.content);

            for author in authors {
                let key = (author.key.clone(), outlet.clone());
                let slot = *index.entry(key).or_insert_with(|| {
                    accumulators.push(AuthorAccumulator {
                        author_key: author.key.clone(),
                        name: author.name.clone(),
                        outlet: outlet.clone(),
                        role: None,
                        email: None,
                        author_pages: Vec::new(),
                        channels: Vec::new(),
                        beats: BeatAnalysis::default(),
                        sources: Vec::new(),
                        freshness: None,
                        geo_signals: vec![outlet.clone()],
                        records: 0,
                    });
                    accumulators.len() - 1
                });
                let acc = &mut accumulators[slot];

                acc.records += 1;
                if acc.role.is_none() {
                    acc.role = author.role.clone();
                }
                if acc.email.is_none() {
                    acc.email = author.email.clone();
                }
                if let Some(page) = &author.author_page {
                    push_unique(&mut acc.author_pages, page);
                }
                for channel in &author.channels {
                    add_channel(&mut acc.channels, channel.clone());
                }
                if let Some(email) = &author.email {
                    add_channel(
                        &mut acc.channels,
                        ContactChannel {
                            channel_type: ChannelType::Email,
                            value: email.clone(),
                            source_url: record.content.url.clone(),
                            confidence: self.config.identity_email_confidence,
                            policy_compliant: true,
                        },
                    );
                }
                push_unique(&mut acc.sources, record.content.url.trim());
                beats::merge(&mut acc.beats, &record_beats);
                if let Some(published) = record.content.published_at {
                    acc.freshness = Some(acc.freshness.map_or(published, |f| f.max(published)));
                }
                for signal in [&record.content.section_path, &record.content.title]
                    .into_iter()
                    .flatten()
                {
                    push_unique(&mut acc.geo_signals, signal);
                }
            }
        }

        let distinct_authors: HashSet<&str> =
            accumulators.iter().map(|a| a.author_key.as_str()).collect();
        stats.authors_found = distinct_authors.len();

        // ====================================================================
        // Freelancer profiles
        // ====================================================================

        let mut freelancers = FreelancerIndex::new();
        for acc in &accumulators {
            freelancers.record(&acc.author_key, &acc.outlet, acc.records);
        }
        stats.freelancers_detected = freelancers.freelancer_count();

        // ====================================================================
        // Scoring and rules
        // ====================================================================

        let mut candidates = Vec::new();
        let mut analyses = Vec::new();

        for acc in accumulators {
            let profile = freelancers.profile(&acc.author_key);
            let address = find_email(acc.email.as_deref(), &acc.channels).map(str::to_string);
            let email_analysis = EmailAnalysis {
                email_type: address.as_deref().and_then(|a| classify_email(a, &acc.name)),
                address,
            };

            let breakdown = score_candidate(
                &ScoringInput {
                    name: &acc.name,
                    freshness: acc.freshness,
                    beats: &acc.beats.primary_beats,
                    channels: &acc.channels,
                    source_count: acc.sources.len(),
                    geo_signals: &acc.geo_signals,
                },
                context,
                &self.config,
            );

            let findings = evaluate(&RuleInput {
                name: &acc.name,
                email: &email_analysis,
                channels: &acc.channels,
                freelancer: &profile,
                freshness: acc.freshness,
                now: context.now,
                stale_after_days: self.config.stale_after_days,
            });

            let draft = CandidateDraft {
                id: Uuid::new_v4(),
                name: acc.name.clone(),
                role: acc.role,
                outlet: acc.outlet,
                author_pages: acc.author_pages,
                channels: acc.channels,
                beats: acc.beats.primary_beats.clone(),
                sources: acc.sources,
                freshness: acc.freshness.unwrap_or(context.now),
            };

            match ContactCandidate::build(draft, breakdown) {
                Ok(candidate) => {
                    analyses.push(HeuristicsAnalysis {
                        contact_id: candidate.id(),
                        freelancer_profile: profile,
                        email_analysis,
                        beat_analysis: acc.beats,
                        overall_score: candidate.score(),
                        warnings: findings.warnings,
                        recommendations: findings.recommendations,
                    });
                    candidates.push(candidate);
                }
                Err(e) => {
                    warn!(author = %acc.name, error = %e, "Candidate rejected");
                    stats.skipped_invalid += 1;
                }
            }
        }

        // ====================================================================
        // Consolidation
        // ====================================================================

        let consolidation = consolidate(candidates, self.config.name_similarity_threshold);
        let dropped: HashSet<Uuid> = consolidation.dropped.iter().map(|c| c.id()).collect();
        analyses.retain(|a| !dropped.contains(&a.contact_id));
        stats.candidates = consolidation.candidates.len();

        let recommendations = batch_recommendations(&stats, consolidation.groups.len());

        info!(
            records = stats.total_records,
            syndicated = stats.syndicated_filtered,
            skipped = stats.skipped_invalid,
            candidates = stats.candidates,
            freelancers = stats.freelancers_detected,
            "Heuristics batch analyzed"
        );

        BatchAnalysis {
            candidates: consolidation.candidates,
            analyses,
            stats,
            recommendations,
            groups: consolidation.groups,
        }
    }
}

fn batch_recommendations(stats: &BatchStats, groups: usize) -> Vec<String> {
    let mut recommendations = Vec::new();
    if stats.candidates == 0 {
        recommendations
            .push("No attributable authors found; broaden queries or relax targets".to_string());
    }
    if stats.total_records > 0 && stats.syndicated_filtered * 2 > stats.total_records {
        recommendations.push(format!(
            "{} of {} records were syndicated copies; prefer original outlets",
            stats.syndicated_filtered, stats.total_records
        ));
    }
    if groups > 0 {
        recommendations.push(format!(
            "Review {} consolidation group(s) before outreach",
            groups
        ));
    }
    recommendations
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !target.iter().any(|v| v == value) {
        target.push(value.to_string());
    }
}

/// Add a channel unless one with the same type and value exists
fn add_channel(channels: &mut Vec<ContactChannel>, channel: ContactChannel) {
    let exists = channels.iter().any(|c| {
        c.channel_type == channel.channel_type && c.value.eq_ignore_ascii_case(&channel.value)
    });
    if !exists && !channel.value.trim().is_empty() {
        channels.push(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorIdentity;

    fn context() -> AnalysisContext {
        AnalysisContext {
            target_beats: vec!["technology".to_string()],
            target_geo: vec![],
            region: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn one_candidate_per_author_and_outlet() {
        let records = vec![
            HarvestedRecord::with_byline("https://paper.com/a", "By Jane Doe"),
            HarvestedRecord::with_byline("https://paper.com/b", "By Jane Doe and Mark Lee"),
        ];

        let batch = HeuristicsEngine::new(HeuristicsConfig::default())
            .analyze_batch(&records, &context());

        assert_eq!(batch.candidates.len(), 2);
        let jane = batch
            .candidates
            .iter()
            .find(|c| c.name() == "Jane Doe")
            .unwrap();
        assert_eq!(jane.sources().len(), 2);
        assert_eq!(batch.stats.authors_found, 2);
        assert_eq!(batch.analyses.len(), 2);
    }

    #[test]
    fn identity_email_becomes_channel() {
        let mut record = HarvestedRecord::with_byline("https://paper.com/a", "");
        record.author = Some(AuthorIdentity {
            name: "Jane Doe".to_string(),
            email: Some("tips@paper.com".to_string()),
            ..Default::default()
        });

        let batch = HeuristicsEngine::new(HeuristicsConfig::default())
            .analyze_batch(&[record], &context());

        let candidate = &batch.candidates[0];
        assert_eq!(candidate.channels().len(), 1);
        let analysis = batch.analysis_for(candidate.id()).unwrap();
        assert_eq!(
            analysis.email_analysis.email_type,
            Some(crate::models::EmailType::Role)
        );
        assert!(analysis.recommendations[0].contains("personal contact channel"));
    }

    #[test]
    fn records_without_authors_are_counted() {
        let records = vec![
            HarvestedRecord::with_byline("https://paper.com/a", "Staff"),
            HarvestedRecord::with_byline("not a url", "By Jane Doe"),
        ];

        let batch = HeuristicsEngine::new(HeuristicsConfig::default())
            .analyze_batch(&records, &context());

        assert!(batch.candidates.is_empty());
        assert_eq!(batch.stats.skipped_invalid, 2);
        assert!(!batch.recommendations.is_empty());
    }
}
