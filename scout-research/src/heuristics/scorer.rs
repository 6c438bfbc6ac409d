//! Candidate quality scoring
//!
//! Five components, each bounded by its configured maximum:
//!
//! | Component     | Default max | Signal                                         |
//! |---------------|-------------|------------------------------------------------|
//! | recency       | 30          | half-life decay of freshness                   |
//! | beatMatch     | 25          | share of target beats hit                      |
//! | channelScore  | 20          | best channel quality                           |
//! | corroboration | 15          | distinct sources, saturating                   |
//! | geoMatch      | 10          | target geography in section/title/outlet       |
//!
//! Beat and geo components give half credit when no targets were requested.

use super::email::{classify_email, email_factor};
use super::engine::{AnalysisContext, HeuristicsConfig};
use crate::models::{ChannelType, ContactChannel, ScoreBreakdown};
use crate::scoring::{contains_phrase, normalize_text, recency_score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-component maxima; defaults sum to 100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreMaxima {
    pub recency: f64,
    pub beat_match: f64,
    pub channel_score: f64,
    pub corroboration: f64,
    pub geo_match: f64,
}

impl Default for ScoreMaxima {
    fn default() -> Self {
        Self {
            recency: 30.0,
            beat_match: 25.0,
            channel_score: 20.0,
            corroboration: 15.0,
            geo_match: 10.0,
        }
    }
}

impl ScoreMaxima {
    pub fn total(&self) -> f64 {
        self.recency + self.beat_match + self.channel_score + self.corroboration + self.geo_match
    }

    /// Negative maxima become 0; a total above 100 is scaled down to 100
    pub fn normalized(&self) -> Self {
        let clean = Self {
            recency: self.recency.max(0.0),
            beat_match: self.beat_match.max(0.0),
            channel_score: self.channel_score.max(0.0),
            corroboration: self.corroboration.max(0.0),
            geo_match: self.geo_match.max(0.0),
        };
        let total = clean.total();
        if total <= 100.0 {
            return clean;
        }
        let factor = 100.0 / total;
        Self {
            recency: clean.recency * factor,
            beat_match: clean.beat_match * factor,
            channel_score: clean.channel_score * factor,
            corroboration: clean.corroboration * factor,
            geo_match: clean.geo_match * factor,
        }
    }
}

/// Signals gathered for one candidate
pub struct ScoringInput<'a> {
    pub name: &'a str,
    pub freshness: Option<DateTime<Utc>>,
    pub beats: &'a [String],
    pub channels: &'a [ContactChannel],
    pub source_count: usize,
    /// Section paths, titles and the outlet domain
    pub geo_signals: &'a [String],
}

const NON_COMPLIANT_FACTOR: f64 = 0.3;
const NON_EMAIL_FACTOR: f64 = 0.8;

pub fn score_candidate(
    input: &ScoringInput<'_>,
    context: &AnalysisContext,
    config: &HeuristicsConfig,
) -> ScoreBreakdown {
    let maxima = config.maxima.normalized();

    let recency = match input.freshness {
        Some(published) => {
            recency_score(published, context.now, config.half_life_days, maxima.recency)
        }
        None => maxima.recency * config.missing_date_share.clamp(0.0, 1.0),
    };

    let beat_match = maxima.beat_match * target_share(&context.target_beats, |target| {
        input.beats.iter().any(|beat| beats_match(beat, target))
    });

    let geo_targets = context.geo_targets();
    let geo_match = maxima.geo_match * target_share(&geo_targets, |target| {
        input.geo_signals.iter().any(|signal| contains_phrase(signal, target))
    });

    let channel_score = maxima.channel_score * best_channel_quality(input.channels, input.name);

    let saturation = config.corroboration_saturation.max(1);
    let corroboration =
        maxima.corroboration * (input.source_count.min(saturation) as f64 / saturation as f64);

    ScoreBreakdown {
        recency: recency.clamp(0.0, maxima.recency),
        beat_match: beat_match.clamp(0.0, maxima.beat_match),
        channel_score: channel_score.clamp(0.0, maxima.channel_score),
        corroboration: corroboration.clamp(0.0, maxima.corroboration),
        geo_match: geo_match.clamp(0.0, maxima.geo_match),
    }
}

/// Fraction of `targets` satisfied; 0.5 when there are none
fn target_share<F>(targets: &[String], hit: F) -> f64
where
    F: Fn(&str) -> bool,
{
    let targets: Vec<&str> = targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return 0.5;
    }
    let hits = targets.iter().filter(|t| hit(**t)).count();
    hits as f64 / targets.len() as f64
}

fn beats_match(beat: &str, target: &str) -> bool {
    normalize_text(beat) == normalize_text(target)
        || contains_phrase(beat, target)
        || contains_phrase(target, beat)
}

/// Quality of the best channel in [0, 1]
///
/// confidence x compliance factor x type factor; emails are weighted by
/// whether they are personal, alias or role mailboxes.
pub fn best_channel_quality(channels: &[ContactChannel], name: &str) -> f64 {
    channels
        .iter()
        .map(|channel| {
            let compliance = if channel.policy_compliant {
                1.0
            } else {
                NON_COMPLIANT_FACTOR
            };
            let kind = match channel.channel_type {
                ChannelType::Email => classify_email(&channel.value, name)
                    .map(email_factor)
                    .unwrap_or(0.0),
                _ => NON_EMAIL_FACTOR,
            };
            channel.confidence.clamp(0.0, 1.0) * compliance * kind
        })
        .fold(0.0, f64::max)
}
