//! Candidate consolidation
//!
//! Candidates are grouped by normalized name (first-seen order). Within a
//! name group:
//! - several entries at one outlet are a `TrueDuplicate`; only the best
//!   scoring entry survives
//! - entries at several outlets are a `FreelancerGroup`; one entry per outlet
//!   survives and the group is reported for multi-outlet association
//!
//! Distinct names at a shared outlet whose Jaro-Winkler similarity reaches
//! the threshold are reported as a `PossibleDuplicate`. Nothing is dropped
//! for a fuzzy match.

use crate::models::{ConsolidationGroup, ConsolidationKind, ContactCandidate};
use crate::scoring::{name_similarity, normalize_name};
use std::cmp::Ordering;

/// Default name similarity for flagging possible duplicates
pub const DEFAULT_NAME_THRESHOLD: f64 = 0.92;

#[derive(Debug, Clone, Default)]
pub struct Consolidation {
    /// Survivors, in input order
    pub candidates: Vec<ContactCandidate>,
    pub groups: Vec<ConsolidationGroup>,
    /// Candidates removed as duplicates
    pub dropped: Vec<ContactCandidate>,
}

/// Indices of `candidates` sharing a normalized name, in first-seen order
fn name_groups(candidates: &[ContactCandidate]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let name = normalize_name(candidate.name());
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push(index),
            None => groups.push((name, vec![index])),
        }
    }
    groups
}

/// Members of one name group split by outlet, in first-seen order
fn by_outlet(candidates: &[ContactCandidate], members: &[usize]) -> Vec<(String, Vec<usize>)> {
    let mut outlets: Vec<(String, Vec<usize>)> = Vec::new();
    for &index in members {
        let outlet = candidates[index].outlet().to_string();
        match outlets.iter_mut().find(|(o, _)| *o == outlet) {
            Some((_, list)) => list.push(index),
            None => outlets.push((outlet, vec![index])),
        }
    }
    outlets
}

/// Higher score first, then more sources, then earlier position
fn better(a: &ContactCandidate, b: &ContactCandidate) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| b.sources().len().cmp(&a.sources().len()))
}

pub fn consolidate(candidates: Vec<ContactCandidate>, threshold: f64) -> Consolidation {
    let mut keep = vec![true; candidates.len()];
    let mut groups = Vec::new();
    let names = name_groups(&candidates);

    for (name, members) in &names {
        if members.len() < 2 {
            continue;
        }
        let outlets = by_outlet(&candidates, members);

        for (outlet, at_outlet) in &outlets {
            if at_outlet.len() < 2 {
                continue;
            }
            let mut ranked = at_outlet.clone();
            ranked.sort_by(|&a, &b| better(&candidates[a], &candidates[b]).then(a.cmp(&b)));
            for &loser in &ranked[1..] {
                keep[loser] = false;
            }
            groups.push(ConsolidationGroup {
                kind: ConsolidationKind::TrueDuplicate,
                name: name.clone(),
                candidate_ids: at_outlet.iter().map(|&i| candidates[i].id()).collect(),
                outlets: vec![outlet.clone()],
                recommendation: format!(
                    "Merged {} entries for {} at {}",
                    at_outlet.len(),
                    name,
                    outlet
                ),
            });
        }

        if outlets.len() > 1 {
            let outlet_names: Vec<String> = outlets.iter().map(|(o, _)| o.clone()).collect();
            groups.push(ConsolidationGroup {
                kind: ConsolidationKind::FreelancerGroup,
                name: name.clone(),
                candidate_ids: members
                    .iter()
                    .filter(|&&i| keep[i])
                    .map(|&i| candidates[i].id())
                    .collect(),
                recommendation: format!(
                    "{} writes for {}; keep one contact with multi-outlet association",
                    name,
                    outlet_names.join(", ")
                ),
                outlets: outlet_names,
            });
        }
    }

    for (i, (name_a, members_a)) in names.iter().enumerate() {
        for (name_b, members_b) in &names[i + 1..] {
            if name_similarity(name_a, name_b) < threshold {
                continue;
            }
            for (outlet, at_a) in by_outlet(&candidates, members_a) {
                let at_b: Vec<usize> = members_b
                    .iter()
                    .copied()
                    .filter(|&j| candidates[j].outlet() == outlet)
                    .collect();
                if at_b.is_empty() {
                    continue;
                }
                groups.push(ConsolidationGroup {
                    kind: ConsolidationKind::PossibleDuplicate,
                    name: name_a.clone(),
                    candidate_ids: at_a
                        .iter()
                        .chain(&at_b)
                        .filter(|&&k| keep[k])
                        .map(|&k| candidates[k].id())
                        .collect(),
                    recommendation: format!(
                        "{} and {} at {} have similar names; confirm they are different people",
                        name_a, name_b, outlet
                    ),
                    outlets: vec![outlet],
                });
            }
        }
    }

    let mut survivors = Vec::new();
    let mut dropped = Vec::new();
    for (candidate, kept) in candidates.into_iter().zip(keep) {
        if kept {
            survivors.push(candidate);
        } else {
            dropped.push(candidate);
        }
    }

    Consolidation {
        candidates: survivors,
        groups,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateDraft, ScoreBreakdown};
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate(name: &str, outlet: &str, recency: f64) -> ContactCandidate {
        ContactCandidate::build(
            CandidateDraft {
                id: Uuid::new_v4(),
                name: name.to_string(),
                role: None,
                outlet: outlet.to_string(),
                author_pages: vec![],
                channels: vec![],
                beats: vec![],
                sources: vec![format!("https://{}/story", outlet)],
                freshness: Utc::now(),
            },
            ScoreBreakdown {
                recency,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn same_name_at_one_outlet_keeps_best() {
        let low = candidate("John Smith", "paper.com", 10.0);
        let high = candidate("JOHN  SMITH", "paper.com", 20.0);
        let high_id = high.id();

        let result = consolidate(vec![low, high], DEFAULT_NAME_THRESHOLD);

        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].id(), high_id);
        assert_eq!(result.dropped.len(), 1);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].kind, ConsolidationKind::TrueDuplicate);
    }

    #[test]
    fn several_outlets_form_freelancer_group() {
        let a = candidate("Jane Doe", "a.com", 10.0);
        let b = candidate("Jane Doe", "b.com", 10.0);

        let result = consolidate(vec![a, b], DEFAULT_NAME_THRESHOLD);

        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].kind, ConsolidationKind::FreelancerGroup);
        assert_eq!(result.groups[0].outlets, vec!["a.com".to_string(), "b.com".to_string()]);
    }

    #[test]
    fn similar_names_at_one_outlet_are_flagged_not_dropped() {
        let mark = candidate("Mark Jones", "paper.com", 20.0);
        let mary = candidate("Mary Jones", "paper.com", 10.0);
        let ids = vec![mark.id(), mary.id()];

        let result = consolidate(vec![mark, mary], DEFAULT_NAME_THRESHOLD);

        assert_eq!(result.candidates.len(), 2);
        assert!(result.dropped.is_empty());
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].kind, ConsolidationKind::PossibleDuplicate);
        assert_eq!(result.groups[0].candidate_ids, ids);
    }

    #[test]
    fn similar_names_at_different_outlets_are_not_grouped() {
        let a = candidate("Chris Wong", "paper.com", 10.0);
        let b = candidate("Chris Wang", "techdesk.io", 10.0);

        let result = consolidate(vec![a, b], DEFAULT_NAME_THRESHOLD);

        assert_eq!(result.candidates.len(), 2);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn different_people_stay_apart() {
        let a = candidate("Jane Doe", "a.com", 10.0);
        let b = candidate("Mark Lee", "a.com", 10.0);

        let result = consolidate(vec![a, b], DEFAULT_NAME_THRESHOLD);

        assert_eq!(result.candidates.len(), 2);
        assert!(result.groups.is_empty());
    }
}
