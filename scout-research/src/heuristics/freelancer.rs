//! Freelancer detection
//!
//! Bylines are grouped by normalized author name. An author seen at more than
//! one outlet domain is a freelancer; the primary outlet is the most frequent
//! one, ties going to the first seen.

use crate::models::FreelancerProfile;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct FreelancerIndex {
    /// Outlet counts per author key, outlets in first-seen order
    outlets: HashMap<String, Vec<(String, usize)>>,
}

impl FreelancerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` bylines by `author_key` at `outlet`
    pub fn record(&mut self, author_key: &str, outlet: &str, count: usize) {
        let entries = self.outlets.entry(author_key.to_string()).or_default();
        match entries.iter_mut().find(|(o, _)| o == outlet) {
            Some((_, n)) => *n += count,
            None => entries.push((outlet.to_string(), count)),
        }
    }

    pub fn profile(&self, author_key: &str) -> FreelancerProfile {
        let Some(entries) = self.outlets.get(author_key) else {
            return FreelancerProfile::default();
        };

        let mut primary: Option<&(String, usize)> = None;
        for entry in entries {
            if primary.map_or(true, |p| entry.1 > p.1) {
                primary = Some(entry);
            }
        }

        FreelancerProfile {
            is_freelancer: entries.len() > 1,
            outlets: entries.iter().map(|(o, _)| o.clone()).collect(),
            primary_outlet: primary.map(|(o, _)| o.clone()),
        }
    }

    /// Number of authors seen at more than one outlet
    pub fn freelancer_count(&self) -> usize {
        self.outlets.values().filter(|e| e.len() > 1).count()
    }
}
