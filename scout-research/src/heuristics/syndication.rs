//! Syndicated content detection
//!
//! A record is syndicated when:
//! - its canonical URL points at another record of the same batch, or
//! - its canonical key was already seen earlier in the batch, or
//! - the SHA-256 fingerprint of its normalized body was already seen.
//!
//! Only non-syndicated records register their key and fingerprint, so the
//! original keeps its candidate no matter where it sits in the batch.

use crate::models::HarvestedRecord;
use crate::scoring::normalize_text;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyndicationReason {
    CanonicalElsewhere,
    DuplicateCanonical,
    DuplicateBody,
}

/// Normalized URL key: lowercase host without `www.`, path without trailing
/// slash, no scheme, query or fragment
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let host = parsed.host_str().unwrap_or_default();
            let host = host.strip_prefix("www.").unwrap_or(host);
            let path = parsed.path().trim_end_matches('/');
            match parsed.port() {
                Some(port) => format!("{}:{}{}", host, port, path),
                None => format!("{}{}", host, path),
            }
        }
        _ => {
            let lowered = trimmed.to_lowercase();
            let without_scheme = lowered
                .split_once("://")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(lowered);
            let end = without_scheme
                .find(['?', '#'])
                .unwrap_or(without_scheme.len());
            let stripped = without_scheme[..end].trim_end_matches('/');
            stripped.strip_prefix("www.").unwrap_or(stripped).to_string()
        }
    }
}

/// Outlet domain of a URL: lowercase host without `www.`
pub fn outlet_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// SHA-256 of the normalized body; `None` for blank bodies
pub fn body_fingerprint(body: &str) -> Option<String> {
    let normalized = normalize_text(body);
    if normalized.is_empty() {
        return None;
    }
    Some(format!("{:x}", Sha256::digest(normalized.as_bytes())))
}

/// Stateful filter for one batch
pub struct SyndicationFilter {
    batch_urls: HashSet<String>,
    seen_keys: HashSet<String>,
    seen_fingerprints: HashSet<String>,
}

impl SyndicationFilter {
    pub fn new(records: &[HarvestedRecord]) -> Self {
        let batch_urls = records
            .iter()
            .map(|r| normalize_url(&r.content.url))
            .filter(|u| !u.is_empty())
            .collect();
        Self {
            batch_urls,
            seen_keys: HashSet::new(),
            seen_fingerprints: HashSet::new(),
        }
    }

    /// Classify the next record, registering it when it is an original
    pub fn check(&mut self, record: &HarvestedRecord) -> Option<SyndicationReason> {
        let own = normalize_url(&record.content.url);
        let canonical = record
            .content
            .canonical_url
            .as_deref()
            .map(normalize_url)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| own.clone());

        if canonical != own && self.batch_urls.contains(&canonical) {
            return Some(SyndicationReason::CanonicalElsewhere);
        }
        if !canonical.is_empty() && self.seen_keys.contains(&canonical) {
            return Some(SyndicationReason::DuplicateCanonical);
        }

        let fingerprint = record.content.body.as_deref().and_then(body_fingerprint);
        if let Some(fp) = &fingerprint {
            if self.seen_fingerprints.contains(fp) {
                return Some(SyndicationReason::DuplicateBody);
            }
        }

        if !canonical.is_empty() {
            self.seen_keys.insert(canonical);
        }
        if let Some(fp) = fingerprint {
            self.seen_fingerprints.insert(fp);
        }
        None
    }
}
