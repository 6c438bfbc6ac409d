//! Content harvesting collaborator
//!
//! The harvester runs one search query and returns (content, byline) records.
//! The HTTP implementation calls a JSON search endpoint:
//! `GET {base_url}/search?q=...&limit=...` returning `{"records": [...]}`.

use crate::models::{GeneratedQuery, HarvestedRecord, ResearchRequest};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
pub enum HarvestError {
    /// Timeout, connection failure, 429 or 5xx
    #[error("Transient harvest failure: {0}")]
    Transient(String),

    #[error("Harvest failure: {0}")]
    Permanent(String),
}

impl HarvestError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[async_trait]
pub trait ContentHarvester: Send + Sync {
    async fn harvest(
        &self,
        query: &GeneratedQuery,
        request: &ResearchRequest,
    ) -> Result<Vec<HarvestedRecord>, HarvestError>;
}

/// `[harvester]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub base_url: String,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    /// Records requested per query
    pub max_records_per_query: u32,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5741".to_string(),
            requests_per_second: 2,
            timeout_secs: 30,
            max_records_per_query: 25,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    records: Vec<HarvestedRecord>,
}

pub struct HttpHarvester {
    config: HarvesterConfig,
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHarvester {
    pub fn new(config: HarvesterConfig) -> Result<Self, HarvestError> {
        let per_second = NonZeroU32::new(config.requests_per_second.max(1))
            .ok_or_else(|| HarvestError::Permanent("invalid rate limit".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| HarvestError::Permanent(format!("HTTP client: {}", e)))?;

        Ok(Self {
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            config,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContentHarvester for HttpHarvester {
    async fn harvest(
        &self,
        query: &GeneratedQuery,
        request: &ResearchRequest,
    ) -> Result<Vec<HarvestedRecord>, HarvestError> {
        self.rate_limiter.until_ready().await;

        let limit = self.config.max_records_per_query.to_string();
        let mut params: Vec<(&str, &str)> = vec![("q", query.text.as_str()), ("limit", limit.as_str())];
        if let Some(region) = request.region.as_deref() {
            params.push(("region", region));
        }
        for language in &request.languages {
            params.push(("lang", language.as_str()));
        }

        let response = self
            .client
            .get(self.endpoint())
            .query(&params)
            .send()
            .await
            .map_err(|e| HarvestError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(HarvestError::Transient(format!("harvester returned {}", status)));
        }
        if !status.is_success() {
            return Err(HarvestError::Permanent(format!("harvester returned {}", status)));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| HarvestError::Permanent(format!("unparseable response: {}", e)))?;

        debug!(query = %query.text, records = body.records.len(), "Harvested records");
        Ok(body.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let harvester = HttpHarvester::new(HarvesterConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(harvester.endpoint(), "http://localhost:9000/search");
    }

    #[test]
    fn response_without_records_is_empty() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.records.is_empty());
    }
}
