//! Raw records supplied by the harvesting collaborator

use super::contact_candidate::ContactChannel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Harvested article or page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestedContent {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// Site section, e.g. "/news/technology"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Raw byline text, e.g. "By Jane Doe and John Roe"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Structured author identity, when the source exposes one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorIdentity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_page: Option<String>,
    #[serde(default)]
    pub channels: Vec<ContactChannel>,
}

/// One (content, byline) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestedRecord {
    pub content: HarvestedContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorIdentity>,
}

impl HarvestedRecord {
    /// Record with a URL and a byline only
    pub fn with_byline(url: impl Into<String>, byline: impl Into<String>) -> Self {
        Self {
            content: HarvestedContent {
                url: url.into(),
                byline: Some(byline.into()),
                ..Default::default()
            },
            author: None,
        }
    }
}
