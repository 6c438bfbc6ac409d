//! OpenAI-compatible chat completion client
//!
//! Posts the prompt to `{base_url}/chat/completions` and splits the reply into
//! one query per line. Calls are rate limited per client instance.

use super::generator::{
    GenerationMetadata, GenerationOutput, GenerationParams, GeneratorError, LanguageGenerator,
};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// `[generation]` configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    /// Credential; the environment variable takes precedence when set
    pub api_key: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            requests_per_minute: 60,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

pub struct HttpLanguageGenerator {
    config: GeneratorConfig,
    api_key: Option<String>,
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpLanguageGenerator {
    pub fn new(config: GeneratorConfig, api_key: Option<String>) -> Result<Self, GeneratorError> {
        let per_minute = NonZeroU32::new(config.requests_per_minute.max(1))
            .ok_or_else(|| GeneratorError::Permanent("invalid rate limit".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GeneratorError::Permanent(format!("HTTP client: {}", e)))?;

        Ok(Self {
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageGenerator for HttpLanguageGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutput, GeneratorError> {
        self.rate_limiter.until_ready().await;

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeneratorError::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(GeneratorError::Transient(format!("generator returned {}", status)));
        }
        if !status.is_success() {
            return Err(GeneratorError::Permanent(format!("generator returned {}", status)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Permanent(format!("unparseable response: {}", e)))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GeneratorError::Permanent("response has no content".to_string()))?;

        let queries = split_lines(&content, params.max_queries as usize);
        debug!(
            enhancement = params.enhancement.as_str(),
            queries = queries.len(),
            "Generator returned queries"
        );

        Ok(GenerationOutput {
            queries,
            metadata: GenerationMetadata {
                engine: "openai-compatible".to_string(),
                model: reply.model.unwrap_or_else(|| self.config.model.clone()),
                token_usage: reply.usage.map(|u| u.total_tokens),
            },
        })
    }
}

/// Non-blank lines of `content`, at most `limit`
fn split_lines(content: &str, limit: usize) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(limit.max(1))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_skips_blank_lines_and_limits() {
        let lines = split_lines("1. one\n\n  2. two \n3. three\n", 2);
        assert_eq!(lines, vec!["1. one".to_string(), "2. two".to_string()]);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = GeneratorConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let generator = HttpLanguageGenerator::new(config, Some("  ".to_string())).unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert!(generator.api_key.is_none());
    }
}
