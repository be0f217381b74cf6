//! Analysis collaborator: asks a language model to profile a tool.
//!
//! [`Analyzer`] is the seam the enrichment engine depends on. It returns the
//! model's raw reply text; cleanup and validation happen in the engine.
//! [`OpenRouterAnalyzer`] talks to any OpenAI-compatible chat completions
//! endpoint (OpenRouter by default).
//!
//! Transport, status and envelope problems are hard failures
//! ([`ToolscoutError::Analysis`]). A well-formed reply whose content is not
//! the expected JSON is *not* an error here.

mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use toolscout_shared::{AnalysisConfig, Result, ToolscoutError};

pub use prompt::{SYSTEM_PROMPT, user_prompt};

/// User-Agent string for analysis requests.
const USER_AGENT: &str = concat!("toolscout/", env!("CARGO_PKG_VERSION"));

/// Maximum number of body characters quoted in an error message.
const ERROR_BODY_EXCERPT: usize = 200;

/// Produces a raw analysis reply for a tool.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the tool named `name` at `url` and return the raw reply text.
    async fn analyze(&self, name: &str, url: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
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
struct ApiErrorBody {
    message: String,
}

// ---------------------------------------------------------------------------
// OpenRouterAnalyzer
// ---------------------------------------------------------------------------

/// Analyzer backed by an OpenAI-compatible chat completions API.
pub struct OpenRouterAnalyzer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterAnalyzer {
    /// Build an analyzer from the `[analysis]` config section and a resolved API key.
    pub fn new(config: &AnalysisConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolscoutError::Analysis(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Analyzer for OpenRouterAnalyzer {
    #[instrument(skip(self), fields(model = %self.model))]
    async fn analyze(&self, name: &str, url: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(name, url),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "toolscout")
            .json(&request)
            .send()
            .await
            .map_err(|e| ToolscoutError::Analysis(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolscoutError::Analysis(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ToolscoutError::Analysis(format!(
                "HTTP {status}: {}",
                excerpt(&body, ERROR_BODY_EXCERPT)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ToolscoutError::Analysis(format!(
                "invalid chat completion envelope: {e} (got: {})",
                excerpt(&body, ERROR_BODY_EXCERPT)
            ))
        })?;

        if let Some(err) = parsed.error {
            return Err(ToolscoutError::Analysis(err.message));
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ToolscoutError::Analysis("response contained no choices".into()))?;

        let text = choice.message.content.unwrap_or_default();
        debug!(chars = text.len(), "analysis reply received");
        Ok(text)
    }
}

/// First `max_chars` characters of `s`, char-boundary safe.
fn excerpt(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AnalysisConfig {
        AnalysisConfig {
            base_url: format!("{}/api/v1/", server.uri()),
            timeout_secs: 5,
            ..AnalysisConfig::default()
        }
    }

    #[tokio::test]
    async fn returns_reply_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"model": "moonshotai/kimi-k2.5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"name\":\"Linear\"}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let analyzer = OpenRouterAnalyzer::new(&config_for(&server), "test-key").unwrap();
        let text = analyzer
            .analyze("Linear", "https://linear.app")
            .await
            .expect("analyze");
        assert_eq!(text, r#"{"name":"Linear"}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_hard_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let analyzer = OpenRouterAnalyzer::new(&config_for(&server), "k").unwrap();
        let err = analyzer.analyze("Linear", "https://linear.app").await.unwrap_err();
        assert!(matches!(err, ToolscoutError::Analysis(_)));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn error_object_in_ok_body_is_hard_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": {"message": "quota exceeded", "code": 402}
            })))
            .mount(&server)
            .await;

        let analyzer = OpenRouterAnalyzer::new(&config_for(&server), "k").unwrap();
        let err = analyzer.analyze("Linear", "https://linear.app").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn empty_content_is_returned_not_failed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let analyzer = OpenRouterAnalyzer::new(&config_for(&server), "k").unwrap();
        let text = analyzer.analyze("Linear", "https://linear.app").await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_is_hard_failure() {
        let config = AnalysisConfig {
            base_url: "http://127.0.0.1:9/api/v1".into(),
            timeout_secs: 2,
            ..AnalysisConfig::default()
        };
        let analyzer = OpenRouterAnalyzer::new(&config, "k").unwrap();
        let err = analyzer.analyze("Linear", "https://linear.app").await.unwrap_err();
        assert!(err.to_string().contains("request failed"));
    }

    #[test]
    fn excerpt_is_char_safe() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
    }
}
