//! Claude Backend
//!
//! Implements the Anthropic Messages API for single-turn coaching requests.
//! Every stage sends one user message with an optional system prompt and
//! reads back the concatenated text blocks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use speech_coach_core::{GenerateRequest, GenerateResponse, LanguageModel, TokenUsage};

use crate::LlmError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used for every coaching stage
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Expand the short `sonnet` alias; anything else is sent as given
fn resolve_model(name: &str) -> String {
    match name.trim() {
        "sonnet" | "sonnet-4" => DEFAULT_MODEL.to_string(),
        other => other.to_string(),
    }
}

/// Configuration for Claude backend
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API key (from ANTHROPIC_API_KEY or direct)
    pub api_key: String,
    /// Messages API model id
    pub model: String,
    /// Upper bound applied to every request's `max_tokens`
    pub max_tokens: u32,
    /// Used when a request does not carry its own temperature
    pub temperature: Option<f32>,
    pub timeout: Duration,
    /// API endpoint (for testing or proxy)
    pub endpoint: String,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2000,
            temperature: None,
            timeout: Duration::from_secs(60),
            endpoint: "https://api.anthropic.com".to_string(),
        }
    }
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read the API key from `ANTHROPIC_API_KEY`
    pub fn from_env() -> Self {
        Self::new(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
    }

    /// Set the model id; a blank name keeps the current model
    pub fn with_model(mut self, model: &str) -> Self {
        if !model.trim().is_empty() {
            self.model = resolve_model(model);
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Claude backend
pub struct ClaudeBackend {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeBackend {
    pub fn new(config: ClaudeConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY not set. Set it via environment or config.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn build_request(&self, request: &GenerateRequest) -> ClaudeRequest {
        ClaudeRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens.min(self.config.max_tokens.max(1)),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: request.system.clone(),
            temperature: request.temperature.or(self.config.temperature),
        }
    }

    /// Send one Messages API call
    pub async fn complete(&self, request: &GenerateRequest) -> Result<ClaudeResponse, LlmError> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.endpoint))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let response: ClaudeApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(Self::parse_response(response))
    }

    fn parse_response(response: ClaudeApiResponse) -> ClaudeResponse {
        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text),
                ClaudeContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        ClaudeResponse {
            text,
            stop_reason: response.stop_reason,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for ClaudeBackend {
    async fn generate(&self, request: GenerateRequest) -> speech_coach_core::Result<GenerateResponse> {
        let start = std::time::Instant::now();
        let response = self.complete(&request).await?;

        tracing::debug!(
            model = %self.config.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            stop_reason = ?response.stop_reason,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Claude generation finished"
        );

        Ok(GenerateResponse {
            text: response.text,
            usage: Some(TokenUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Parsed response from Claude
#[derive(Debug, Clone)]
pub struct ClaudeResponse {
    pub text: String,
    pub stop_reason: ClaudeStopReason,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// =============================================================================
// Claude API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    stop_reason: ClaudeStopReason,
    usage: ClaudeUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaudeStopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_resolution() {
        assert_eq!(ClaudeConfig::default().model, DEFAULT_MODEL);
        assert_eq!(ClaudeConfig::new("k").with_model("sonnet").model, DEFAULT_MODEL);
        assert_eq!(ClaudeConfig::new("k").with_model("  ").model, DEFAULT_MODEL);
        assert_eq!(
            ClaudeConfig::new("k").with_model("claude-custom-1").model,
            "claude-custom-1"
        );
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let result = ClaudeBackend::new(ClaudeConfig::new(""));
        assert!(matches!(result, Err(LlmError::Configuration(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = ClaudeConfig::new("test-key")
            .with_model("sonnet-4")
            .with_max_tokens(1500)
            .with_temperature(1.7);

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 1500);
        assert_eq!(config.temperature, Some(1.0));
    }

    #[test]
    fn test_request_serialization() {
        let backend = ClaudeBackend::new(ClaudeConfig::new("k").with_max_tokens(1500)).unwrap();
        let request = GenerateRequest::new("분석해주세요").with_system("당신은 스피치 코치입니다");
        let body = backend.build_request(&request);

        assert_eq!(body.max_tokens, 1500);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-20250514");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "당신은 스피치 코치입니다");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "좋은 "},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "답변입니다"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;

        let response: ClaudeApiResponse = serde_json::from_str(json).unwrap();
        let parsed = ClaudeBackend::parse_response(response);
        assert_eq!(parsed.text, "좋은 답변입니다");
        assert_eq!(parsed.stop_reason, ClaudeStopReason::EndTurn);
        assert_eq!(parsed.output_tokens, 5);
    }
}
