//! Google Gemini API provider implementation.
//!
//! Implements the `LlmProvider` trait for the native `generateContent`
//! endpoint.
//!
//! Key differences from OpenAI-compatible APIs:
//! - Auth via `?key=API_KEY` query parameter
//! - System instruction is a top-level `system_instruction` field
//! - Roles are `"user"` / `"model"` (not `"assistant"`)

use crate::brain::{LlmProvider, TokenCounter};
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// The default Google Gemini API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    context_window: usize,
    cost_input: f64,
    cost_output: f64,
    token_counter: TokenCounter,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration.
    ///
    /// Uses `config.api_key` when set, otherwise reads the environment
    /// variable named by `config.api_key_env`. Returns `LlmError::AuthFailed`
    /// if neither is available.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!("Gemini (env var '{}' not set)", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new Gemini provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            context_window: config.context_window,
            cost_input: config.input_cost_per_million / 1_000_000.0,
            cost_output: config.output_cost_per_million / 1_000_000.0,
            token_counter: TokenCounter::for_model(&config.model),
        })
    }

    /// Build the JSON request body for the Gemini API.
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let max_tokens = request.max_tokens.unwrap_or(4096);

        let (system_text, non_system_messages) =
            Self::extract_system_instruction(&request.messages);

        let contents = Self::merge_turns(
            non_system_messages
                .iter()
                .map(|msg| Self::message_to_gemini_json(msg))
                .collect(),
        );

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": max_tokens,
                "temperature": request.temperature,
            },
        });

        if let Some(system) = &system_text {
            body["system_instruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        if !request.stop_sequences.is_empty() {
            body["generationConfig"]["stopSequences"] = serde_json::json!(request.stop_sequences);
        }

        body
    }

    /// Split system messages from the rest.
    ///
    /// Returns a tuple of (optional concatenated system text, non-system messages).
    fn extract_system_instruction(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            if msg.role == Role::System {
                system_parts.push(msg.content.to_plain_text());
            } else {
                non_system.push(msg);
            }
        }

        let system_text = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system_text, non_system)
    }

    fn message_to_gemini_json(msg: &Message) -> Value {
        let role = match msg.role {
            Role::Assistant => "model",
            Role::User | Role::System => "user",
        };
        serde_json::json!({
            "role": role,
            "parts": Self::content_to_gemini_parts(&msg.content),
        })
    }

    fn content_to_gemini_parts(content: &Content) -> Value {
        match content {
            Content::Text { text } => serde_json::json!([{ "text": text }]),
            Content::MultiPart { parts } => Value::Array(
                parts
                    .iter()
                    .flat_map(|part| match Self::content_to_gemini_parts(part) {
                        Value::Array(arr) => arr,
                        other => vec![other],
                    })
                    .collect(),
            ),
        }
    }

    /// Merge consecutive same-role turns; Gemini rejects two user turns in a row.
    fn merge_turns(contents: Vec<Value>) -> Vec<Value> {
        let mut merged: Vec<Value> = Vec::with_capacity(contents.len());
        for entry in contents {
            match merged.last_mut() {
                Some(last) if last["role"] == entry["role"] => {
                    if let (Some(existing), Some(new)) =
                        (last["parts"].as_array_mut(), entry["parts"].as_array())
                    {
                        existing.extend(new.iter().cloned());
                    }
                }
                _ => merged.push(entry),
            }
        }
        merged
    }

    /// Parse a Gemini API response JSON into a `CompletionResponse`.
    fn parse_response(body: &Value) -> Result<CompletionResponse, LlmError> {
        let candidates = body["candidates"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'candidates' array in response".to_string(),
            })?;

        let candidate = candidates.first().ok_or_else(|| LlmError::ResponseParse {
            message: "Empty 'candidates' array in response".to_string(),
        })?;

        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "Missing 'parts' array in candidate content".to_string(),
            })?;

        let texts: Vec<Content> = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .map(Content::text)
            .collect();
        let content = match texts.len() {
            0 => Content::text(""),
            1 => texts.into_iter().next().unwrap_or_else(|| Content::text("")),
            _ => Content::MultiPart { parts: texts },
        };

        let finish_reason = candidate["finishReason"].as_str().map(|s| s.to_string());

        let usage_metadata = &body["usageMetadata"];
        let usage = TokenUsage {
            input_tokens: usage_metadata["promptTokenCount"].as_u64().unwrap_or(0) as usize,
            output_tokens: usage_metadata["candidatesTokenCount"].as_u64().unwrap_or(0) as usize,
        };

        let model = body["modelVersion"]
            .as_str()
            .unwrap_or("gemini")
            .to_string();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, content),
            usage,
            model,
            finish_reason,
        })
    }

    /// Map an HTTP status code to the appropriate `LlmError`.
    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "Gemini".to_string(),
            },
            429 => LlmError::RateLimited {
                retry_after_secs: 30,
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {} from Gemini API: {}", status, body_text),
            },
        }
    }

    fn endpoint_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, self.api_key
        )
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = self.build_request_body(&request);
        let url = self.endpoint_url(model, "generateContent");

        debug!(model = model, "Sending Gemini completion request");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout { timeout_secs: 120 }
                } else if e.is_connect() {
                    LlmError::Connection {
                        message: e.to_string(),
                    }
                } else {
                    LlmError::ApiRequest {
                        message: format!("Request to Gemini API failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| LlmError::ResponseParse {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let response_json: Value =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON in response: {}", e),
            })?;

        Self::parse_response(&response_json)
    }

    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        self.token_counter.count_messages(messages)
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn cost_per_token(&self) -> (f64, f64) {
        (self.cost_input, self.cost_output)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> LlmConfig {
        LlmConfig {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "SCIAGENTS_GEMINI_UNUSED_KEY".to_string(),
            api_key: Some("test-gemini-key-12345".to_string()),
            input_cost_per_million: 0.10,
            output_cost_per_million: 0.40,
            ..Default::default()
        }
    }

    fn make_provider() -> GeminiProvider {
        GeminiProvider::new(&test_config()).expect("Provider creation should succeed")
    }

    #[test]
    fn test_new_uses_inline_key() {
        let provider = make_provider();
        assert_eq!(provider.api_key, "test-gemini-key-12345");
        assert_eq!(provider.model, "gemini-2.0-flash");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.context_window, 1_000_000);
    }

    #[test]
    fn test_new_missing_key_returns_auth_failed() {
        let mut config = test_config();
        config.api_key = None;
        config.api_key_env = "SCIAGENTS_GEMINI_MISSING_KEY_XYZ".to_string();
        match GeminiProvider::new(&config) {
            Err(LlmError::AuthFailed { provider }) => {
                assert!(provider.contains("SCIAGENTS_GEMINI_MISSING_KEY_XYZ"));
            }
            Err(other) => panic!("Expected AuthFailed, got {:?}", other),
            Ok(_) => panic!("Expected AuthFailed"),
        }
    }

    #[test]
    fn test_new_custom_base_url() {
        let mut config = test_config();
        config.base_url = Some("https://my-proxy.example.com/v1".to_string());
        let provider = GeminiProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "https://my-proxy.example.com/v1");
        assert_eq!(
            provider.endpoint_url("gemini-2.0-flash", "generateContent"),
            "https://my-proxy.example.com/v1/models/gemini-2.0-flash:generateContent?key=test-gemini-key-12345"
        );
    }

    #[test]
    fn test_system_instruction_extraction() {
        let messages = vec![
            Message::system("You are a theoretical scientist."),
            Message::system("Respond with JSON."),
            Message::user("Hello!"),
        ];
        let (system_text, non_system) = GeminiProvider::extract_system_instruction(&messages);
        assert_eq!(
            system_text.as_deref(),
            Some("You are a theoretical scientist.\n\nRespond with JSON.")
        );
        assert_eq!(non_system.len(), 1);
    }

    #[test]
    fn test_build_request_body() {
        let provider = make_provider();
        let request = CompletionRequest {
            messages: vec![
                Message::system("Be precise."),
                Message::user("Question"),
                Message::assistant("Answer"),
            ],
            temperature: 0.1,
            max_tokens: Some(512),
            stop_sequences: vec!["END".into()],
            ..Default::default()
        };
        let body = provider.build_request_body(&request);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(body["generationConfig"]["stopSequences"][0], "END");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "Be precise.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
    }

    #[test]
    fn test_consecutive_user_turns_merged() {
        let provider = make_provider();
        let request = CompletionRequest {
            messages: vec![Message::user("first"), Message::user("second")],
            ..Default::default()
        };
        let body = provider.build_request_body(&request);
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["parts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_response_text() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "HYPOTHESIS: F = ma"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7},
            "modelVersion": "gemini-2.0-flash-001"
        });
        let response = GeminiProvider::parse_response(&body).unwrap();
        assert_eq!(response.text(), "HYPOTHESIS: F = ma");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 7);
        assert_eq!(response.model, "gemini-2.0-flash-001");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_parse_response_multiple_parts() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}]
        });
        let response = GeminiProvider::parse_response(&body).unwrap();
        assert_eq!(response.text(), "a\nb");
        assert_eq!(response.model, "gemini");
    }

    #[test]
    fn test_parse_response_missing_candidates() {
        let err = GeminiProvider::parse_response(&serde_json::json!({})).unwrap_err();
        match err {
            LlmError::ResponseParse { message } => assert!(message.contains("Missing")),
            other => panic!("Expected ResponseParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_empty_candidates() {
        let err = GeminiProvider::parse_response(&serde_json::json!({"candidates": []}))
            .unwrap_err();
        match err {
            LlmError::ResponseParse { message } => assert!(message.contains("Empty")),
            other => panic!("Expected ResponseParse, got {:?}", other),
        }
    }

    #[test]
    fn test_map_http_errors() {
        assert!(matches!(
            GeminiProvider::map_http_error(reqwest::StatusCode::FORBIDDEN, ""),
            LlmError::AuthFailed { .. }
        ));
        assert!(matches!(
            GeminiProvider::map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            LlmError::RateLimited {
                retry_after_secs: 30
            }
        ));
        match GeminiProvider::map_http_error(reqwest::StatusCode::BAD_REQUEST, "bad model") {
            LlmError::ApiRequest { message } => assert!(message.contains("bad model")),
            other => panic!("Expected ApiRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_cost_per_token() {
        let provider = make_provider();
        let (input, output) = provider.cost_per_token();
        assert!((input - 0.10 / 1_000_000.0).abs() < 1e-15);
        assert!((output - 0.40 / 1_000_000.0).abs() < 1e-15);
    }
}
