//! Brain module: LLM provider abstraction and interaction.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the
//! `Brain` wrapper that every agent talks through, and a scripted mock
//! provider used by tests and offline runs.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, CostEstimate, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Estimate the token count for a set of messages.
    fn estimate_tokens(&self, messages: &[Message]) -> usize;

    /// Return the context window size for this provider/model.
    fn context_window(&self) -> usize;

    /// Return the cost per token (input, output) in USD.
    fn cost_per_token(&self) -> (f64, f64);

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Token counter using tiktoken-rs for BPE tokenization.
pub struct TokenCounter {
    bpe: Option<tiktoken_rs::CoreBPE>,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized, and to a
    /// character heuristic if no encoding can be loaded at all.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .or_else(|_| tiktoken_rs::cl100k_base())
            .ok();
        Self { bpe }
    }

    /// Count the number of tokens in a string.
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.len().div_ceil(4),
        }
    }

    /// Estimate the token count for a set of messages.
    /// Adds overhead for message structure (role, separators).
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|msg| 4 + self.count(&msg.content.to_plain_text()))
            .sum::<usize>()
            + 3
    }
}

/// The Brain wraps an LLM provider and adds prompt construction and
/// cost tracking. Each agent owns one.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<usize>,
    total_usage: TokenUsage,
    total_cost: CostEstimate,
    token_counter: TokenCounter,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, system_prompt: impl Into<String>) -> Self {
        let model_name = provider.model_name().to_string();
        Self {
            provider,
            system_prompt: system_prompt.into(),
            temperature: 0.1,
            max_tokens: None,
            total_usage: TokenUsage::default(),
            total_cost: CostEstimate::default(),
            token_counter: TokenCounter::for_model(&model_name),
        }
    }

    /// Set sampling parameters used for every request.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Estimate token count for messages using tiktoken-rs.
    pub fn estimate_tokens(&self, messages: &[Message]) -> usize {
        self.token_counter.count_messages(messages)
    }

    /// Construct messages for the LLM with the system prompt prepended.
    pub fn build_messages(&self, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend_from_slice(conversation);
        messages
    }

    /// Send a completion request and return the response, tracking usage.
    pub async fn think(
        &mut self,
        conversation: &[Message],
    ) -> Result<CompletionResponse, LlmError> {
        self.think_with_system(None, conversation).await
    }

    /// Like [`Brain::think`], but with a one-off system prompt in place of the
    /// configured one.
    pub async fn think_with_system(
        &mut self,
        system_override: Option<&str>,
        conversation: &[Message],
    ) -> Result<CompletionResponse, LlmError> {
        let messages = match system_override {
            Some(system) => {
                let mut messages = vec![Message::system(system)];
                messages.extend_from_slice(conversation);
                messages
            }
            None => self.build_messages(conversation),
        };
        let token_estimate = self.provider.estimate_tokens(&messages);
        let context_limit = self.provider.context_window();

        if token_estimate > context_limit {
            return Err(LlmError::ContextOverflow {
                used: token_estimate,
                limit: context_limit,
            });
        }

        debug!(
            model = self.provider.model_name(),
            estimated_tokens = token_estimate,
            "Sending completion request"
        );

        let request = CompletionRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        };

        let response = self.provider.complete(request).await?;
        self.track_usage(&response.usage);

        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            cost = format!("${:.4}", self.total_cost.total()),
            "Completion received"
        );

        Ok(response)
    }

    /// Get total token usage across all calls.
    pub fn total_usage(&self) -> &TokenUsage {
        &self.total_usage
    }

    /// Get total cost across all calls.
    pub fn total_cost(&self) -> &CostEstimate {
        &self.total_cost
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn context_window(&self) -> usize {
        self.provider.context_window()
    }

    /// Track usage and cost from a completion.
    pub fn track_usage(&mut self, usage: &TokenUsage) {
        self.total_usage.accumulate(usage);
        let (input_rate, output_rate) = self.provider.cost_per_token();
        let cost = CostEstimate {
            input_cost: usage.input_tokens as f64 * input_rate,
            output_cost: usage.output_tokens as f64 * output_rate,
        };
        self.total_cost.accumulate(&cost);
    }
}

enum MockReply {
    Response(CompletionResponse),
    Failure(String),
}

/// A mock LLM provider for testing and offline runs.
///
/// Replies are served in FIFO order; once the queue is drained every call
/// returns a fixed text. Requests are recorded for inspection.
pub struct MockLlmProvider {
    model: String,
    context_window: usize,
    replies: Mutex<Vec<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            context_window: 128_000,
            replies: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let provider = Self::new();
        for _ in 0..20 {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Shrink the advertised context window.
    pub fn with_context_window(mut self, context_window: usize) -> Self {
        self.context_window = context_window;
        self
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockReply::Response(response));
    }

    /// Queue a text response.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue a non-retryable API failure.
    pub fn queue_failure(&self, message: &str) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockReply::Failure(message.to_string()));
    }

    /// Number of `complete` calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// A copy of every request received so far.
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        if replies.is_empty() {
            return Ok(MockLlmProvider::text_response(
                "I'm a mock LLM. No queued responses available.",
            ));
        }
        match replies.remove(0) {
            MockReply::Response(response) => Ok(response),
            MockReply::Failure(message) => Err(LlmError::ApiRequest { message }),
        }
    }

    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        // ~4 chars per token
        messages.iter().map(|m| m.content_length() / 4).sum::<usize>() + 100
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn cost_per_token(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default_response() {
        let provider = MockLlmProvider::new();
        let response = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(
            response.message.content.as_text(),
            Some("I'm a mock LLM. No queued responses available.")
        );
    }

    #[tokio::test]
    async fn test_mock_provider_queued_responses() {
        let provider = MockLlmProvider::new();
        provider.queue_text("first");
        provider.queue_text("second");

        let r1 = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(r1.message.content.as_text(), Some("first"));

        let r2 = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(r2.message.content.as_text(), Some("second"));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_provider_failure() {
        let provider = MockLlmProvider::new();
        provider.queue_failure("quota exhausted");
        let err = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ApiRequest { .. }));
    }

    #[test]
    fn test_mock_provider_properties() {
        let provider = MockLlmProvider::new();
        assert_eq!(provider.context_window(), 128_000);
        assert_eq!(provider.cost_per_token(), (0.0, 0.0));
        assert_eq!(provider.model_name(), "mock-model");
    }

    #[test]
    fn test_token_counter() {
        let counter = TokenCounter::for_model("gemini-2.0-flash");
        assert!(counter.count("Hello, world!") > 0);
        assert!(counter.count_messages(&[Message::user("How does force affect acceleration?")]) > 4);
    }

    #[tokio::test]
    async fn test_brain_think() {
        let provider = Arc::new(MockLlmProvider::new());
        provider.queue_text("Force is proportional to acceleration.");

        let mut brain = Brain::new(provider.clone(), "You are a theoretical physicist.");
        let response = brain
            .think(&[Message::user("How does force affect acceleration?")])
            .await
            .unwrap();
        assert_eq!(response.text(), "Force is proportional to acceleration.");
        assert_eq!(brain.total_usage().total(), 150);

        let sent = provider.recorded_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].messages[0].content.as_text(),
            Some("You are a theoretical physicist.")
        );
        assert!((sent[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_brain_system_override() {
        let provider = Arc::new(MockLlmProvider::new());
        let mut brain = Brain::new(provider.clone(), "default prompt");
        brain
            .think_with_system(Some("override prompt"), &[Message::user("hi")])
            .await
            .unwrap();
        let sent = provider.recorded_requests();
        assert_eq!(sent[0].messages[0].content.as_text(), Some("override prompt"));
        assert_eq!(sent[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_brain_context_overflow() {
        let provider = Arc::new(MockLlmProvider::new().with_context_window(50));
        let mut brain = Brain::new(provider, "system");
        let err = brain
            .think(&[Message::user("x".repeat(1000))])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ContextOverflow { limit: 50, .. }));
    }

    #[test]
    fn test_brain_build_messages() {
        let provider = Arc::new(MockLlmProvider::new());
        let brain = Brain::new(provider, "You are an experimental scientist.");
        let messages = brain.build_messages(&[Message::user("Design an experiment")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::types::Role::System);
    }
}
