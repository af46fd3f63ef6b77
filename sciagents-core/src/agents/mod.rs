//! Scientific agents.
//!
//! Every agent wraps a [`BaseAgent`]: one system prompt, one [`Brain`] and the
//! retry/timeout policy applied to each model call. The specialised agents add
//! prompt construction and turn model text into typed records.

pub mod analysis;
pub mod collector;
pub mod experimental;
pub mod theoretical;

pub use analysis::AnalysisAgent;
pub use collector::CollectorAgent;
pub use experimental::ExperimentalAgent;
pub use theoretical::TheoreticalAgent;

use crate::brain::{Brain, LlmProvider};
use crate::config::{RetryConfig, SciConfig};
use crate::error::LlmError;
use crate::logging::log_agent_action;
use crate::parsing::{OutputSchema, StructuredOutput, parse_with_repair};
use crate::providers::with_retry;
use crate::types::{CostEstimate, Message, TokenUsage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Call policy shared by all agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub retry: RetryConfig,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

impl AgentSettings {
    pub fn from_config(config: &SciConfig) -> Self {
        Self {
            retry: config.llm.retry.clone(),
            timeout: Duration::from_secs(config.agents.timeout_secs),
            temperature: config.llm.temperature,
            max_tokens: Some(config.llm.max_tokens),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&SciConfig::default())
    }
}

/// Token and cost totals for one agent.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AgentUsage {
    pub tokens: TokenUsage,
    pub cost: CostEstimate,
}

pub struct BaseAgent {
    name: String,
    brain: Mutex<Brain>,
    retry: RetryConfig,
    timeout: Duration,
}

impl BaseAgent {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn LlmProvider>,
        system_prompt: impl Into<String>,
        settings: &AgentSettings,
    ) -> Self {
        let brain = Brain::new(provider, system_prompt)
            .with_sampling(settings.temperature, settings.max_tokens);
        Self {
            name: name.into(),
            brain: Mutex::new(brain),
            retry: settings.retry.clone(),
            timeout: settings.timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text call with the agent's own system prompt.
    pub async fn ask(&self, query: &str) -> Result<String, LlmError> {
        self.call(None, query).await
    }

    /// Free-text call with a one-off system prompt.
    pub async fn ask_with_system(&self, system: &str, query: &str) -> Result<String, LlmError> {
        self.call(Some(system), query).await
    }

    /// Ask for a `T` and parse the reply, repairing it once if needed.
    pub async fn run_structured<T: OutputSchema>(
        &self,
        query: &str,
    ) -> Result<StructuredOutput<T>, LlmError> {
        let system = {
            let brain = self.brain.lock().await;
            format!("{}\n\n{}", brain.system_prompt(), T::format_instructions())
        };
        let text = self.call(Some(&system), query).await?;
        let output = parse_with_repair::<T>(&text);
        if !output.is_parsed() {
            tracing::warn!(agent = %self.name, "Structured output could not be parsed");
        }
        Ok(output)
    }

    pub async fn usage(&self) -> AgentUsage {
        let brain = self.brain.lock().await;
        AgentUsage {
            tokens: *brain.total_usage(),
            cost: *brain.total_cost(),
        }
    }

    async fn call(&self, system: Option<&str>, query: &str) -> Result<String, LlmError> {
        let conversation = [Message::user(query)];
        let conversation = &conversation;
        let attempt = with_retry(&self.retry, || async move {
            let mut brain = self.brain.lock().await;
            brain.think_with_system(system, conversation).await
        });

        let response = tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| {
                tracing::error!(agent = %self.name, timeout_secs = self.timeout.as_secs(), "Agent call timed out");
                LlmError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            })??;

        let text = response.text();
        log_agent_action(
            &self.name,
            "llm_call",
            &format!("{} chars in, {} chars out", query.len(), text.len()),
        );
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::brain::MockLlmProvider;

    pub fn settings() -> AgentSettings {
        AgentSettings {
            retry: RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 1,
                max_backoff_ms: 1,
                backoff_multiplier: 1.0,
                jitter: false,
            },
            timeout: Duration::from_secs(5),
            temperature: 0.1,
            max_tokens: Some(512),
        }
    }

    pub fn mock() -> Arc<MockLlmProvider> {
        Arc::new(MockLlmProvider::new())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{mock, settings};
    use super::*;
    use crate::schemas::HypothesisDraft;
    use crate::types::Role;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_ask_returns_text_and_tracks_usage() {
        let provider = mock();
        provider.queue_text("hello");
        let agent = BaseAgent::new("tester", provider.clone(), "Be brief.", &settings());

        assert_eq!(agent.ask("hi").await.unwrap(), "hello");
        let usage = agent.usage().await;
        assert_eq!(usage.tokens.input_tokens, 100);
        assert_eq!(usage.tokens.output_tokens, 50);

        let requests = provider.recorded_requests();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].content.to_plain_text(), "Be brief.");
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_run_structured_appends_format_instructions() {
        let provider = mock();
        provider.queue_text(r#"{"statement": "s", "confidence": 0.4}"#);
        let agent = BaseAgent::new("tester", provider.clone(), "System.", &settings());

        let out: StructuredOutput<HypothesisDraft> = agent.run_structured("q").await.unwrap();
        assert_eq!(out.parsed().unwrap().confidence, 0.4);

        let system = provider.recorded_requests()[0].messages[0]
            .content
            .to_plain_text();
        assert!(system.starts_with("System.\n\n"));
        assert!(system.contains("\"statement\""));
    }

    #[tokio::test]
    async fn test_run_structured_unparsed_keeps_raw() {
        let provider = mock();
        provider.queue_text("just words");
        let agent = BaseAgent::new("tester", provider, "System.", &settings());
        let out: StructuredOutput<HypothesisDraft> = agent.run_structured("q").await.unwrap();
        assert_eq!(out.raw(), Some("just words"));
    }

    #[tokio::test]
    async fn test_ask_propagates_provider_error() {
        let provider = mock();
        provider.queue_failure("quota exhausted");
        let agent = BaseAgent::new("tester", provider, "System.", &settings());
        let err = agent.ask("q").await.unwrap_err();
        assert!(matches!(err, LlmError::ApiRequest { .. }));
    }
}
