//! Inter-agent handoffs and direct messaging.
//!
//! [`CommunicationHub`] records the structured handoffs of an investigation,
//! a shared context map and a conversational transcript. [`AgentProtocol`]
//! routes free-text messages to registered [`AgentEndpoint`]s.

use crate::agents::BaseAgent;
use crate::error::{CommunicationError, LlmError};
use crate::logging::log_communication;
use crate::schemas::{
    CommunicationMessage, ExperimentDesign, ExperimentalResults, Hypothesis, TheoreticalGuidance,
};
use crate::stats;
use crate::types::Message;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct HubState {
    history: Vec<CommunicationMessage>,
    shared_context: Map<String, Value>,
    transcript: Vec<Message>,
}

#[derive(Debug, Default)]
pub struct CommunicationHub {
    state: Mutex<HubState>,
}

impl CommunicationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message to the history and log it.
    pub fn record(&self, message: CommunicationMessage) {
        log_communication(&message.from_agent, &message.to_agent, &message.message_type);
        self.state().history.push(message);
    }

    pub fn theoretical_to_experimental_handoff(
        &self,
        hypothesis: &Hypothesis,
        guidance: &TheoreticalGuidance,
    ) -> CommunicationMessage {
        let recommendations = json!({
            "parameter_ranges": "Use theoretically predicted ranges",
            "measurement_precision": "High precision required for domain",
            "control_variables": "Standard domain controls",
            "expected_trends": "Based on mathematical model predictions"
        });
        let message = CommunicationMessage {
            from_agent: "theoretical".to_string(),
            to_agent: "experimental".to_string(),
            message_type: "hypothesis_transfer".to_string(),
            content: json!({
                "hypothesis": {
                    "id": hypothesis.id,
                    "statement": hypothesis.statement,
                    "confidence": hypothesis.confidence,
                    "mathematical_model": hypothesis.mathematical_model,
                    "variables": hypothesis.variables,
                },
                "theoretical_guidance": guidance,
                "recommendations": recommendations,
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            priority: "normal".to_string(),
        };

        let predictions =
            serde_json::to_string_pretty(&guidance.predicted_parameters).unwrap_or_default();
        let transcript = Message::user(format!(
            "HYPOTHESIS TRANSFER FROM THEORETICAL AGENT\n\n\
             Hypothesis Details:\n\
             - ID: {}\n\
             - Statement: {}\n\
             - Confidence: {:.2}\n\
             - Mathematical Model: {}\n\
             - Key Variables: {}\n\n\
             Theoretical Guidance:\n\
             Theory: {}\n\
             Predictions: {}\n\
             Model: {}\n\n\
             Please design and execute an experiment to test this hypothesis.",
            hypothesis.id,
            hypothesis.statement,
            hypothesis.confidence,
            hypothesis.mathematical_model.as_deref().unwrap_or("None"),
            hypothesis.variables.join(", "),
            guidance.theoretical_guidance,
            predictions,
            guidance.mathematical_model.as_deref().unwrap_or("None"),
        ));

        {
            let mut state = self.state();
            state.shared_context.insert(
                "current_hypothesis".to_string(),
                json!(hypothesis.statement),
            );
            state
                .shared_context
                .insert("domain".to_string(), json!(guidance.domain));
            state.transcript.push(transcript);
        }
        self.record(message.clone());
        message
    }

    pub fn experimental_to_collector_handoff(
        &self,
        design: &ExperimentDesign,
        results: &ExperimentalResults,
    ) -> CommunicationMessage {
        let data_summary = summarize_experimental_data(&results.raw_data);
        let message = CommunicationMessage {
            from_agent: "experimental".to_string(),
            to_agent: "collector".to_string(),
            message_type: "results_transfer".to_string(),
            content: json!({
                "experiment_design": {
                    "id": design.experiment_id,
                    "parameters": design.parameters,
                    "setup": design.setup,
                    "measurements": design.measurements,
                },
                "experimental_results": {
                    "id": results.experiment_id,
                    "analysis": results.analysis,
                    "conclusion": results.conclusion,
                    "supports_hypothesis": results.supports_hypothesis,
                    "confidence": results.confidence,
                    "data_summary": data_summary,
                },
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
            priority: "normal".to_string(),
        };

        let parameters = serde_json::to_string_pretty(&design.parameters).unwrap_or_default();
        let transcript = Message::assistant(format!(
            "EXPERIMENTAL RESULTS FROM EXPERIMENTAL AGENT\n\n\
             Experiment Details:\n\
             - ID: {}\n\
             - Analysis: {}\n\
             - Conclusion: {}\n\
             - Supports Hypothesis: {}\n\
             - Confidence: {:.2}\n\n\
             Data Summary:\n{}\n\n\
             Experimental Setup:\n\
             - Parameters: {}\n\
             - Measurements: {}\n\n\
             Ready for final analysis and aggregation.",
            results.experiment_id,
            results.analysis,
            results.conclusion,
            results.supports_hypothesis,
            results.confidence,
            data_summary,
            parameters,
            design.measurements.join(", "),
        ));

        {
            let mut state = self.state();
            state
                .shared_context
                .insert("current_experiment".to_string(), json!(design.experiment_id));
            state.transcript.push(transcript);
        }
        self.record(message.clone());
        message
    }

    pub fn history(&self) -> Vec<CommunicationMessage> {
        self.state().history.clone()
    }

    pub fn shared_context(&self) -> Map<String, Value> {
        self.state().shared_context.clone()
    }

    pub fn set_context(&self, key: &str, value: Value) {
        self.state().shared_context.insert(key.to_string(), value);
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.state().transcript.clone()
    }
}

/// `key: avg=…, range=[min, max], n=…` per non-empty series, one per line.
pub fn summarize_experimental_data(raw_data: &BTreeMap<String, Vec<f64>>) -> String {
    raw_data
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            format!(
                "{}: avg={:.2}, range=[{:.2}, {:.2}], n={}",
                key,
                stats::mean(values),
                min,
                max,
                values.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Something that can receive a free-text message from another agent.
#[async_trait]
pub trait AgentEndpoint: Send + Sync {
    async fn handle(&self, message: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl AgentEndpoint for BaseAgent {
    async fn handle(&self, message: &str) -> Result<String, LlmError> {
        self.ask(message).await
    }
}

/// Registry of named endpoints; every delivery is recorded in the hub.
pub struct AgentProtocol {
    agents: HashMap<String, Arc<dyn AgentEndpoint>>,
    hub: Arc<CommunicationHub>,
}

impl AgentProtocol {
    pub fn new(hub: Arc<CommunicationHub>) -> Self {
        Self {
            agents: HashMap::new(),
            hub,
        }
    }

    pub fn register(&mut self, name: impl Into<String>, agent: Arc<dyn AgentEndpoint>) {
        self.agents.insert(name.into(), agent);
    }

    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn send_message(
        &self,
        sender: &str,
        receiver: &str,
        message: &str,
    ) -> Result<String, CommunicationError> {
        let agent = self
            .agents
            .get(receiver)
            .ok_or_else(|| CommunicationError::UnknownAgent {
                name: receiver.to_string(),
            })?;

        self.hub.record(direct(sender, receiver, "direct_message", message));
        let reply = agent
            .handle(message)
            .await
            .map_err(|e| CommunicationError::DeliveryFailed {
                name: receiver.to_string(),
                message: e.to_string(),
            })?;
        self.hub.record(direct(receiver, sender, "direct_response", &reply));
        Ok(reply)
    }
}

fn direct(from: &str, to: &str, message_type: &str, text: &str) -> CommunicationMessage {
    CommunicationMessage {
        from_agent: from.to_string(),
        to_agent: to.to_string(),
        message_type: message_type.to_string(),
        content: json!({ "message": text }),
        timestamp: chrono::Utc::now().to_rfc3339(),
        priority: "normal".to_string(),
    }
}
