//! Typed records exchanged between agents.
//!
//! The four investigation records ([`Hypothesis`], [`ExperimentDesign`],
//! [`ExperimentalResults`], [`FinalAnalysis`]) form the output of one run.
//! The `*Draft` types and [`AnalysisResponse`] are what the model is asked to
//! emit; agents complete them into full records.

use crate::parsing::OutputSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn default_domain() -> String {
    "general".to_string()
}

fn default_duration() -> f64 {
    60.0
}

fn default_sample_size() -> u32 {
    5
}

fn default_confidence_level() -> String {
    "moderate".to_string()
}

fn default_priority() -> String {
    "normal".to_string()
}

/// Clamp a model-supplied confidence into 0..=1; non-finite values become 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn deserialize_unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_unit)
}

/// A testable scientific hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub statement: String,
    #[serde(deserialize_with = "deserialize_unit_interval")]
    pub confidence: f64,
    pub mathematical_model: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub theoretical_basis: String,
    #[serde(default)]
    pub literature_support: Vec<String>,
}

/// A planned experiment for one hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDesign {
    pub experiment_id: String,
    pub hypothesis_id: String,
    pub parameters: Map<String, Value>,
    pub setup: String,
    pub measurements: Vec<String>,
    pub expected_outcome: String,
    pub tools_required: Vec<String>,
    #[serde(default)]
    pub control_variables: Vec<String>,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    /// Selects the simulator model on execution.
    #[serde(default = "default_domain")]
    pub domain: String,
}

/// Measured data and its statistical reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalResults {
    pub experiment_id: String,
    pub raw_data: BTreeMap<String, Vec<f64>>,
    pub analysis: String,
    pub conclusion: String,
    pub supports_hypothesis: bool,
    #[serde(deserialize_with = "deserialize_unit_interval")]
    pub confidence: f64,
    /// P-value of the primary correlation.
    #[serde(default)]
    pub statistical_significance: Option<f64>,
    #[serde(default)]
    pub effect_size: Option<f64>,
    #[serde(default)]
    pub limitations: Vec<String>,
}

/// The aggregated outcome of an investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnalysis {
    pub scientific_question: String,
    pub hypothesis: Hypothesis,
    pub experiment_design: ExperimentDesign,
    pub experimental_results: ExperimentalResults,
    pub theoretical_vs_experimental: String,
    pub final_conclusion: String,
    pub future_research: Vec<String>,
    #[serde(default)]
    pub methodology_assessment: String,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: String,
    #[serde(default)]
    pub practical_implications: Vec<String>,
}

impl FinalAnalysis {
    /// Placeholder analysis returned when an investigation errors out.
    pub fn failure(question: &str, error: &str) -> Self {
        let hypothesis = Hypothesis {
            id: "failed_hypothesis".to_string(),
            statement: format!("Investigation of: {}", question),
            confidence: 0.0,
            mathematical_model: Some("Investigation failed".to_string()),
            variables: vec!["error".to_string()],
            domain: default_domain(),
            theoretical_basis: String::new(),
            literature_support: Vec::new(),
        };

        let mut parameters = Map::new();
        parameters.insert("error".to_string(), Value::String(error.to_string()));
        let experiment_design = ExperimentDesign {
            experiment_id: "failed_experiment".to_string(),
            hypothesis_id: "failed_hypothesis".to_string(),
            parameters,
            setup: "Investigation failed".to_string(),
            measurements: vec!["error_analysis".to_string()],
            expected_outcome: "System error occurred".to_string(),
            tools_required: vec!["debugging_tools".to_string()],
            control_variables: Vec::new(),
            duration: default_duration(),
            sample_size: default_sample_size(),
            domain: default_domain(),
        };

        let experimental_results = ExperimentalResults {
            experiment_id: "failed_experiment".to_string(),
            raw_data: BTreeMap::from([("error".to_string(), vec![0.0])]),
            analysis: format!("System error: {}", error),
            conclusion: "Investigation could not be completed".to_string(),
            supports_hypothesis: false,
            confidence: 0.0,
            statistical_significance: None,
            effect_size: None,
            limitations: Vec::new(),
        };

        Self {
            scientific_question: question.to_string(),
            hypothesis,
            experiment_design,
            experimental_results,
            theoretical_vs_experimental: "Analysis failed due to system error".to_string(),
            final_conclusion: format!(
                "The scientific investigation could not be completed due to: {}",
                error
            ),
            future_research: vec![
                "Debug system errors".to_string(),
                "Improve error handling".to_string(),
                "Retry investigation".to_string(),
            ],
            methodology_assessment: String::new(),
            confidence_level: default_confidence_level(),
            practical_implications: Vec::new(),
        }
    }

    /// Whether this is the placeholder produced by [`FinalAnalysis::failure`].
    pub fn is_failure(&self) -> bool {
        self.hypothesis.id == "failed_hypothesis"
    }
}

/// A structured message between two agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationMessage {
    pub from_agent: String,
    pub to_agent: String,
    pub message_type: String,
    pub content: Value,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

/// Expected ranges and precision for experiment design in one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedParameters {
    pub measurement_ranges: String,
    pub precision_requirements: String,
    pub control_conditions: String,
}

/// The theoretical agent's advice to the experimental agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalGuidance {
    pub theoretical_guidance: String,
    pub domain: String,
    pub predicted_parameters: PredictedParameters,
    pub mathematical_model: Option<String>,
    pub knowledge_base_used: Vec<String>,
    pub literature_basis: Vec<String>,
}

/// Hypothesis fields the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisDraft {
    pub statement: String,
    #[serde(deserialize_with = "deserialize_unit_interval")]
    pub confidence: f64,
    #[serde(default)]
    pub mathematical_model: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl OutputSchema for HypothesisDraft {
    fn schema_example() -> Value {
        serde_json::json!({
            "statement": "A precise, testable hypothesis",
            "confidence": 0.8,
            "mathematical_model": "Equation relating the key variables",
            "variables": ["independent variable", "dependent variable"],
            "reasoning": "Theoretical justification"
        })
    }
}

/// Experiment design fields the model is asked to produce.
///
/// `setup` is required so that an off-schema object is not taken for a design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDesignDraft {
    pub setup: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub measurements: Vec<String>,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default)]
    pub tools_required: Vec<String>,
    #[serde(default)]
    pub control_variables: Vec<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub sample_size: Option<u32>,
}

impl OutputSchema for ExperimentDesignDraft {
    fn schema_example() -> Value {
        serde_json::json!({
            "setup": "Description of the apparatus and procedure",
            "parameters": {"independent_variable": [1.0, 2.0, 3.0, 4.0, 5.0]},
            "measurements": ["quantity to measure"],
            "expected_outcome": "Predicted result if the hypothesis holds",
            "tools_required": ["instrument"],
            "control_variables": ["variable held constant"],
            "duration": 60.0,
            "sample_size": 5
        })
    }
}

/// The analysis agent's comparison of theory and experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub summary: String,
    #[serde(default)]
    pub statistics: Map<String, Value>,
    #[serde(deserialize_with = "deserialize_unit_interval")]
    pub confidence: f64,
    /// Free-text recommendations; may contain `recommend_literature`.
    #[serde(default)]
    pub next_steps: String,
}

impl OutputSchema for AnalysisResponse {
    fn schema_example() -> Value {
        serde_json::json!({
            "summary": "Key findings, agreements/contradictions and limitations",
            "statistics": {"correlation": 0.9, "p_value": 0.01},
            "confidence": 0.75,
            "next_steps": "Recommended follow-up; include recommend_literature if more background is needed"
        })
    }
}
