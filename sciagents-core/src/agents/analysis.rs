//! Structured comparison of a hypothesis with its experimental results.

use super::{AgentSettings, BaseAgent};
use crate::brain::LlmProvider;
use crate::error::LlmError;
use crate::parsing::StructuredOutput;
use crate::schemas::{AnalysisResponse, ExperimentalResults, Hypothesis};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are the Analytical Agent. You evaluate, synthesize and interpret the results from the Experimental and Theoretical Agents.
You compare theoretical predictions with experimental results and highlight consistencies, contradictions and uncertainties.
You suggest refinements to theoretical assumptions, experiments or analysis methods.
Structure your analysis as: Key Findings, Agreements/Contradictions, Limitations, Next Steps.
If more background reading would help, include the phrase recommend_literature in next_steps.";

/// Marker in `next_steps` that asks for another literature pass.
pub const RECOMMEND_LITERATURE: &str = "recommend_literature";

pub struct AnalysisAgent {
    base: BaseAgent,
}

impl AnalysisAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &AgentSettings) -> Self {
        Self {
            base: BaseAgent::new("DataAnalysisAgent", provider, SYSTEM_PROMPT, settings),
        }
    }

    pub fn base(&self) -> &BaseAgent {
        &self.base
    }

    pub async fn analyze(
        &self,
        hypothesis: &Hypothesis,
        results: &ExperimentalResults,
    ) -> Result<AnalysisResponse, LlmError> {
        let query = format!(
            "Analyze the following experimental results against the hypothesis and provide a summary and statistics.\n\
             Hypothesis: {} (theoretical confidence {:.2})\n\
             Mathematical model: {}\n\
             Results: {}\n\
             Conclusion: {}\n\
             Supports hypothesis: {}",
            hypothesis.statement,
            hypothesis.confidence,
            hypothesis.mathematical_model.as_deref().unwrap_or("None"),
            results.analysis,
            results.conclusion,
            results.supports_hypothesis,
        );

        match self.base.run_structured::<AnalysisResponse>(&query).await? {
            StructuredOutput::Parsed(response) => Ok(response),
            StructuredOutput::Unparsed(_) => Ok(response_from_results(results)),
        }
    }
}

/// Analysis built from the experiment statistics alone.
pub fn response_from_results(results: &ExperimentalResults) -> AnalysisResponse {
    let mut statistics = Map::new();
    if let Some(p) = results.statistical_significance {
        statistics.insert("p_value".to_string(), json!(p));
    }
    if let Some(d) = results.effect_size {
        statistics.insert("effect_size".to_string(), json!(d));
    }
    statistics.insert(
        "supports_hypothesis".to_string(),
        Value::Bool(results.supports_hypothesis),
    );
    AnalysisResponse {
        summary: format!("{} {}", results.analysis, results.conclusion),
        statistics,
        confidence: results.confidence,
        next_steps: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{mock, settings};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn fixtures() -> (Hypothesis, ExperimentalResults) {
        let hypothesis = Hypothesis {
            id: "hyp_1".into(),
            statement: "Dose raises response".into(),
            confidence: 0.7,
            mathematical_model: None,
            variables: Vec::new(),
            domain: "medicine".into(),
            theoretical_basis: String::new(),
            literature_support: Vec::new(),
        };
        let results = ExperimentalResults {
            experiment_id: "exp_1".into(),
            raw_data: BTreeMap::new(),
            analysis: "r = 0.9.".into(),
            conclusion: "Positive.".into(),
            supports_hypothesis: true,
            confidence: 0.8,
            statistical_significance: Some(0.01),
            effect_size: Some(1.5),
            limitations: Vec::new(),
        };
        (hypothesis, results)
    }

    #[tokio::test]
    async fn test_parsed_response() {
        let provider = mock();
        provider.queue_text(
            r#"{"summary": "Agrees", "statistics": {"r": 0.9}, "confidence": 0.93, "next_steps": "recommend_literature on kinetics"}"#,
        );
        let agent = AnalysisAgent::new(provider, &settings());
        let (h, r) = fixtures();
        let response = agent.analyze(&h, &r).await.unwrap();
        assert_eq!(response.summary, "Agrees");
        assert_eq!(response.confidence, 0.93);
        assert!(response.next_steps.contains(RECOMMEND_LITERATURE));
    }

    #[tokio::test]
    async fn test_unparsed_falls_back_to_statistics() {
        let provider = mock();
        provider.queue_text("Looks fine to me.");
        let agent = AnalysisAgent::new(provider, &settings());
        let (h, r) = fixtures();
        let response = agent.analyze(&h, &r).await.unwrap();
        assert_eq!(response.summary, "r = 0.9. Positive.");
        assert_eq!(response.confidence, 0.8);
        assert_eq!(response.statistics["p_value"], json!(0.01));
        assert_eq!(response.next_steps, "");
    }
}
