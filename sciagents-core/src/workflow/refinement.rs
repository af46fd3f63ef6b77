//! Iterative theory/experiment refinement.

use crate::agents::analysis::RECOMMEND_LITERATURE;
use crate::agents::{AgentSettings, AnalysisAgent, ExperimentalAgent, TheoreticalAgent};
use crate::brain::LlmProvider;
use crate::config::SciConfig;
use crate::domain::{self, Domain, LiteratureReview};
use crate::error::LlmError;
use crate::schemas::{AnalysisResponse, ExperimentalResults, Hypothesis};
use crate::simulation::GenericSimulator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ConfidenceReached,
    MaxTurns,
    Failed,
}

/// One theory → experiment → analysis pass.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementTurn {
    pub turn: u32,
    pub hypothesis: Hypothesis,
    pub results: ExperimentalResults,
    pub analysis: AnalysisResponse,
    pub literature: Option<LiteratureReview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefinementOutcome {
    pub topic: String,
    pub turns: Vec<RefinementTurn>,
    pub final_hypothesis: Option<Hypothesis>,
    pub confidence: f64,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RefinementLoop {
    theoretical: TheoreticalAgent,
    experimental: ExperimentalAgent,
    analysis: AnalysisAgent,
    confidence_threshold: f64,
    max_turns: u32,
}

impl RefinementLoop {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &SciConfig) -> Self {
        let settings = AgentSettings::from_config(config);
        let simulator = Arc::new(GenericSimulator::new(config.simulation.clone()));
        Self {
            theoretical: TheoreticalAgent::new(provider.clone(), &settings),
            experimental: ExperimentalAgent::new(provider.clone(), &settings, simulator),
            analysis: AnalysisAgent::new(provider, &settings),
            confidence_threshold: config.workflow.confidence_threshold,
            max_turns: config.workflow.max_turns.max(1),
        }
    }

    pub fn with_limits(mut self, confidence_threshold: f64, max_turns: u32) -> Self {
        self.confidence_threshold = confidence_threshold;
        self.max_turns = max_turns.max(1);
        self
    }

    /// Iterate until the analysis confidence reaches the threshold or turns run out.
    pub async fn run(&self, topic: &str) -> RefinementOutcome {
        let mut outcome = RefinementOutcome {
            topic: topic.to_string(),
            turns: Vec::new(),
            final_hypothesis: None,
            confidence: 0.0,
            stop_reason: StopReason::MaxTurns,
            error: None,
        };
        let mut pending_literature: Option<LiteratureReview> = None;

        for turn in 1..=self.max_turns {
            let previous = outcome.turns.last();
            match self
                .run_turn(topic, turn, previous, pending_literature.take())
                .await
            {
                Ok(record) => {
                    outcome.confidence = record.analysis.confidence;
                    outcome.final_hypothesis = Some(record.hypothesis.clone());
                    info!(
                        turn,
                        confidence = outcome.confidence,
                        "Refinement turn completed"
                    );

                    if record.analysis.next_steps.contains(RECOMMEND_LITERATURE) {
                        let domain = Domain::from_name(&record.hypothesis.domain);
                        pending_literature = Some(domain::literature_review(topic, domain));
                    }
                    outcome.turns.push(record);

                    if outcome.confidence >= self.confidence_threshold {
                        outcome.stop_reason = StopReason::ConfidenceReached;
                        break;
                    }
                }
                Err(e) => {
                    warn!(turn, error = %e, "Refinement turn failed");
                    outcome.stop_reason = StopReason::Failed;
                    outcome.error = Some(e.to_string());
                    break;
                }
            }
        }
        outcome
    }

    async fn run_turn(
        &self,
        topic: &str,
        turn: u32,
        previous: Option<&RefinementTurn>,
        literature: Option<LiteratureReview>,
    ) -> Result<RefinementTurn, LlmError> {
        let hypothesis = match (previous, &literature) {
            (None, _) => self.theoretical.generate_hypothesis(topic, "").await?,
            (Some(prev), None) => {
                self.theoretical
                    .refine_hypothesis(&prev.hypothesis, &prev.results)
                    .await?
            }
            (Some(prev), Some(review)) => {
                let context = format!(
                    "Previous hypothesis: {}\nAnalysis summary: {}\nRecommended literature: {}\nKey findings: {}",
                    prev.hypothesis.statement,
                    prev.analysis.summary,
                    review.sources.join(", "),
                    review.key_findings,
                );
                self.theoretical.generate_hypothesis(topic, &context).await?
            }
        };

        let guidance = self
            .theoretical
            .collaborate_on_experiment_design(&hypothesis)
            .await?;
        let design = self
            .experimental
            .design_experiment(&hypothesis, &guidance)
            .await?;
        let results = self.experimental.execute_experiment(&design);
        let analysis = self.analysis.analyze(&hypothesis, &results).await?;

        Ok(RefinementTurn {
            turn,
            hypothesis,
            results,
            analysis,
            literature,
        })
    }
}
