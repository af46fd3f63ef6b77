//! Hypothesis generation and theoretical guidance.

use super::{AgentSettings, BaseAgent};
use crate::brain::LlmProvider;
use crate::domain::{self, Domain, DomainKnowledge, LiteratureReview};
use crate::error::LlmError;
use crate::parsing::{StructuredOutput, extract_field, extract_number};
use crate::schemas::{
    ExperimentalResults, Hypothesis, HypothesisDraft, TheoreticalGuidance, clamp_unit,
};
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are a theoretical scientist with expertise across multiple scientific domains.

Your responsibilities:
1. Generate well-founded scientific hypotheses based on established theory
2. Create or recall relevant mathematical models for any scientific domain
3. Perform literature review and theoretical analysis
4. Design experiments collaboratively with the experimental agent

When generating hypotheses:
- Base them on established scientific principles from any field
- Include mathematical formulations when relevant
- Specify key variables and their relationships
- Provide confidence estimates based on theoretical foundation
- Consider interdisciplinary connections";

const GUIDANCE_PROMPT: &str = "You are providing theoretical guidance for experimental design.";

const LABELS: [&str; 5] = [
    "HYPOTHESIS",
    "CONFIDENCE",
    "MATHEMATICAL_MODEL",
    "VARIABLES",
    "REASONING",
];

pub struct TheoreticalAgent {
    base: BaseAgent,
}

impl TheoreticalAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &AgentSettings) -> Self {
        Self {
            base: BaseAgent::new("TheoreticalAgent", provider, SYSTEM_PROMPT, settings),
        }
    }

    pub fn base(&self) -> &BaseAgent {
        &self.base
    }

    /// Propose a testable hypothesis for `question`.
    pub async fn generate_hypothesis(
        &self,
        question: &str,
        context: &str,
    ) -> Result<Hypothesis, LlmError> {
        self.hypothesis_in_domain(question, Domain::classify(question), context)
            .await
    }

    /// Regenerate a hypothesis in light of experimental results.
    pub async fn refine_hypothesis(
        &self,
        hypothesis: &Hypothesis,
        results: &ExperimentalResults,
    ) -> Result<Hypothesis, LlmError> {
        let context = format!(
            "Previous hypothesis: {}\nExperiment {} {} the hypothesis (confidence {:.2}).\nAnalysis: {}\nConclusion: {}\nRefine the hypothesis to better explain these results.",
            hypothesis.statement,
            results.experiment_id,
            if results.supports_hypothesis {
                "supported"
            } else {
                "did not support"
            },
            results.confidence,
            results.analysis,
            results.conclusion,
        );
        let domain = match Domain::from_name(&hypothesis.domain) {
            Domain::General => Domain::classify(&hypothesis.statement),
            d => d,
        };
        self.hypothesis_in_domain(&hypothesis.statement, domain, &context)
            .await
    }

    async fn hypothesis_in_domain(
        &self,
        question: &str,
        domain: Domain,
        context: &str,
    ) -> Result<Hypothesis, LlmError> {
        let knowledge = domain::domain_knowledge(domain, question);
        let literature = domain::literature_review(question, domain);
        let query = hypothesis_query(question, context, domain, &knowledge, &literature);
        debug!(domain = %domain, topics = knowledge.topics.len(), "Generating hypothesis");

        let output = self.base.run_structured::<HypothesisDraft>(&query).await?;
        let draft = match output {
            StructuredOutput::Parsed(draft) => draft,
            StructuredOutput::Unparsed(failure) => draft_from_labels(&failure.raw),
        };

        let hypothesis = Hypothesis {
            id: format!(
                "hyp_{}_{}",
                domain,
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ),
            statement: draft.statement,
            confidence: draft.confidence,
            mathematical_model: draft.mathematical_model,
            variables: draft.variables,
            domain: domain.to_string(),
            theoretical_basis: draft.reasoning,
            literature_support: literature.sources,
        };
        info!(
            id = %hypothesis.id,
            confidence = hypothesis.confidence,
            "Hypothesis generated"
        );
        Ok(hypothesis)
    }

    /// Advise the experimental agent on how to test `hypothesis`.
    pub async fn collaborate_on_experiment_design(
        &self,
        hypothesis: &Hypothesis,
    ) -> Result<TheoreticalGuidance, LlmError> {
        let domain = match Domain::from_name(&hypothesis.domain) {
            Domain::General => Domain::classify(&hypothesis.statement),
            d => d,
        };
        let knowledge = domain::domain_knowledge(domain, &hypothesis.statement);
        let query = format!(
            "Hypothesis: {statement}\nMathematical Model: {model}\nDomain: {domain}\nVariables: {vars}\n\n\
             Domain Knowledge: {knowledge}\n\n\
             Provide theoretical guidance for experimental design:\n\n\
             1. CONTROL VARIABLES: What should be kept constant\n\
             2. INDEPENDENT VARIABLES: What should be manipulated\n\
             3. DEPENDENT VARIABLES: What should be measured\n\
             4. EXPECTED RELATIONSHIPS: Theoretical predictions\n\
             5. MEASUREMENT PRECISION: Required accuracy\n\
             6. POTENTIAL CONFOUNDING FACTORS: What could interfere\n\
             7. THEORETICAL PREDICTIONS: Expected quantitative results\n\n\
             Consider the specific requirements of {domain} experiments.",
            statement = hypothesis.statement,
            model = hypothesis.mathematical_model.as_deref().unwrap_or("None"),
            vars = hypothesis.variables.join(", "),
            knowledge = pretty(&knowledge.to_json()),
        );

        let guidance = self.base.ask_with_system(GUIDANCE_PROMPT, &query).await?;
        let literature = domain::literature_review(&hypothesis.statement, domain);

        Ok(TheoreticalGuidance {
            theoretical_guidance: guidance,
            domain: domain.to_string(),
            predicted_parameters: domain::predicted_parameters(domain),
            mathematical_model: hypothesis.mathematical_model.clone(),
            knowledge_base_used: knowledge.topic_names(),
            literature_basis: literature.sources,
        })
    }
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn hypothesis_query(
    question: &str,
    context: &str,
    domain: Domain,
    knowledge: &DomainKnowledge,
    literature: &LiteratureReview,
) -> String {
    let sources: Vec<&str> = literature.sources.iter().take(3).map(String::as_str).collect();
    format!(
        "Scientific Question: {question}\n\
         Context: {context}\n\
         Scientific Domain: {domain}\n\n\
         Relevant Knowledge Base:\n{knowledge}\n\n\
         Literature Review Results:\n\
         Sources: {sources}\n\
         Key Findings: {findings}\n\
         Research Gaps: {gaps}\n\n\
         Generate a testable scientific hypothesis that:\n\
         1. Directly addresses the research question\n\
         2. Is based on established scientific principles\n\
         3. Includes relevant variables and their expected relationships\n\
         4. Can be tested experimentally\n\
         5. Includes a mathematical model or relationship if applicable\n\n\
         If you cannot produce JSON, use this format:\n\
         HYPOTHESIS: [Clear, testable statement]\n\
         CONFIDENCE: [0.0 to 1.0]\n\
         MATHEMATICAL_MODEL: [Equation or relationship if applicable]\n\
         VARIABLES: [List of key variables]\n\
         REASONING: [Brief explanation of theoretical basis]",
        knowledge = pretty(&knowledge.to_json()),
        sources = sources.join(", "),
        findings = literature.key_findings,
        gaps = literature.research_gaps,
    )
}

/// Recover hypothesis fields from a `LABEL: value` reply.
fn draft_from_labels(raw: &str) -> HypothesisDraft {
    let stops_after = |label: &str| -> Vec<&'static str> {
        LABELS
            .iter()
            .skip_while(|l| **l != label)
            .skip(1)
            .copied()
            .collect()
    };

    let statement = extract_field(raw, "HYPOTHESIS", &stops_after("HYPOTHESIS"))
        .unwrap_or_else(|| raw.chars().take(200).collect());
    let confidence = extract_number(raw, "CONFIDENCE").map_or(0.7, clamp_unit);
    let mathematical_model =
        extract_field(raw, "MATHEMATICAL_MODEL", &stops_after("MATHEMATICAL_MODEL"))
            .or_else(|| Some("Domain-specific relationship".to_string()));
    let variables = extract_field(raw, "VARIABLES", &stops_after("VARIABLES"))
        .map(|v| {
            v.split(", ")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_else(|| vec!["independent_var".to_string(), "dependent_var".to_string()]);
    let reasoning = extract_field(raw, "REASONING", &[]).unwrap_or_default();

    HypothesisDraft {
        statement,
        confidence,
        mathematical_model,
        variables,
        reasoning,
    }
}
