//! Final synthesis of theory and experiment.

use super::{AgentSettings, BaseAgent};
use crate::brain::LlmProvider;
use crate::domain::Domain;
use crate::error::LlmError;
use crate::schemas::{
    ExperimentDesign, ExperimentalResults, FinalAnalysis, Hypothesis, TheoreticalGuidance,
};
use crate::stats;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You are a scientific analysis collector and synthesizer with expertise across multiple domains.

Your responsibilities:
1. Compare experimental results to theoretical predictions across any scientific field
2. Analyze data collected by the experimental agent using appropriate statistical methods
3. Aggregate findings from all agents into coherent conclusions
4. Provide final scientific conclusions and recommendations

Your analysis should be objective, evidence-based and clear about limitations and uncertainties.";

pub struct CollectorAgent {
    base: BaseAgent,
}

impl CollectorAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &AgentSettings) -> Self {
        Self {
            base: BaseAgent::new("CollectorAgent", provider, SYSTEM_PROMPT, settings),
        }
    }

    pub fn base(&self) -> &BaseAgent {
        &self.base
    }

    /// Combine every record of an investigation into a [`FinalAnalysis`].
    pub async fn analyze_and_aggregate(
        &self,
        question: &str,
        hypothesis: &Hypothesis,
        design: &ExperimentDesign,
        results: &ExperimentalResults,
        guidance: &TheoreticalGuidance,
    ) -> Result<FinalAnalysis, LlmError> {
        let domain = Domain::from_name(&guidance.domain);
        let predicted = serde_json::to_string_pretty(&guidance.predicted_parameters)
            .unwrap_or_default();
        let query = format!(
            "SCIENTIFIC INVESTIGATION ANALYSIS\n\n\
             Research Question: {question}\n\
             Scientific Domain: {domain}\n\n\
             THEORETICAL COMPONENT:\n\
             - Hypothesis: {statement}\n\
             - Mathematical Model: {model}\n\
             - Theoretical Confidence: {hc}\n\
             - Variables: {vars}\n\n\
             EXPERIMENTAL COMPONENT:\n\
             - Experiment ID: {exp_id}\n\
             - Supports Hypothesis: {supports}\n\
             - Experimental Confidence: {rc}\n\
             - Analysis: {analysis}\n\
             - Conclusion: {conclusion}\n\
             - Raw Data Summary: {summary}\n\n\
             THEORETICAL GUIDANCE USED:\n{predicted}\n\n\
             Provide a comprehensive scientific analysis that:\n\
             1. Compares theoretical predictions with experimental outcomes\n\
             2. Evaluates the strength of evidence\n\
             3. Identifies limitations and uncertainties\n\
             4. Assesses the validity of the hypothesis\n\
             5. Provides domain-specific insights\n\
             6. Recommends future research directions\n\n\
             Consider the specific methodologies and standards of {domain} research.",
            statement = hypothesis.statement,
            model = hypothesis.mathematical_model.as_deref().unwrap_or("None"),
            hc = hypothesis.confidence,
            vars = hypothesis.variables.join(", "),
            exp_id = results.experiment_id,
            supports = results.supports_hypothesis,
            rc = results.confidence,
            analysis = results.analysis,
            conclusion = results.conclusion,
            summary = summarize_raw_data(&results.raw_data),
        );

        let narrative = self.base.ask(&query).await?;
        let agreement = agreement_score(hypothesis, results, domain);
        let level = ConfidenceLevel::from_agreement(agreement);
        info!(agreement, level = level.as_str(), "Final analysis assembled");

        Ok(FinalAnalysis {
            scientific_question: question.to_string(),
            hypothesis: hypothesis.clone(),
            experiment_design: design.clone(),
            experimental_results: results.clone(),
            theoretical_vs_experimental: format!("Agreement score: {:.2}. {}", agreement, narrative),
            final_conclusion: conclusion(hypothesis, results, agreement, domain),
            future_research: future_research(domain, results),
            methodology_assessment: methodology_assessment(design, results),
            confidence_level: level.as_str().to_string(),
            practical_implications: Vec::new(),
        })
    }
}

/// `key: mean=…, std=…, n=…` for each non-empty series, joined by "; ".
pub fn summarize_raw_data(raw_data: &BTreeMap<String, Vec<f64>>) -> String {
    raw_data
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| {
            format!(
                "{}: mean={:.2}, std={:.2}, n={}",
                key,
                stats::mean(values),
                stats::std_dev(values),
                values.len()
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn domain_factor(domain: Domain) -> f64 {
    match domain {
        Domain::Physics => 1.0,
        Domain::Chemistry => 0.95,
        Domain::Biology => 0.85,
        Domain::Environmental => 0.8,
        _ => 0.9,
    }
}

/// Theory/experiment agreement in `0.0..=0.98`.
pub fn agreement_score(hypothesis: &Hypothesis, results: &ExperimentalResults, domain: Domain) -> f64 {
    let (hc, rc) = (hypothesis.confidence, results.confidence);
    let base = if results.supports_hypothesis {
        (hc + rc) / 2.0
    } else {
        (1.0 - (hc - rc).abs()).max(0.1)
    };
    (base * domain_factor(domain)).min(0.98)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Moderate,
    Low,
}

impl ConfidenceLevel {
    pub fn from_agreement(score: f64) -> Self {
        if score > 0.8 {
            Self::High
        } else if score > 0.6 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }

    fn adverb(&self) -> &'static str {
        match self {
            Self::High => "strongly",
            Self::Moderate => "moderately",
            Self::Low => "weakly",
        }
    }
}

fn domain_context(domain: Domain) -> &'static str {
    match domain {
        Domain::Physics => "physical principles and mathematical relationships",
        Domain::Chemistry => "chemical kinetics and thermodynamic principles",
        Domain::Biology => "biological processes and ecological relationships",
        Domain::Environmental => "environmental interactions and sustainability factors",
        Domain::General => "scientific principles and empirical relationships",
        _ => "scientific principles",
    }
}

fn conclusion(
    hypothesis: &Hypothesis,
    results: &ExperimentalResults,
    agreement: f64,
    domain: Domain,
) -> String {
    let level = ConfidenceLevel::from_agreement(agreement);
    let context = domain_context(domain);
    let model = hypothesis.mathematical_model.as_deref().unwrap_or("None");
    if results.supports_hypothesis {
        format!(
            "The experimental evidence {} supports the hypothesis \"{}\" with {} confidence \
             (agreement score: {:.2}). The results are consistent with established {}. \
             The mathematical model {} provides a theoretical framework that aligns with \
             the observed experimental data.",
            level.adverb(),
            hypothesis.statement,
            level.as_str(),
            agreement,
            context,
            model
        )
    } else {
        format!(
            "The experimental evidence does not strongly support the hypothesis \"{}\". \
             While the theoretical foundation based on {} suggested this relationship, the \
             experimental data shows {} agreement (score: {:.2}). This suggests the need for \
             hypothesis refinement or consideration of additional variables not accounted \
             for in the current model.",
            hypothesis.statement,
            context,
            level.as_str(),
            agreement
        )
    }
}

fn future_research(domain: Domain, results: &ExperimentalResults) -> Vec<String> {
    let base: &[&str] = match domain {
        Domain::Physics => &[
            "Investigate quantum effects at microscopic scales",
            "Examine relativistic corrections for high-speed phenomena",
            "Study non-linear dynamics and chaos theory applications",
            "Explore temperature-dependent material properties",
        ],
        Domain::Chemistry => &[
            "Investigate catalyst effects on reaction pathways",
            "Study solvent effects on reaction kinetics",
            "Examine pressure dependence of equilibrium constants",
            "Explore green chemistry alternatives",
        ],
        Domain::Biology => &[
            "Study genetic variations affecting the observed response",
            "Investigate seasonal and circadian rhythm effects",
            "Examine inter-species variations and evolutionary implications",
            "Explore molecular mechanisms underlying the observed phenomena",
        ],
        Domain::Environmental => &[
            "Scale up to ecosystem-level impacts",
            "Study long-term temporal trends and climate interactions",
            "Investigate human activity influences",
            "Examine geographical variations and local factors",
        ],
        _ => &[
            "Expand parameter ranges for broader applicability",
            "Investigate confounding variables not yet considered",
            "Replicate study in different conditions",
            "Develop more sophisticated theoretical models",
        ],
    };
    let specific: [&str; 2] = if results.supports_hypothesis {
        [
            "Optimize conditions for practical applications",
            "Investigate mechanisms underlying the confirmed relationship",
        ]
    } else {
        [
            "Revise theoretical model to account for unexpected results",
            "Investigate alternative explanations for observed phenomena",
        ]
    };
    base.iter()
        .chain(specific.iter())
        .take(6)
        .map(|s| s.to_string())
        .collect()
}

fn methodology_assessment(design: &ExperimentDesign, results: &ExperimentalResults) -> String {
    let significance = match results.statistical_significance {
        Some(p) if p < 0.05 => format!("statistically significant (p = {:.4})", p),
        Some(p) => format!("not statistically significant (p = {:.4})", p),
        None => "of unknown significance".to_string(),
    };
    let points = results.raw_data.values().map(Vec::len).max().unwrap_or(0);
    format!(
        "Parameter-driven {} simulation with {} measured series and up to {} points per series \
         (planned sample size {}). The primary relationship is {}.",
        design.domain,
        results.raw_data.len(),
        points,
        design.sample_size,
        significance
    )
}
