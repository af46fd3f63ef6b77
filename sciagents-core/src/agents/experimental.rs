//! Experiment design and simulated execution.

use super::{AgentSettings, BaseAgent};
use crate::brain::LlmProvider;
use crate::domain::Domain;
use crate::error::LlmError;
use crate::logging::log_experiment;
use crate::parsing::StructuredOutput;
use crate::schemas::{
    ExperimentDesign, ExperimentDesignDraft, ExperimentalResults, Hypothesis, TheoreticalGuidance,
};
use crate::simulation::GenericSimulator;
use crate::stats;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are the Experimental Agent. Your role is to test and validate ideas through empirical methods and simulated experiments.
You design experiments that collect clear evidence: methodology, parameters, measurements and controls.
You do not speculate beyond what experimental evidence supports.
Parameter levels must be given as lists of numbers so they can be simulated.";

/// Minimum |r| for a result to count as supporting the hypothesis.
pub const SUPPORT_CORRELATION: f64 = 0.5;
/// Maximum p-value for a result to count as supporting the hypothesis.
pub const SUPPORT_P_VALUE: f64 = 0.05;

pub struct ExperimentalAgent {
    base: BaseAgent,
    simulator: Arc<GenericSimulator>,
}

impl ExperimentalAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: &AgentSettings,
        simulator: Arc<GenericSimulator>,
    ) -> Self {
        Self {
            base: BaseAgent::new("ExperimentalAgent", provider, SYSTEM_PROMPT, settings),
            simulator,
        }
    }

    pub fn base(&self) -> &BaseAgent {
        &self.base
    }

    /// Default parameter levels that drive `domain`'s simulation model.
    ///
    /// A physics hypothesis mentioning a pendulum also gets an `initial_angle`.
    pub fn domain_parameters(domain: Domain, hypothesis: &str) -> Map<String, Value> {
        let value = match domain {
            Domain::Physics => {
                let mut params = json!({
                    "temperature": [20, 40, 60, 80, 100],
                    "time_duration": 10.0,
                    "frequency": 1.0,
                    "damping": 0.1
                });
                if hypothesis.to_lowercase().contains("pendulum") {
                    params["initial_angle"] = json!(0.2);
                }
                params
            }
            Domain::Chemistry => json!({
                "concentration": [0.1, 0.5, 1.0, 2.0, 5.0],
                "temperature": [20, 30, 40, 50, 60],
                "pH": [4, 5, 6, 7, 8, 9]
            }),
            Domain::Biology => json!({
                "light_intensity": [0, 100, 200, 400, 800],
                "nutrient_concentration": [0.5, 1.0, 2.0, 4.0, 8.0],
                "observation_period": 100
            }),
            Domain::Environmental => json!({
                "air_quality_index": [25, 50, 100, 150, 200],
                "humidity": [30, 45, 60, 75, 90],
                "carbon_concentration": [350, 400, 450, 500, 550]
            }),
            Domain::Engineering => json!({
                "applied_stress": [0, 50, 100, 200, 300],
                "input_power": [100, 200, 300, 400, 500]
            }),
            Domain::Medicine => json!({
                "dosage": [0, 5, 10, 15, 20],
                "initial_dose": 100
            }),
            Domain::General => json!({
                "levels": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]
            }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Measurements that trigger every model of `domain`.
    pub fn default_measurements(domain: Domain) -> Vec<String> {
        let items: &[&str] = match domain {
            Domain::Physics => &["response_values", "force and motion"],
            Domain::Chemistry => &["reaction_rates", "rate_constants", "activity_coefficients"],
            Domain::Biology => &["photosynthesis_rate", "growth_rates", "population_size"],
            Domain::Environmental => &[
                "health_impact_score",
                "ecosystem_response",
                "temperature_anomaly",
            ],
            Domain::Engineering => &["stress-strain response", "efficiency"],
            Domain::Medicine => &["therapeutic_response", "time_course"],
            Domain::General => &["measured_response"],
        };
        items.iter().map(|s| s.to_string()).collect()
    }

    fn default_tools(domain: Domain) -> Vec<String> {
        let items: &[&str] = match domain {
            Domain::Physics => &["simulation_engine", "motion_sensor", "thermometer"],
            Domain::Chemistry => &["simulation_engine", "spectrophotometer", "pH_meter"],
            Domain::Biology => &["simulation_engine", "light_meter", "population_counter"],
            Domain::Environmental => &["simulation_engine", "air_quality_monitor", "co2_sensor"],
            Domain::Engineering => &["simulation_engine", "strain_gauge", "power_meter"],
            Domain::Medicine => &["simulation_engine", "plasma_assay"],
            Domain::General => &["simulation_engine", "data_logger"],
        };
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Plan an experiment for `hypothesis`, guided by the theoretical agent.
    pub async fn design_experiment(
        &self,
        hypothesis: &Hypothesis,
        guidance: &TheoreticalGuidance,
    ) -> Result<ExperimentDesign, LlmError> {
        let domain = Domain::from_name(&guidance.domain);
        let defaults = Self::domain_parameters(domain, &hypothesis.statement);
        let query = format!(
            "Design an experiment to test: {statement}\n\
             Scientific Domain: {domain}\n\n\
             Theoretical guidance:\n{theory}\n\n\
             Measurement ranges: {ranges}\n\
             Precision requirements: {precision}\n\
             Control conditions: {controls}\n\n\
             Default parameter levels for this domain:\n{defaults}",
            statement = hypothesis.statement,
            theory = guidance.theoretical_guidance,
            ranges = guidance.predicted_parameters.measurement_ranges,
            precision = guidance.predicted_parameters.precision_requirements,
            controls = guidance.predicted_parameters.control_conditions,
            defaults = Value::Object(defaults.clone()),
        );

        let draft = match self
            .base
            .run_structured::<ExperimentDesignDraft>(&query)
            .await?
        {
            StructuredOutput::Parsed(draft) => draft,
            StructuredOutput::Unparsed(_) => {
                debug!(domain = %domain, "Using template experiment design");
                ExperimentDesignDraft::default()
            }
        };

        let design = self.complete_design(hypothesis, guidance, domain, defaults, draft);
        info!(
            id = %design.experiment_id,
            params = design.parameters.len(),
            measurements = design.measurements.len(),
            "Experiment designed"
        );
        log_experiment(&design.experiment_id, "designed", &design.setup);
        Ok(design)
    }

    fn complete_design(
        &self,
        hypothesis: &Hypothesis,
        guidance: &TheoreticalGuidance,
        domain: Domain,
        mut parameters: Map<String, Value>,
        draft: ExperimentDesignDraft,
    ) -> ExperimentDesign {
        for (key, value) in draft.parameters {
            if is_numeric_parameter(&value) {
                parameters.insert(key, value);
            }
        }

        let mut measurements = draft.measurements;
        for default in Self::default_measurements(domain) {
            if !measurements.contains(&default) {
                measurements.push(default);
            }
        }

        let non_empty = |s: String, fallback: String| if s.trim().is_empty() { fallback } else { s };
        let control_variables = if draft.control_variables.is_empty() {
            guidance
                .predicted_parameters
                .control_conditions
                .split(", ")
                .map(str::to_string)
                .collect()
        } else {
            draft.control_variables
        };
        let tools_required = if draft.tools_required.is_empty() {
            Self::default_tools(domain)
        } else {
            draft.tools_required
        };

        ExperimentDesign {
            experiment_id: format!(
                "exp_{}_{}",
                domain,
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ),
            hypothesis_id: hypothesis.id.clone(),
            parameters,
            setup: non_empty(
                draft.setup,
                format!(
                    "Controlled {} simulation testing: {}",
                    domain, hypothesis.statement
                ),
            ),
            measurements,
            expected_outcome: non_empty(
                draft.expected_outcome,
                "Measured response follows the relationship predicted by the hypothesis"
                    .to_string(),
            ),
            tools_required,
            control_variables,
            duration: draft.duration.filter(|d| *d > 0.0).unwrap_or(60.0),
            sample_size: draft.sample_size.filter(|n| *n > 0).unwrap_or(5),
            domain: domain.to_string(),
        }
    }

    /// Simulate `design` and read the primary series statistically.
    pub fn execute_experiment(&self, design: &ExperimentDesign) -> ExperimentalResults {
        log_experiment(&design.experiment_id, "running", &design.domain);
        let output =
            self.simulator
                .run_experiment(&design.domain, &design.parameters, &design.measurements);

        let x = output.independent_series().unwrap_or_default();
        let y = output.response_series().unwrap_or_default();
        let x_name = output.independent.as_deref().unwrap_or("independent variable");
        let y_name = output.response.as_deref().unwrap_or("response");

        let n = x.len().min(y.len());
        let r = stats::pearson(x, y);
        let p = stats::correlation_p_value(r, n);
        let (lower, upper) = y[..n].split_at(n / 2);
        let d = stats::cohens_d(lower, upper);

        let supports = r.abs() >= SUPPORT_CORRELATION && p < SUPPORT_P_VALUE;
        let confidence = (r.abs() * (1.0 - p)).clamp(0.05, 0.99);

        let analysis = format!(
            "Simulated {} experiment: {} against {} over {} points. Pearson r = {:.3}, p = {:.4}, Cohen's d = {:.2}.",
            design.domain, y_name, x_name, n, r, p, d
        );
        let conclusion = if supports {
            let direction = if r > 0.0 { "positive" } else { "negative" };
            format!(
                "The data show a statistically significant {} relationship between {} and {}, consistent with the hypothesis.",
                direction, x_name, y_name
            )
        } else {
            format!(
                "The data do not show a statistically significant relationship between {} and {}.",
                x_name, y_name
            )
        };

        let mut limitations = vec![
            "Simulated data".to_string(),
            format!("Sample size of {} points", n),
        ];
        if output.fallback {
            limitations.push("fallback dataset used".to_string());
        }

        log_experiment(
            &design.experiment_id,
            "completed",
            &format!("r={:.3} p={:.4} supports={}", r, p, supports),
        );

        ExperimentalResults {
            experiment_id: design.experiment_id.clone(),
            raw_data: output.data,
            analysis,
            conclusion,
            supports_hypothesis: supports,
            confidence,
            statistical_significance: Some(p),
            effect_size: Some(d),
            limitations,
        }
    }
}

fn is_numeric_parameter(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_number),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{mock, settings};
    use crate::domain::predicted_parameters;
    use pretty_assertions::assert_eq;

    fn agent(provider: Arc<crate::brain::MockLlmProvider>) -> ExperimentalAgent {
        ExperimentalAgent::new(provider, &settings(), Arc::new(GenericSimulator::with_seed(5)))
    }

    fn hypothesis() -> Hypothesis {
        Hypothesis {
            id: "hyp_chem".into(),
            statement: "Reaction rate rises with concentration".into(),
            confidence: 0.8,
            mathematical_model: Some("rate = k[A]^n".into()),
            variables: vec!["concentration".into(), "rate".into()],
            domain: "chemistry".into(),
            theoretical_basis: String::new(),
            literature_support: Vec::new(),
        }
    }

    fn guidance(domain: Domain) -> TheoreticalGuidance {
        TheoreticalGuidance {
            theoretical_guidance: "Vary concentration.".into(),
            domain: domain.to_string(),
            predicted_parameters: predicted_parameters(domain),
            mathematical_model: None,
            knowledge_base_used: Vec::new(),
            literature_basis: Vec::new(),
        }
    }

    #[test]
    fn test_domain_parameters() {
        assert!(ExperimentalAgent::domain_parameters(Domain::Physics, "test hypothesis").contains_key("temperature"));
        assert!(
            ExperimentalAgent::domain_parameters(Domain::Chemistry, "test hypothesis")
                .contains_key("concentration")
        );
        assert!(
            ExperimentalAgent::domain_parameters(Domain::Physics, "A pendulum swings")
                .contains_key("initial_angle")
        );
        assert_eq!(
            ExperimentalAgent::domain_parameters(Domain::General, "")["levels"]
                .as_array()
                .map(Vec::len),
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_design_template_when_unparsed() {
        let provider = mock();
        provider.queue_text("Use a beaker.");
        let agent = agent(provider);
        let design = agent
            .design_experiment(&hypothesis(), &guidance(Domain::Chemistry))
            .await
            .unwrap();
        assert!(design.experiment_id.starts_with("exp_chemistry_"));
        assert_eq!(design.hypothesis_id, "hyp_chem");
        assert_eq!(design.domain, "chemistry");
        assert!(design.setup.contains("Reaction rate rises"));
        assert_eq!(
            design.measurements,
            ExperimentalAgent::default_measurements(Domain::Chemistry)
        );
        assert_eq!(
            design.control_variables,
            vec!["pH", "pressure", "stirring rate"]
        );
        assert_eq!(design.sample_size, 5);
    }

    #[tokio::test]
    async fn test_design_template_for_off_schema_object() {
        let provider = mock();
        provider.queue_text(r#"{"statement": "unrelated", "confidence": 0.9}"#);
        let agent = agent(provider);
        let design = agent
            .design_experiment(&hypothesis(), &guidance(Domain::Chemistry))
            .await
            .unwrap();
        assert!(design.setup.contains("Reaction rate rises"));
        assert_eq!(
            design.measurements,
            ExperimentalAgent::default_measurements(Domain::Chemistry)
        );
        assert_eq!(design.sample_size, 5);
    }

    #[tokio::test]
    async fn test_design_only_numeric_overrides() {
        let provider = mock();
        provider.queue_text(
            r#"{"setup": "Stopped-flow kinetics", "parameters": {"concentration": [1, 2, 3], "temperature": "room", "stirring": 300}, "measurements": ["reaction_rates"], "sample_size": 12}"#,
        );
        let agent = agent(provider);
        let design = agent
            .design_experiment(&hypothesis(), &guidance(Domain::Chemistry))
            .await
            .unwrap();
        assert_eq!(design.setup, "Stopped-flow kinetics");
        assert_eq!(design.parameters["concentration"], json!([1, 2, 3]));
        assert_eq!(design.parameters["temperature"], json!([20, 30, 40, 50, 60]));
        assert_eq!(design.parameters["stirring"], json!(300));
        assert_eq!(design.measurements[0], "reaction_rates");
        assert_eq!(design.sample_size, 12);
    }

    #[test]
    fn test_execute_keeps_experiment_id() {
        let agent = agent(mock());
        let mut parameters = Map::new();
        parameters.insert("temperature".into(), json!([20, 30, 40]));
        let design = ExperimentDesign {
            experiment_id: "test_exp".into(),
            hypothesis_id: "test_hyp".into(),
            parameters,
            setup: "test setup".into(),
            measurements: vec!["response".into()],
            expected_outcome: "test outcome".into(),
            tools_required: vec!["thermometer".into()],
            control_variables: Vec::new(),
            duration: 60.0,
            sample_size: 5,
            domain: "general".into(),
        };
        let results = agent.execute_experiment(&design);
        assert_eq!(results.experiment_id, "test_exp");
        assert!(results.raw_data.contains_key("temperature"));
        assert!((0.05..=0.99).contains(&results.confidence));
        assert_eq!(results.limitations[0], "Simulated data");
    }

    #[test]
    fn test_execute_fallback_is_flagged() {
        let agent = agent(mock());
        let mut parameters = Map::new();
        parameters.insert("concentration".into(), json!(["high"]));
        let design = ExperimentDesign {
            experiment_id: "exp_bad".into(),
            hypothesis_id: "h".into(),
            parameters,
            setup: String::new(),
            measurements: Vec::new(),
            expected_outcome: String::new(),
            tools_required: Vec::new(),
            control_variables: Vec::new(),
            duration: 60.0,
            sample_size: 5,
            domain: "chemistry".into(),
        };
        let results = agent.execute_experiment(&design);
        assert!(
            results
                .limitations
                .contains(&"fallback dataset used".to_string())
        );
        // The fallback series is strongly linear.
        assert!(results.supports_hypothesis);
        assert!(results.statistical_significance.unwrap() < 0.05);
    }

    #[test]
    fn test_numeric_parameter_check() {
        assert!(is_numeric_parameter(&json!(3)));
        assert!(is_numeric_parameter(&json!([1, 2.5])));
        assert!(!is_numeric_parameter(&json!([])));
        assert!(!is_numeric_parameter(&json!([1, "a"])));
        assert!(!is_numeric_parameter(&json!("high")));
    }
}
