//! The investigation pipeline.
//!
//! [`ScientificWorkflow`] runs one question through five timed phases:
//! theory, the theoretical handoff, experiment, the results handoff and
//! final analysis. [`RefinementLoop`] repeats theory and experiment until
//! the analysis is confident enough.

pub mod refinement;

pub use refinement::{RefinementLoop, RefinementOutcome, RefinementTurn, StopReason};

use crate::agents::{AgentSettings, AgentUsage, CollectorAgent, ExperimentalAgent, TheoreticalAgent};
use crate::brain::LlmProvider;
use crate::communication::CommunicationHub;
use crate::config::SciConfig;
use crate::error::{LlmError, WorkflowError};
use crate::monitor::{OperationMetric, PerformanceMonitor, PerformanceReport};
use crate::schemas::{CommunicationMessage, FinalAnalysis};
use crate::simulation::GenericSimulator;
use crate::store::{AgentPerformanceRecord, InvestigationRecord, InvestigationStore};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, error, info, info_span, warn};

/// A stage of [`ScientificWorkflow::investigate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Theory,
    TheoryHandoff,
    Experiment,
    ResultsHandoff,
    FinalAnalysis,
}

impl WorkflowPhase {
    pub const ALL: [WorkflowPhase; 5] = [
        WorkflowPhase::Theory,
        WorkflowPhase::TheoryHandoff,
        WorkflowPhase::Experiment,
        WorkflowPhase::ResultsHandoff,
        WorkflowPhase::FinalAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Theory => "theory",
            WorkflowPhase::TheoryHandoff => "theory_handoff",
            WorkflowPhase::Experiment => "experiment",
            WorkflowPhase::ResultsHandoff => "results_handoff",
            WorkflowPhase::FinalAnalysis => "final_analysis",
        }
    }

    /// Human-readable label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowPhase::Theory => "Theoretical analysis",
            WorkflowPhase::TheoryHandoff => "Handoff to experimental agent",
            WorkflowPhase::Experiment => "Experiment design and execution",
            WorkflowPhase::ResultsHandoff => "Handoff to collector agent",
            WorkflowPhase::FinalAnalysis => "Final analysis",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress notifications from a running investigation.
#[async_trait]
pub trait PhaseCallback: Send + Sync {
    async fn on_phase_start(&self, phase: WorkflowPhase);

    async fn on_phase_complete(&self, phase: WorkflowPhase, elapsed: Duration);
}

/// Snapshot returned by [`ScientificWorkflow::status`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    pub communication_history: Vec<CommunicationMessage>,
    pub shared_context: Map<String, Value>,
    pub agents_initialized: BTreeMap<String, bool>,
    pub performance: PerformanceReport,
}

pub struct ScientificWorkflow {
    theoretical: TheoreticalAgent,
    experimental: ExperimentalAgent,
    collector: CollectorAgent,
    hub: Arc<CommunicationHub>,
    monitor: Arc<PerformanceMonitor>,
    store: Option<InvestigationStore>,
    callback: Option<Arc<dyn PhaseCallback>>,
}

impl ScientificWorkflow {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &SciConfig) -> Self {
        let settings = AgentSettings::from_config(config);
        let simulator = Arc::new(GenericSimulator::new(config.simulation.clone()));
        Self {
            theoretical: TheoreticalAgent::new(provider.clone(), &settings),
            experimental: ExperimentalAgent::new(provider.clone(), &settings, simulator),
            collector: CollectorAgent::new(provider, &settings),
            hub: Arc::new(CommunicationHub::new()),
            monitor: Arc::new(PerformanceMonitor::new()),
            store: None,
            callback: None,
        }
    }

    /// Persist every completed investigation into `store`.
    pub fn with_store(mut self, store: InvestigationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn PhaseCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn hub(&self) -> &Arc<CommunicationHub> {
        &self.hub
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    pub fn store(&self) -> Option<&InvestigationStore> {
        self.store.as_ref()
    }

    /// Run an investigation; failures become [`FinalAnalysis::failure`].
    pub async fn investigate(&self, question: &str) -> FinalAnalysis {
        self.investigate_with_context(question, "").await
    }

    pub async fn investigate_with_context(&self, question: &str, context: &str) -> FinalAnalysis {
        match self.try_investigate_with_context(question, context).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(question, error = %e, "Investigation failed");
                FinalAnalysis::failure(question, &e.to_string())
            }
        }
    }

    pub async fn try_investigate(&self, question: &str) -> Result<FinalAnalysis, WorkflowError> {
        self.try_investigate_with_context(question, "").await
    }

    pub async fn try_investigate_with_context(
        &self,
        question: &str,
        context: &str,
    ) -> Result<FinalAnalysis, WorkflowError> {
        let span = info_span!("investigation", question);
        self.run_phases(question, context).instrument(span).await
    }

    async fn run_phases(&self, question: &str, context: &str) -> Result<FinalAnalysis, WorkflowError> {
        let start = Instant::now();
        info!("Starting scientific investigation");

        // Agent timings of this run only; the shared monitor sees concurrent runs.
        let run = PerformanceMonitor::new();
        let result = self.run_agents(question, context, &run).await;
        let agent_metrics = run.metrics();
        self.monitor.absorb(agent_metrics.iter().cloned());
        let analysis = result?;

        let elapsed = start.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            supports = analysis.experimental_results.supports_hypothesis,
            "Investigation completed"
        );
        self.persist(&analysis, elapsed, agent_metrics);
        Ok(analysis)
    }

    async fn run_agents(
        &self,
        question: &str,
        context: &str,
        run: &PerformanceMonitor,
    ) -> Result<FinalAnalysis, WorkflowError> {
        let (hypothesis, guidance) = self
            .phase(WorkflowPhase::Theory, async {
                let hypothesis = run
                    .measure(
                        "generate_hypothesis",
                        self.theoretical.base().name(),
                        self.theoretical.generate_hypothesis(question, context),
                    )
                    .await?;
                let guidance = run
                    .measure(
                        "collaborate_on_experiment_design",
                        self.theoretical.base().name(),
                        self.theoretical.collaborate_on_experiment_design(&hypothesis),
                    )
                    .await?;
                Ok::<_, LlmError>((hypothesis, guidance))
            })
            .await?;

        self.phase(WorkflowPhase::TheoryHandoff, async {
            Ok::<_, LlmError>(
                self.hub
                    .theoretical_to_experimental_handoff(&hypothesis, &guidance),
            )
        })
        .await?;

        let (design, results) = self
            .phase(WorkflowPhase::Experiment, async {
                let design = run
                    .measure(
                        "design_experiment",
                        self.experimental.base().name(),
                        self.experimental.design_experiment(&hypothesis, &guidance),
                    )
                    .await?;
                let started = Instant::now();
                let results = self.experimental.execute_experiment(&design);
                run.record(
                    "execute_experiment",
                    self.experimental.base().name(),
                    started.elapsed(),
                    true,
                );
                Ok::<_, LlmError>((design, results))
            })
            .await?;

        self.phase(WorkflowPhase::ResultsHandoff, async {
            Ok::<_, LlmError>(self.hub.experimental_to_collector_handoff(&design, &results))
        })
        .await?;

        self.phase(WorkflowPhase::FinalAnalysis, async {
            run.measure(
                "analyze_and_aggregate",
                self.collector.base().name(),
                self.collector
                    .analyze_and_aggregate(question, &hypothesis, &design, &results, &guidance),
            )
            .await
        })
        .await
    }

    async fn phase<T, F>(&self, phase: WorkflowPhase, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        if let Some(callback) = &self.callback {
            callback.on_phase_start(phase).await;
        }
        let start = Instant::now();
        let result = fut.instrument(info_span!("phase", phase = phase.as_str())).await;
        let elapsed = start.elapsed();
        self.monitor
            .record(phase.as_str(), "workflow", elapsed, result.is_ok());

        match result {
            Ok(value) => {
                info!(
                    phase = phase.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Phase completed"
                );
                if let Some(callback) = &self.callback {
                    callback.on_phase_complete(phase, elapsed).await;
                }
                Ok(value)
            }
            Err(e) => Err(WorkflowError::PhaseFailed {
                phase: phase.as_str().to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn persist(&self, analysis: &FinalAnalysis, elapsed: Duration, metrics: Vec<OperationMetric>) {
        let Some(store) = &self.store else {
            return;
        };
        let record = InvestigationRecord::from_analysis(analysis, elapsed.as_secs_f64());
        if let Err(e) = store.save(&record) {
            warn!(error = %e, "Failed to save investigation record");
        }

        let rows: Vec<AgentPerformanceRecord> = metrics
            .into_iter()
            .map(|m| AgentPerformanceRecord {
                agent_name: m.agent,
                operation: m.operation,
                execution_time: m.execution_time,
                success: m.success,
                timestamp: record.created_at,
            })
            .collect();
        if let Err(e) = store.append_performance(&rows) {
            warn!(error = %e, "Failed to append performance records");
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        let agents_initialized = ["theoretical", "experimental", "collector"]
            .into_iter()
            .map(|name| (name.to_string(), true))
            .collect();
        WorkflowStatus {
            communication_history: self.hub.history(),
            shared_context: self.hub.shared_context(),
            agents_initialized,
            performance: self.monitor.report(),
        }
    }

    /// Token and cost totals per agent.
    pub async fn usage(&self) -> BTreeMap<String, AgentUsage> {
        let mut usage = BTreeMap::new();
        for agent in [
            self.theoretical.base(),
            self.experimental.base(),
            self.collector.base(),
        ] {
            usage.insert(agent.name().to_string(), agent.usage().await);
        }
        usage
    }
}
