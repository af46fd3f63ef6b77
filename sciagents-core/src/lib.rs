//! # SciAgents Core
//!
//! Core library for the SciAgents investigation orchestrator.
//! Provides the LLM interface (brain), the scientific agents, the
//! experiment simulator, inter-agent communication, the investigation
//! workflow, persistence and the REST wrapper.

pub mod agents;
pub mod brain;
pub mod communication;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod parsing;
pub mod providers;
pub mod report;
pub mod schemas;
pub mod server;
pub mod simulation;
pub mod stats;
pub mod store;
pub mod types;
pub mod workflow;

// Re-export commonly used types at the crate root.
pub use agents::{AgentSettings, AnalysisAgent, CollectorAgent, ExperimentalAgent, TheoreticalAgent};
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use communication::{AgentEndpoint, AgentProtocol, CommunicationHub};
pub use config::{SciConfig, load_config};
pub use domain::Domain;
pub use error::{Result, SciError};
pub use monitor::{PerformanceMonitor, PerformanceReport};
pub use report::OutputFormat;
pub use schemas::{
    CommunicationMessage, ExperimentDesign, ExperimentalResults, FinalAnalysis, Hypothesis,
    TheoreticalGuidance,
};
pub use simulation::{GenericSimulator, PendulumSimulator};
pub use store::{InvestigationRecord, InvestigationStore};
pub use workflow::{
    PhaseCallback, RefinementLoop, RefinementOutcome, ScientificWorkflow, StopReason,
    WorkflowPhase, WorkflowStatus,
};
