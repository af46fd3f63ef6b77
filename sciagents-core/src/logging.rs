//! Structured log events shared by agents, the hub and the workflow.
//!
//! Subscriber setup lives in the binary; these helpers only fix the field
//! names so log consumers can filter on them.

use tracing::info;

pub fn log_agent_action(agent: &str, action: &str, details: &str) {
    info!(
        target: "sciagents::agents",
        agent,
        action,
        details,
        "Agent action"
    );
}

pub fn log_communication(from: &str, to: &str, message_type: &str) {
    info!(
        target: "sciagents::communication",
        from,
        to,
        message_type,
        "Agent communication"
    );
}

pub fn log_experiment(experiment_id: &str, status: &str, details: &str) {
    info!(
        target: "sciagents::experiments",
        experiment_id,
        status,
        details,
        "Experiment event"
    );
}
