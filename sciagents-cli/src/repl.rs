//! Single-question and interactive investigation modes.

use sciagents_core::brain::{LlmProvider, MockLlmProvider};
use sciagents_core::config::SciConfig;
use sciagents_core::report::{OutputFormat, render_summary};
use sciagents_core::store::InvestigationStore;
use sciagents_core::workflow::{PhaseCallback, ScientificWorkflow, WorkflowPhase};
use sciagents_core::FinalAnalysis;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Options shared by every run mode.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub workspace: PathBuf,
    pub offline: bool,
    pub format: OutputFormat,
}

/// Prints phase progress to stdout.
pub(crate) struct CliProgress;

#[async_trait::async_trait]
impl PhaseCallback for CliProgress {
    async fn on_phase_start(&self, phase: WorkflowPhase) {
        println!("\x1b[90m  → {}...\x1b[0m", phase.label());
    }

    async fn on_phase_complete(&self, phase: WorkflowPhase, elapsed: Duration) {
        println!(
            "\x1b[32m  ✓ {}\x1b[0m \x1b[90m({:.1}s)\x1b[0m",
            phase.label(),
            elapsed.as_secs_f64()
        );
    }
}

/// The configured provider, or the mock when offline or misconfigured.
pub(crate) fn build_provider(config: &SciConfig, offline: bool) -> Arc<dyn LlmProvider> {
    if offline || config.llm.provider == "mock" {
        return Arc::new(MockLlmProvider::new());
    }
    if let Err(e) = config.llm.check_credentials() {
        tracing::warn!("{}. Using mock provider.", e);
        return Arc::new(MockLlmProvider::new());
    }
    match sciagents_core::providers::create_provider(&config.llm) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("LLM provider init failed: {}. Using mock.", e);
            Arc::new(MockLlmProvider::new())
        }
    }
}

pub(crate) fn investigation_store(config: &SciConfig, opts: &RunOptions) -> InvestigationStore {
    InvestigationStore::new(config.storage.data_path(&opts.workspace))
}

/// A workflow with the store attached when recording is enabled.
pub(crate) fn build_workflow(
    config: &SciConfig,
    opts: &RunOptions,
    progress: bool,
) -> ScientificWorkflow {
    let mut workflow = ScientificWorkflow::new(build_provider(config, opts.offline), config);
    if config.workflow.record_investigations {
        workflow = workflow.with_store(investigation_store(config, opts));
    }
    if progress {
        workflow = workflow.with_callback(Arc::new(CliProgress));
    }
    workflow
}

pub(crate) fn print_analysis(analysis: &FinalAnalysis, format: OutputFormat) {
    println!("{}", render_summary(analysis, format));
}

pub async fn run_single(question: &str, config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    let workflow = build_workflow(config, opts, opts.format == OutputFormat::Text);
    if opts.format == OutputFormat::Text {
        println!("\n\x1b[1mInvestigating:\x1b[0m {}\n", question);
    }
    let analysis = workflow.investigate(question).await;
    print_analysis(&analysis, opts.format);
    if analysis.is_failure() {
        anyhow::bail!("investigation failed");
    }
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /help              Show this help");
    println!("  /status            Communication and performance status");
    println!("  /cost              Token usage and estimated cost per agent");
    println!("  /history           Recorded investigations");
    println!("  /format <fmt>      Switch output format (text, markdown, json, yaml)");
    println!("  /quit              Exit");
    println!("Anything else is investigated as a scientific question.");
}

pub async fn run_interactive(config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    println!("\x1b[1;32m");
    println!("  SciAgents - Multi-Agent Scientific Investigation");
    println!("\x1b[0m");
    println!(
        "  Model: {} | Workspace: {}",
        if opts.offline { "mock" } else { config.llm.model.as_str() },
        opts.workspace.display()
    );
    println!("  Type /help for commands, /quit to exit\n");

    let workflow = build_workflow(config, opts, true);
    let mut format = opts.format;

    let stdin = io::stdin();
    loop {
        print!("\x1b[1;34mquestion> \x1b[0m");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            let (cmd, arg) = input.split_once(' ').unwrap_or((input, ""));
            match cmd {
                "/quit" | "/exit" | "/q" => {
                    println!("Goodbye!");
                    break;
                }
                "/help" | "/?" => print_help(),
                "/status" => {
                    println!("{}", serde_json::to_string_pretty(&workflow.status())?);
                }
                "/cost" => {
                    for (agent, usage) in workflow.usage().await {
                        println!(
                            "{:<20} {} in / {} out  ${:.4}",
                            agent,
                            usage.tokens.input_tokens,
                            usage.tokens.output_tokens,
                            usage.cost.total()
                        );
                    }
                }
                "/history" => match workflow.store() {
                    Some(store) => crate::commands::print_history(store)?,
                    None => println!("Recording is disabled (workflow.record_investigations)."),
                },
                "/format" => match arg.trim().parse::<OutputFormat>() {
                    Ok(f) => {
                        format = f;
                        println!("Output format: {:?}", format);
                    }
                    Err(e) => println!("{}", e),
                },
                other => println!("Unknown command: {}. Type /help.", other),
            }
            continue;
        }

        let analysis = workflow.investigate(input).await;
        print_analysis(&analysis, format);
    }
    Ok(())
}
