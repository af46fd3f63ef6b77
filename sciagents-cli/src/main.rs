//! SciAgents CLI: terminal front end for multi-agent scientific investigations.
//!
//! Supports single-question, interactive, batch and benchmark modes, plus
//! subcommands for configuration, the REST server, history and refinement.

mod batch;
mod benchmark;
mod commands;
mod repl;

use clap::Parser;
use sciagents_core::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// SciAgents: multi-agent scientific investigation system
#[derive(Parser, Debug)]
#[command(name = "sciagents", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Scientific question to investigate
    question: Option<String>,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Run every question in FILE (one per line, `#` for comments)
    #[arg(short, long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Check configuration and credentials, then exit
    #[arg(long)]
    config_check: bool,

    /// Show example questions by domain
    #[arg(long)]
    examples: bool,

    /// Time investigations across four domains
    #[arg(long)]
    benchmark: bool,

    /// Runs per domain for --benchmark
    #[arg(long, default_value_t = 3)]
    runs: usize,

    /// Use the scripted mock provider instead of a real LLM
    #[arg(long)]
    offline: bool,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Output format: text, markdown, json, yaml
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Serve the REST API
    Serve {
        /// Bind address (defaults to server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port (defaults to server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Browse recorded investigations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Iteratively refine a hypothesis until it is confident enough
    Refine {
        /// Research topic or question
        question: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum HistoryAction {
    /// List recorded investigations, newest first
    List,
    /// Show one recorded investigation
    Show {
        /// Investigation id
        id: uuid::Uuid,
    },
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(log_filter(cli.verbose, cli.quiet)));

    let log_dir = directories::ProjectDirs::from("dev", "sciagents", "sciagents")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sciagents.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = sciagents_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let opts = repl::RunOptions {
        workspace,
        offline: cli.offline,
        format: cli.format,
    };

    if let Some(command) = cli.command {
        return commands::handle_command(command, config, &opts).await;
    }
    if cli.config_check {
        return commands::config_check(&config, &opts);
    }
    if cli.examples {
        commands::print_examples();
        return Ok(());
    }
    if cli.benchmark {
        return benchmark::run(cli.runs, &config, &opts).await;
    }
    if let Some(path) = &cli.batch {
        return batch::run(path, &config, &opts).await;
    }

    match cli.question {
        Some(question) if !cli.interactive => repl::run_single(&question, &config, &opts).await,
        _ => repl::run_interactive(&config, &opts).await,
    }
}
