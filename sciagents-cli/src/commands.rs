//! Subcommand handlers and informational modes.

use crate::repl::{RunOptions, build_provider, build_workflow, investigation_store};
use crate::{Commands, ConfigAction, HistoryAction};
use sciagents_core::config::{SciConfig, workspace_config_path};
use sciagents_core::server::{self, AppState};
use sciagents_core::store::InvestigationStore;
use sciagents_core::workflow::{RefinementLoop, StopReason};
use std::path::Path;
use std::sync::Arc;

pub(crate) const EXAMPLE_QUESTIONS: [(&str, [&str; 4]); 5] = [
    (
        "Physics",
        [
            "How does temperature affect electrical resistance?",
            "What is the relationship between force and acceleration?",
            "How does frequency affect wave energy?",
            "What factors influence pendulum oscillation period?",
        ],
    ),
    (
        "Chemistry",
        [
            "How does concentration affect reaction rate?",
            "What is the effect of temperature on chemical equilibrium?",
            "How does pH affect enzyme activity?",
            "What factors influence catalyst effectiveness?",
        ],
    ),
    (
        "Biology",
        [
            "How does light intensity affect photosynthesis rate?",
            "What factors influence population growth?",
            "How does temperature affect enzyme function?",
            "What is the relationship between nutrient availability and plant growth?",
        ],
    ),
    (
        "Environmental Science",
        [
            "How does air pollution affect ecosystem health?",
            "What factors influence carbon sequestration?",
            "How does deforestation affect local climate?",
            "What is the impact of ocean acidification on marine life?",
        ],
    ),
    (
        "Engineering",
        [
            "How does material thickness affect structural strength?",
            "What factors influence solar panel efficiency?",
            "How does aerodynamics affect fuel consumption?",
            "What is the relationship between design parameters and performance?",
        ],
    ),
];

pub async fn handle_command(
    command: Commands,
    config: SciConfig,
    opts: &RunOptions,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, &opts.workspace),
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let workflow = Arc::new(build_workflow(&config, opts, false));
            println!("Serving SciAgents API on http://{}:{}", host, port);
            server::run(AppState::new(workflow), &host, port).await?;
            Ok(())
        }
        Commands::History { action } => handle_history(action, &investigation_store(&config, opts)),
        Commands::Refine { question } => refine(&question, &config, opts).await,
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&SciConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = sciagents_core::config::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn handle_history(action: HistoryAction, store: &InvestigationStore) -> anyhow::Result<()> {
    match action {
        HistoryAction::List => print_history(store),
        HistoryAction::Show { id } => match store.load(id)? {
            Some(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(())
            }
            None => anyhow::bail!("No investigation with id {}", id),
        },
    }
}

pub(crate) fn print_history(store: &InvestigationStore) -> anyhow::Result<()> {
    let summaries = store.list()?;
    if summaries.is_empty() {
        println!("No recorded investigations in {}", store.base_dir().display());
        return Ok(());
    }
    println!("Recorded investigations ({}):", summaries.len());
    for s in summaries {
        println!(
            "  {}  {}  [{}] {}{}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.domain,
            s.question,
            if s.supports_hypothesis { "  (supported)" } else { "" }
        );
    }
    Ok(())
}

async fn refine(question: &str, config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    let refinement = RefinementLoop::new(build_provider(config, opts.offline), config);
    let outcome = refinement.run(question).await;

    for turn in &outcome.turns {
        println!("\n--- Turn {} ---", turn.turn);
        println!("Hypothesis: {}", turn.hypothesis.statement);
        println!(
            "Experiment: supports={} confidence={:.2}",
            turn.results.supports_hypothesis, turn.results.confidence
        );
        println!("Analysis: {}", turn.analysis.summary);
        if let Some(review) = &turn.literature {
            println!("Literature: {}", review.sources.join(", "));
        }
    }

    let reason = match outcome.stop_reason {
        StopReason::ConfidenceReached => "confidence threshold reached",
        StopReason::MaxTurns => "maximum turns reached",
        StopReason::Failed => "turn failed",
    };
    println!(
        "\nConversation ended after {} turns with confidence: {:.2} ({})",
        outcome.turns.len(),
        outcome.confidence,
        reason
    );
    if let Some(error) = outcome.error {
        anyhow::bail!(error);
    }
    Ok(())
}

pub fn config_check(config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    println!("Provider: {}", config.llm.provider);
    println!("Model: {}", config.llm.model);
    println!(
        "Config file: {}",
        if sciagents_core::config::config_exists(Some(&opts.workspace)) {
            "found"
        } else {
            "none (using defaults)"
        }
    );
    for warning in config.validate() {
        println!("Warning: {}", warning);
    }
    match config.llm.check_credentials() {
        Ok(()) => {
            println!("✓ Configuration is valid");
            Ok(())
        }
        Err(e) => anyhow::bail!("✗ {}", e),
    }
}

pub fn print_examples() {
    println!("Example Scientific Questions by Domain");
    println!("{}", "=".repeat(80));
    for (domain, questions) in EXAMPLE_QUESTIONS {
        println!("\n{}:", domain);
        for (i, question) in questions.iter().enumerate() {
            println!("  {}. {}", i + 1, question);
        }
    }
    println!("\n{}", "=".repeat(80));
    println!("Usage: sciagents \"Your question here\"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sciagents_core::OutputFormat;
    use tempfile::TempDir;

    fn opts(dir: &TempDir) -> RunOptions {
        RunOptions {
            workspace: dir.path().to_path_buf(),
            offline: true,
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();

        let config_path = dir.path().join(".sciagents").join("config.toml");
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: SciConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed.llm.model, "gemini-2.0-flash");
        assert_eq!(parsed.workflow.max_turns, 5);
    }

    #[test]
    fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        let path = dir.path().join(".sciagents").join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"custom\"\n").unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("custom"));
    }

    #[test]
    fn test_history_show_unknown_id() {
        let dir = TempDir::new().unwrap();
        let store = InvestigationStore::new(dir.path());
        assert!(handle_history(HistoryAction::List, &store).is_ok());
        let err = handle_history(
            HistoryAction::Show {
                id: uuid::Uuid::new_v4(),
            },
            &store,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("No investigation with id"));
    }

    #[tokio::test]
    async fn test_refine_offline_completes() {
        let dir = TempDir::new().unwrap();
        let mut config = SciConfig::default();
        config.llm.retry.max_retries = 0;
        config.workflow.max_turns = 2;
        refine("How does force affect motion?", &config, &opts(&dir))
            .await
            .unwrap();
    }

    #[test]
    fn test_examples_cover_five_domains() {
        assert_eq!(EXAMPLE_QUESTIONS.len(), 5);
        assert!(EXAMPLE_QUESTIONS.iter().all(|(_, qs)| qs.len() == 4));
    }
}
