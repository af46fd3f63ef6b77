//! Batch mode: investigate every question in a file.

use crate::repl::{RunOptions, build_workflow};
use sciagents_core::config::SciConfig;
use sciagents_core::report::write_batch_results;
use std::path::Path;

/// Non-empty lines that do not start with `#`.
pub(crate) fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

pub async fn run(path: &Path, config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Questions file not found: {} ({})", path.display(), e))?;
    let questions = parse_questions(&text);
    tracing::info!(count = questions.len(), "Running batch mode");

    let workflow = build_workflow(config, opts, false);
    let mut results = Vec::with_capacity(questions.len());
    for (i, question) in questions.iter().enumerate() {
        println!("\nInvestigation {}/{}: {}", i + 1, questions.len(), question);
        match workflow.try_investigate(question).await {
            Ok(analysis) => {
                tracing::info!(index = i + 1, "Completed investigation");
                println!("  ✓ {}", analysis.final_conclusion);
                results.push((question.clone(), Some(analysis)));
            }
            Err(e) => {
                tracing::error!(index = i + 1, error = %e, "Failed investigation");
                println!("  ✗ {}", e);
                results.push((question.clone(), None));
            }
        }
    }

    let path = write_batch_results(&config.storage.results_path(&opts.workspace), &results)?;
    println!("\nBatch results saved to: {}", path.display());
    Ok(())
}
