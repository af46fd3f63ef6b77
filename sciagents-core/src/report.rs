//! Rendering of investigation results for terminals and files.

use crate::schemas::FinalAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const BATCH_TITLE: &str = "Multi-Agent Scientific Investigation - Batch Results";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

pub fn render_summary(analysis: &FinalAnalysis, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(analysis),
        OutputFormat::Markdown => render_markdown(analysis),
        OutputFormat::Json => serde_json::to_string_pretty(analysis)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputFormat::Yaml => {
            serde_yaml::to_string(analysis).unwrap_or_else(|e| format!("error: {}\n", e))
        }
    }
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn render_text(a: &FinalAnalysis) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "SCIENTIFIC INVESTIGATION RESULTS");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Research Question: {}", a.scientific_question);
    let _ = writeln!(out);
    let _ = writeln!(out, "Hypothesis: {}", a.hypothesis.statement);
    let _ = writeln!(out, "Theoretical Confidence: {}", percent(a.hypothesis.confidence));
    let _ = writeln!(
        out,
        "Mathematical Model: {}",
        a.hypothesis.mathematical_model.as_deref().unwrap_or("None")
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Experimental Findings:");
    let _ = writeln!(
        out,
        "  Supports Hypothesis: {}",
        a.experimental_results.supports_hypothesis
    );
    let _ = writeln!(
        out,
        "  Experimental Confidence: {}",
        percent(a.experimental_results.confidence)
    );
    let _ = writeln!(out, "  Analysis: {}", a.experimental_results.analysis);
    let _ = writeln!(out);
    let _ = writeln!(out, "Final Scientific Conclusion:");
    let _ = writeln!(out, "  {}", a.final_conclusion);
    let _ = writeln!(out);
    let _ = writeln!(out, "Theory vs Experiment Agreement:");
    let _ = writeln!(out, "  {}", a.theoretical_vs_experimental);
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommended Future Research:");
    for (i, direction) in a.future_research.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, direction);
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn render_markdown(a: &FinalAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", a.scientific_question);
    let _ = writeln!(out, "## Hypothesis\n");
    let _ = writeln!(out, "{}\n", a.hypothesis.statement);
    let _ = writeln!(out, "| Field | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Domain | {} |", a.hypothesis.domain);
    let _ = writeln!(
        out,
        "| Theoretical confidence | {} |",
        percent(a.hypothesis.confidence)
    );
    let _ = writeln!(
        out,
        "| Mathematical model | {} |",
        a.hypothesis.mathematical_model.as_deref().unwrap_or("None")
    );
    let _ = writeln!(
        out,
        "| Supports hypothesis | {} |",
        a.experimental_results.supports_hypothesis
    );
    let _ = writeln!(
        out,
        "| Experimental confidence | {} |",
        percent(a.experimental_results.confidence)
    );
    let _ = writeln!(out, "| Confidence level | {} |\n", a.confidence_level);
    let _ = writeln!(out, "## Experiment\n");
    let _ = writeln!(out, "{}\n", a.experimental_results.analysis);
    let _ = writeln!(out, "## Conclusion\n");
    let _ = writeln!(out, "{}\n", a.final_conclusion);
    let _ = writeln!(out, "## Future Research\n");
    for direction in &a.future_research {
        let _ = writeln!(out, "- {}", direction);
    }
    out
}

/// Plain-text layout of a batch run; `None` marks a failed investigation.
pub fn render_batch_results(results: &[(String, Option<FinalAnalysis>)]) -> String {
    let heavy = "=".repeat(80);
    let light = "-".repeat(60);
    let mut out = format!("{BATCH_TITLE}\n{heavy}\n\n");
    for (i, (question, analysis)) in results.iter().enumerate() {
        let _ = writeln!(out, "Investigation {}: {}", i + 1, question);
        let _ = writeln!(out, "{light}");
        match analysis {
            Some(a) => {
                let _ = writeln!(out, "Hypothesis: {}", a.hypothesis.statement);
                let _ = writeln!(out, "Conclusion: {}", a.final_conclusion);
                let _ = writeln!(
                    out,
                    "Supports Hypothesis: {}",
                    a.experimental_results.supports_hypothesis
                );
            }
            None => {
                let _ = writeln!(out, "Status: FAILED");
            }
        }
        let _ = write!(out, "\n{heavy}\n\n");
    }
    out
}

/// Write the batch layout to `dir/batch_results_{timestamp}.txt`.
pub fn write_batch_results(
    dir: &Path,
    results: &[(String, Option<FinalAnalysis>)],
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "batch_results_{}.txt",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, render_batch_results(results))?;
    Ok(path)
}

/// One column per series; shorter series leave trailing cells empty.
pub fn raw_data_csv(raw_data: &BTreeMap<String, Vec<f64>>) -> String {
    let mut out = raw_data.keys().cloned().collect::<Vec<_>>().join(",");
    out.push('\n');
    let rows = raw_data.values().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        let cells: Vec<String> = raw_data
            .values()
            .map(|series| series.get(row).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
