//! Wall-clock benchmark of full investigations across domains.

use crate::repl::{RunOptions, build_workflow};
use sciagents_core::config::SciConfig;
use sciagents_core::stats;
use std::time::Instant;

const QUESTIONS: [(&str, &str); 4] = [
    ("Physics", "How does force affect acceleration?"),
    ("Chemistry", "How does temperature affect reaction rate?"),
    ("Biology", "How does light affect photosynthesis?"),
    ("Environmental", "How does pollution affect air quality?"),
];

/// Mean and sample standard deviation in seconds; stdev is 0 for one run.
pub(crate) fn summarize(times: &[f64]) -> (f64, f64) {
    let std = if times.len() > 1 {
        stats::sample_variance(times).sqrt()
    } else {
        0.0
    };
    (stats::mean(times), std)
}

pub async fn run(runs: usize, config: &SciConfig, opts: &RunOptions) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.workflow.record_investigations = false;
    let workflow = build_workflow(&config, opts, false);
    let runs = runs.max(1);

    println!("Benchmarking Scientific Investigation Speed");
    println!("{}", "=".repeat(60));

    let mut summary = Vec::new();
    for (domain, question) in QUESTIONS {
        println!("\nTesting {}: {}", domain, question);
        let mut times = Vec::with_capacity(runs);
        for run in 1..=runs {
            let start = Instant::now();
            match workflow.try_investigate(question).await {
                Ok(_) => {
                    times.push(start.elapsed().as_secs_f64());
                    println!("  ✓ Run {}: {:.1}s", run, start.elapsed().as_secs_f64());
                }
                Err(e) => println!("  ✗ Run {}: Error - {}", run, e),
            }
        }
        if !times.is_empty() {
            let (avg, std) = summarize(&times);
            println!("  Average: {:.1}s ± {:.1}s", avg, std);
            summary.push((domain, avg, std, times.len()));
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK SUMMARY");
    println!("{}", "=".repeat(60));
    for (domain, avg, std, ok) in summary {
        println!(
            "{:15} | {:6.1}s ± {:4.1}s | {}/{} success",
            domain, avg, std, ok, runs
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let (mean, std) = summarize(&[1.0, 2.0, 3.0]);
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);
        assert_eq!(summarize(&[4.0]), (4.0, 0.0));
    }
}
