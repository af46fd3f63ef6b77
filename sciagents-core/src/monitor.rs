//! Per-operation timing for agents and workflow phases.

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Operations slower than this are logged at `warn`.
pub const SLOW_OPERATION: Duration = Duration::from_secs(10);

/// One timed operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationMetric {
    pub operation: String,
    pub agent: String,
    /// Seconds.
    pub execution_time: f64,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentStatistics {
    pub count: usize,
    pub total_time: f64,
}

/// Aggregate view over everything recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub total_execution_time: f64,
    pub operations_count: usize,
    pub agent_statistics: BTreeMap<String, AgentStatistics>,
    pub slowest_operations: Vec<OperationMetric>,
}

/// Thread-safe collector of [`OperationMetric`]s.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    metrics: Mutex<Vec<OperationMetric>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, operation: &str, agent: &str, duration: Duration, success: bool) {
        if duration > SLOW_OPERATION {
            tracing::warn!(
                operation,
                agent,
                secs = duration.as_secs_f64(),
                "Slow operation"
            );
        }
        let metric = OperationMetric {
            operation: operation.to_string(),
            agent: agent.to_string(),
            execution_time: duration.as_secs_f64(),
            success,
        };
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(metric);
    }

    /// Time `fut` and record it, whether it succeeds or not.
    pub async fn measure<T, E, F>(&self, operation: &str, agent: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(operation, agent, start.elapsed(), result.is_ok());
        result
    }

    pub fn len(&self) -> usize {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every metric recorded so far.
    pub fn metrics(&self) -> Vec<OperationMetric> {
        self.metrics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Append metrics collected elsewhere, e.g. by a per-run monitor.
    pub fn absorb(&self, metrics: impl IntoIterator<Item = OperationMetric>) {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(metrics);
    }

    pub fn report(&self) -> PerformanceReport {
        let metrics = self.metrics.lock().unwrap_or_else(|e| e.into_inner());
        if metrics.is_empty() {
            return PerformanceReport {
                status: Some("No metrics collected".to_string()),
                ..PerformanceReport::default()
            };
        }

        let mut agent_statistics: BTreeMap<String, AgentStatistics> = BTreeMap::new();
        for metric in metrics.iter() {
            let stats = agent_statistics.entry(metric.agent.clone()).or_default();
            stats.count += 1;
            stats.total_time += metric.execution_time;
        }

        let mut slowest = metrics.clone();
        slowest.sort_by(|a, b| b.execution_time.total_cmp(&a.execution_time));
        slowest.truncate(5);

        PerformanceReport {
            status: None,
            total_execution_time: metrics.iter().map(|m| m.execution_time).sum(),
            operations_count: metrics.len(),
            agent_statistics,
            slowest_operations: slowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_report() {
        let monitor = PerformanceMonitor::new();
        let report = monitor.report();
        assert_eq!(report.status.as_deref(), Some("No metrics collected"));
        assert_eq!(report.operations_count, 0);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "No metrics collected");
    }

    #[test]
    fn test_agent_statistics_and_slowest() {
        let monitor = PerformanceMonitor::new();
        for ms in [100u64, 400, 200, 50, 300, 250] {
            monitor.record("think", "theoretical", Duration::from_millis(ms), true);
        }
        monitor.record("execute", "experimental", Duration::from_millis(10), false);

        let report = monitor.report();
        assert_eq!(report.status, None);
        assert_eq!(report.operations_count, 7);
        assert_eq!(report.agent_statistics["theoretical"].count, 6);
        assert!((report.agent_statistics["theoretical"].total_time - 1.3).abs() < 1e-9);
        assert_eq!(report.slowest_operations.len(), 5);
        assert_eq!(report.slowest_operations[0].execution_time, 0.4);
        assert!((report.total_execution_time - 1.31).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_measure_records_errors() {
        let monitor = PerformanceMonitor::new();
        let ok: Result<u8, String> = monitor.measure("a", "x", async { Ok(1) }).await;
        let err: Result<u8, String> = monitor
            .measure("b", "x", async { Err("boom".to_string()) })
            .await;
        assert_eq!(ok, Ok(1));
        assert!(err.is_err());
        assert_eq!(monitor.len(), 2);
        let report = monitor.report();
        assert_eq!(report.agent_statistics["x"].count, 2);
        assert!(
            report
                .slowest_operations
                .iter()
                .any(|m| m.operation == "b" && !m.success)
        );
    }

    #[test]
    fn test_absorb_merges_run_metrics() {
        let shared = PerformanceMonitor::new();
        shared.record("theory", "workflow", Duration::from_millis(5), true);
        let run = PerformanceMonitor::new();
        run.record("think", "theoretical", Duration::from_millis(20), true);

        shared.absorb(run.metrics());
        assert_eq!(shared.len(), 2);
        assert_eq!(run.metrics().len(), 1);
        assert_eq!(shared.report().agent_statistics["theoretical"].count, 1);
    }
}
