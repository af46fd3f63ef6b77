//! Persistence of investigation records.
//!
//! All writes go through [`atomic_write`]: data lands in a uniquely named
//! `.tmp` sibling and is renamed over the target, so a crash never leaves a
//! half-written record.

use crate::schemas::{ExperimentalResults, FinalAnalysis};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const PERFORMANCE_FILE: &str = "performance.json";

/// Serialize `data` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Write `data` to a `{name}.{uuid}.tmp` sibling, then rename it over `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.{}.tmp", name, Uuid::new_v4().simple()));
    if let Err(e) = std::fs::write(&tmp, data) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
}

/// `Ok(None)` when the file does not exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// One completed investigation as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub id: Uuid,
    pub question: String,
    pub domain: String,
    pub hypothesis_statement: String,
    pub hypothesis_confidence: f64,
    pub mathematical_model: Option<String>,
    pub experiment_parameters: Map<String, Value>,
    pub experimental_results: ExperimentalResults,
    pub supports_hypothesis: bool,
    pub final_conclusion: String,
    pub created_at: DateTime<Utc>,
    /// Seconds.
    pub execution_time: f64,
}

impl InvestigationRecord {
    pub fn from_analysis(analysis: &FinalAnalysis, execution_time: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: analysis.scientific_question.clone(),
            domain: analysis.hypothesis.domain.clone(),
            hypothesis_statement: analysis.hypothesis.statement.clone(),
            hypothesis_confidence: analysis.hypothesis.confidence,
            mathematical_model: analysis.hypothesis.mathematical_model.clone(),
            experiment_parameters: analysis.experiment_design.parameters.clone(),
            experimental_results: analysis.experimental_results.clone(),
            supports_hypothesis: analysis.experimental_results.supports_hypothesis,
            final_conclusion: analysis.final_conclusion.clone(),
            created_at: Utc::now(),
            execution_time,
        }
    }

    pub fn summary(&self) -> InvestigationSummary {
        InvestigationSummary {
            id: self.id,
            question: self.question.clone(),
            domain: self.domain.clone(),
            supports_hypothesis: self.supports_hypothesis,
            created_at: self.created_at,
        }
    }
}

/// Listing entry for [`InvestigationStore::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSummary {
    pub id: Uuid,
    pub question: String,
    pub domain: String,
    pub supports_hypothesis: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-agent timing row appended to `performance.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformanceRecord {
    pub agent_name: String,
    pub operation: String,
    pub execution_time: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Directory of `investigations/{id}.json` files plus the performance log.
///
/// Clones share the lock that serializes performance appends.
#[derive(Debug, Clone)]
pub struct InvestigationStore {
    base_dir: PathBuf,
    performance_lock: Arc<Mutex<()>>,
}

impl InvestigationStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            performance_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn investigations_dir(&self) -> PathBuf {
        self.base_dir.join("investigations")
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.investigations_dir().join(format!("{id}.json"))
    }

    pub fn save(&self, record: &InvestigationRecord) -> io::Result<PathBuf> {
        let path = self.record_path(record.id);
        atomic_write_json(&path, record)?;
        tracing::debug!(id = %record.id, path = %path.display(), "Investigation saved");
        Ok(path)
    }

    pub fn load(&self, id: Uuid) -> io::Result<Option<InvestigationRecord>> {
        load_json(&self.record_path(id))
    }

    /// Summaries of every stored record, newest first. Unreadable files are skipped.
    pub fn list(&self) -> io::Result<Vec<InvestigationSummary>> {
        let dir = self.investigations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_json::<InvestigationRecord>(&path) {
                Ok(Some(record)) => summaries.push(record.summary()),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record")
                }
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    pub fn append_performance(&self, rows: &[AgentPerformanceRecord]) -> io::Result<()> {
        let _guard = self
            .performance_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let path = self.base_dir.join(PERFORMANCE_FILE);
        let mut existing: Vec<AgentPerformanceRecord> = load_json(&path)?.unwrap_or_default();
        existing.extend_from_slice(rows);
        atomic_write_json(&path, &existing)
    }

    pub fn performance(&self) -> io::Result<Vec<AgentPerformanceRecord>> {
        Ok(load_json(&self.base_dir.join(PERFORMANCE_FILE))?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(question: &str) -> InvestigationRecord {
        InvestigationRecord::from_analysis(&FinalAnalysis::failure(question, "boom"), 1.5)
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");
        atomic_write_json(&path, &vec![1, 2, 3]).unwrap();
        assert!(path.exists());
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
        let loaded: Option<Vec<i32>> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Vec<i32>> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_json::<Vec<i32>>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_save_and_load_record() {
        let dir = TempDir::new().unwrap();
        let store = InvestigationStore::new(dir.path());
        let rec = record("Why is the sky blue?");
        store.save(&rec).unwrap();
        let loaded = store.load(rec.id).unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert!(!loaded.supports_hypothesis);
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = InvestigationStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());

        let mut older = record("first");
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = record("second");
        store.save(&older).unwrap();
        store.save(&newer).unwrap();

        let questions: Vec<String> = store.list().unwrap().into_iter().map(|s| s.question).collect();
        assert_eq!(questions, vec!["second", "first"]);
    }

    #[test]
    fn test_performance_rows_append() {
        let dir = TempDir::new().unwrap();
        let store = InvestigationStore::new(dir.path());
        let row = AgentPerformanceRecord {
            agent_name: "TheoreticalAgent".into(),
            operation: "generate_hypothesis".into(),
            execution_time: 0.5,
            success: true,
            timestamp: Utc::now(),
        };
        store.append_performance(std::slice::from_ref(&row)).unwrap();
        store.append_performance(std::slice::from_ref(&row)).unwrap();
        assert_eq!(store.performance().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_performance_appends_keep_every_row() {
        let dir = TempDir::new().unwrap();
        let store = InvestigationStore::new(dir.path());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let row = AgentPerformanceRecord {
                        agent_name: format!("agent-{i}"),
                        operation: "analyze".into(),
                        execution_time: 0.1,
                        success: true,
                        timestamp: Utc::now(),
                    };
                    store.append_performance(&[row])
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(store.performance().unwrap().len(), 16);
    }
}
