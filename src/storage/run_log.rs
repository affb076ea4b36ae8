//! Run Log
//!
//! One pretty-printed JSON file per request under
//! `<run_dir>/<YYYYMMDD>/run_<HHMMSS>_<micros>_<id>.json`. Files are opened
//! with create-new semantics and carry a random suffix, so concurrent writers
//! never share or clobber a file and need no lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::ai::validation::Signal;
use crate::constants::scoring;
use crate::router::DecodingOptions;
use crate::types::{Result, TaskFamily};

/// Heuristic quality score: 1.0 when valid, otherwise 0.6 minus 0.1 per
/// signal, floored at 0
pub fn proxy_score(ok: bool, signal_count: usize) -> f64 {
    if ok {
        1.0
    } else {
        (scoring::INVALID_BASE_SCORE - scoring::SIGNAL_PENALTY * signal_count as f64).max(0.0)
    }
}

/// Immutable record of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub ts: DateTime<Utc>,
    pub task_family: TaskFamily,
    pub user_input: String,
    pub options: DecodingOptions,
    pub steps: Vec<StepRecord>,
    pub outcome: OutcomeRecord,
}

/// One escalation step: every candidate and the winner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Ladder index
    pub position: usize,
    pub model: String,
    pub candidates: Vec<CandidateRecord>,
    pub winner: WinnerRecord,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub variant: usize,
    pub ok: bool,
    pub signals: Vec<Signal>,
    pub elapsed_ms: u64,
    pub repaired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub index: usize,
    pub ok: bool,
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub state: String,
    pub model: String,
    pub position: usize,
    pub ok: bool,
    pub signals: Vec<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub score: f64,
}

/// Append-only destination for run records
pub trait RunSink: Send + Sync {
    /// Store `record`, returning where it went
    fn append(&self, record: &RunRecord) -> Result<String>;
}

/// File-backed run log
#[derive(Debug, Clone)]
pub struct FsRunLog {
    run_dir: PathBuf,
}

impl FsRunLog {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    fn file_path(&self, now: DateTime<Utc>) -> PathBuf {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.run_dir
            .join(now.format("%Y%m%d").to_string())
            .join(format!(
                "run_{}_{}.json",
                now.format("%H%M%S_%6f"),
                &suffix[..8]
            ))
    }
}

impl RunSink for FsRunLog {
    fn append(&self, record: &RunRecord) -> Result<String> {
        let path = self.file_path(Utc::now());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        debug!(path = %path.display(), run_id = %record.run_id, "Wrote run record");
        Ok(path.display().to_string())
    }
}

/// In-memory sink, mostly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl RunSink for MemoryRunLog {
    fn append(&self, record: &RunRecord) -> Result<String> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| crate::types::EscalatorError::Config("run log lock poisoned".to_string()))?;
        records.push(record.clone());
        Ok(format!("memory:{}", records.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> RunRecord {
        RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            ts: Utc::now(),
            task_family: TaskFamily::new("extraction"),
            user_input: "Extract the total".to_string(),
            options: DecodingOptions::default(),
            steps: vec![StepRecord {
                position: 0,
                model: "qwen2.5:3b-instruct".to_string(),
                candidates: vec![CandidateRecord {
                    variant: 0,
                    ok: true,
                    signals: vec![],
                    elapsed_ms: 12,
                    repaired: false,
                }],
                winner: WinnerRecord {
                    index: 0,
                    ok: true,
                    signals: vec![],
                },
                score: 1.0,
            }],
            outcome: OutcomeRecord {
                state: "accepted".to_string(),
                model: "qwen2.5:3b-instruct".to_string(),
                position: 0,
                ok: true,
                signals: vec![],
                warning: None,
                score: 1.0,
            },
        }
    }

    #[test]
    fn test_proxy_score() {
        assert_eq!(proxy_score(true, 3), 1.0);
        assert!((proxy_score(false, 0) - 0.6).abs() < 1e-9);
        assert!((proxy_score(false, 2) - 0.4).abs() < 1e-9);
        assert_eq!(proxy_score(false, 9), 0.0);
    }

    #[test]
    fn test_append_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let log = FsRunLog::new(dir.path());
        let location = log.append(&record()).unwrap();

        let path = PathBuf::from(&location);
        assert!(path.starts_with(dir.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("run_") && name.ends_with(".json"));
        let day = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(day.len(), 8);

        let parsed: RunRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.outcome.state, "accepted");
        assert_eq!(parsed.steps[0].candidates.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_never_collide() {
        let dir = TempDir::new().unwrap();
        let log = FsRunLog::new(dir.path());

        let locations: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| log.append(&record()).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut unique = locations.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 16);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryRunLog::new();
        assert_eq!(sink.append(&record()).unwrap(), "memory:0");
        assert_eq!(sink.records().len(), 1);
    }
}
