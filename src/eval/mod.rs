//! Offline Evaluation
//!
//! Reads the golden task set (JSON Lines, one `{"task_family", "input"}`
//! object per line) and reports counts per family plus classifier accuracy
//! on the lines that carry an input. No backend is contacted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::router::Classifier;
use crate::types::{EscalatorError, Result, TaskFamily};

/// One golden line
#[derive(Debug, Clone, Deserialize)]
pub struct GoldenTask {
    /// 1-based line number in the golden file
    #[serde(skip)]
    pub line: usize,
    #[serde(default)]
    pub task_family: Option<TaskFamily>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub line: usize,
    pub expected: TaskFamily,
    pub predicted: TaskFamily,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifierAccuracy {
    pub labelled: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub mismatches: Vec<Mismatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub file: PathBuf,
    pub total: usize,
    pub golden_counts: BTreeMap<TaskFamily, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<ClassifierAccuracy>,
}

/// Parse the golden file. A missing file is an empty set.
pub fn load_golden(path: &Path) -> Result<Vec<GoldenTask>> {
    if !path.exists() {
        debug!(path = %path.display(), "Golden file not found");
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let mut task: GoldenTask = serde_json::from_str(line).map_err(|e| {
                EscalatorError::Config(format!(
                    "Invalid golden task at {}:{}: {}",
                    path.display(),
                    i + 1,
                    e
                ))
            })?;
            task.line = i + 1;
            Ok(task)
        })
        .collect()
}

/// Evaluate the first `limit` golden tasks (all when `None`)
pub fn evaluate(path: &Path, classifier: &Classifier, limit: Option<usize>) -> Result<EvalReport> {
    let tasks = load_golden(path)?;
    let tasks = &tasks[..limit.unwrap_or(tasks.len()).min(tasks.len())];

    let mut golden_counts = BTreeMap::new();
    let mut accuracy = ClassifierAccuracy::default();

    for task in tasks {
        let Some(expected) = &task.task_family else {
            continue;
        };
        *golden_counts.entry(expected.clone()).or_insert(0) += 1;

        if let Some(input) = &task.input {
            accuracy.labelled += 1;
            let predicted = classifier.classify(input);
            if &predicted == expected {
                accuracy.correct += 1;
            } else {
                accuracy.mismatches.push(Mismatch {
                    line: task.line,
                    expected: expected.clone(),
                    predicted,
                });
            }
        }
    }

    let classifier = (accuracy.labelled > 0).then(|| {
        accuracy.accuracy = accuracy.correct as f64 / accuracy.labelled as f64;
        accuracy
    });

    Ok(EvalReport {
        file: path.to_path_buf(),
        total: tasks.len(),
        golden_counts,
        classifier,
    })
}
