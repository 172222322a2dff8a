use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CuaError, CuaResult};

/// One recorded step of a task trace (one JSONL line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStep {
    /// Ground-truth action.
    pub action: String,
    /// Screenshot path relative to the image base directory.
    pub screenshot: String,
    /// Memory fields are free-form; non-string values are rendered as JSON text.
    #[serde(default)]
    pub thought: Option<Value>,
    #[serde(default, rename = "second instruction")]
    pub second_instruction: Option<Value>,
}

impl EvaluationStep {
    /// Instruction text handed to the agent, embedding the recorded memory fields.
    pub fn instruction(&self) -> String {
        format!(
            "These are your memories from the last time you performed this task.\n\
             {}\n\
             {}\n\
             Given the screenshot as below. What's the next step that you will do to help with the task?",
            memory_text(self.thought.as_ref()),
            memory_text(self.second_instruction.as_ref()),
        )
    }
}

fn memory_text(field: Option<&Value>) -> String {
    match field {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One non-blank line of a task file, in file order.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRecord {
    Step(EvaluationStep),
    /// The line is not a usable step record; it still counts toward the task total.
    Invalid { line: usize, error: String },
}

impl From<EvaluationStep> for StepRecord {
    fn from(step: EvaluationStep) -> Self {
        StepRecord::Step(step)
    }
}

/// Parse JSONL task content. Blank lines are ignored; every other line yields a record.
pub fn parse_task_steps(content: &str, source: &str) -> Vec<StepRecord> {
    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EvaluationStep>(line) {
            Ok(step) => records.push(StepRecord::Step(step)),
            Err(e) => {
                tracing::warn!(source = %source, line = line_no + 1, error = %e, "invalid step record");
                records.push(StepRecord::Invalid {
                    line: line_no + 1,
                    error: e.to_string(),
                });
            }
        }
    }
    records
}

pub async fn load_task_steps(path: &Path) -> CuaResult<Vec<StepRecord>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_task_steps(&content, &path.display().to_string()))
}

/// All `*.jsonl` files directly under `dir`, sorted by file name.
pub async fn list_task_files(dir: &Path) -> CuaResult<Vec<PathBuf>> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Err(CuaError::Dataset(format!(
            "dataset directory {} does not exist",
            dir.display()
        )));
    }
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn task_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
