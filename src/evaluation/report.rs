use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::action::ActionKind;
use crate::errors::CuaResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Error,
}

/// Outcome of one recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepResult {
    Evaluated {
        step: usize,
        gt_action: String,
        pred_action: String,
        pred_type: ActionKind,
        #[serde(rename = "match")]
        matched: bool,
    },
    /// The step could not be run, e.g. its screenshot is missing.
    Errored {
        step: usize,
        status: StepStatus,
        reason: String,
    },
}

impl StepResult {
    pub fn errored(step: usize, reason: impl Into<String>) -> Self {
        StepResult::Errored {
            step,
            status: StepStatus::Error,
            reason: reason.into(),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, StepResult::Evaluated { matched: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_name: String,
    pub total_steps: usize,
    pub correct_steps: usize,
    /// Percentage of steps matched, 0 for an empty task.
    pub accuracy: f64,
    pub details: Vec<StepResult>,
}

impl TaskResult {
    pub fn from_steps(task_name: impl Into<String>, details: Vec<StepResult>) -> Self {
        let total_steps = details.len();
        let correct_steps = details.iter().filter(|s| s.is_match()).count();
        Self {
            task_name: task_name.into(),
            total_steps,
            correct_steps,
            accuracy: percentage(correct_steps, total_steps),
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_tasks: usize,
    pub total_steps: usize,
    pub total_correct: usize,
    /// Mean of per-task accuracies.
    pub macro_acc: f64,
    /// Correct steps over all steps of the run.
    pub micro_acc: f64,
}

impl Summary {
    pub fn from_tasks(tasks: &[TaskResult]) -> Self {
        let total_steps: usize = tasks.iter().map(|t| t.total_steps).sum();
        let total_correct: usize = tasks.iter().map(|t| t.correct_steps).sum();
        let macro_acc = if tasks.is_empty() {
            0.0
        } else {
            tasks.iter().map(|t| t.accuracy).sum::<f64>() / tasks.len() as f64
        };
        Self {
            total_tasks: tasks.len(),
            total_steps,
            total_correct,
            macro_acc,
            micro_acc: percentage(total_correct, total_steps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub model: String,
    pub task: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub summary: Summary,
    pub tasks: Vec<TaskResult>,
}

impl Report {
    pub fn new(model: impl Into<String>, task: impl Into<String>, tasks: Vec<TaskResult>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            task: task.into(),
            generated_at: chrono::Utc::now(),
            summary: Summary::from_tasks(&tasks),
            tasks,
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Report file name: `{model}_{task}_{YYYYmmdd_HHMMSS}.json`, path separators in the
/// model id replaced so the file lands directly in `output_dir`.
pub fn report_file_name(model: &str, task: &str, at: chrono::DateTime<chrono::Local>) -> String {
    let model = model.replace(['/', '\\'], "_");
    format!("{}_{}_{}.json", model, task, at.format("%Y%m%d_%H%M%S"))
}

/// Write the report as pretty JSON into `output_dir` (created if missing).
pub async fn write_report(report: &Report, output_dir: &Path) -> CuaResult<PathBuf> {
    if !tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
        tokio::fs::create_dir_all(output_dir).await?;
        tracing::info!(path = %output_dir.display(), "output directory created");
    }
    let path = output_dir.join(report_file_name(&report.model, &report.task, chrono::Local::now()));
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&path, json).await?;
    tracing::info!(path = %path.display(), "evaluation report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn evaluated(step: usize, matched: bool) -> StepResult {
        StepResult::Evaluated {
            step,
            gt_action: "click (1, 1)".into(),
            pred_action: "click (2, 2)".into(),
            pred_type: ActionKind::Click,
            matched,
        }
    }

    fn four_steps_three_correct(name: &str) -> TaskResult {
        TaskResult::from_steps(
            name,
            vec![evaluated(1, true), evaluated(2, true), evaluated(3, false), evaluated(4, true)],
        )
    }

    #[test]
    fn test_task_accuracy() {
        let task = four_steps_three_correct("a.jsonl");
        assert_eq!(task.total_steps, 4);
        assert_eq!(task.correct_steps, 3);
        assert!((task.accuracy - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_errored_steps_count_as_incorrect() {
        let task = TaskResult::from_steps("a", vec![evaluated(1, true), StepResult::errored(2, "image_missing")]);
        assert_eq!(task.total_steps, 2);
        assert_eq!(task.correct_steps, 1);
        assert!((task.accuracy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_macro_and_micro_accuracy() {
        let tasks = vec![four_steps_three_correct("a"), four_steps_three_correct("b")];
        let summary = Summary::from_tasks(&tasks);
        assert_eq!(summary.total_tasks, 2);
        assert_eq!(summary.total_steps, 8);
        assert_eq!(summary.total_correct, 6);
        assert!((summary.macro_acc - 75.0).abs() < 1e-9);
        assert!((summary.micro_acc - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_macro_differs_from_micro_for_uneven_tasks() {
        let tasks = vec![
            TaskResult::from_steps("one", vec![evaluated(1, true)]),
            four_steps_three_correct("four"),
            TaskResult::from_steps("empty", vec![]),
        ];
        let summary = Summary::from_tasks(&tasks);
        // (100 + 75 + 0) / 3
        assert!((summary.macro_acc - 175.0 / 3.0).abs() < 1e-9);
        // 4 / 5
        assert!((summary.micro_acc - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_run_is_zero() {
        let summary = Summary::from_tasks(&[]);
        assert_eq!(summary.macro_acc, 0.0);
        assert_eq!(summary.micro_acc, 0.0);
    }

    #[test]
    fn test_step_result_json_shape() {
        let json = serde_json::to_value(evaluated(3, true)).unwrap();
        assert_eq!(json["step"], 3);
        assert_eq!(json["match"], true);
        assert_eq!(json["pred_type"], "click");

        let json = serde_json::to_value(StepResult::errored(4, "image_missing")).unwrap();
        assert_eq!(json, serde_json::json!({"step": 4, "status": "error", "reason": "image_missing"}));
    }

    #[test]
    fn test_report_file_name() {
        let at = chrono::Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            report_file_name("GUI-R1/GUI-R1-3B", "preference_task", at),
            "GUI-R1_GUI-R1-3B_preference_task_20260102_030405.json"
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let report = Report::new("m", "t", vec![four_steps_three_correct("a.jsonl")]);
        let path = write_report(&report, &out).await.unwrap();
        assert!(path.starts_with(&out));
        let back: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.summary, report.summary);
        assert_eq!(back.tasks[0].details.len(), 4);
    }
}
