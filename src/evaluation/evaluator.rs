use std::path::{Path, PathBuf};

use crate::agent_engine::action::Action;
use crate::agent_engine::engine::CuAgent;
use crate::agent_engine::history::ActionHistory;
use crate::errors::CuaResult;
use crate::evaluation::dataset::{list_task_files, load_task_steps, task_name, StepRecord};
use crate::evaluation::matcher::Matcher;
use crate::evaluation::report::{Report, StepResult, TaskResult};
use crate::perception::screenshot::Observation;

/// Replays recorded task traces through the agent and scores each predicted step.
pub struct TaskEvaluator {
    agent: CuAgent,
    matcher: Matcher,
    image_base_dir: PathBuf,
    /// Feed earlier predictions of the same task back to the model.
    history_cutoff: Option<usize>,
}

impl TaskEvaluator {
    pub fn new(agent: CuAgent, image_base_dir: impl Into<PathBuf>) -> Self {
        Self {
            agent,
            matcher: Matcher::default(),
            image_base_dir: image_base_dir.into(),
            history_cutoff: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_history(mut self, cutoff: usize) -> Self {
        self.history_cutoff = Some(cutoff);
        self
    }

    /// Evaluate every `*.jsonl` task under `dataset_dir` in file-name order.
    /// Fails only when the dataset directory itself cannot be listed.
    pub async fn evaluate_dataset(&mut self, dataset_dir: &Path, task_label: &str) -> CuaResult<Report> {
        let files = list_task_files(dataset_dir).await?;
        tracing::info!(dir = %dataset_dir.display(), tasks = files.len(), "starting evaluation");

        let mut tasks = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            tracing::info!(progress = %format!("{}/{}", i + 1, files.len()), task = %task_name(file), "evaluating task");
            tasks.push(self.evaluate_task_file(file).await);
        }

        let report = Report::new(self.agent.model(), task_label, tasks);
        tracing::info!(
            total_tasks = report.summary.total_tasks,
            total_steps = report.summary.total_steps,
            total_correct = report.summary.total_correct,
            macro_acc = report.summary.macro_acc,
            micro_acc = report.summary.micro_acc,
            "evaluation complete"
        );
        Ok(report)
    }

    /// Evaluate one task file. An unreadable file yields an empty task result.
    pub async fn evaluate_task_file(&mut self, path: &Path) -> TaskResult {
        let name = task_name(path);
        match load_task_steps(path).await {
            Ok(steps) => self.evaluate_steps(&name, &steps).await,
            Err(e) => {
                tracing::error!(task = %name, error = %e, "failed to read task file");
                TaskResult::from_steps(name, Vec::new())
            }
        }
    }

    /// Every record yields exactly one step result, so the task total is the record count.
    pub async fn evaluate_steps(&mut self, name: &str, records: &[StepRecord]) -> TaskResult {
        let mut history = self.history_cutoff.map(ActionHistory::new);
        let mut details = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let index = i + 1;
            let step = match record {
                StepRecord::Step(step) => step,
                StepRecord::Invalid { line, error } => {
                    tracing::error!(task = %name, step = index, line, error = %error, "step record is invalid");
                    details.push(StepResult::errored(index, "invalid_record"));
                    continue;
                }
            };
            let instruction = step.instruction();
            let image_path = self.image_base_dir.join(&step.screenshot);

            if !tokio::fs::try_exists(&image_path).await.unwrap_or(false) {
                tracing::error!(task = %name, step = index, path = %image_path.display(), "screenshot does not exist");
                details.push(StepResult::errored(index, "image_missing"));
                continue;
            }
            let obs = match Observation::from_file(&image_path).await {
                Ok(obs) => obs,
                Err(e) => {
                    tracing::error!(task = %name, step = index, error = %e, "screenshot could not be read");
                    details.push(StepResult::errored(index, "image_unreadable"));
                    continue;
                }
            };

            let prediction = match history.as_ref() {
                Some(h) => self.agent.predict_with_history(&instruction, &obs, h).await,
                None => self.agent.predict(&instruction, &obs).await,
            };
            if let Some(h) = history.as_mut() {
                h.push(instruction, prediction.action.clone());
            }

            let matched = self.matcher.is_match(&prediction.action, &step.action);
            let pred_type = Action::classify(&prediction.action).kind();
            tracing::info!(
                task = %name,
                step = index,
                status = if matched { "Pass" } else { "Fail" },
                gt = %step.action,
                pred = %prediction.action,
                "step evaluated"
            );

            details.push(StepResult::Evaluated {
                step: index,
                gt_action: step.action.clone(),
                pred_action: prediction.action,
                pred_type,
                matched,
            });
        }

        let result = TaskResult::from_steps(name, details);
        tracing::info!(
            task = %name,
            correct = result.correct_steps,
            total = result.total_steps,
            accuracy = result.accuracy,
            "task evaluated"
        );
        result
    }
}
