pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod llm;
pub mod perception;

use crate::agent_engine::engine::CuAgent;
use crate::errors::CuaResult;
use crate::evaluation::evaluator::TaskEvaluator;
use crate::evaluation::matcher::Matcher;
use crate::evaluation::report::write_report;
use crate::llm::registry::ProviderRegistry;

pub use crate::agent_engine::action::{Action, ActionKind};
pub use crate::agent_engine::history::ActionHistory;
pub use crate::agent_engine::parser::{ActionParser, ParsedOutput, NO_ACTION};
pub use crate::agent_engine::state::{Prediction, PredictionOutcome};
pub use crate::errors::CuaError;
pub use crate::evaluation::matcher::is_match;
pub use crate::perception::screenshot::Observation;
pub use crate::perception::types::Dimensions;

/// Evaluate the configured dataset end to end and write the JSON report.
pub async fn run() -> CuaResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;
    let registry = ProviderRegistry::from_config(&cfg)?;
    let (provider, call) = registry.active_call_config()?;
    let agent = CuAgent::from_config(provider, call, &cfg.agent)?;

    let mut evaluator = TaskEvaluator::new(agent, cfg.evaluation.image_base_dir.clone())
        .with_matcher(Matcher::new(cfg.evaluation.match_threshold));
    if cfg.agent.use_history {
        evaluator = evaluator.with_history(cfg.agent.history_cutoff);
    }

    let report = match evaluator
        .evaluate_dataset(&cfg.evaluation.dataset_dir, &cfg.evaluation.task)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "evaluation aborted, no report written");
            return Ok(());
        }
    };

    let path = write_report(&report, &cfg.evaluation.output_dir).await?;
    tracing::info!(
        path = %path.display(),
        macro_acc = report.summary.macro_acc,
        micro_acc = report.summary.micro_acc,
        "detailed evaluation results saved"
    );
    Ok(())
}
