use std::sync::Arc;
use std::time::Duration;

use crate::agent_engine::history::ActionHistory;
use crate::agent_engine::loop_control::AttemptBudget;
use crate::agent_engine::parser::ActionParser;
use crate::agent_engine::prompt::{build_prompt, AGENT_PROMPT, FORMAT_FEEDBACK};
use crate::agent_engine::state::{PredictState, Prediction};
use crate::config::{AgentConfig, DimensionFallback};
use crate::errors::CuaResult;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, CompletionRequest};
use crate::perception::screenshot::Observation;
use crate::perception::types::Dimensions;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Computer-use agent: turns (instruction, screenshot) into the next GUI action.
///
/// The only state carried between calls is the last decoded screenshot size, which
/// is needed to scale normalized positions in dictionary-style model output.
pub struct CuAgent {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    prompt: String,
    parser: ActionParser,
    screenshot_size: Dimensions,
    dimension_fallback: DimensionFallback,
    max_attempts: u32,
    retry_delay: Duration,
}

impl CuAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig) -> Self {
        tracing::info!(provider = %provider.name(), model = %call.model, "initializing CU agent");
        Self {
            provider,
            call,
            prompt: AGENT_PROMPT.to_string(),
            parser: ActionParser::default(),
            screenshot_size: Dimensions::DEFAULT,
            dimension_fallback: DimensionFallback::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build an agent from the `[agent]` config section, reading `prompt_file` if set.
    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        call: CallConfig,
        cfg: &AgentConfig,
    ) -> CuaResult<Self> {
        let mut agent = Self::new(provider, call)
            .with_max_attempts(cfg.max_attempts)
            .with_retry_delay(Duration::from_millis(cfg.retry_delay_ms))
            .with_dimension_fallback(cfg.dimension_fallback);
        if let Some(path) = &cfg.prompt_file {
            agent = agent.with_prompt(std::fs::read_to_string(path)?);
            tracing::info!(path = %path, "agent prompt loaded from file");
        }
        Ok(agent)
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_dimension_fallback(mut self, policy: DimensionFallback) -> Self {
        self.dimension_fallback = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.call.model
    }

    fn update_screenshot_size(&mut self, obs: &Observation) {
        match obs.dimensions() {
            Ok(dims) => self.screenshot_size = dims,
            Err(e) => {
                if self.dimension_fallback == DimensionFallback::ResetToDefault {
                    self.screenshot_size = Dimensions::DEFAULT;
                }
                tracing::warn!(
                    error = %e,
                    width = self.screenshot_size.width,
                    height = self.screenshot_size.height,
                    policy = ?self.dimension_fallback,
                    "screenshot decode failed, using fallback dimensions"
                );
            }
        }
    }

    pub async fn predict(&mut self, instruction: &str, obs: &Observation) -> Prediction {
        self.predict_with_history(instruction, obs, &ActionHistory::new(0)).await
    }

    /// Predict the next action, showing the model the given earlier steps.
    pub async fn predict_with_history(
        &mut self,
        instruction: &str,
        obs: &Observation,
        history: &ActionHistory,
    ) -> Prediction {
        self.update_screenshot_size(obs);
        let image_base64 = obs.to_base64();

        let mut budget = AttemptBudget::new(self.max_attempts, self.retry_delay);
        let mut invocations = 0u32;
        let mut state = if budget.is_exhausted() {
            PredictState::Exhausted
        } else {
            PredictState::Attempting {
                feedback: String::new(),
            }
        };

        while !state.is_terminal() {
            state = match state {
                PredictState::Attempting { feedback } => {
                    let request = CompletionRequest {
                        prompt: build_prompt(&self.prompt, history, instruction, &feedback),
                        image_base64: image_base64.clone(),
                        call: self.call.clone(),
                    };
                    invocations += 1;
                    match self.provider.complete(request).await {
                        Err(e) => PredictState::RetryTransport {
                            feedback,
                            error: e.to_string(),
                        },
                        Ok(response) => {
                            let parsed = self.parser.parse(response.text(), self.screenshot_size);
                            if parsed.is_format_violation() {
                                tracing::warn!(
                                    attempts_left = budget.remaining().saturating_sub(1),
                                    raw = %response.text(),
                                    "model output has no usable action"
                                );
                                PredictState::RetryFormat { plan: parsed.plan }
                            } else {
                                PredictState::Succeeded {
                                    plan: parsed.plan,
                                    action: parsed.action,
                                }
                            }
                        }
                    }
                }
                PredictState::RetryTransport { feedback, error } => {
                    tracing::warn!(error = %error, attempt = budget.used() + 1, "model invocation failed");
                    if budget.record_failure() {
                        budget.backoff().await;
                        PredictState::Attempting { feedback }
                    } else {
                        PredictState::TransportFailed { error }
                    }
                }
                PredictState::RetryFormat { plan } => {
                    if budget.record_failure() {
                        PredictState::Attempting {
                            feedback: FORMAT_FEEDBACK.to_string(),
                        }
                    } else {
                        PredictState::FormatFailed { plan }
                    }
                }
                terminal => terminal,
            };
        }

        let prediction = state.into_prediction(invocations);
        tracing::debug!(
            outcome = ?prediction.outcome,
            attempts = prediction.attempts,
            action = %prediction.action,
            "prediction complete"
        );
        prediction
    }
}
