use serde::{Deserialize, Serialize};

/// Terminal action returned when the model service kept failing.
pub const API_ERROR_PREFIX: &str = "API Error: ";
/// Terminal action returned when the model kept ignoring the response format.
pub const FORMAT_FAILURE_ACTION: &str = "Error: Model failed to follow format after retries.";
/// Terminal action for the defensive exit with no attempts left.
pub const UNKNOWN_FAILURE_ACTION: &str = "Error: Unknown failure";
/// Plan text paired with transport and unknown failures.
pub const ERROR_PLAN: &str = "Error";

/// Result of one `predict` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub plan: String,
    pub action: String,
    pub outcome: PredictionOutcome,
    /// Model invocations issued for this prediction.
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    Success,
    TransportFailed,
    FormatFailed,
    Exhausted,
}

impl Prediction {
    pub fn is_success(&self) -> bool {
        self.outcome == PredictionOutcome::Success
    }
}

/// States of the predict retry loop.
#[derive(Debug, Clone)]
pub enum PredictState {
    /// Ready to invoke the model with the current feedback suffix.
    Attempting { feedback: String },
    /// Service call failed; back off and try again.
    RetryTransport { feedback: String, error: String },
    /// Reply had no usable action; retry with corrective feedback.
    RetryFormat { plan: String },
    Succeeded { plan: String, action: String },
    TransportFailed { error: String },
    FormatFailed { plan: String },
    /// No attempts were available at all.
    Exhausted,
}

impl PredictState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictState::Succeeded { .. }
                | PredictState::TransportFailed { .. }
                | PredictState::FormatFailed { .. }
                | PredictState::Exhausted
        )
    }

    /// Convert the final state into the `(plan, action)` handed back to callers.
    /// A state that is not terminal yields the unknown-failure sentinel.
    pub fn into_prediction(self, attempts: u32) -> Prediction {
        let (plan, action, outcome) = match self {
            PredictState::Succeeded { plan, action } => (plan, action, PredictionOutcome::Success),
            PredictState::TransportFailed { error } => (
                ERROR_PLAN.to_string(),
                format!("{API_ERROR_PREFIX}{error}"),
                PredictionOutcome::TransportFailed,
            ),
            PredictState::FormatFailed { plan } => {
                (plan, FORMAT_FAILURE_ACTION.to_string(), PredictionOutcome::FormatFailed)
            }
            PredictState::Exhausted
            | PredictState::Attempting { .. }
            | PredictState::RetryTransport { .. }
            | PredictState::RetryFormat { .. } => (
                ERROR_PLAN.to_string(),
                UNKNOWN_FAILURE_ACTION.to_string(),
                PredictionOutcome::Exhausted,
            ),
        };
        Prediction {
            plan,
            action,
            outcome,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_map_to_sentinels() {
        let p = PredictState::TransportFailed { error: "connection refused".into() }
            .into_prediction(3);
        assert_eq!(p.plan, "Error");
        assert_eq!(p.action, "API Error: connection refused");
        assert_eq!(p.outcome, PredictionOutcome::TransportFailed);

        let p = PredictState::FormatFailed { plan: "rambling".into() }.into_prediction(3);
        assert_eq!(p.plan, "rambling");
        assert_eq!(p.action, FORMAT_FAILURE_ACTION);

        let p = PredictState::Exhausted.into_prediction(0);
        assert_eq!((p.plan.as_str(), p.action.as_str()), ("Error", "Error: Unknown failure"));
    }

    #[test]
    fn test_non_terminal_state_is_unknown_failure() {
        let s = PredictState::Attempting { feedback: String::new() };
        assert!(!s.is_terminal());
        let p = s.into_prediction(1);
        assert_eq!(p.action, UNKNOWN_FAILURE_ACTION);
        assert_eq!(p.outcome, PredictionOutcome::Exhausted);
    }
}
