use async_trait::async_trait;

use crate::errors::CuaResult;
use crate::llm::types::{CompletionRequest, LlmResponse};

/// Unified model-invocation trait. The predictor only talks to the model through this,
/// so tests can substitute deterministic stubs.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider's identifier (matches config.toml key).
    fn name(&self) -> &str;

    /// Sends one prompt + screenshot and returns the model's full reply.
    /// Transport and service failures surface as `Err`.
    async fn complete(&self, request: CompletionRequest) -> CuaResult<LlmResponse>;
}
