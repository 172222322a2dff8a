use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{CuaError, CuaResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    /// Kept for model / sampling lookups.
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> CuaResult<Arc<dyn LlmProvider>> {
        self.providers
            .get(&self.active)
            .cloned()
            .ok_or_else(|| CuaError::Config(format!("Active provider '{}' not found in registry", self.active)))
    }

    /// Return the active provider together with the model and sampling parameters
    /// from its `[llm.providers.<id>]` entry.
    pub fn active_call_config(&self) -> CuaResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let provider = self.get_active()?;
        let cfg = match self.llm_config.providers.get(&self.active) {
            Some(entry) => CallConfig {
                model: entry.model.clone(),
                stream: entry.stream,
                temperature: entry.temperature,
                max_tokens: entry.max_tokens,
            },
            None => {
                tracing::warn!(provider = %self.active, "no provider entry, using built-in sampling defaults");
                CallConfig {
                    model: String::new(),
                    stream: false,
                    temperature: 0.1,
                    max_tokens: 1024,
                }
            }
        };
        tracing::debug!(
            provider = %self.active,
            model = %cfg.model,
            stream = cfg.stream,
            temperature = cfg.temperature,
            max_tokens = cfg.max_tokens,
            "resolved call config"
        );
        Ok((provider, cfg))
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `CUAGENT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> CuaResult<Self> {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("CUAGENT_{}_API_KEY", id.to_uppercase()))
                .ok()
                .or_else(|| entry.api_key.clone())
                .unwrap_or_else(|| "EMPTY".to_string());
            let provider = OpenAiCompatibleProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                Duration::from_secs(entry.timeout_secs),
            )?;
            registry.register(Arc::new(provider));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::llm::types::CompletionRequest;

    const SAMPLE: &str = r#"
[llm]
active_provider = "vllm"

[llm.providers.vllm]
display_name = "Local vLLM"
api_base = "http://localhost:8030/v1/chat/completions"
model = "GUI-R1/GUI-R1-3B"
temperature = 0.2
stream = true

[llm.providers.remote]
display_name = "Remote"
api_base = "https://example.invalid/v1/chat/completions"
model = "showui-2b"

[evaluation]
task = "t"
dataset_dir = "d"
image_base_dir = "i"
output_dir = "o"
"#;

    #[test]
    fn test_from_config_resolves_active_call_config() {
        let cfg = parse_config(SAMPLE).unwrap();
        let registry = ProviderRegistry::from_config(&cfg).unwrap();
        assert_eq!(registry.providers.len(), 2);

        let (provider, call) = registry.active_call_config().unwrap();
        assert_eq!(provider.name(), "vllm");
        assert_eq!(call.model, "GUI-R1/GUI-R1-3B");
        assert!(call.stream);
        assert!((call.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(call.max_tokens, 1024);
    }

    #[test]
    fn test_unregistered_active_provider_is_config_error() {
        let mut cfg = parse_config(SAMPLE).unwrap();
        cfg.llm.active_provider = "missing".into();
        let registry = ProviderRegistry::from_config(&cfg).unwrap();
        assert!(matches!(registry.get_active(), Err(CuaError::Config(_))));
        assert!(registry.active_call_config().is_err());
    }

    #[tokio::test]
    async fn test_example_config_reaches_chat_completions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Action: finish"}}]}"#)
            .create_async()
            .await;

        let text = include_str!("../../config.example.toml").replace("http://localhost:8030", &server.url());
        let cfg = parse_config(&text).unwrap();
        let registry = ProviderRegistry::from_config(&cfg).unwrap();
        let (provider, call) = registry.active_call_config().unwrap();
        let resp = provider
            .complete(CompletionRequest {
                prompt: "next?".into(),
                image_base64: "AAAA".into(),
                call,
            })
            .await
            .unwrap();
        assert_eq!(resp.text(), "Action: finish");
        mock.assert_async().await;
    }
}
