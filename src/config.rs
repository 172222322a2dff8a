use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{CuaError, CuaResult};

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CUAGENT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions URL, e.g. `http://localhost:8030/v1/chat/completions`.
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Use SSE streaming for completions.
    #[serde(default)]
    pub stream: bool,
    /// Optional API key stored in config.toml (falls back to env var CUAGENT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound on one completion request, body included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    1024
}

/// What the predictor does with its cached screenshot size when an
/// observation cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DimensionFallback {
    #[default]
    KeepLastKnown,
    ResetToDefault,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub dimension_fallback: DimensionFallback,
    #[serde(default)]
    pub use_history: bool,
    #[serde(default = "default_history_cutoff")]
    pub history_cutoff: usize,
    /// Replaces the built-in agent prompt when set.
    #[serde(default)]
    pub prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            dimension_fallback: DimensionFallback::default(),
            use_history: false,
            history_cutoff: default_history_cutoff(),
            prompt_file: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_history_cutoff() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Label used in the report file name.
    pub task: String,
    pub dataset_dir: PathBuf,
    pub image_base_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

fn default_match_threshold() -> f64 {
    50.0
}

fn resolve_config_path() -> CuaResult<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(explicit);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found via {CONFIG_PATH_ENV}");
            return Ok(candidate);
        }
        return Err(CuaError::Config(format!(
            "{CONFIG_PATH_ENV} points at missing file {}",
            candidate.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("cuagent").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(CuaError::Config(
        "config.toml not found via CUAGENT_CONFIG, next to executable, in working directory or user config dir".into(),
    ))
}

pub fn parse_config(content: &str) -> CuaResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if !config.llm.providers.contains_key(&config.llm.active_provider) {
        return Err(CuaError::Config(format!(
            "active provider '{}' has no [llm.providers.{}] entry",
            config.llm.active_provider, config.llm.active_provider
        )));
    }
    Ok(config)
}

pub fn load_config() -> CuaResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> CuaResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[llm]
active_provider = "vllm"

[llm.providers.vllm]
display_name = "Local vLLM"
api_base = "http://localhost:8030/v1/chat/completions"
model = "GUI-R1/GUI-R1-3B"

[evaluation]
task = "preference_task"
dataset_dir = "data/final_data/preference_task"
image_base_dir = "data/events"
output_dir = "evaluate_report"
"#;

    #[test]
    fn test_parse_config_applies_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        let vllm = &cfg.llm.providers["vllm"];
        assert_eq!(vllm.max_tokens, 1024);
        assert!((vllm.temperature - 0.1).abs() < f64::EPSILON);
        assert!(!vllm.stream);
        assert_eq!(vllm.timeout_secs, 120);
        assert_eq!(cfg.agent.max_attempts, 3);
        assert_eq!(cfg.agent.retry_delay_ms, 1000);
        assert_eq!(cfg.agent.dimension_fallback, DimensionFallback::KeepLastKnown);
        assert_eq!(cfg.agent.history_cutoff, 10);
        assert!((cfg.evaluation.match_threshold - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_config_dimension_policy() {
        let text = format!("{SAMPLE}\n[agent]\ndimension_fallback = \"reset_to_default\"\n");
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.agent.dimension_fallback, DimensionFallback::ResetToDefault);
    }

    #[test]
    fn test_parse_config_rejects_unknown_active_provider() {
        let text = SAMPLE.replace("active_provider = \"vllm\"", "active_provider = \"other\"");
        assert!(matches!(parse_config(&text), Err(CuaError::Config(_))));
    }

    #[test]
    fn test_example_config_targets_chat_completions() {
        let cfg = parse_config(include_str!("../config.example.toml")).unwrap();
        let active = &cfg.llm.providers[&cfg.llm.active_provider];
        assert_eq!(active.api_base, "http://localhost:8030/v1/chat/completions");
        assert_eq!(cfg.agent.max_attempts, 3);
    }

    #[test]
    fn test_save_config_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        std::env::set_var(CONFIG_PATH_ENV, &path);

        let mut cfg = load_config().unwrap();
        cfg.agent.use_history = true;
        cfg.evaluation.match_threshold = 30.0;
        cfg.llm.providers.get_mut("vllm").unwrap().stream = true;
        save_config(&cfg).unwrap();

        let back = load_config().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);
        assert!(back.agent.use_history);
        assert!((back.evaluation.match_threshold - 30.0).abs() < f64::EPSILON);
        assert!(back.llm.providers["vllm"].stream);
        assert_eq!(back.llm.providers["vllm"].model, "GUI-R1/GUI-R1-3B");
        assert_eq!(back.evaluation.dataset_dir, PathBuf::from("data/final_data/preference_task"));
    }
}
