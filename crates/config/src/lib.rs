//! Configuration loading, validation, and management for Rose.
//!
//! Loads configuration from `~/.rose/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rose/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key shared by every provider unless overridden per provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL shared by every provider
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// The companion's name, used in every prompt
    #[serde(default = "default_character_name")]
    pub character_name: String,

    /// Model selection
    #[serde(default)]
    pub models: ModelsConfig,

    /// Graph behaviour
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Timeouts, circuit breakers and retries
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Where sessions, memories and media live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-capability overrides, keyed by "llm", "stt", "tts", "image", "embeddings"
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_character_name() -> String {
    "Rose".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base_url", &self.api_base_url)
            .field("character_name", &self.character_name)
            .field("models", &self.models)
            .field("workflow", &self.workflow)
            .field("resilience", &self.resilience)
            .field("storage", &self.storage)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Cheaper model for routing and memory analysis
    #[serde(default = "default_small_text_model")]
    pub small_text_model: String,

    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,

    #[serde(default = "default_image_model")]
    pub image_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_text_model() -> String {
    "gpt-4o-mini".into()
}
fn default_small_text_model() -> String {
    "gpt-4o-mini".into()
}
fn default_stt_model() -> String {
    "whisper-1".into()
}
fn default_tts_model() -> String {
    "tts-1".into()
}
fn default_tts_voice() -> String {
    "nova".into()
}
fn default_image_model() -> String {
    "dall-e-3".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            small_text_model: default_small_text_model(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
            image_model: default_image_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Message count at which older turns are folded into the summary
    #[serde(default = "default_summary_trigger")]
    pub total_messages_summary_trigger: usize,

    /// Most recent messages kept verbatim after summarizing
    #[serde(default = "default_after_summary")]
    pub total_messages_after_summary: usize,

    /// How many recent messages the router looks at
    #[serde(default = "default_router_window")]
    pub router_messages_to_analyze: usize,

    /// Memories injected per turn
    #[serde(default = "default_memory_top_k")]
    pub memory_top_k: usize,

    /// Similarity at or above which a new memory counts as a duplicate
    #[serde(default = "default_duplicate_threshold")]
    pub memory_duplicate_threshold: f32,

    /// Ceiling for one whole turn
    #[serde(default = "default_workflow_timeout")]
    pub workflow_timeout_secs: u64,

    /// Frame replies with what Rose is "doing" at this time of day
    #[serde(default = "default_true")]
    pub schedule_context: bool,
}

fn default_summary_trigger() -> usize {
    20
}
fn default_after_summary() -> usize {
    5
}
fn default_router_window() -> usize {
    3
}
fn default_memory_top_k() -> usize {
    3
}
fn default_duplicate_threshold() -> f32 {
    0.9
}
fn default_workflow_timeout() -> u64 {
    55
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            total_messages_summary_trigger: default_summary_trigger(),
            total_messages_after_summary: default_after_summary(),
            router_messages_to_analyze: default_router_window(),
            memory_top_k: default_memory_top_k(),
            memory_duplicate_threshold: default_duplicate_threshold(),
            workflow_timeout_secs: default_workflow_timeout(),
            schedule_context: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Per-attempt timeout for provider calls
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    /// Ceiling for speech synthesis, shorter than the API timeout
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,

    /// Consecutive failures that open a provider's circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before an open circuit lets a probe through
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_api_timeout() -> u64 {
    30
}
fn default_tts_timeout() -> u64 {
    10
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8000
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: default_api_timeout(),
            tts_timeout_secs: default_tts_timeout(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_checkpoint_backend")]
    pub checkpoint_backend: String,

    /// SQLite checkpoint database (default: `~/.rose/checkpoints.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,

    /// JSONL long-term memory file (default: `~/.rose/memory/memories.jsonl`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<PathBuf>,

    /// Generated images (default: `~/.rose/images`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_dir: Option<PathBuf>,

    /// Synthesized replies saved by the CLI (default: `~/.rose/audio`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_dir: Option<PathBuf>,
}

fn default_checkpoint_backend() -> String {
    "sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_backend: default_checkpoint_backend(),
            checkpoint_path: None,
            memory_path: None,
            image_dir: None,
            audio_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("checkpoints.db"))
    }

    pub fn memory_path(&self) -> PathBuf {
        self.memory_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory").join("memories.jsonl"))
    }

    pub fn image_dir(&self) -> PathBuf {
        self.image_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("images"))
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("audio"))
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.rose/config.toml).
    ///
    /// Also checks environment variables:
    /// - `ROSE_API_KEY` (highest priority), `GROQ_API_KEY`, `OPENAI_API_KEY`
    /// - `ROSE_BASE_URL` overrides `api_base_url`
    /// - `ROSE_MODEL` overrides `models.text_model`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("ROSE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("ROSE_BASE_URL") {
            config.api_base_url = url;
        }

        if let Ok(model) = std::env::var("ROSE_MODEL") {
            config.models.text_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rose")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(ConfigError::ValidationError(
                "models.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let wf = &self.workflow;
        if wf.total_messages_after_summary >= wf.total_messages_summary_trigger {
            return Err(ConfigError::ValidationError(
                "workflow.total_messages_after_summary must be less than total_messages_summary_trigger"
                    .into(),
            ));
        }
        if wf.router_messages_to_analyze == 0 {
            return Err(ConfigError::ValidationError(
                "workflow.router_messages_to_analyze must be > 0".into(),
            ));
        }
        if !(wf.memory_duplicate_threshold > 0.0 && wf.memory_duplicate_threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "workflow.memory_duplicate_threshold must be in (0.0, 1.0]".into(),
            ));
        }

        let res = &self.resilience;
        if res.tts_timeout_secs == 0 || res.tts_timeout_secs >= wf.workflow_timeout_secs {
            return Err(ConfigError::ValidationError(
                "resilience.tts_timeout_secs must be > 0 and less than workflow.workflow_timeout_secs"
                    .into(),
            ));
        }
        if res.failure_threshold == 0 || res.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "resilience.failure_threshold and resilience.max_attempts must be > 0".into(),
            ));
        }
        if res.initial_backoff_ms > res.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "resilience.initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        if !matches!(self.storage.checkpoint_backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "storage.checkpoint_backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.storage.checkpoint_backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Resolve (base_url, api_key) for one capability.
    pub fn endpoint_for(&self, capability: &str) -> (String, String) {
        let overrides = self.providers.get(capability);
        let base_url = overrides
            .and_then(|p| p.api_url.clone())
            .unwrap_or_else(|| self.api_base_url.clone());
        let api_key = overrides
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
            .unwrap_or_default();
        (base_url, api_key)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            character_name: default_character_name(),
            models: ModelsConfig::default(),
            workflow: WorkflowConfig::default(),
            resilience: ResilienceConfig::default(),
            storage: StorageConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.character_name, "Rose");
        assert_eq!(config.workflow.total_messages_summary_trigger, 20);
        assert_eq!(config.workflow.total_messages_after_summary, 5);
        assert_eq!(config.workflow.workflow_timeout_secs, 55);
        assert_eq!(config.resilience.tts_timeout_secs, 10);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api_base_url, config.api_base_url);
        assert_eq!(parsed.models.tts_voice, config.models.tts_voice);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.models.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn retention_window_must_be_below_trigger() {
        let mut config = AppConfig::default();
        config.workflow.total_messages_after_summary = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tts_timeout_must_be_shorter_than_workflow_timeout() {
        let mut config = AppConfig::default();
        config.resilience.tts_timeout_secs = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_checkpoint_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.checkpoint_backend = "redis".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().models.stt_model, "whisper-1");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
character_name = "Rosie"

[workflow]
total_messages_summary_trigger = 10

[providers.tts]
api_url = "https://tts.example.com/v1"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.character_name, "Rosie");
        assert_eq!(config.workflow.total_messages_summary_trigger, 10);
        assert_eq!(config.workflow.total_messages_after_summary, 5);

        let (tts_url, _) = config.endpoint_for("tts");
        assert_eq!(tts_url, "https://tts.example.com/v1");
        let (llm_url, _) = config.endpoint_for("llm");
        assert_eq!(llm_url, config.api_base_url);
    }

    #[test]
    fn invalid_file_is_a_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\ntotal_messages_summary_trigger = 3").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn debug_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("total_messages_summary_trigger"));
    }
}
