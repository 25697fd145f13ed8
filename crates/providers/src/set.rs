//! Provider set: the five guarded capabilities the graph runs on.
//!
//! Each capability gets its own circuit breaker (named after the capability)
//! that lives as long as the set, so failures in one dependency never trip
//! another's circuit.

use rose_config::{AppConfig, ResilienceConfig};
use rose_core::error::ProviderError;
use rose_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::guard::{Guard, Guarded};
use crate::openai_compat::{ClientModels, OpenAiCompatClient};
use crate::retry::RetryPolicy;

pub const LLM: &str = "llm";
pub const STT: &str = "stt";
pub const TTS: &str = "tts";
pub const IMAGE: &str = "image";
pub const EMBEDDINGS: &str = "embeddings";

/// Unguarded providers, one per capability.
pub struct RawProviders {
    pub llm: Arc<dyn TextGenerator>,
    pub stt: Arc<dyn Transcriber>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub image: Arc<dyn ImageGenerator>,
    pub embedder: Arc<dyn Embedder>,
}

/// Guarded providers plus the breakers guarding them.
#[derive(Clone)]
pub struct ProviderSet {
    pub llm: Arc<dyn TextGenerator>,
    pub stt: Arc<dyn Transcriber>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub image: Arc<dyn ImageGenerator>,
    pub embedder: Arc<dyn Embedder>,
    breakers: Vec<Arc<CircuitBreaker>>,
}

impl ProviderSet {
    /// Build OpenAI-compatible clients for every capability from config.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let models = ClientModels::from_config(&config.models);
        let client = |capability: &str| -> Result<Arc<OpenAiCompatClient>, ProviderError> {
            let (base_url, api_key) = config.endpoint_for(capability);
            info!(capability, base_url = %base_url, "Configuring provider");
            Ok(Arc::new(OpenAiCompatClient::new(
                capability,
                base_url,
                api_key,
                models.clone(),
            )?))
        };

        let raw = RawProviders {
            llm: client(LLM)?,
            stt: client(STT)?,
            tts: client(TTS)?,
            image: client(IMAGE)?,
            embedder: client(EMBEDDINGS)?,
        };
        Ok(Self::guarded(raw, &config.resilience))
    }

    /// Put each raw provider behind its own breaker and retry policy.
    pub fn guarded(raw: RawProviders, resilience: &ResilienceConfig) -> Self {
        let retry = RetryPolicy::from_config(resilience);
        let api_timeout = Duration::from_secs(resilience.api_timeout_secs);
        let tts_timeout = Duration::from_secs(resilience.tts_timeout_secs);
        let breaker = |name: &str| {
            Arc::new(CircuitBreaker::new(
                name,
                resilience.failure_threshold,
                Duration::from_secs(resilience.recovery_timeout_secs),
            ))
        };

        let breakers = vec![
            breaker(LLM),
            breaker(STT),
            breaker(TTS),
            breaker(IMAGE),
            breaker(EMBEDDINGS),
        ];
        let guard = |i: usize, timeout: Duration| {
            Guard::new(breakers[i].clone(), retry.clone(), timeout)
        };

        Self {
            llm: Arc::new(Guarded::new(raw.llm, guard(0, api_timeout))),
            stt: Arc::new(Guarded::new(raw.stt, guard(1, api_timeout))),
            tts: Arc::new(Guarded::new(raw.tts, guard(2, tts_timeout))),
            image: Arc::new(Guarded::new(raw.image, guard(3, api_timeout))),
            embedder: Arc::new(Guarded::new(raw.embedder, guard(4, api_timeout))),
            breakers,
        }
    }

    pub fn breakers(&self) -> &[Arc<CircuitBreaker>] {
        &self.breakers
    }

    /// Look up a breaker by capability name.
    pub fn breaker(&self, name: &str) -> Option<&Arc<CircuitBreaker>> {
        self.breakers.iter().find(|b| b.name() == name)
    }

    /// `(capability, state, failure_count)` for every breaker.
    pub fn breaker_states(&self) -> Vec<(String, CircuitState, u32)> {
        self.breakers
            .iter()
            .map(|b| (b.name().to_string(), b.state(), b.failure_count()))
            .collect()
    }
}
