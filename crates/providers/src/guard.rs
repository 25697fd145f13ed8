//! Guarded providers: retry inside a circuit breaker, timeout per attempt.
//!
//! The breaker sees one outcome per logical call: a call that only succeeds
//! on its third attempt counts as a success, and a call that exhausts its
//! retries counts as a single failure.

use async_trait::async_trait;
use rose_core::error::ProviderError;
use rose_core::provider::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreaker;
use crate::retry::RetryPolicy;

/// Resilience wrapper shared by every call to one provider.
#[derive(Debug, Clone)]
pub struct Guard {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Guard {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            breaker,
            retry,
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `op` through the breaker with retries and a per-attempt timeout.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let name = self.breaker.name();
        let timeout = self.timeout;

        let attempts = self.retry.retry(ProviderError::is_transient, || {
            let attempt = op();
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "{name} did not respond within {}s",
                        timeout.as_secs_f32()
                    ))),
                }
            }
        });

        self.breaker.call_async(attempts).await
    }
}

/// A provider behind a [`Guard`]. Implements the same trait as its inner
/// provider so callers cannot tell the difference.
pub struct Guarded<P: ?Sized> {
    inner: Arc<P>,
    guard: Guard,
}

impl<P: ?Sized> Guarded<P> {
    pub fn new(inner: Arc<P>, guard: Guard) -> Self {
        Self { inner, guard }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

#[async_trait]
impl TextGenerator for Guarded<dyn TextGenerator> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.guard
            .run(|| self.inner.complete(request.clone()))
            .await
    }
}

#[async_trait]
impl Transcriber for Guarded<dyn Transcriber> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String, ProviderError> {
        self.guard.run(|| self.inner.transcribe(audio)).await
    }
}

#[async_trait]
impl SpeechSynthesizer for Guarded<dyn SpeechSynthesizer> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn mime_type(&self) -> &str {
        self.inner.mime_type()
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        self.guard.run(|| self.inner.synthesize(text)).await
    }
}

#[async_trait]
impl ImageGenerator for Guarded<dyn ImageGenerator> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_image(&self, prompt: &str) -> Result<ImageArtifact, ProviderError> {
        self.guard.run(|| self.inner.generate_image(prompt)).await
    }
}

#[async_trait]
impl Embedder for Guarded<dyn Embedder> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.guard.run(|| self.inner.embed(texts)).await
    }
}
