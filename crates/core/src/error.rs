//! Error types for the Rose domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Rose operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Checkpoint errors ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider output: {0}")]
    MalformedResponse(String),

    #[error("Circuit open for provider '{provider}'")]
    CircuitOpen { provider: String },
}

impl ProviderError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Network blips, timeouts, rate limits and 5xx responses are transient.
    /// Everything else (auth, bad output, an open circuit) fails the same way
    /// on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::AuthenticationFailed(_)
            | ProviderError::NotConfigured(_)
            | ProviderError::MalformedResponse(_)
            | ProviderError::CircuitOpen { .. } => false,
        }
    }
}

/// Raised by a circuit breaker that refuses to let a call through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker '{breaker}' is open")]
pub struct CircuitOpenError {
    pub breaker: String,
}

impl From<CircuitOpenError> for ProviderError {
    fn from(err: CircuitOpenError) -> Self {
        ProviderError::CircuitOpen {
            provider: err.breaker,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("Corrupted checkpoint for session {session_id}: {reason}")]
    Corrupted { session_id: String, reason: String },

    #[error("Checkpoint migration failed: {0}")]
    MigrationFailed(String),
}
