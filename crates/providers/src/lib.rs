//! Provider plumbing for Rose.
//!
//! - [`CircuitBreaker`] and [`RetryPolicy`]: the two resilience primitives
//! - [`Guard`]: retry-within-breaker composition with per-attempt timeouts
//! - [`Guarded`]: decorators that put any provider trait behind a guard
//! - [`OpenAiCompatClient`]: one HTTP client implementing every provider trait
//! - [`ProviderSet`]: the guarded providers the graph is built from

pub mod circuit_breaker;
pub mod guard;
pub mod openai_compat;
pub mod retry;
pub mod set;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use guard::{Guard, Guarded};
pub use openai_compat::{ClientModels, OpenAiCompatClient};
pub use retry::RetryPolicy;
pub use set::{ProviderSet, RawProviders};
