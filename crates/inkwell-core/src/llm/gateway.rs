//! Gateway trait, the boundary to the language-model service.
//!
//! The orchestrator submits a whole conversation and receives output items;
//! transport, signing, and retry policy live behind this trait.

use crate::BoxFuture;

use super::types::{GatewayRequest, GatewayResponse};

/// Errors from gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("API request failed: {0}")]
    Request(String),

    #[error("authentication failed (check API key): {0}")]
    Auth(String),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("provider error: {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,
}

/// A language-model service that answers conversation requests.
///
/// Implementations must be `Send + Sync` so one gateway can serve concurrent
/// conversations. Uses `BoxFuture` for object safety (`Arc<dyn LmGateway>`).
pub trait LmGateway: Send + Sync {
    /// Gateway display name (e.g. "OpenAI").
    fn name(&self) -> &str;

    /// Submit the conversation and return the model's output items.
    fn respond(&self, request: &GatewayRequest) -> BoxFuture<'_, Result<GatewayResponse, GatewayError>>;
}
