//! Language-model gateway: the request/response boundary to the model service.
//!
//! The orchestrator talks to any service through the [`LmGateway`] trait.
//! Currently supported:
//!
//! - **OpenAI**: the Responses API (also usable with Responses-compatible
//!   endpoints via `llm.base_url`)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐
//! │ Orchestrator │────▶│  LmGateway   │  (trait)
//! └──────────────┘     └──────┬───────┘
//!                             │
//!                    ┌────────┴────────┐
//!                    ▼                 ▼
//!           ┌────────────────┐  ┌──────────────┐
//!           │ OpenAiGateway  │  │ test doubles │
//!           │ (Responses API)│  │  (scripted)  │
//!           └────────────────┘  └──────────────┘
//! ```

pub mod gateway;
pub mod openai;
pub mod types;

use std::time::Duration;

pub use gateway::{GatewayError, LmGateway};
pub use openai::OpenAiGateway;
pub use types::*;

/// Create a gateway from config.
///
/// `api_key` is passed separately so callers resolve it (inline value or
/// environment variable) before any network client is built.
pub fn create_gateway(config: &inkwell_config::LlmConfig, api_key: &str) -> Box<dyn LmGateway> {
    let mut gateway = OpenAiGateway::new(api_key)
        .with_timeout(Duration::from_secs(config.timeout_secs));
    if !config.model.is_empty() {
        gateway = gateway.with_model(&config.model);
    }
    if let Some(ref base_url) = config.base_url {
        gateway = gateway.with_base_url(base_url);
    }
    Box::new(gateway)
}
