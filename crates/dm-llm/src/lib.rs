//! The LLM Gateway: structured-prompt access to an external text-in/text-out
//! LLM service, with transport-only providers, a centralized retry/backoff
//! policy, and an explicit single-flight configuration handle (never a bare
//! global static).

pub mod gateway;
pub mod prompts;
pub mod provider_a;
pub mod provider_b;
pub mod types;

pub use gateway::{LlmGateway, LlmGatewayHandle};
pub use types::{CompletionRequest, CompletionResponse, GatewayConfig, LlmError, LlmProvider, ProviderKind, ProviderSendOutcome};
