//! Providers module - the reasoning backend behind the agent
//!
//! The agent talks to an [`LLMProvider`]. The shipped implementation is an
//! OpenAI-compatible chat-completions client, optionally wrapped in a
//! [`RetryProvider`] for transient failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use aptoclaw::providers::{LLMProvider, ChatOptions, OpenAIProvider};
//! use aptoclaw::session::Message;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key", "gpt-4-turbo");
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await.unwrap();
//!     println!("Response: {}", response.content);
//! }
//! ```

#[cfg(test)]
pub(crate) mod mock;
pub mod openai;
pub mod retry;
mod types;

use crate::config::Config;
use crate::error::{AptoError, ProviderError, Result};

pub use openai::OpenAIProvider;
pub use retry::RetryProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the configured provider stack.
///
/// # Errors
///
/// Returns [`AptoError::Config`] when no OpenAI API key is configured.
pub fn build_provider(config: &Config) -> Result<Box<dyn LLMProvider>> {
    let api_key = config.openai_api_key().ok_or_else(|| {
        AptoError::Config(
            "no OpenAI API key; set providers.openai.api_key or OPENAI_API_KEY".to_string(),
        )
    })?;
    let api_base = config
        .providers
        .openai
        .as_ref()
        .and_then(|p| p.api_base.as_deref())
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(openai::OPENAI_API_URL);

    let provider: Box<dyn LLMProvider> = Box::new(OpenAIProvider::with_base_url(
        &api_key,
        api_base,
        &config.agents.defaults.model,
    ));

    let retry = &config.providers.retry;
    if retry.enabled && retry.max_retries > 0 {
        Ok(Box::new(RetryProvider::from_config(provider, retry)))
    } else {
        Ok(provider)
    }
}
