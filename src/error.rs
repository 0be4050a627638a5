//! Error types for AptoClaw
//!
//! One library-wide error enum, [`AptoError`], covers wallet, agent, transport
//! and infrastructure failures. Blockchain failures have their own
//! [`ChainError`](crate::chain::ChainError) because they are reported back to
//! the reasoning loop as tool results instead of aborting a request.

use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Classification of reasoning-backend HTTP failures.
///
/// Drives the retry decision in [`RetryProvider`](crate::providers::RetryProvider)
/// without string matching on error messages.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 401/403: invalid API key
    #[error("Authentication error: {0}")]
    Auth(String),
    /// 429: rate limit or quota exceeded
    #[error("Rate limit error: {0}")]
    RateLimit(String),
    /// 402: billing problem on the provider account
    #[error("Billing error: {0}")]
    Billing(String),
    /// 5xx
    #[error("Server error: {0}")]
    ServerError(String),
    /// 400: malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// 404: unknown model or endpoint
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    /// Connect or read timeout
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Unknown provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Returns `true` if the request may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::ServerError(_) | ProviderError::Timeout(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) | ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for AptoError {
    fn from(err: ProviderError) -> Self {
        AptoError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for AptoClaw operations.
#[derive(Error, Debug)]
pub enum AptoError {
    /// Mutation or read that requires an account the user does not have.
    #[error("No account found for user {0}")]
    AccountNotFound(String),

    /// Stored key material could not be decoded into a signing key.
    ///
    /// Never resolved by generating a replacement key: that would silently
    /// orphan the funds held by the stored one.
    #[error("Stored key could not be decoded: {0}")]
    KeyDecode(String),

    /// Import input was not exactly 64 hexadecimal characters.
    #[error("Invalid private key format: expected 64 hexadecimal characters")]
    InvalidKeyFormat,

    /// The reasoning backend failed while producing a reply.
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    /// A reasoning step did not finish within its deadline.
    #[error("Agent timed out after {0}s")]
    AgentTimeout(u64),

    /// Configuration-related errors (invalid config, missing token, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors that were not classified
    #[error("Provider error: {0}")]
    Provider(String),

    /// Classified provider error
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Chat transport failures
    #[error("Channel error: {0}")]
    Channel(String),

    /// Tool registration or execution failures
    #[error("Tool error: {0}")]
    Tool(String),

    /// Conversation memory persistence failures
    #[error("Session error: {0}")]
    Session(String),

    /// Account store failures
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Message bus channel closed unexpectedly
    #[error("Bus error: channel closed")]
    BusClosed,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AptoError {
    /// Returns `true` for errors caused by user input or user state that the
    /// user can fix by themselves (bad key text, no account yet).
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            AptoError::InvalidKeyFormat | AptoError::AccountNotFound(_)
        )
    }

    /// Returns `true` if stored key material is corrupt.
    pub fn is_fatal_key_error(&self) -> bool {
        matches!(self, AptoError::KeyDecode(_))
    }
}

/// A specialized `Result` type for AptoClaw operations.
pub type Result<T> = std::result::Result<T, AptoError>;
