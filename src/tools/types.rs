//! Tool types for AptoClaw
//!
//! This module defines the core types for tool execution: the `Tool` trait,
//! the `ToolContext` that binds a user's signer and chain client to a call,
//! and the structured `ToolError` that is reported back to the reasoning loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::chain::{ChainClient, ChainError};
use crate::wallet::SigningIdentity;

/// What a tool does to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Queries only (balance, gas price, transaction status).
    ChainRead,
    /// Signs and submits a transaction.
    ChainWrite,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChainRead => write!(f, "chain_read"),
            Self::ChainWrite => write!(f, "chain_write"),
        }
    }
}

/// Result of a tool call as the reasoning loop sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Content sent to the LLM as the tool result.
    pub for_llm: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful result.
    pub fn llm_only(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: false,
        }
    }

    /// Successful result rendered as compact JSON.
    pub fn json(value: &Value) -> Self {
        Self::llm_only(value.to_string())
    }

    /// Error result. The LLM sees the error and can explain it to the user.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: true,
        }
    }
}

/// Failure of a single tool call.
///
/// Never aborts a reply: the registry turns it into an error [`ToolOutput`]
/// carrying `{"error": kind, "message": text}`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("tool call did not finish within {0}s")]
    Timeout(u64),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Stable snake_case tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::Chain(e) => e.kind(),
            ToolError::Timeout(_) => "timeout",
            ToolError::UnknownTool(_) => "unknown_tool",
        }
    }

    /// JSON payload handed back to the reasoning loop.
    pub fn to_payload(&self) -> Value {
        json!({
            "error": self.kind(),
            "message": self.to_string(),
        })
    }

    pub fn into_output(self) -> ToolOutput {
        ToolOutput::error(self.to_payload().to_string())
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use aptoclaw::tools::{Tool, ToolCategory, ToolContext, ToolError, ToolOutput};
///
/// struct NetworkName;
///
/// #[async_trait]
/// impl Tool for NetworkName {
///     fn name(&self) -> &str { "network_name" }
///     fn description(&self) -> &str { "Name of the connected network" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({ "type": "object", "properties": {} })
///     }
///     fn category(&self) -> ToolCategory { ToolCategory::ChainRead }
///     async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
///         Ok(ToolOutput::llm_only(ctx.chain.network()))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the LLM uses to request the tool.
    fn name(&self) -> &str;

    /// Sent to the LLM to explain when and how to use the tool.
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;

    fn category(&self) -> ToolCategory;

    /// Execute the tool with the arguments the LLM produced.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Per-user execution context.
///
/// The registry is shared by every session; the context is what binds a call
/// to one user's signing identity.
#[derive(Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub signer: SigningIdentity,
    pub chain: Arc<dyn ChainClient>,
}

impl ToolContext {
    pub fn new(user_id: &str, signer: SigningIdentity, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            user_id: user_id.to_string(),
            signer,
            chain,
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("user_id", &self.user_id)
            .field("signer", &self.signer)
            .field("network", &self.chain.network())
            .finish()
    }
}
