//! Tool registry for AptoClaw
//!
//! The registry is built once at startup and shared by every agent session.
//! A call is bound to a user only through the [`ToolContext`] passed in.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::providers::ToolDefinition;

use super::{ChainTool, Tool, ToolContext, ToolError, ToolOutput};

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use aptoclaw::tools::ToolRegistry;
///
/// let registry = ToolRegistry::chain_tools();
/// assert!(registry.has("aptos_get_balance"));
/// assert!(registry.has("aptos_transfer"));
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    timeout: Option<Duration>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: None,
        }
    }

    /// Registry holding every on-chain tool.
    pub fn chain_tools() -> Self {
        let mut registry = Self::new();
        for tool in ChainTool::ALL {
            registry.register(Box::new(tool));
        }
        registry
    }

    /// Bound each tool call; an expired call yields a `timeout` tool error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Register a new tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, category = %tool.category(), "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name for one user.
    ///
    /// Never fails: unknown tools, bad arguments, chain failures and timeouts
    /// all come back as an error [`ToolOutput`] so the reasoning loop can
    /// explain them.
    pub async fn execute_with_context(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> ToolOutput {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                warn!(tool = name, "LLM requested an unknown tool");
                return ToolError::UnknownTool(name.to_string()).into_output();
            }
        };

        let start = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(args, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout(limit.as_secs())),
            },
            None => tool.execute(args, ctx).await,
        };

        match result {
            Ok(output) => {
                info!(
                    tool = name,
                    user_id = %ctx.user_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                output
            }
            Err(e) => {
                error!(
                    tool = name,
                    user_id = %ctx.user_id,
                    error_kind = e.kind(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                e.into_output()
            }
        }
    }

    /// Tool definitions for the LLM provider, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Get the names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::tools::ToolCategory;
    use crate::wallet::SigningIdentity;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Never answers in time"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn category(&self) -> ToolCategory {
            ToolCategory::ChainRead
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolOutput::llm_only("late"))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new("u1", SigningIdentity::generate(), Arc::new(MockChain::new()))
    }

    #[test]
    fn test_chain_tools_registered() {
        let registry = ToolRegistry::chain_tools();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.names(),
            vec![
                "aptos_estimate_gas",
                "aptos_get_balance",
                "aptos_get_transaction",
                "aptos_get_wallet_address",
                "aptos_transfer",
            ]
        );
    }

    #[test]
    fn test_definitions_sorted() {
        let registry = ToolRegistry::chain_tools();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 5);
        assert_eq!(defs[0].name, "aptos_estimate_gas");
        assert!(defs.iter().all(|d| d.parameters["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_output() {
        let registry = ToolRegistry::chain_tools();
        let out = registry
            .execute_with_context("rm_rf", json!({}), &ctx())
            .await;
        assert!(out.is_error);
        assert!(out.for_llm.contains("unknown_tool"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_tool_error() {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(20));
        registry.register(Box::new(SlowTool));
        let out = registry.execute_with_context("slow", json!({}), &ctx()).await;
        assert!(out.is_error);
        let v: Value = serde_json::from_str(&out.for_llm).unwrap();
        assert_eq!(v["error"], "timeout");
    }

    #[tokio::test]
    async fn test_execute_balance_through_registry() {
        let signer = SigningIdentity::generate();
        let chain = MockChain::new().with_balance(signer.address(), 250_000_000);
        let ctx = ToolContext::new("u1", signer, Arc::new(chain));
        let out = ToolRegistry::chain_tools()
            .execute_with_context("aptos_get_balance", json!({}), &ctx)
            .await;
        assert!(!out.is_error);
        let v: Value = serde_json::from_str(&out.for_llm).unwrap();
        assert_eq!(v["balance_apt"], "2.5");
    }
}
