//! Tools module - on-chain actions the reasoning agent may call
//!
//! # Overview
//!
//! - `Tool` trait: the interface every tool implements
//! - `ToolContext`: binds a call to one user's signer and the chain client
//! - `ToolRegistry`: shared registry that executes tools by name
//! - `ChainTool`: the statically declared Aptos toolset
//!
//! Tool failures never abort a reply. They come back from
//! [`ToolRegistry::execute_with_context`] as an error [`ToolOutput`] whose
//! content is `{"error": <kind>, "message": <text>}`.
//!
//! # Example
//!
//! ```rust
//! use aptoclaw::tools::{ChainTool, Tool, ToolRegistry};
//!
//! let registry = ToolRegistry::chain_tools();
//! let definitions = registry.definitions();
//! assert_eq!(definitions.len(), ChainTool::ALL.len());
//! assert_eq!(ChainTool::Transfer.name(), "aptos_transfer");
//! ```

pub mod chain;
mod registry;
mod types;

pub use chain::ChainTool;
pub use registry::ToolRegistry;
pub use types::{Tool, ToolCategory, ToolContext, ToolError, ToolOutput};
