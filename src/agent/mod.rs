//! Agent module - the per-user reasoning session
//!
//! A [`SessionFactory`] binds a user's [`SigningIdentity`](crate::wallet::SigningIdentity)
//! to the on-chain toolset and to the conversation memory of thread
//! `user_id`. The resulting [`AgentSession`] answers exactly one message,
//! streaming [`ResponseChunk`]s while the tool loop runs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ build_session ┌──────────────┐     ┌─────────────┐
//! │SessionFactory│──────────────>│ AgentSession │────>│ LLMProvider │
//! └──────────────┘               │ (tool loop)  │     └─────────────┘
//!                                └──────────────┘
//!                                  │         │
//!                                  ▼         ▼
//!                           ┌──────────┐ ┌──────────────┐
//!                           │ Session  │ │ ToolRegistry │──> ChainClient
//!                           │ Manager  │ │ (ChainTool)  │
//!                           └──────────┘ └──────────────┘
//! ```
//!
//! Only one reply per thread runs at a time; a second message for the same
//! thread waits for the first reply to finish.

mod context;
mod factory;
mod session;

pub use context::{ContextBuilder, DEFAULT_SYSTEM_PROMPT};
pub use factory::SessionFactory;
pub use session::{AgentSession, ResponseChunk, ResponseStream};
