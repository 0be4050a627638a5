//! AptoClaw - custodial Aptos wallet with a conversational agent, on Telegram
//!
//! Every Telegram user gets an ed25519 account on first contact. Plain text
//! goes to a tool-calling agent that can read balances, estimate fees and
//! transfer APT on the user's behalf; slash commands and inline buttons
//! manage the account itself.

pub mod agent;
pub mod bus;
pub mod chain;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;
pub mod wallet;

pub use agent::{AgentSession, ResponseChunk, ResponseStream, SessionFactory};
pub use bus::{InboundMessage, MessageBus, OutboundMessage};
pub use chain::{AccountAddress, AptosClient, ChainClient, ChainError};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{AptoError, Result};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, OpenAIProvider};
pub use session::{Message, Role, Session, SessionManager, ToolCall};
pub use wallet::{ImportStateTracker, Keystore, SigningIdentity};
