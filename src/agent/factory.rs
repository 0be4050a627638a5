//! Builds [`AgentSession`]s bound to one user's signer.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::chain::ChainClient;
use crate::config::AgentDefaults;
use crate::providers::LLMProvider;
use crate::session::SessionManager;
use crate::tools::{ToolContext, ToolRegistry};
use crate::utils::KeyedLocks;
use crate::wallet::SigningIdentity;

use super::{AgentSession, ContextBuilder};

/// Stateless factory: everything shared between sessions lives here, the
/// per-user parts are bound in [`build_session`](Self::build_session).
///
/// # Example
///
/// ```rust,ignore
/// use aptoclaw::agent::SessionFactory;
/// use futures::StreamExt;
///
/// let factory = SessionFactory::new(provider, chain, sessions, config.agents.defaults.clone());
/// let session = factory.build_session("42", signer);
/// let mut stream = session.stream_respond("What's my balance?");
/// while let Some(chunk) = stream.next().await {
///     println!("{:?}", chunk?);
/// }
/// ```
#[derive(Clone)]
pub struct SessionFactory {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    chain: Arc<dyn ChainClient>,
    sessions: SessionManager,
    settings: AgentDefaults,
    thread_locks: KeyedLocks,
}

impl SessionFactory {
    /// Factory wired to the on-chain toolset. Each tool call is bounded by
    /// `request_timeout_secs`.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        chain: Arc<dyn ChainClient>,
        sessions: SessionManager,
        settings: AgentDefaults,
    ) -> Self {
        let tools = ToolRegistry::chain_tools()
            .with_timeout(Duration::from_secs(settings.request_timeout_secs));
        Self {
            provider,
            tools: Arc::new(tools),
            chain,
            sessions,
            settings,
            thread_locks: KeyedLocks::new(),
        }
    }

    /// Replace the toolset.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Conversation memory shared by every session.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Bind `signer` to the toolset and to the conversation `thread_id = user_id`.
    pub fn build_session(&self, user_id: &str, signer: SigningIdentity) -> AgentSession {
        let address = signer.address().to_hex();
        let mut context = ContextBuilder::new().with_wallet(&address, self.chain.network());
        if let Some(prompt) = self
            .settings
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            context = context.with_system_prompt(prompt);
        }
        debug!(user_id = %user_id, address = %address, "Building agent session");

        AgentSession {
            thread_id: user_id.to_string(),
            ctx: ToolContext::new(user_id, signer, Arc::clone(&self.chain)),
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            sessions: self.sessions.clone(),
            context,
            settings: self.settings.clone(),
            thread_locks: self.thread_locks.clone(),
        }
    }
}
