//! Context builder for agent conversations
//!
//! Builds the system prompt and the message list sent to the provider on
//! every reasoning step.

use crate::session::Message;

/// Default system prompt for the AptoClaw agent
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful agent that interacts on-chain on the \
Aptos blockchain on behalf of the user, using the tools provided. Be concise and helpful.";

const TOOL_RULES: &str = "Amounts are in APT with up to 8 decimal places. Only send funds when \
the user has clearly asked for a transfer, and report the transaction hash afterwards. If a tool \
returns an error, explain it plainly and suggest what the user can do.";

/// Builds the messages for one reasoning step.
///
/// # Example
///
/// ```rust
/// use aptoclaw::agent::ContextBuilder;
/// use aptoclaw::session::Message;
///
/// let builder = ContextBuilder::new().with_wallet("0xabc", "testnet");
/// let messages = builder.build_messages(&[Message::user("balance?")]);
/// assert_eq!(messages.len(), 2);
/// assert!(messages[0].content.contains("0xabc"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    wallet: Option<(String, String)>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            wallet: None,
        }
    }

    /// Replace the built-in instruction text.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Tell the agent which wallet it acts for.
    pub fn with_wallet(mut self, address: &str, network: &str) -> Self {
        self.wallet = Some((address.to_string(), network.to_string()));
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.system_prompt.clone();
        if let Some((address, network)) = &self.wallet {
            prompt.push_str(&format!(
                "\n\n## Wallet\n- Network: {}\n- Address: {}",
                network, address
            ));
        }
        prompt.push_str("\n\n");
        prompt.push_str(TOOL_RULES);
        prompt
    }

    /// System prompt followed by the conversation so far.
    pub fn build_messages(&self, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(&self.build_system_prompt()));
        messages.extend(history.iter().cloned());
        messages
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
