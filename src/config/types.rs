//! Configuration type definitions for AptoClaw
//!
//! All types implement serde traits for JSON serialization and fall back to
//! defaults field by field, so a partial config file is always valid.

use serde::{Deserialize, Serialize};

/// Main configuration struct for AptoClaw
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (model, limits, timeouts)
    pub agents: AgentConfig,
    /// Chat transports
    pub channels: ChannelsConfig,
    /// Reasoning backend credentials and retry policy
    pub providers: ProvidersConfig,
    /// Aptos network settings
    pub chain: ChainConfig,
    /// Where accounts and conversation memory are kept
    pub storage: StorageConfig,
    /// Log output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    pub defaults: AgentDefaults,
}

/// Default agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Chat-completions model name
    pub model: String,
    /// Maximum tokens for responses
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum reasoning/tool rounds per reply
    pub max_tool_iterations: u32,
    /// Wall-clock bound (seconds) for a whole reply
    pub agent_timeout_secs: u64,
    /// Bound (seconds) for each reasoning call and each tool call
    pub request_timeout_secs: u64,
    /// Messages kept in a conversation checkpoint
    pub max_history_messages: usize,
    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            max_tool_iterations: 8,
            agent_timeout_secs: 120,
            request_timeout_secs: 60,
            max_history_messages: 40,
            system_prompt: None,
        }
    }
}

// ============================================================================
// Channel Configurations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Telegram bot configuration
    pub telegram: Option<TelegramConfig>,
}

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// Whether the channel is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token from BotFather
    pub token: String,
    /// Allowlist of user IDs/usernames
    #[serde(default)]
    pub allow_from: Vec<String>,
    /// Reject everyone when `allow_from` is empty
    #[serde(default)]
    pub deny_by_default: bool,
}

// ============================================================================
// Provider Configurations
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI (or any OpenAI-compatible endpoint)
    pub openai: Option<ProviderConfig>,
    /// Retry behaviour for transient provider failures
    pub retry: RetryConfig,
}

/// Generic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom API base URL
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Retry behavior for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
        }
    }
}

// ============================================================================
// Chain Configuration
// ============================================================================

/// Named Aptos networks with a well-known fullnode endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Devnet,
    Local,
}

impl Network {
    /// REST base URL of the public fullnode for this network.
    pub fn default_node_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://fullnode.mainnet.aptoslabs.com/v1",
            Network::Testnet => "https://fullnode.testnet.aptoslabs.com/v1",
            Network::Devnet => "https://fullnode.devnet.aptoslabs.com/v1",
            Network::Local => "http://127.0.0.1:8080/v1",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Local => "local",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "local" => Ok(Network::Local),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// Aptos client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub network: Network,
    /// Overrides the network's public fullnode URL
    pub node_url: Option<String>,
    /// Gas unit cap attached to every transaction
    pub max_gas_amount: u64,
    /// How long to wait for a submitted transaction to commit
    pub transaction_wait_secs: u64,
    /// Per-request HTTP timeout against the node
    pub http_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            node_url: None,
            max_gas_amount: 2_000,
            transaction_wait_secs: 30,
            http_timeout_secs: 15,
        }
    }
}

impl ChainConfig {
    /// Effective node URL without a trailing slash.
    pub fn node_url(&self) -> String {
        self.node_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(self.network.default_node_url())
            .trim_end_matches('/')
            .to_string()
    }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// On-disk locations. `~` expands to the home directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// One JSON document per user account
    pub accounts_dir: String,
    /// One JSON document per conversation thread
    pub sessions_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            accounts_dir: "~/.aptoclaw/accounts".to_string(),
            sessions_dir: "~/.aptoclaw/sessions".to_string(),
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Component,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Append JSON logs to this file instead of stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
