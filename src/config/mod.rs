//! Configuration management for AptoClaw
//!
//! Configuration is loaded from `~/.aptoclaw/config.json` (defaults when the
//! file is missing), then overridden from the environment. A `.env` file in
//! the working directory is loaded first so its values count as environment.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the AptoClaw configuration directory path (~/.aptoclaw)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aptoclaw")
    }

    /// Returns the path to the config file (~/.aptoclaw/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Variables follow the pattern `APTOCLAW_SECTION_SUBSECTION_KEY`.
    /// `TELEGRAM_BOT_TOKEN` and `OPENAI_API_KEY` are honoured when the
    /// namespaced variable is absent.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("APTOCLAW_AGENTS_DEFAULTS_MODEL") {
            self.agents.defaults.model = val;
        }
        env_parse("APTOCLAW_AGENTS_DEFAULTS_MAX_TOKENS", &mut self.agents.defaults.max_tokens);
        env_parse("APTOCLAW_AGENTS_DEFAULTS_TEMPERATURE", &mut self.agents.defaults.temperature);
        env_parse(
            "APTOCLAW_AGENTS_DEFAULTS_MAX_TOOL_ITERATIONS",
            &mut self.agents.defaults.max_tool_iterations,
        );
        env_parse(
            "APTOCLAW_AGENTS_DEFAULTS_AGENT_TIMEOUT_SECS",
            &mut self.agents.defaults.agent_timeout_secs,
        );
        env_parse(
            "APTOCLAW_AGENTS_DEFAULTS_REQUEST_TIMEOUT_SECS",
            &mut self.agents.defaults.request_timeout_secs,
        );

        // Provider
        let api_key = std::env::var("APTOCLAW_PROVIDERS_OPENAI_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"));
        if let Ok(val) = api_key {
            self.providers
                .openai
                .get_or_insert_with(ProviderConfig::default)
                .api_key = Some(val);
        }
        if let Ok(val) = std::env::var("APTOCLAW_PROVIDERS_OPENAI_API_BASE") {
            self.providers
                .openai
                .get_or_insert_with(ProviderConfig::default)
                .api_base = Some(val);
        }

        // Telegram
        let token = std::env::var("APTOCLAW_CHANNELS_TELEGRAM_TOKEN")
            .or_else(|_| std::env::var("TELEGRAM_BOT_TOKEN"));
        if let Ok(val) = token {
            let channel = self
                .channels
                .telegram
                .get_or_insert_with(TelegramConfig::default);
            channel.token = val;
            // A token from the environment implies the operator wants the bot up.
            channel.enabled = true;
        }
        if let Ok(val) = std::env::var("APTOCLAW_CHANNELS_TELEGRAM_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.channels
                    .telegram
                    .get_or_insert_with(TelegramConfig::default)
                    .enabled = enabled;
            }
        }

        // Chain
        if let Ok(val) = std::env::var("APTOCLAW_CHAIN_NETWORK") {
            if let Ok(network) = val.parse() {
                self.chain.network = network;
            }
        }
        if let Ok(val) = std::env::var("APTOCLAW_CHAIN_NODE_URL") {
            self.chain.node_url = Some(val);
        }

        // Storage
        if let Ok(val) = std::env::var("APTOCLAW_STORAGE_ACCOUNTS_DIR") {
            self.storage.accounts_dir = val;
        }
        if let Ok(val) = std::env::var("APTOCLAW_STORAGE_SESSIONS_DIR") {
            self.storage.sessions_dir = val;
        }

        if let Ok(val) = std::env::var("APTOCLAW_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Expanded account store directory.
    pub fn accounts_path(&self) -> PathBuf {
        expand_home(&self.storage.accounts_dir)
    }

    /// Expanded conversation memory directory.
    pub fn sessions_path(&self) -> PathBuf {
        expand_home(&self.storage.sessions_dir)
    }

    /// Non-empty OpenAI API key, if configured.
    pub fn openai_api_key(&self) -> Option<String> {
        self.providers
            .openai
            .as_ref()
            .and_then(|p| p.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(val) = std::env::var(name) {
        if let Ok(v) = val.parse() {
            *target = v;
        }
    }
}

/// Expand ~ to home directory in a path string
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
