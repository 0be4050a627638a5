//! Configuration checks run by `aptoclaw config check` and before the
//! gateway starts.

use super::Config;
use std::fmt;

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Check a loaded config for settings the gateway cannot run with.
pub fn validate_config(config: &Config) -> Vec<Diagnostic> {
    use DiagnosticLevel::*;
    let mut out = Vec::new();

    match &config.channels.telegram {
        Some(tg) if tg.enabled && tg.token.trim().is_empty() => {
            out.push(Diagnostic::new(Error, "channels.telegram.token", "Missing bot token"));
        }
        Some(tg) if tg.enabled => {
            if tg.allow_from.is_empty() && !tg.deny_by_default {
                out.push(Diagnostic::new(
                    Warn,
                    "channels.telegram.allow_from",
                    "Empty; anyone can message the bot",
                ));
            }
        }
        _ => out.push(Diagnostic::new(Error, "channels.telegram", "No enabled chat channel")),
    }

    if config.openai_api_key().is_none() {
        out.push(Diagnostic::new(
            Error,
            "providers.openai.api_key",
            "Missing API key; the agent cannot answer",
        ));
    }

    let defaults = &config.agents.defaults;
    if !(0.0..=2.0).contains(&defaults.temperature) {
        out.push(Diagnostic::new(
            Error,
            "agents.defaults.temperature",
            format!("{} is outside 0.0..=2.0", defaults.temperature),
        ));
    }
    if defaults.max_tool_iterations == 0 {
        out.push(Diagnostic::new(
            Error,
            "agents.defaults.max_tool_iterations",
            "Must be at least 1",
        ));
    }
    if defaults.request_timeout_secs == 0 || defaults.agent_timeout_secs == 0 {
        out.push(Diagnostic::new(Error, "agents.defaults", "Timeouts must be non-zero"));
    } else if defaults.request_timeout_secs > defaults.agent_timeout_secs {
        out.push(Diagnostic::new(
            Warn,
            "agents.defaults.request_timeout_secs",
            "Longer than agent_timeout_secs; the overall bound fires first",
        ));
    }

    if let Some(url) = &config.chain.node_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            out.push(Diagnostic::new(
                Error,
                "chain.node_url",
                format!("'{}' is not an http(s) URL", url),
            ));
        }
    }
    if config.chain.max_gas_amount == 0 {
        out.push(Diagnostic::new(Error, "chain.max_gas_amount", "Must be non-zero"));
    }

    if !out.iter().any(|d| d.level == Error) {
        out.insert(0, Diagnostic::new(Ok, "", "Configuration is usable"));
    }
    out
}

/// `true` if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
}
