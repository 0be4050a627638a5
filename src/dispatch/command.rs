//! Slash commands and inline-button actions.

use std::fmt;

/// Every non-conversational request the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    CreateAccount,
    ImportAccount,
    Settings,
    ViewPrivateKey,
    ViewWallet,
    ToggleAlerts,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Start,
        Command::CreateAccount,
        Command::ImportAccount,
        Command::Settings,
        Command::ViewPrivateKey,
        Command::ViewWallet,
        Command::ToggleAlerts,
    ];

    /// Action tag carried by the inline button for this command.
    pub fn action(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::CreateAccount => "create_account",
            Command::ImportAccount => "import_account",
            Command::Settings => "settings",
            Command::ViewPrivateKey => "view_private_key",
            Command::ViewWallet => "view_wallet",
            Command::ToggleAlerts => "toggle_alerts",
        }
    }

    /// Typed form, without the leading slash.
    pub fn slash(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::CreateAccount => "create",
            Command::ImportAccount => "import",
            Command::Settings => "settings",
            Command::ViewPrivateKey => "privatekey",
            Command::ViewWallet => "wallet",
            Command::ToggleAlerts => "alerts",
        }
    }

    pub fn from_action(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.action() == tag.trim())
    }

    /// Parse typed text such as `/start` or `/wallet@AptoClawBot`.
    ///
    /// Anything after the command word is ignored. Text that does not start
    /// with `/` is never a command.
    pub fn from_text(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word).to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.slash() == name)
    }

    /// Button presses are matched by action tag, typed text by slash form.
    pub fn parse(content: &str, is_action: bool) -> Option<Self> {
        if is_action {
            Self::from_action(content)
        } else {
            Self::from_text(content)
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_commands() {
        assert_eq!(Command::from_text("/start"), Some(Command::Start));
        assert_eq!(Command::from_text("  /Wallet  "), Some(Command::ViewWallet));
        assert_eq!(Command::from_text("/alerts@AptoClawBot"), Some(Command::ToggleAlerts));
        assert_eq!(Command::from_text("/start ref123"), Some(Command::Start));
        assert_eq!(Command::from_text("/privatekey"), Some(Command::ViewPrivateKey));
        assert_eq!(Command::from_text("/unknown"), None);
        assert_eq!(Command::from_text("/"), None);
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::from_text("start"), None);
        assert_eq!(Command::from_text("settings please"), None);
        assert_eq!(Command::parse("settings", false), None);
    }

    #[test]
    fn test_actions() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_action(cmd.action()), Some(cmd));
            assert_eq!(Command::parse(cmd.action(), true), Some(cmd));
        }
        assert_eq!(Command::from_action("/start"), None);
        assert_eq!(Command::from_action("transfer_all"), None);
    }
}
