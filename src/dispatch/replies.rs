//! Reply templates (Telegram HTML).

use crate::bus::{InboundMessage, InlineButton, OutboundMessage};
use crate::error::AptoError;

use super::command::Command;

/// Telegram's per-message text limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

const NO_ACCOUNT: &str = "No account found. Send /start to create one.";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn button(text: &str, cmd: Command) -> InlineButton {
    InlineButton::new(text, cmd.action())
}

fn html(msg: &InboundMessage, body: &str) -> OutboundMessage {
    OutboundMessage::reply_to(msg, body).html()
}

pub fn welcome(msg: &InboundMessage, public_key: &str, address: &str) -> OutboundMessage {
    let body = format!(
        "<b>Welcome to AptoClaw!</b>\n\n\
         Your Aptos wallet is ready.\n\
         <b>Public key:</b> <code>{}</code>\n\
         <b>Address:</b> <code>{}</code>\n\n\
         Just tell me what you need, for example:\n\
         • <i>What's my balance?</i>\n\
         • <i>Send 0.5 APT to 0x1234...</i>\n\
         • <i>How much gas does a transfer cost?</i>",
        escape_html(public_key),
        escape_html(address),
    );
    html(msg, &body).with_button_row(vec![
        button("Settings", Command::Settings),
        button("Import Existing Account", Command::ImportAccount),
    ])
}

pub fn account_ready(msg: &InboundMessage, address: &str) -> OutboundMessage {
    html(
        msg,
        &format!(
            "Your account is ready!\n<b>Wallet Address:</b> <code>{}</code>",
            escape_html(address)
        ),
    )
}

pub fn import_prompt(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(msg, "Send your private key (64-character hex format).")
}

pub fn import_in_group(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(
        msg,
        "For your safety, import an account in a private chat with me, never in a group.",
    )
}

pub fn import_success(msg: &InboundMessage, address: &str) -> OutboundMessage {
    html(
        msg,
        &format!(
            "Account imported!\n<b>Wallet Address:</b> <code>{}</code>",
            escape_html(address)
        ),
    )
}

pub fn import_invalid(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(
        msg,
        "Invalid private key format. Tap the button to try again, then send exactly \
         64 hexadecimal characters.",
    )
    .with_button_row(vec![button("Import Existing Account", Command::ImportAccount)])
}

pub fn settings(msg: &InboundMessage) -> OutboundMessage {
    html(msg, "<b>Settings</b>")
        .with_button_row(vec![button("View Private Key", Command::ViewPrivateKey)])
        .with_button_row(vec![button("View Wallet Address", Command::ViewWallet)])
        .with_button_row(vec![button("Toggle Alerts", Command::ToggleAlerts)])
}

/// Addressed to the user's direct chat, whatever chat the request came from.
pub fn private_key(msg: &InboundMessage, key: &str) -> OutboundMessage {
    OutboundMessage::new(
        &msg.channel,
        &msg.sender_id,
        &format!(
            "<b>Your private key</b>\n<tg-spoiler><code>{}</code></tg-spoiler>\n\n\
             Anyone with this key controls your funds. Never share it.",
            escape_html(key)
        ),
    )
    .html()
}

pub fn private_key_sent(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(msg, "I sent your private key to you in a private chat.")
}

pub fn private_chat_required(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(
        msg,
        "I couldn't message you privately. Open a private chat with me and send /start first, then ask for your key again.",
    )
}

pub fn wallet(msg: &InboundMessage, public_key: &str, address: &str) -> OutboundMessage {
    html(
        msg,
        &format!(
            "<b>Public key:</b> <code>{}</code>\n<b>Wallet Address:</b> <code>{}</code>",
            escape_html(public_key),
            escape_html(address)
        ),
    )
}

pub fn no_wallet(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(msg, "No wallet found. Send /start to create one.")
}

pub fn alerts(msg: &InboundMessage, enabled: bool) -> OutboundMessage {
    let state = if enabled { "on" } else { "off" };
    OutboundMessage::reply_to(msg, &format!("Alerts are now {}.", state))
}

pub fn unknown_action(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(msg, "That button is no longer available. Send /start to see the menu.")
}

/// Sent when the agent finished without any text.
pub fn empty_answer(msg: &InboundMessage) -> OutboundMessage {
    OutboundMessage::reply_to(msg, "I couldn't come up with an answer. Please rephrase your request.")
        .with_reply_opt(msg.message_id.as_deref())
}

/// The one message a user gets for a failed request.
///
/// When part of an agent reply was already shown, the text says so.
pub fn failure(msg: &InboundMessage, err: &AptoError, partial: bool) -> OutboundMessage {
    let text = failure_text(err);
    let text = if partial {
        format!("(The reply above was cut short.) {}", text)
    } else {
        text.to_string()
    };
    OutboundMessage::reply_to(msg, &text).with_reply_opt(msg.message_id.as_deref())
}

fn failure_text(err: &AptoError) -> &'static str {
    match err {
        AptoError::AccountNotFound(_) => NO_ACCOUNT,
        AptoError::InvalidKeyFormat => {
            "Invalid private key format. Send exactly 64 hexadecimal characters."
        }
        AptoError::KeyDecode(_) => {
            "Your stored wallet key could not be read. No new key was created, so your \
             funds are safe; please contact the bot operator."
        }
        AptoError::AgentTimeout(_) => "That took too long to answer. Please try again.",
        AptoError::AgentUnavailable(_) => {
            "The assistant is unavailable right now. Please try again in a moment."
        }
        _ => "Something went wrong on our side. Please try again later.",
    }
}
