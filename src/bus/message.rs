//! Message types for the AptoClaw message bus
//!
//! Transport-neutral shapes exchanged between chat channels and the
//! [`Dispatcher`](crate::dispatch::Dispatcher).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Where an inbound message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one chat between the user and the bot.
    #[default]
    Direct,
    /// Group or channel with other participants.
    Group,
}

/// Represents an incoming event from a channel: either typed text or a
/// button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The channel this message came from (e.g., "telegram")
    pub channel: String,
    /// Unique identifier of the sender; this is the user id
    pub sender_id: String,
    /// Unique identifier of the chat the message was posted in
    pub chat_id: String,
    /// Text content, or the action tag for a button press
    pub content: String,
    /// Direct or group chat
    pub chat_kind: ChatKind,
    /// Transport message id, used for threading replies
    pub message_id: Option<String>,
    /// Set when the event is a button press
    pub callback_id: Option<String>,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    /// Label shown to the user
    pub text: String,
    /// Action tag delivered back as `InboundMessage::content`
    pub action: String,
}

/// How the outbound text should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// Transient chat status shown by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    Typing,
}

/// Represents an outgoing message to be sent via a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The channel to send this message through
    pub channel: String,
    /// The chat/conversation to send to
    pub chat_id: String,
    /// The text content to send; ignored when `action` is set
    pub content: String,
    /// Optional message ID to reply to
    pub reply_to: Option<String>,
    /// Rows of inline buttons attached to the message
    pub buttons: Vec<Vec<InlineButton>>,
    /// Rendering mode for `content`
    pub format: TextFormat,
    /// When set, the channel shows this status instead of sending text
    pub action: Option<ChatAction>,
    /// Resolved by the channel manager once the send attempt finished
    #[serde(skip)]
    delivery: DeliveryReport,
}

/// Sender half of a delivery report. Clones do not carry it, so only the
/// message actually handed to the channel reports back.
#[derive(Default)]
struct DeliveryReport(Option<oneshot::Sender<bool>>);

impl Clone for DeliveryReport {
    fn clone(&self) -> Self {
        Self(None)
    }
}

impl std::fmt::Debug for DeliveryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0.is_some() { "Requested" } else { "None" })
    }
}

impl InboundMessage {
    /// Creates a new text message posted in a direct chat.
    ///
    /// # Example
    /// ```
    /// use aptoclaw::bus::message::{ChatKind, InboundMessage};
    ///
    /// let msg = InboundMessage::new("telegram", "42", "42", "what's my balance?");
    /// assert_eq!(msg.chat_kind, ChatKind::Direct);
    /// assert!(!msg.is_action());
    /// ```
    pub fn new(channel: &str, sender_id: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender_id: sender_id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            chat_kind: ChatKind::Direct,
            message_id: None,
            callback_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Creates a button-press event carrying `action` as its content.
    pub fn action(
        channel: &str,
        sender_id: &str,
        chat_id: &str,
        action: &str,
        callback_id: &str,
    ) -> Self {
        Self::new(channel, sender_id, chat_id, action).with_callback(callback_id)
    }

    /// Marks the message as posted in a group chat (builder pattern).
    pub fn in_group(mut self) -> Self {
        self.chat_kind = ChatKind::Group;
        self
    }

    /// Sets the chat kind (builder pattern).
    pub fn with_chat_kind(mut self, kind: ChatKind) -> Self {
        self.chat_kind = kind;
        self
    }

    /// Sets the transport message id (builder pattern).
    pub fn with_message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_string());
        self
    }

    /// Sets the callback id, turning this into a button press (builder pattern).
    pub fn with_callback(mut self, id: &str) -> Self {
        self.callback_id = Some(id.to_string());
        self
    }

    /// Adds a metadata key-value pair to the message (builder pattern).
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Returns `true` if this event is a button press.
    pub fn is_action(&self) -> bool {
        self.callback_id.is_some()
    }

    /// Returns `true` if this message was posted in a direct chat.
    pub fn is_direct(&self) -> bool {
        self.chat_kind == ChatKind::Direct
    }
}

impl InlineButton {
    pub fn new(text: &str, action: &str) -> Self {
        Self {
            text: text.to_string(),
            action: action.to_string(),
        }
    }
}

impl OutboundMessage {
    /// Creates a new plain-text outbound message.
    ///
    /// # Example
    /// ```
    /// use aptoclaw::bus::message::{OutboundMessage, TextFormat};
    ///
    /// let msg = OutboundMessage::new("telegram", "42", "gm");
    /// assert_eq!(msg.format, TextFormat::Plain);
    /// assert!(msg.buttons.is_empty());
    /// ```
    pub fn new(channel: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            reply_to: None,
            buttons: Vec::new(),
            format: TextFormat::Plain,
            action: None,
            delivery: DeliveryReport::default(),
        }
    }

    /// Creates a chat-status update such as the typing indicator.
    pub fn chat_action(channel: &str, chat_id: &str, action: ChatAction) -> Self {
        let mut msg = Self::new(channel, chat_id, "");
        msg.action = Some(action);
        msg
    }

    /// Creates an outbound message addressed to the chat `msg` came from.
    pub fn reply_to(msg: &InboundMessage, content: &str) -> Self {
        Self::new(&msg.channel, &msg.chat_id, content)
    }

    /// Sets the message ID to reply to (builder pattern).
    pub fn with_reply(mut self, message_id: &str) -> Self {
        self.reply_to = Some(message_id.to_string());
        self
    }

    /// Threads under `message_id` when one is known (builder pattern).
    pub fn with_reply_opt(mut self, message_id: Option<&str>) -> Self {
        self.reply_to = message_id.map(str::to_string);
        self
    }

    /// Renders `content` as Telegram-flavoured HTML (builder pattern).
    pub fn html(mut self) -> Self {
        self.format = TextFormat::Html;
        self
    }

    /// Appends a row of inline buttons (builder pattern).
    pub fn with_button_row(mut self, row: Vec<InlineButton>) -> Self {
        self.buttons.push(row);
        self
    }

    /// Returns `true` if this is a status update rather than a text message.
    pub fn is_chat_action(&self) -> bool {
        self.action.is_some()
    }

    /// Asks whoever delivers this message to report the outcome.
    ///
    /// The receiver yields `true` once the channel accepted the message and
    /// `false` (or a closed channel) when it could not be delivered.
    ///
    /// ```
    /// use aptoclaw::bus::message::OutboundMessage;
    ///
    /// let (mut msg, mut report) = OutboundMessage::new("telegram", "42", "gm").with_delivery_report();
    /// if let Some(tx) = msg.take_delivery_report() {
    ///     let _ = tx.send(true);
    /// }
    /// assert_eq!(report.try_recv(), Ok(true));
    /// ```
    pub fn with_delivery_report(mut self) -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        self.delivery = DeliveryReport(Some(tx));
        (self, rx)
    }

    pub fn wants_delivery_report(&self) -> bool {
        self.delivery.0.is_some()
    }

    /// Detaches the report sender so the message itself can be handed on.
    pub fn take_delivery_report(&mut self) -> Option<oneshot::Sender<bool>> {
        self.delivery.0.take()
    }
}
