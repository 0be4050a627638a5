//! Telegram Channel Implementation
//!
//! Long-polls the Bot API with teloxide. Text messages and inline-button
//! presses become [`InboundMessage`]s; outbound messages are sent with HTML
//! formatting, inline keyboards and reply threading, and typing status
//! updates become `sendChatAction` calls.
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────┐
//! │   Telegram API   │ <────── │  TelegramChannel │
//! │                  │ ──────> │   (teloxide)     │
//! └──────────────────┘         └────────┬─────────┘
//!                                       │ InboundMessage
//!                                       ▼
//!                              ┌──────────────────┐
//!                              │    MessageBus    │
//!                              └──────────────────┘
//! ```

use async_trait::async_trait;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction as TelegramChatAction, InlineKeyboardButton, InlineKeyboardMarkup, MessageId,
    ParseMode, ReplyParameters,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bus::{
    ChatAction, ChatKind, InboundMessage, InlineButton, MessageBus, OutboundMessage, TextFormat,
};
use crate::config::TelegramConfig;
use crate::error::{AptoError, Result};

use super::{BaseChannelConfig, Channel};

/// Maximum number of startup connectivity retries before giving up.
const MAX_STARTUP_RETRIES: u32 = 10;
/// Base delay (in seconds) for exponential backoff on startup retries.
const BASE_RETRY_DELAY_SECS: u64 = 2;
/// Maximum delay (in seconds) for exponential backoff on startup retries.
const MAX_RETRY_DELAY_SECS: u64 = 120;

const CHANNEL_NAME: &str = "telegram";

type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Telegram bot channel.
pub struct TelegramChannel {
    config: TelegramConfig,
    base_config: BaseChannelConfig,
    bus: Arc<MessageBus>,
    /// Shared with the polling task so it can report when it stops.
    running: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Cached bot for `send`
    bot: Option<Bot>,
}

impl TelegramChannel {
    /// ```
    /// use std::sync::Arc;
    /// use aptoclaw::bus::MessageBus;
    /// use aptoclaw::channels::{Channel, TelegramChannel};
    /// use aptoclaw::config::TelegramConfig;
    ///
    /// let config = TelegramConfig {
    ///     enabled: true,
    ///     token: "BOT_TOKEN".to_string(),
    ///     ..Default::default()
    /// };
    /// let channel = TelegramChannel::new(config, Arc::new(MessageBus::new()));
    /// assert_eq!(channel.name(), "telegram");
    /// assert!(!channel.is_running());
    /// ```
    pub fn new(config: TelegramConfig, bus: Arc<MessageBus>) -> Self {
        let base_config = BaseChannelConfig {
            name: CHANNEL_NAME.to_string(),
            allowlist: config.allow_from.clone(),
            deny_by_default: config.deny_by_default,
        };
        Self {
            config,
            base_config,
            bus,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            bot: None,
        }
    }

    pub fn telegram_config(&self) -> &TelegramConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn startup_backoff_delay(attempt: u32) -> Duration {
        let delay_secs = BASE_RETRY_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY_SECS);
        Duration::from_secs(delay_secs)
    }

    /// Bot client without automatic system proxy detection.
    fn build_bot(token: &str) -> Result<Bot> {
        let client = teloxide::net::default_reqwest_settings()
            .no_proxy()
            .build()
            .map_err(|e| AptoError::Channel(format!("Failed to build Telegram HTTP client: {}", e)))?;
        Ok(Bot::with_client(token.to_string(), client))
    }

    /// Retry `getMe` on transient errors. Returns `false` if the bot should
    /// not start (permanent error, retries exhausted, or shutdown).
    async fn wait_until_reachable(bot: &Bot, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        use teloxide::RequestError;

        let mut attempt: u32 = 0;
        loop {
            let err = match bot.get_me().await {
                Ok(_) => {
                    info!("Telegram bot authenticated");
                    return true;
                }
                Err(e) => e,
            };
            let is_transient = matches!(
                &err,
                RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
            );
            if !is_transient || attempt >= MAX_STARTUP_RETRIES {
                error!(attempts = attempt + 1, error = %err, "Telegram startup check failed");
                return false;
            }

            let delay = match &err {
                RequestError::RetryAfter(d) => d.duration(),
                _ => Self::startup_backoff_delay(attempt),
            };
            warn!(
                attempt = attempt + 1,
                max = MAX_STARTUP_RETRIES,
                retry_in_secs = delay.as_secs(),
                error = %err,
                "Telegram startup check failed, retrying"
            );
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Telegram channel shutdown during startup retry");
                    return false;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

/// Typed text from a user. Non-text updates are ignored.
async fn on_message(msg: Message, bus: Arc<MessageBus>, access: BaseChannelConfig) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0.to_string();
    if !access.is_allowed(&user_id) {
        info!(user_id = %user_id, "Telegram user not in allowlist, ignoring message");
        return Ok(());
    }

    let chat_id = msg.chat.id.0.to_string();
    // The text may be a private key; only its size is logged here.
    debug!(user_id = %user_id, chat_id = %chat_id, chars = text.chars().count(), "Telegram message received");

    let inbound = text_message(
        &user_id,
        &chat_id,
        msg.chat.is_private(),
        &msg.id.0.to_string(),
        text,
    );
    if let Err(e) = bus.publish_inbound(inbound).await {
        error!(error = %e, "Failed to publish inbound message to bus");
    }
    Ok(())
}

/// Inline-button press. Always answered so the client stops its spinner.
async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    bus: Arc<MessageBus>,
    access: BaseChannelConfig,
) -> HandlerResult {
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let user_id = query.from.id.0.to_string();
    if !access.is_allowed(&user_id) {
        info!(user_id = %user_id, "Telegram user not in allowlist, ignoring button");
        return Ok(());
    }
    let (Some(action), Some(origin)) = (query.data.as_deref(), query.message.as_ref()) else {
        return Ok(());
    };

    let chat = origin.chat();
    let message_id = origin.id().0.to_string();
    debug!(user_id = %user_id, action = %action, "Telegram button pressed");

    let inbound = button_press(
        &user_id,
        &chat.id.0.to_string(),
        chat.is_private(),
        &message_id,
        action,
    );
    if let Err(e) = bus.publish_inbound(inbound).await {
        error!(error = %e, "Failed to publish inbound action to bus");
    }
    Ok(())
}

fn chat_kind(is_private: bool) -> ChatKind {
    if is_private {
        ChatKind::Direct
    } else {
        ChatKind::Group
    }
}

fn text_message(
    user_id: &str,
    chat_id: &str,
    is_private: bool,
    message_id: &str,
    text: &str,
) -> InboundMessage {
    InboundMessage::new(CHANNEL_NAME, user_id, chat_id, text)
        .with_chat_kind(chat_kind(is_private))
        .with_message_id(message_id)
}

fn button_press(
    user_id: &str,
    chat_id: &str,
    is_private: bool,
    message_id: &str,
    action: &str,
) -> InboundMessage {
    let callback_id = format!("{}:{}", chat_id, message_id);
    InboundMessage::action(CHANNEL_NAME, user_id, chat_id, action, &callback_id)
        .with_chat_kind(chat_kind(is_private))
}

fn keyboard(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.action.clone()))
            .collect::<Vec<_>>()
    }))
}

fn parse_chat_id(chat_id: &str) -> Result<ChatId> {
    chat_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| AptoError::Channel(format!("Invalid Telegram chat ID: {}", chat_id)))
}

fn parse_reply_to(reply_to: Option<&str>) -> Option<MessageId> {
    reply_to.and_then(|id| id.parse::<i32>().ok()).map(MessageId)
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    /// Spawns the polling task and returns immediately.
    async fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Telegram channel already running");
            return Ok(());
        }

        if !self.config.enabled {
            warn!("Telegram channel is disabled in configuration");
            self.running.store(false, Ordering::SeqCst);
            return Ok(());
        }

        if self.config.token.trim().is_empty() {
            error!("Telegram bot token is empty");
            self.running.store(false, Ordering::SeqCst);
            return Err(AptoError::Config("Telegram bot token is empty".into()));
        }

        info!("Starting Telegram channel");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let bot = match Self::build_bot(&self.config.token) {
            Ok(bot) => bot,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.bot = Some(bot.clone());

        let bus = self.bus.clone();
        let access = self.base_config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let task_result = std::panic::AssertUnwindSafe(async move {
                if !TelegramChannel::wait_until_reachable(&bot, &mut shutdown_rx).await {
                    return;
                }

                let handler = dptree::entry()
                    .branch(Update::filter_message().endpoint(on_message))
                    .branch(Update::filter_callback_query().endpoint(on_callback));

                let mut dispatcher = Dispatcher::builder(bot, handler)
                    .dependencies(dptree::deps![bus, access])
                    .build();

                info!("Telegram polling started");
                tokio::select! {
                    _ = dispatcher.dispatch() => {
                        info!("Telegram dispatcher completed");
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Telegram channel shutdown signal received");
                    }
                }
            })
            .catch_unwind()
            .await;

            if task_result.is_err() {
                error!("Telegram polling task panicked");
            }
            running.store(false, Ordering::SeqCst);
            info!("Telegram polling task stopped");
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            info!("Telegram channel already stopped");
            return Ok(());
        }

        info!("Stopping Telegram channel");
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).await.is_err() {
                warn!("Telegram shutdown channel already closed");
            }
        }
        self.bot = None;
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AptoError::Channel("Telegram channel not running".to_string()));
        }
        let chat_id = parse_chat_id(&msg.chat_id)?;
        let bot = self
            .bot
            .as_ref()
            .ok_or_else(|| AptoError::Channel("Telegram bot not initialized".to_string()))?;

        if let Some(ChatAction::Typing) = msg.action {
            bot.send_chat_action(chat_id, TelegramChatAction::Typing)
                .await
                .map_err(|e| AptoError::Channel(format!("Failed to send chat action: {}", e)))?;
            return Ok(());
        }

        let mut request = bot.send_message(chat_id, msg.content.clone());
        if msg.format == TextFormat::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        if !msg.buttons.is_empty() {
            request = request.reply_markup(keyboard(&msg.buttons));
        }
        if let Some(reply_to) = parse_reply_to(msg.reply_to.as_deref()) {
            request = request.reply_parameters(ReplyParameters::new(reply_to));
        }
        request
            .await
            .map_err(|e| AptoError::Channel(format!("Failed to send Telegram message: {}", e)))?;

        debug!(chat_id = %msg.chat_id, "Telegram message sent");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_allowed(&self, user_id: &str) -> bool {
        self.base_config.is_allowed(user_id)
    }
}
