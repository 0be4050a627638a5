//! Dispatch module - per-message control flow
//!
//! The [`Dispatcher`] consumes inbound messages from the [`MessageBus`] and
//! decides, in this order:
//!
//! 1. the user asked to import a key and this is their next text: it is
//!    consumed as the import attempt, valid or not (text posted in a group
//!    is discarded instead of imported);
//! 2. a slash command or button action: handled by the keystore or the
//!    import tracker;
//! 3. anything else is a conversational turn for the user's agent session,
//!    whose chunks are forwarded as they arrive.
//!
//! Messages from different users run concurrently; one user's messages are
//! handled one at a time. Every failed request produces exactly one message
//! to the user.

pub mod command;
pub mod replies;

pub use command::Command;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::SessionFactory;
use crate::bus::{ChatAction, InboundMessage, MessageBus, OutboundMessage};
use crate::chain::AccountAddress;
use crate::error::{AptoError, Result};
use crate::utils::string::{preview, split_message};
use crate::utils::KeyedLocks;
use crate::wallet::{ImportStateTracker, Keystore};

use replies::MAX_MESSAGE_CHARS;

/// Interval between typing updates; Telegram clears the status after ~5s.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// How long to wait for the transport to confirm a private-key message.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes inbound messages to the keystore, the import tracker or the agent.
pub struct Dispatcher {
    bus: Arc<MessageBus>,
    keystore: Keystore,
    imports: ImportStateTracker,
    factory: SessionFactory,
    user_locks: KeyedLocks,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Dispatcher {
    pub fn new(bus: Arc<MessageBus>, keystore: Keystore, factory: SessionFactory) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bus,
            keystore,
            imports: ImportStateTracker::new(),
            factory,
            user_locks: KeyedLocks::new(),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn imports(&self) -> &ImportStateTracker {
        &self.imports
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Consume the bus until [`stop`](Self::stop) is called, handling each
    /// message on its own task.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher is already running.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AptoError::Config("Dispatcher already running".into()));
        }
        info!("Starting dispatcher");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = *shutdown_rx.borrow_and_update();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Received shutdown signal");
                        break;
                    }
                }
                msg = self.bus.consume_inbound() => {
                    match msg {
                        Some(msg) => {
                            let this = Arc::clone(&self);
                            tokio::spawn(async move { this.handle(msg).await });
                        }
                        None => {
                            warn!("Inbound queue closed");
                            break;
                        }
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Dispatcher stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
    }

    /// Handle one inbound message to completion, replies included.
    ///
    /// Waits for any earlier message of the same user to finish first.
    pub async fn handle(&self, msg: InboundMessage) {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "request",
            request_id = %request_id,
            user_id = %msg.sender_id,
            chat_id = %msg.chat_id,
            channel = %msg.channel,
        );

        async {
            let _user_guard = self.user_locks.acquire(&msg.sender_id).await;
            let start = Instant::now();

            match self.route(&msg).await {
                Ok(route) => {
                    info!(
                        route = route,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Request completed"
                    );
                }
                Err(e) => {
                    if e.is_fatal_key_error() {
                        error!(error = %e, "Stored key material unusable; no key was regenerated");
                    } else if e.is_user_recoverable() {
                        info!(error = %e, "Request rejected");
                    } else {
                        error!(error = %e, "Request failed");
                    }
                    if let Err(send_err) = self.send(replies::failure(&msg, &e, false)).await {
                        error!(error = %send_err, "Failed to deliver failure notice");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn route(&self, msg: &InboundMessage) -> Result<&'static str> {
        let user_id = msg.sender_id.as_str();

        // Import text is never logged or forwarded to the agent.
        if !msg.is_action() && self.imports.take(user_id).await {
            if !msg.is_direct() {
                warn!("Import text arrived in a group chat; discarded");
                self.send(replies::import_in_group(msg)).await?;
                return Ok("import_refused");
            }
            self.import(msg).await?;
            return Ok("import");
        }

        if let Some(cmd) = Command::parse(&msg.content, msg.is_action()) {
            info!(command = %cmd, "Dispatching command");
            self.command(cmd, msg).await?;
            return Ok("command");
        }

        if msg.is_action() {
            warn!(action = %msg.content, "Unknown button action");
            self.send(replies::unknown_action(msg)).await?;
            return Ok("unknown_action");
        }

        if msg.content.trim().is_empty() {
            debug!("Ignoring empty message");
            return Ok("ignored");
        }

        debug!(text = %preview(&msg.content, 80), "Conversational turn");
        self.converse(msg).await?;
        Ok("conversation")
    }

    /// Chat clients often add a trailing newline to pasted text, so only the
    /// trimmed message is checked against the 64-hex format.
    async fn import(&self, msg: &InboundMessage) -> Result<()> {
        match self
            .keystore
            .import_from_hex(&msg.sender_id, msg.content.trim())
            .await
        {
            Ok(public_key) => {
                self.send(replies::import_success(msg, &address_of(&public_key)))
                    .await
            }
            Err(AptoError::InvalidKeyFormat) => {
                info!("Import rejected: invalid key format");
                self.send(replies::import_invalid(msg)).await
            }
            Err(e) => Err(e),
        }
    }

    async fn command(&self, cmd: Command, msg: &InboundMessage) -> Result<()> {
        let user_id = msg.sender_id.as_str();
        match cmd {
            Command::Start => {
                let (identity, public_key) = self.keystore.get_or_create(user_id).await?;
                self.send(replies::welcome(msg, &public_key, &identity.address().to_hex()))
                    .await
            }
            Command::CreateAccount => {
                let (identity, _) = self.keystore.get_or_create(user_id).await?;
                self.send(replies::account_ready(msg, &identity.address().to_hex()))
                    .await
            }
            Command::ImportAccount => {
                if !msg.is_direct() {
                    return self.send(replies::import_in_group(msg)).await;
                }
                self.imports.begin(user_id).await;
                self.send(replies::import_prompt(msg)).await
            }
            Command::Settings => self.send(replies::settings(msg)).await,
            Command::ViewPrivateKey => {
                let key = self.keystore.reveal_private_key(user_id).await?;
                if msg.is_direct() {
                    self.send(replies::private_key(msg, &key)).await?;
                    info!("Private key sent to owner's direct chat");
                    return Ok(());
                }
                // From a group the user may never have opened a private chat,
                // so the group is only told once delivery is confirmed.
                if self.send_confirmed(replies::private_key(msg, &key)).await? {
                    info!("Private key sent to owner's direct chat");
                    self.send(replies::private_key_sent(msg)).await
                } else {
                    warn!("Private key could not be delivered to owner's direct chat");
                    self.send(replies::private_chat_required(msg)).await
                }
            }
            Command::ViewWallet => match self.keystore.account(user_id).await? {
                Some(account) => {
                    let address = address_of(account.public_key());
                    self.send(replies::wallet(msg, account.public_key(), &address))
                        .await
                }
                None => self.send(replies::no_wallet(msg)).await,
            },
            Command::ToggleAlerts => {
                let enabled = self.keystore.toggle_alerts(user_id).await?;
                self.send(replies::alerts(msg, enabled)).await
            }
        }
    }

    /// Stream the agent's answer. Agent failures are answered here, after
    /// whatever part of the reply was already delivered.
    async fn converse(&self, msg: &InboundMessage) -> Result<()> {
        let (signer, _) = self.keystore.get_or_create(&msg.sender_id).await?;

        let mut typing = Some(TypingIndicator::start(
            Arc::clone(&self.bus),
            &msg.channel,
            &msg.chat_id,
        ));
        let mut stream = self
            .factory
            .build_session(&msg.sender_id, signer)
            .stream_respond(&msg.content);

        let mut shown = 0usize;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let Some(text) = chunk.text() else {
                        debug!(chunk = ?chunk, "Skipping internal chunk");
                        continue;
                    };
                    typing.take();
                    for part in split_message(text, MAX_MESSAGE_CHARS) {
                        // A send failure drops the stream, which cancels the reply.
                        self.send(
                            OutboundMessage::reply_to(msg, &part)
                                .with_reply_opt(msg.message_id.as_deref()),
                        )
                        .await?;
                    }
                    shown += 1;
                }
                Err(e) => {
                    typing.take();
                    warn!(error = %e, chunks_shown = shown, "Agent reply failed");
                    return self.send(replies::failure(msg, &e, shown > 0)).await;
                }
            }
        }
        drop(typing);

        if shown == 0 {
            self.send(replies::empty_answer(msg)).await?;
        }
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        self.bus.publish_outbound(msg).await
    }

    /// Publish `msg` and wait for the transport to report delivery.
    /// Returns `false` when it was refused, dropped or not confirmed in time.
    async fn send_confirmed(&self, msg: OutboundMessage) -> Result<bool> {
        let (msg, report) = msg.with_delivery_report();
        self.send(msg).await?;
        match tokio::time::timeout(DELIVERY_TIMEOUT, report).await {
            Ok(Ok(delivered)) => Ok(delivered),
            Ok(Err(_)) => Ok(false),
            Err(_) => {
                warn!(timeout_secs = DELIVERY_TIMEOUT.as_secs(), "Delivery not confirmed in time");
                Ok(false)
            }
        }
    }
}

fn address_of(public_key: &str) -> String {
    AccountAddress::from_public_key_hex(public_key)
        .map(|a| a.to_hex())
        .unwrap_or_else(|| "unavailable".to_string())
}

/// Keeps the typing status alive until dropped.
struct TypingIndicator {
    task: JoinHandle<()>,
}

impl TypingIndicator {
    /// Sends the first update immediately, then refreshes it.
    fn start(bus: Arc<MessageBus>, channel: &str, chat_id: &str) -> Self {
        let update = OutboundMessage::chat_action(channel, chat_id, ChatAction::Typing);
        if let Err(e) = bus.try_publish_outbound(update.clone()) {
            debug!(error = %e, "Dropped typing update");
        }
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(TYPING_REFRESH).await;
                if let Err(e) = bus.try_publish_outbound(update.clone()) {
                    debug!(error = %e, "Dropped typing update");
                }
            }
        });
        Self { task }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::config::AgentDefaults;
    use crate::providers::mock::ScriptedProvider;
    use crate::providers::{LLMResponse, LLMToolCall};
    use crate::session::SessionManager;
    use crate::wallet::{ImportState, MemoryAccountStore, SigningIdentity};

    struct Harness {
        bus: Arc<MessageBus>,
        dispatcher: Dispatcher,
        provider: Arc<ScriptedProvider>,
    }

    fn harness_with(keystore: Keystore, chain: MockChain, provider: ScriptedProvider) -> Harness {
        let bus = Arc::new(MessageBus::new());
        let provider = Arc::new(provider);
        let factory = SessionFactory::new(
            provider.clone(),
            Arc::new(chain),
            SessionManager::new_memory(),
            AgentDefaults::default(),
        );
        Harness {
            dispatcher: Dispatcher::new(Arc::clone(&bus), keystore, factory),
            bus,
            provider,
        }
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let keystore = Keystore::new(Arc::new(MemoryAccountStore::new()));
        harness_with(keystore, MockChain::new(), provider)
    }

    /// Text replies published so far, typing updates excluded.
    async fn replies(bus: &MessageBus) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(Some(msg)) =
            tokio::time::timeout(Duration::from_millis(20), bus.consume_outbound()).await
        {
            if !msg.is_chat_action() {
                out.push(msg);
            }
        }
        out
    }

    fn dm(text: &str) -> InboundMessage {
        InboundMessage::new("telegram", "u1", "u1", text).with_message_id("100")
    }

    fn press(action: &str) -> InboundMessage {
        InboundMessage::action("telegram", "u1", "u1", action, "cb")
    }

    #[tokio::test]
    async fn test_start_creates_account() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(dm("/start")).await;

        let account = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert!(!account.alerts_enabled());
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].content.contains(account.public_key()));
    }

    #[tokio::test]
    async fn test_import_flow() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(dm("/start")).await;
        h.dispatcher.handle(press("import_account")).await;
        assert_eq!(h.dispatcher.imports().state("u1").await, ImportState::AwaitingKey);

        let key = "11".repeat(32);
        h.dispatcher.handle(dm(&key)).await;

        let expected = SigningIdentity::from_hex64(&key).unwrap();
        let account = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert_eq!(account.public_key(), expected.public_key_hex());
        assert_eq!(h.dispatcher.imports().state("u1").await, ImportState::Idle);

        let out = replies(&h.bus).await;
        assert!(out.last().unwrap().content.contains(&expected.address().to_hex()));
        // The key never reached the agent.
        assert!(h.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_import_trims_pasted_text() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(press("import_account")).await;

        let key = "ab".repeat(32);
        h.dispatcher.handle(dm(&format!("  {}\n", key))).await;

        let expected = SigningIdentity::from_hex64(&key).unwrap();
        let account = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert_eq!(account.public_key(), expected.public_key_hex());

        // Inner whitespace is not repaired.
        h.dispatcher.handle(press("import_account")).await;
        let spaced = format!("{} {}", "cd".repeat(16), "cd".repeat(16));
        h.dispatcher.handle(dm(&spaced)).await;
        let account = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert_eq!(account.public_key(), expected.public_key_hex());
    }

    #[tokio::test]
    async fn test_invalid_import_is_single_shot() {
        let h = harness(ScriptedProvider::new().text("Hi there!"));
        h.dispatcher.handle(dm("/start")).await;
        let before = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();

        h.dispatcher.handle(press("import_account")).await;
        h.dispatcher.handle(dm("abc")).await;

        let after = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert_eq!(before.public_key(), after.public_key());
        assert_eq!(h.dispatcher.imports().state("u1").await, ImportState::Idle);
        let out = replies(&h.bus).await;
        assert!(out.last().unwrap().content.starts_with("Invalid private key format"));

        // The next message is conversational again.
        h.dispatcher.handle(dm("hello")).await;
        assert_eq!(h.provider.requests().len(), 1);
        let out = replies(&h.bus).await;
        assert_eq!(out.last().unwrap().content, "Hi there!");
    }

    #[tokio::test]
    async fn test_import_refused_in_group() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher
            .handle(InboundMessage::action("telegram", "u1", "-100", "import_account", "cb").in_group())
            .await;
        assert_eq!(h.dispatcher.imports().state("u1").await, ImportState::Idle);
        let out = replies(&h.bus).await;
        assert!(out[0].content.contains("private chat"));
    }

    #[tokio::test]
    async fn test_key_pasted_in_group_is_discarded() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(dm("/start")).await;
        let before = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        h.dispatcher.handle(press("import_account")).await;
        replies(&h.bus).await;

        let key = "11".repeat(32);
        h.dispatcher
            .handle(InboundMessage::new("telegram", "u1", "-100", &key).in_group())
            .await;

        let after = h.dispatcher.keystore().account("u1").await.unwrap().unwrap();
        assert_eq!(before.public_key(), after.public_key());
        assert_eq!(h.dispatcher.imports().state("u1").await, ImportState::Idle);
        assert!(h.provider.requests().is_empty());
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chat_id, "-100");
        assert!(!out[0].content.contains(&key));
    }

    /// Delivers outbound messages the way the channel manager does, failing
    /// every send to `unreachable_chat`. Returns the messages delivered.
    fn spawn_transport(
        bus: Arc<MessageBus>,
        unreachable_chat: &'static str,
    ) -> Arc<std::sync::Mutex<Vec<OutboundMessage>>> {
        let delivered = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&delivered);
        tokio::spawn(async move {
            while let Some(mut msg) = bus.consume_outbound().await {
                let ok = msg.chat_id != unreachable_chat;
                if let Some(tx) = msg.take_delivery_report() {
                    let _ = tx.send(ok);
                }
                if ok && !msg.is_chat_action() {
                    log.lock().unwrap().push(msg);
                }
            }
        });
        delivered
    }

    async fn wait_for(
        log: &std::sync::Mutex<Vec<OutboundMessage>>,
        count: usize,
    ) -> Vec<OutboundMessage> {
        for _ in 0..200 {
            if log.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        log.lock().unwrap().clone()
    }

    fn group_press(action: &str) -> InboundMessage {
        InboundMessage::action("telegram", "u1", "-100", action, "cb").in_group()
    }

    #[tokio::test]
    async fn test_private_key_from_group_goes_to_direct_chat() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.keystore().get_or_create("u1").await.unwrap();
        let key = h.dispatcher.keystore().reveal_private_key("u1").await.unwrap();
        let delivered = spawn_transport(Arc::clone(&h.bus), "nobody");

        h.dispatcher.handle(group_press("view_private_key")).await;

        let out = wait_for(&delivered, 2).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].chat_id, "u1");
        assert!(out[0].content.contains(&key));
        assert_eq!(out[1].chat_id, "-100");
        assert!(out[1].content.contains("sent your private key"));
        assert!(!out[1].content.contains(&key));
    }

    #[tokio::test]
    async fn test_private_key_undeliverable_from_group() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.keystore().get_or_create("u1").await.unwrap();
        let key = h.dispatcher.keystore().reveal_private_key("u1").await.unwrap();
        // The user never opened a private chat with the bot.
        let delivered = spawn_transport(Arc::clone(&h.bus), "u1");

        h.dispatcher.handle(group_press("view_private_key")).await;

        let out = wait_for(&delivered, 1).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chat_id, "-100");
        assert!(out[0].content.contains("/start"));
        assert!(!out[0].content.contains("sent your private key"));
        assert!(!out[0].content.contains(&key));
    }

    #[tokio::test]
    async fn test_private_key_in_direct_chat() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(press("view_private_key")).await;
        let out = replies(&h.bus).await;
        assert!(out[0].content.starts_with("No account found"));

        h.dispatcher.keystore().get_or_create("u1").await.unwrap();
        let key = h.dispatcher.keystore().reveal_private_key("u1").await.unwrap();
        h.dispatcher.handle(dm("/privatekey")).await;
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chat_id, "u1");
        assert!(out[0].content.contains(&key));
    }

    #[tokio::test]
    async fn test_users_handled_concurrently() {
        let provider = ScriptedProvider::new()
            .stall(Duration::from_secs(3))
            .text("Hi u2!");
        let h = harness(provider);
        let provider = Arc::clone(&h.provider);
        let dispatcher = Arc::new(h.dispatcher);

        let slow = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.handle(dm("hello")).await }
        });
        for _ in 0..200 {
            if !provider.requests().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(provider.requests().len(), 1);

        let other = InboundMessage::new("telegram", "u2", "u2", "hello");
        tokio::time::timeout(Duration::from_secs(1), dispatcher.handle(other))
            .await
            .expect("u2 waited for u1");
        assert!(!slow.is_finished());

        let out = replies(&h.bus).await;
        assert!(out.iter().any(|m| m.chat_id == "u2" && m.content == "Hi u2!"));
        assert!(out.iter().all(|m| m.chat_id != "u1"));
        slow.abort();
    }

    #[tokio::test]
    async fn test_same_user_messages_serialized() {
        let provider = ScriptedProvider::new()
            .stall(Duration::from_millis(300))
            .text("Second answer");
        let h = harness(provider);
        let provider = Arc::clone(&h.provider);
        let dispatcher = Arc::new(h.dispatcher);

        let first = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.handle(dm("first question")).await }
        });
        for _ in 0..200 {
            if !provider.requests().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let second = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.handle(dm("second question")).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.requests().len(), 1, "second message started early");

        first.await.unwrap();
        second.await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let history = &requests[1];
        assert!(history.iter().any(|m| m.content == "first question"));
        assert!(history.iter().any(|m| m.content == "too late"));
        assert_eq!(history.last().unwrap().content, "second question");

        let out = replies(&h.bus).await;
        let texts: Vec<&str> = out.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["too late", "Second answer"]);
    }

    #[tokio::test]
    async fn test_toggle_alerts() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(press("toggle_alerts")).await;
        let out = replies(&h.bus).await;
        assert!(out[0].content.starts_with("No account found"));

        h.dispatcher.handle(dm("/start")).await;
        h.dispatcher.handle(press("toggle_alerts")).await;
        h.dispatcher.handle(dm("/alerts")).await;
        let out = replies(&h.bus).await;
        assert_eq!(out[1].content, "Alerts are now on.");
        assert_eq!(out[2].content, "Alerts are now off.");
    }

    #[tokio::test]
    async fn test_view_wallet_does_not_create() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(press("view_wallet")).await;
        assert!(h.dispatcher.keystore().account("u1").await.unwrap().is_none());
        let out = replies(&h.bus).await;
        assert!(out[0].content.starts_with("No wallet found"));
    }

    #[tokio::test]
    async fn test_conversation_streams_balance() {
        let keystore = Keystore::new(Arc::new(MemoryAccountStore::new()));
        let (identity, _) = keystore.get_or_create("u1").await.unwrap();
        let chain = MockChain::new().with_balance(identity.address(), 150_000_000);
        let provider = ScriptedProvider::new()
            .reply(LLMResponse::with_tools(
                "",
                vec![LLMToolCall::new("call_1", "aptos_get_balance", "{}")],
            ))
            .text("You have 1.5 APT.");
        let h = harness_with(keystore, chain, provider);

        h.dispatcher.handle(dm("What's my balance?")).await;

        let first = h.bus.consume_outbound().await.unwrap();
        assert_eq!(first.action, Some(ChatAction::Typing));
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "You have 1.5 APT.");
        assert_eq!(out[0].reply_to.as_deref(), Some("100"));
    }

    #[tokio::test]
    async fn test_partial_reply_gets_trailing_notice() {
        let provider = ScriptedProvider::new()
            .reply(LLMResponse::with_tools(
                "Let me check.",
                vec![LLMToolCall::new("call_1", "aptos_get_balance", "{}")],
            ))
            .unreachable();
        let h = harness(provider);

        h.dispatcher.handle(dm("balance?")).await;
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "Let me check.");
        assert!(out[1].content.starts_with("(The reply above was cut short.)"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let h = harness(ScriptedProvider::new());
        h.dispatcher.handle(press("launch_rocket")).await;
        let out = replies(&h.bus).await;
        assert_eq!(out.len(), 1);
        assert!(h.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_run_and_stop() {
        let h = harness(ScriptedProvider::new());
        let dispatcher = Arc::new(h.dispatcher);
        let runner = tokio::spawn(Arc::clone(&dispatcher).run());

        h.bus.publish_inbound(dm("/start")).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(2), h.bus.consume_outbound())
            .await
            .unwrap()
            .unwrap();
        assert!(reply.content.contains("Welcome"));

        dispatcher.stop();
        runner.await.unwrap().unwrap();
        assert!(!dispatcher.is_running());
    }
}
