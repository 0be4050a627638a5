//! Message Bus Module
//!
//! The `MessageBus` decouples chat transports from the dispatcher: channels
//! publish inbound events, the dispatcher publishes replies and typing
//! updates, and the channel manager delivers them.
//!
//! ```text
//! ┌─────────────┐  inbound   ┌─────────────┐
//! │  Telegram   │──────────> │ Dispatcher  │
//! │  channel    │ <──────────│             │
//! └─────────────┘  outbound  └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use aptoclaw::bus::{MessageBus, InboundMessage};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bus = MessageBus::new();
//!     let msg = InboundMessage::new("telegram", "42", "42", "/start");
//!     bus.publish_inbound(msg).await.unwrap();
//!
//!     let received = bus.consume_inbound().await.unwrap();
//!     assert_eq!(received.content, "/start");
//! }
//! ```

pub mod message;

pub use message::{
    ChatAction, ChatKind, InboundMessage, InlineButton, OutboundMessage, TextFormat,
};

use crate::error::{AptoError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Default buffer size for message channels
const DEFAULT_BUFFER_SIZE: usize = 100;

/// Two bounded MPSC queues: inbound (channel -> dispatcher) and outbound
/// (dispatcher -> channel). Cloning shares the same queues.
#[derive(Clone)]
pub struct MessageBus {
    inbound_tx: mpsc::Sender<InboundMessage>,
    inbound_rx: Arc<Mutex<mpsc::Receiver<InboundMessage>>>,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    outbound_rx: Arc<Mutex<mpsc::Receiver<OutboundMessage>>>,
}

impl MessageBus {
    /// Creates a new `MessageBus` with the default buffer size (100).
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a new `MessageBus` holding at most `buffer_size` pending
    /// messages per direction.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer_size);

        Self {
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(outbound_rx)),
        }
    }

    /// Publishes an inbound message to the bus.
    ///
    /// # Errors
    /// Returns `AptoError::BusClosed` if the receiver has been dropped.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<()> {
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|_| AptoError::BusClosed)
    }

    /// Waits for the next inbound message. `None` once all senders are gone.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Publishes an outbound message to the bus.
    ///
    /// # Errors
    /// Returns `AptoError::BusClosed` if the receiver has been dropped.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|_| AptoError::BusClosed)
    }

    /// Waits for the next outbound message. `None` once all senders are gone.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Returns a clone of the inbound sender for a channel to own.
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Tries to publish an outbound message without waiting.
    ///
    /// Used for best-effort updates (typing indicator) that should be dropped
    /// rather than delay the caller when the queue is full.
    pub fn try_publish_outbound(&self, msg: OutboundMessage) -> Result<()> {
        self.outbound_tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                AptoError::Channel("outbound buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => AptoError::BusClosed,
        })
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
