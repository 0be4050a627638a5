//! Channel Manager for AptoClaw
//!
//! Owns the registered channels, starts and stops them, and delivers
//! outbound messages from the bus to the channel each one names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{MessageBus, OutboundMessage};
use crate::error::Result;

use super::Channel;

type ChannelMap = Arc<RwLock<HashMap<String, Box<dyn Channel>>>>;

/// Lifecycle and outbound routing for all channels.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use aptoclaw::bus::MessageBus;
/// use aptoclaw::channels::{ChannelManager, TelegramChannel};
///
/// let bus = Arc::new(MessageBus::new());
/// let manager = ChannelManager::new(bus.clone());
/// manager.register(Box::new(TelegramChannel::new(telegram_config, bus))).await;
/// manager.start_all().await?;
/// ```
pub struct ChannelManager {
    channels: ChannelMap,
    bus: Arc<MessageBus>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    /// Outbound delivery task, while running
    outbound_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl ChannelManager {
    /// Creates a manager with no channels.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use aptoclaw::bus::MessageBus;
    /// use aptoclaw::channels::ChannelManager;
    ///
    /// # tokio_test::block_on(async {
    /// let manager = ChannelManager::new(Arc::new(MessageBus::new()));
    /// assert!(manager.channels().await.is_empty());
    /// # })
    /// ```
    pub fn new(bus: Arc<MessageBus>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            bus,
            shutdown_tx,
            shutdown_rx,
            outbound_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Registers a channel under its name, replacing any channel of the same name.
    pub async fn register(&self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "Registering channel");
        self.channels.write().await.insert(name, channel);
    }

    /// Names of all registered channels.
    pub async fn channels(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn has_channel(&self, name: &str) -> bool {
        self.channels.read().await.contains_key(name)
    }

    /// Starts every channel and the outbound delivery task.
    ///
    /// A channel that fails to start is logged and skipped. Calling this
    /// again while the delivery task runs is a no-op.
    pub async fn start_all(&self) -> Result<()> {
        {
            let handle = self.outbound_handle.read().await;
            if let Some(ref handle) = *handle {
                if !handle.is_finished() {
                    warn!("Outbound delivery already running, skipping start");
                    return Ok(());
                }
            }
        }

        let mut channels = self.channels.write().await;
        for (name, channel) in channels.iter_mut() {
            info!(channel = %name, "Starting channel");
            if let Err(e) = channel.start().await {
                error!(channel = %name, error = %e, "Failed to start channel");
            }
        }
        drop(channels);

        let _ = self.shutdown_tx.send(false);

        let bus = self.bus.clone();
        let channels = self.channels.clone();
        let shutdown_rx = self.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            deliver_outbound(bus, channels, shutdown_rx).await;
        });
        *self.outbound_handle.write().await = Some(handle);

        Ok(())
    }

    /// Stops the delivery task (waiting up to 5s) and then every channel.
    pub async fn stop_all(&self) -> Result<()> {
        info!("Signaling outbound delivery to stop");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.outbound_handle.write().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(_) => info!("Outbound delivery stopped cleanly"),
                Err(_) => warn!("Outbound delivery did not stop within timeout"),
            }
        }

        let mut channels = self.channels.write().await;
        for (name, channel) in channels.iter_mut() {
            info!(channel = %name, "Stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %name, error = %e, "Failed to stop channel");
            }
        }
        Ok(())
    }

    /// Sends directly through one channel. Unknown channels are logged and ignored.
    pub async fn send(&self, channel_name: &str, msg: OutboundMessage) -> Result<()> {
        let channels = self.channels.read().await;
        match channels.get(channel_name) {
            Some(channel) => channel.send(msg).await,
            None => {
                warn!(channel = %channel_name, "Channel not found");
                Ok(())
            }
        }
    }

    pub fn bus(&self) -> Arc<MessageBus> {
        self.bus.clone()
    }
}

/// Consumes outbound messages and routes each to `msg.channel` until shutdown.
///
/// A failed send is logged, and reported back when the sender asked for a
/// delivery report.
async fn deliver_outbound(
    bus: Arc<MessageBus>,
    channels: ChannelMap,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Outbound delivery started");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Outbound delivery received shutdown signal");
                    break;
                }
            }
            msg = bus.consume_outbound() => {
                let Some(mut msg) = msg else {
                    info!("Outbound queue closed");
                    break;
                };
                let report = msg.take_delivery_report();
                let channels = channels.read().await;
                let Some(channel) = channels.get(&msg.channel) else {
                    warn!(channel = %msg.channel, "Unknown channel for outbound message");
                    continue;
                };
                let name = msg.channel.clone();
                let is_status = msg.is_chat_action();
                let delivered = match channel.send(msg).await {
                    Ok(()) => true,
                    Err(e) => {
                        if is_status {
                            debug!(channel = %name, error = %e, "Failed to send chat status");
                        } else {
                            error!(channel = %name, error = %e, "Failed to send message");
                        }
                        false
                    }
                };
                if let Some(tx) = report {
                    let _ = tx.send(delivered);
                }
            }
        }
    }
    info!("Outbound delivery stopped");
}
