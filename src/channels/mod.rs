//! Channels module - chat transports
//!
//! A [`Channel`] publishes user events to the [`MessageBus`](crate::bus::MessageBus)
//! and delivers replies. The [`ChannelManager`] starts the registered
//! channels and routes outbound messages to them by name.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ChannelManager              │
//! │   ┌──────────┐                           │
//! │   │ Telegram │  implements Channel       │
//! │   └────┬─────┘                           │
//! │        │                                 │
//! │  ┌─────┴─────┐                           │
//! │  │MessageBus │ inbound -> Dispatcher     │
//! │  │           │ outbound <- Dispatcher    │
//! │  └───────────┘                           │
//! └──────────────────────────────────────────┘
//! ```

mod manager;
pub mod telegram;
mod types;

pub use manager::ChannelManager;
pub use telegram::TelegramChannel;
pub use types::{BaseChannelConfig, Channel};
