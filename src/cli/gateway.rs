//! Gateway command handler (the running bot).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use aptoclaw::agent::SessionFactory;
use aptoclaw::bus::MessageBus;
use aptoclaw::chain::{AptosClient, ChainClient};
use aptoclaw::channels::{ChannelManager, TelegramChannel};
use aptoclaw::config::validate::{has_errors, validate_config, DiagnosticLevel};
use aptoclaw::config::Config;
use aptoclaw::dispatch::Dispatcher;
use aptoclaw::providers::{build_provider, LLMProvider};
use aptoclaw::session::SessionManager;
use aptoclaw::wallet::{JsonFileAccountStore, Keystore};

/// Start the Telegram bot and serve until Ctrl+C.
pub(crate) async fn cmd_gateway() -> Result<()> {
    println!("Starting AptoClaw Gateway...");

    let config = Config::load().with_context(|| "Failed to load configuration")?;

    let diagnostics = validate_config(&config);
    for diag in diagnostics.iter().filter(|d| d.level != DiagnosticLevel::Ok) {
        eprintln!("{}", diag);
    }
    if has_errors(&diagnostics) {
        return Err(anyhow::anyhow!(
            "Configuration has errors; run 'aptoclaw config check' for details"
        ));
    }

    let provider: Arc<dyn LLMProvider> = Arc::from(
        build_provider(&config).with_context(|| "Failed to configure the reasoning backend")?,
    );
    let chain: Arc<dyn ChainClient> = Arc::new(
        AptosClient::new(&config.chain).with_context(|| "Failed to create the Aptos client")?,
    );
    info!(network = %chain.network(), node = %config.chain.node_url(), "Aptos client ready");

    let store = JsonFileAccountStore::open(config.accounts_path())
        .with_context(|| "Failed to open the account store")?;
    let keystore = Keystore::new(Arc::new(store));

    let sessions = SessionManager::with_path(config.sessions_path())
        .with_context(|| "Failed to open conversation storage")?;

    let factory = SessionFactory::new(provider, chain, sessions, config.agents.defaults.clone());

    let bus = Arc::new(MessageBus::new());
    let dispatcher = Arc::new(Dispatcher::new(bus.clone(), keystore, factory));

    let channel_manager = ChannelManager::new(bus.clone());
    if let Some(telegram) = config.channels.telegram.clone().filter(|t| t.enabled) {
        channel_manager
            .register(Box::new(TelegramChannel::new(telegram, bus.clone())))
            .await;
    }
    channel_manager
        .start_all()
        .await
        .with_context(|| "Failed to start channels")?;

    let dispatcher_task = Arc::clone(&dispatcher);
    let dispatcher_handle = tokio::spawn(async move {
        if let Err(e) = dispatcher_task.run().await {
            error!("Dispatcher error: {}", e);
        }
    });

    println!();
    println!(
        "Gateway is running on {} ({} channel(s)). Press Ctrl+C to stop.",
        config.chain.network.as_str(),
        channel_manager.channel_count().await
    );
    println!();

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "Failed to listen for Ctrl+C")?;

    println!();
    println!("Shutting down...");

    dispatcher.stop();
    channel_manager
        .stop_all()
        .await
        .with_context(|| "Failed to stop channels")?;
    let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await;

    println!("Gateway stopped.");
    Ok(())
}
