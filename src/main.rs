//! # RelayClaw — Admin-Gated Message Forwarding Agent
//!
//! Recurring campaigns, targeted campaigns, one-shot schedules, and per-day
//! delivery analytics over the Telegram Bot API.
//!
//! Usage:
//!   relayclaw                          # Run with ~/.relayclaw/config.toml
//!   relayclaw --config ./bot.toml      # Custom config path
//!   relayclaw --init-config            # Write a default config and exit

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use relayclaw_agent::CommandHandler;
use relayclaw_core::RelayConfig;
use relayclaw_engine::{CampaignStore, SchedulingEngine};
use relayclaw_transport::TelegramTransport;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "relayclaw",
    version,
    about = "🤖 RelayClaw — admin-gated message forwarding agent"
)]
struct Cli {
    /// Path to the config file (default: ~/.relayclaw/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "relayclaw=debug,relayclaw_engine=debug,relayclaw_transport=debug,relayclaw_agent=debug"
    } else {
        "relayclaw=info,relayclaw_engine=info,relayclaw_transport=info,relayclaw_agent=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // --init-config: write the template and exit
    if cli.init_config {
        let path = match &cli.config {
            Some(p) => std::path::PathBuf::from(p),
            None => RelayConfig::default_path(),
        };
        if path.exists() {
            println!("⚠️  Config already exists at {}", path.display());
        } else {
            RelayConfig::default().save_to(&path)?;
            println!("✅ Config written to {}", path.display());
            println!("   Fill in bot_token and admin_ids, then run relayclaw again.");
        }
        return Ok(());
    }

    // Load and validate config
    let config = match &cli.config {
        Some(p) => RelayConfig::load_from(std::path::Path::new(p))?,
        None => RelayConfig::load()?,
    };
    config.validate()?;

    // Wire transport, engine, handler
    let transport = Arc::new(TelegramTransport::new(
        &config.bot_token,
        config.poll_interval_secs,
    ));
    let me = transport.get_me().await?;
    tracing::info!(
        "Telegram bot: @{} ({})",
        me.username.as_deref().unwrap_or("unknown"),
        me.first_name
    );

    let store = CampaignStore::new(
        config.admin_ids.iter().copied(),
        config.forward_interval_secs,
    );
    let engine = Arc::new(SchedulingEngine::new(store, transport.clone()));
    let handler = CommandHandler::new(engine.clone());

    println!("🤖 RelayClaw v{}", env!("CARGO_PKG_VERSION"));
    println!("   👤 Admins:           {}", config.admin_ids.len());
    println!("   ⏱️  Default interval: {}s", config.forward_interval_secs);
    println!("   📡 Polling:          every {}s", config.poll_interval_secs);
    println!("   💤 Forwarding starts disabled — send /start from an admin account");
    println!();

    let mut updates = transport.clone().start_polling();

    loop {
        tokio::select! {
            maybe_cmd = updates.next() => {
                let Some(cmd) = maybe_cmd else {
                    tracing::error!("update stream ended, shutting down");
                    break;
                };
                if let Some(reply) = handler.handle(&cmd).await {
                    if let Err(e) = transport.send_message(cmd.chat, &reply).await {
                        tracing::warn!("failed to reply in chat {}: {e}", cmd.chat);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    let stopped = engine.stop_all().await;
    tracing::info!("stopped {stopped} task(s), goodbye");
    Ok(())
}
