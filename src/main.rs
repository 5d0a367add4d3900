mod audio;
mod bot;
mod catalog;
mod config;
mod error;
mod handlers;
mod language;
mod middleware;
mod platform;
mod proofread;
mod speech;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, reload, EnvFilter};

use crate::bot::{AppState, Collaborators, LogControl};
use crate::catalog::MessageCatalog;
use crate::config::Config;
use crate::language::Language;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging behind a reload layer so the admin /debug command
    // can change verbosity at runtime.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let (filter_layer, reload_handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let default_language = Language::resolve(&config.bot.default_language, Language::En);
    info!("Configuration loaded successfully");
    info!("  Default language: {}", default_language);
    info!("  Max audio size: {} bytes", config.audio.max_size_bytes);
    info!(
        "  Supported audio formats: {}",
        config.audio.allowed_mime_types.join(", ")
    );
    if config.telegram.whitelist.enabled {
        info!(
            "  Whitelist enabled: {} users, admin {}",
            config.telegram.whitelist.users.len(),
            config.telegram.whitelist.admin_id
        );
    }

    let catalog = MessageCatalog::load(&config.bot.locales_dir, default_language);
    let collaborators = Collaborators::production(&config);
    let state = Arc::new(AppState::new(
        config,
        catalog,
        LogControl::new(reload_handle),
        collaborators,
    ));

    // Run the Telegram bot
    info!("Bot is starting...");
    platform::telegram::run(state).await?;

    info!("Bot stopped");
    Ok(())
}
