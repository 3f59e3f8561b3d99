//! Relay - Main entry point.

use anyhow::Result;
use relay_channels::run;
use relay_common::config::Config;
use relay_common::logging::init_logging;
use relay_common::util::mask_secret;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!(
        channel = ?config.channel,
        token = %mask_secret(&config.discord.bot_token),
        owner_configured = config.discord.owner_id.is_some(),
        "Relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    run(&config).await
}
