//! Relay Channels - chat relay bot.
//!
//! Receives commands from a chat channel, forwards prompts to a g4f-compatible
//! generation backend and sends the answers back in platform-sized segments.
//!
//! ## Architecture
//!
//! ```text
//! Discord gateway → listen() → mpsc → RelayBridge → GenerationBackend
//!                                          ↓
//! Discord REST   ←──── Channel::send ←── segments
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backend;
pub mod bridge;
pub mod cli;
pub mod command;
pub mod discord;
pub mod message;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use backend::{BackendError, ChatCompletion, G4fBackend, GeneratedImage, GenerationBackend};
pub use bridge::{BridgeSettings, RelayBridge};
pub use cli::CliChannel;
pub use command::Command;
pub use discord::DiscordChannel;
pub use message::{Attachment, ChannelMessage, ChannelType, OutgoingContent, OutgoingMessage};
pub use traits::{Channel, ChannelError, ChannelResult};

use relay_common::config::{ChannelKind, Config};
use std::sync::Arc;

/// Inbound queue depth between the listener and the bridge.
const INBOUND_QUEUE: usize = 100;

/// Build and initialize the configured channel.
pub async fn build_channel(config: &Config) -> anyhow::Result<Arc<dyn Channel>> {
    let channel: Arc<dyn Channel> = match config.channel {
        ChannelKind::Discord => {
            anyhow::ensure!(
                config.discord.enabled,
                "channel is \"discord\" but discord.enabled is false"
            );
            let mut discord = DiscordChannel::new(
                config.discord.bot_token.clone(),
                config.discord.guild_id.clone(),
                config.discord.allowed_users.clone(),
            );
            discord.init().await?;
            Arc::new(discord)
        }
        ChannelKind::Cli => {
            let mut cli = CliChannel::new();
            cli.init().await?;
            Arc::new(cli)
        }
    };
    Ok(channel)
}

/// Run the relay until the channel closes or Ctrl-C is received.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let channel = build_channel(config).await?;
    let backend = Arc::new(G4fBackend::new(config.backend.clone()));

    let bridge = Arc::new(RelayBridge::new(
        backend,
        channel.clone(),
        BridgeSettings::from_config(config),
    ));

    let (tx, rx) = tokio::sync::mpsc::channel(INBOUND_QUEUE);
    let processor_handle = RelayBridge::spawn_processor(bridge, rx);

    tracing::info!(
        channel = channel.name(),
        backend = %config.backend.endpoint,
        "Relay started"
    );

    tokio::select! {
        result = channel.listen(tx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Channel listener failed");
                channel.shutdown().await?;
                processor_handle.abort();
                return Err(e.into());
            }
            tracing::info!("Channel listener stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    channel.shutdown().await?;
    processor_handle.abort();

    Ok(())
}
