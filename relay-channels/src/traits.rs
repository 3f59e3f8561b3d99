//! Channel traits for implementing channel adapters.

use crate::message::{ChannelMessage, OutgoingMessage};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Channel adapter trait.
///
/// Implement this trait to add support for a new messaging channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Initialize the channel (verify credentials, etc.).
    async fn init(&mut self) -> ChannelResult<()>;

    /// Send a message to the channel, returning the platform message ID.
    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String>;

    /// Show a typing indicator while a reply is being produced.
    async fn start_typing(&self, _channel_id: &str) -> ChannelResult<()> {
        Ok(())
    }

    /// Listen for incoming messages and push them into `tx`.
    ///
    /// Returns when the connection closes or the receiver is dropped.
    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()>;

    /// Check if the channel is healthy.
    async fn health_check(&self) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
