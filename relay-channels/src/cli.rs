//! CLI channel adapter for interactive terminal sessions.
//!
//! Provides a simple stdin/stdout based channel for local testing against a
//! real backend without a Discord bot.

use crate::message::{ChannelMessage, ChannelType, OutgoingContent, OutgoingMessage};
use crate::traits::{Channel, ChannelResult};
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// User id attached to every CLI message.
pub const CLI_USER_ID: &str = "cli-user";

/// CLI channel - stdin/stdout, always available.
pub struct CliChannel;

impl CliChannel {
    /// Create a new CLI channel.
    pub const fn new() -> Self {
        Self
    }

    /// Build the inbound message for one input line, or `None` for blank lines.
    fn message_from_line(line: &str) -> Option<ChannelMessage> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        Some(ChannelMessage {
            id: uuid::Uuid::new_v4().to_string(),
            channel_type: ChannelType::Cli,
            channel_id: "cli".to_string(),
            user_id: CLI_USER_ID.to_string(),
            user_name: "you".to_string(),
            content: line.to_string(),
            attachments: vec![],
            timestamp: chrono::Utc::now().timestamp_millis(),
            trace_id: relay_common::logging::generate_trace_id(),
        })
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        match message.content {
            OutgoingContent::Text { text } => println!("{text}"),
            OutgoingContent::Image { url, caption } => match caption {
                Some(cap) => println!("[Image: {cap}] {url}"),
                None => println!("[Image] {url}"),
            },
        }
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let reader = BufReader::new(io::stdin());
        let mut lines = reader.lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if matches!(line.trim(), "/quit" | "/exit") {
                break;
            }

            let Some(msg) = Self::message_from_line(&line) else {
                continue;
            };

            if tx.send(msg).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        Ok(())
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        Ok(())
    }
}
