//! Relay bridge.
//!
//! Handles the complete message flow:
//! 1. Receive ChannelMessage from the channel listener
//! 2. Parse the bot command
//! 3. Forward chat/image prompts to the generation backend
//! 4. Send the answer back to the originating channel in platform-sized segments

use crate::backend::GenerationBackend;
use crate::command::{help_text, Command};
use crate::discord::format::debug_segments;
use crate::message::{ChannelMessage, OutgoingContent, OutgoingMessage};
use crate::session::{UserLocks, UserQueues};
use crate::traits::Channel;
use anyhow::Result;
use relay_common::config::Config;
use relay_common::util::truncate_with_ellipsis;
use relay_core::{split_message, HistoryBuffer, Role, Turn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

pub const RESET_DONE: &str = "🧠 User memory reset.";
pub const RESET_DENIED: &str = "❌ You don't have the permission to use this command !";

/// How long a user's queue worker waits for more messages before stopping.
const QUEUE_IDLE: Duration = Duration::from_secs(60);

/// Bridge tuning taken from the configuration.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Turns rendered into each prompt
    pub history_window: usize,
    /// Characters per outbound segment
    pub max_message_length: usize,
    /// User allowed to reset memory
    pub owner_id: Option<String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            history_window: 5,
            max_message_length: relay_core::DEFAULT_MAX_LENGTH,
            owner_id: None,
        }
    }
}

impl BridgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_window: config.conversation.history_window,
            max_message_length: config.conversation.max_message_length,
            owner_id: config.discord.owner_id.clone(),
        }
    }

    /// Whether `user_id` may run owner-only commands. Nobody may when no owner is set.
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }
}

/// Bridge between a chat channel and the generation backend.
pub struct RelayBridge {
    backend: Arc<dyn GenerationBackend>,
    channel: Arc<dyn Channel>,
    history: RwLock<HistoryBuffer>,
    locks: UserLocks,
    queues: UserQueues<ChannelMessage>,
    settings: BridgeSettings,
}

impl RelayBridge {
    /// Create a new bridge.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        channel: Arc<dyn Channel>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            backend,
            channel,
            history: RwLock::new(HistoryBuffer::new()),
            locks: UserLocks::new(),
            queues: UserQueues::new(),
            settings,
        }
    }

    /// Stored turns for a user, oldest-first.
    pub async fn history_of(&self, user_id: &str) -> Vec<Turn> {
        self.history.read().await.turns(user_id).to_vec()
    }

    /// Process an incoming message and send the response.
    pub async fn process(&self, message: ChannelMessage) -> Result<()> {
        let Some(command) = Command::parse(&message.content) else {
            tracing::trace!(trace_id = %message.trace_id, "Not a command, ignoring");
            return Ok(());
        };

        tracing::info!(
            trace_id = %message.trace_id,
            channel = message.channel_type.as_str(),
            user_id = %message.user_id,
            command = ?command,
            "Processing command"
        );

        match command {
            Command::Help => self.reply(&message, help_text()).await,
            Command::ResetMemory { target } => self.reset_memory(&message, target).await,
            Command::Chat { prompt, debug } => self.chat(&message, &prompt, debug).await,
            Command::Generate { prompt, debug } => self.generate(&message, &prompt, debug).await,
        }
    }

    async fn reset_memory(&self, message: &ChannelMessage, target: Option<String>) -> Result<()> {
        if !self.settings.is_owner(&message.user_id) {
            tracing::warn!(user_id = %message.user_id, "Memory reset refused");
            return self.reply(message, RESET_DENIED).await;
        }

        let target = target.unwrap_or_else(|| message.user_id.clone());
        {
            let _guard = self.locks.lock(&target).await;
            self.history.write().await.clear(&target);
        }

        tracing::info!(target_user = %target, "Conversation memory cleared");
        self.reply(message, RESET_DONE).await
    }

    async fn chat(&self, message: &ChannelMessage, prompt: &str, debug: bool) -> Result<()> {
        let user_id = message.user_id.as_str();
        let _guard = self.locks.lock(user_id).await;

        let prompt_with_history = {
            let mut history = self.history.write().await;
            history.append(user_id, Role::User, prompt);
            history.render(user_id, self.settings.history_window)
        };

        self.typing(message).await;

        let image_url = message.image_attachment().map(|a| a.url.as_str());
        tracing::debug!(
            trace_id = %message.trace_id,
            prompt = %truncate_with_ellipsis(&prompt_with_history, 200),
            with_image = image_url.is_some(),
            "Calling backend"
        );

        let completion = match self.backend.chat(&prompt_with_history, image_url).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(trace_id = %message.trace_id, error = %e, "Backend chat failed");
                return self.reply(message, e.to_string()).await;
            }
        };

        if debug {
            let segments = debug_segments(&completion.raw, self.settings.max_message_length);
            return self.send_all(message, segments).await;
        }

        self.history
            .write()
            .await
            .append(user_id, Role::Assistant, completion.answer.as_str());

        self.send_segments(message, &completion.answer).await
    }

    async fn generate(&self, message: &ChannelMessage, prompt: &str, debug: bool) -> Result<()> {
        self.typing(message).await;

        let image = match self.backend.generate_image(prompt).await {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(trace_id = %message.trace_id, error = %e, "Image generation failed");
                return self.reply(message, e.to_string()).await;
            }
        };

        if debug {
            let segments = debug_segments(&image.raw, self.settings.max_message_length);
            return self.send_all(message, segments).await;
        }

        let outgoing = OutgoingMessage {
            channel_type: message.channel_type,
            channel_id: message.channel_id.clone(),
            reply_to: Some(message.id.clone()),
            content: OutgoingContent::Image {
                url: image.url,
                caption: Some(prompt.to_string()),
            },
        };
        self.channel.send(outgoing).await?;
        Ok(())
    }

    /// Send `text` as consecutive segments, the first one as a reply.
    async fn send_segments(&self, message: &ChannelMessage, text: &str) -> Result<()> {
        let mut segments = split_message(text, self.settings.max_message_length);
        if segments.is_empty() {
            segments.push(crate::backend::NO_CONTENT.to_string());
        }
        self.send_all(message, segments).await
    }

    async fn send_all(&self, message: &ChannelMessage, segments: Vec<String>) -> Result<()> {
        let total = segments.len();
        for (index, segment) in segments.into_iter().enumerate() {
            let mut outgoing = OutgoingMessage::text_to(message, segment);
            if index == 0 {
                outgoing = outgoing.replying_to(message.id.clone());
            }
            self.channel.send(outgoing).await?;
        }

        tracing::debug!(trace_id = %message.trace_id, segments = total, "Reply sent");
        Ok(())
    }

    async fn reply(&self, message: &ChannelMessage, text: impl Into<String>) -> Result<()> {
        self.channel
            .send(OutgoingMessage::text_to(message, text))
            .await?;
        Ok(())
    }

    async fn typing(&self, message: &ChannelMessage) {
        if let Err(e) = self.channel.start_typing(&message.channel_id).await {
            tracing::warn!(error = %e, "Failed to start typing indicator");
        }
    }

    /// Start a background processor that handles messages from a channel.
    ///
    /// Each user's messages go to that user's queue and are handled in arrival
    /// order by one worker; different users are handled concurrently.
    pub fn spawn_processor(
        bridge: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Relay bridge processor started");

            while let Some(message) = rx.recv().await {
                let user_id = message.user_id.clone();
                if let Some(queue) = bridge.queues.enqueue(&user_id, message) {
                    tracing::debug!(user_id = %user_id, "Starting user queue worker");
                    tokio::spawn(bridge.clone().drain_queue(user_id, queue));
                }
            }

            tracing::info!("Relay bridge processor stopped");
        })
    }

    async fn drain_queue(
        self: Arc<Self>,
        user_id: String,
        mut queue: mpsc::UnboundedReceiver<ChannelMessage>,
    ) {
        loop {
            match tokio::time::timeout(QUEUE_IDLE, queue.recv()).await {
                Ok(Some(message)) => {
                    let trace_id = message.trace_id.clone();
                    if let Err(e) = self.process(message).await {
                        tracing::error!(trace_id = %trace_id, error = %e, "Failed to process message");
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    if self.queues.retire(&user_id, &queue) {
                        break;
                    }
                }
            }
        }
        tracing::debug!(user_id = %user_id, "User queue worker stopped");
    }
}
