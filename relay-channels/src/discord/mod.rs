//! Discord channel for the relay.
//!
//! Receives messages over the Gateway WebSocket and replies through the REST API.

pub mod format;

use crate::message::{Attachment, ChannelMessage, ChannelType, OutgoingContent, OutgoingMessage};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 1 | (1 << 9) | (1 << 12) | (1 << 15);

/// Discord channel using Gateway WebSocket for real-time messaging.
pub struct DiscordChannel {
    bot_token: String,
    guild_id: Option<String>,
    allowed_users: Vec<String>,
    api_base: String,
    client: Client,
}

/// Which gateway messages are relayed.
#[derive(Debug, Clone, Default)]
struct InboundFilter {
    bot_user_id: String,
    guild_id: Option<String>,
    allowed_users: Vec<String>,
}

impl InboundFilter {
    fn is_user_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.iter().any(|u| u == "*" || u == user_id)
    }
}

impl DiscordChannel {
    /// Create a new Discord channel.
    pub fn new(bot_token: String, guild_id: Option<String>, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            guild_id,
            allowed_users,
            api_base: DISCORD_API.to_string(),
            client: Client::new(),
        }
    }

    /// Point REST calls at another base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Check if a Discord user ID is in the allowlist.
    pub fn is_user_allowed(&self, user_id: &str) -> bool {
        self.filter().is_user_allowed(user_id)
    }

    fn filter(&self) -> InboundFilter {
        InboundFilter {
            bot_user_id: Self::bot_user_id_from_token(&self.bot_token).unwrap_or_default(),
            guild_id: self.guild_id.clone(),
            allowed_users: self.allowed_users.clone(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Extract bot user ID from token. The first token segment is the base64 user ID.
    fn bot_user_id_from_token(token: &str) -> Option<String> {
        let part = token.split('.').next()?;
        let bytes = STANDARD_NO_PAD.decode(part.trim_end_matches('=')).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn post_message(&self, channel_id: &str, body: &Value) -> ChannelResult<String> {
        let resp = self
            .client
            .post(self.api_url(&format!("/channels/{channel_id}/messages")))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord send error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed(format!(
                "Discord API error ({status}): {error}"
            )));
        }

        let msg_data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Internal(format!("Failed to parse response: {e}")))?;

        Ok(msg_data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

/// Turn a `MESSAGE_CREATE` payload into a [`ChannelMessage`], or `None` when
/// it should not be relayed.
fn parse_message_create(d: &Value, filter: &InboundFilter) -> Option<ChannelMessage> {
    let author = d.get("author")?;
    let author_id = author.get("id").and_then(Value::as_str).unwrap_or("");
    if author_id.is_empty() || author_id == filter.bot_user_id {
        return None;
    }

    if author.get("bot").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }

    if !filter.is_user_allowed(author_id) {
        tracing::warn!("Discord: ignoring message from unauthorized user: {author_id}");
        return None;
    }

    if let Some(ref gid) = filter.guild_id {
        let msg_guild = d.get("guild_id").and_then(Value::as_str).unwrap_or("");
        if msg_guild != gid {
            return None;
        }
    }

    let content = d.get("content").and_then(Value::as_str).unwrap_or("");
    if content.is_empty() {
        return None;
    }

    let attachments = d
        .get("attachments")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_attachment).collect())
        .unwrap_or_default();

    Some(ChannelMessage {
        id: d.get("id").and_then(Value::as_str).unwrap_or("").to_string(),
        channel_type: ChannelType::Discord,
        channel_id: d
            .get("channel_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        user_id: author_id.to_string(),
        user_name: author
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        content: content.to_string(),
        attachments,
        timestamp: chrono::Utc::now().timestamp_millis(),
        trace_id: relay_common::logging::generate_trace_id(),
    })
}

fn parse_attachment(a: &Value) -> Option<Attachment> {
    Some(Attachment {
        url: a.get("url").and_then(Value::as_str)?.to_string(),
        filename: a.get("filename").and_then(Value::as_str).map(Into::into),
        content_type: a.get("content_type").and_then(Value::as_str).map(Into::into),
        size_bytes: a.get("size").and_then(Value::as_u64),
    })
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        self.health_check().await?;
        tracing::info!("Discord channel initialized");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> ChannelResult<String> {
        match &message.content {
            OutgoingContent::Text { text } => {
                let chunks = format::split_message(text);
                if chunks.is_empty() {
                    return Err(ChannelError::InvalidMessage("empty message".into()));
                }

                let mut last_message_id = String::new();
                for chunk in chunks {
                    let mut body = json!({ "content": chunk });

                    // Reply reference only on the first chunk
                    if last_message_id.is_empty() {
                        if let Some(ref reply_to) = message.reply_to {
                            body["message_reference"] = json!({ "message_id": reply_to });
                        }
                    }

                    last_message_id = self.post_message(&message.channel_id, &body).await?;
                }
                Ok(last_message_id)
            }
            OutgoingContent::Image { url, caption } => {
                let mut body = json!({ "embeds": [{ "image": { "url": url } }] });
                if let Some(caption) = caption {
                    body["content"] = json!(caption);
                }
                if let Some(ref reply_to) = message.reply_to {
                    body["message_reference"] = json!({ "message_id": reply_to });
                }
                self.post_message(&message.channel_id, &body).await
            }
        }
    }

    async fn start_typing(&self, channel_id: &str) -> ChannelResult<()> {
        let resp = self
            .client
            .post(self.api_url(&format!("/channels/{channel_id}/typing")))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("Discord typing error: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed(format!(
                "Discord typing returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn listen(&self, tx: mpsc::Sender<ChannelMessage>) -> ChannelResult<()> {
        let filter = self.filter();

        // Get Gateway URL
        let gw_resp: Value = self
            .client
            .get(self.api_url("/gateway/bot"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("Failed to get gateway: {e}")))?
            .json()
            .await
            .map_err(|e| ChannelError::Connection(format!("Invalid gateway response: {e}")))?;

        let gw_url = gw_resp
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("wss://gateway.discord.gg");

        let ws_url = format!("{gw_url}/?v=10&encoding=json");
        tracing::info!("Discord: connecting to gateway...");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| ChannelError::Connection(format!("WebSocket connection failed: {e}")))?;

        let (mut write, mut read) = ws_stream.split();

        // Read Hello (opcode 10)
        let hello = read
            .next()
            .await
            .ok_or_else(|| ChannelError::Connection("No hello from gateway".into()))?
            .map_err(|e| ChannelError::Connection(format!("WebSocket error: {e}")))?;

        let hello_data: Value = serde_json::from_str(&hello.to_string())
            .map_err(|e| ChannelError::Connection(format!("Invalid hello: {e}")))?;

        let heartbeat_interval = hello_data
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(Value::as_u64)
            .unwrap_or(41250);

        // Send Identify (opcode 2)
        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": "linux",
                    "browser": "relay",
                    "device": "relay"
                }
            }
        });

        write
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(|e| ChannelError::Connection(format!("Failed to identify: {e}")))?;

        tracing::info!("Discord: connected and identified");

        let mut heartbeat =
            tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
        let mut sequence: Option<u64> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let hb = json!({"op": 1, "d": sequence});
                    if write.send(Message::Text(hb.to_string())).await.is_err() {
                        break;
                    }
                }
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(Message::Text(t))) => t,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Discord: gateway read error");
                            break;
                        }
                        _ => continue,
                    };

                    let event: Value = match serde_json::from_str(&msg) {
                        Ok(e) => e,
                        Err(_) => continue,
                    };

                    if let Some(s) = event.get("s").and_then(Value::as_u64) {
                        sequence = Some(s);
                    }

                    // Gateway asked for an immediate heartbeat
                    if event.get("op").and_then(Value::as_u64) == Some(1) {
                        let hb = json!({"op": 1, "d": sequence});
                        if write.send(Message::Text(hb.to_string())).await.is_err() {
                            break;
                        }
                        continue;
                    }

                    if event.get("t").and_then(Value::as_str) != Some("MESSAGE_CREATE") {
                        continue;
                    }

                    let Some(channel_msg) = event.get("d").and_then(|d| parse_message_create(d, &filter)) else {
                        continue;
                    };

                    tracing::info!(
                        channel = "discord",
                        user_id = %channel_msg.user_id,
                        chat_id = %channel_msg.channel_id,
                        trace_id = %channel_msg.trace_id,
                        attachments = channel_msg.attachments.len(),
                        "IM message received"
                    );

                    if tx.send(channel_msg).await.is_err() {
                        tracing::info!("Discord: message receiver closed, stopping listener");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        let resp = self
            .client
            .get(self.api_url("/users/@me"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ChannelError::Connection(format!("Health check failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Auth("Discord authentication failed".into()))
        }
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Discord channel shutdown");
        Ok(())
    }
}
