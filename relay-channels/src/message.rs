//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// Channel type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Discord,
    Cli,
}

impl ChannelType {
    /// Get the channel type as a string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Cli => "cli",
        }
    }
}

/// Inbound message from a chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (channel-specific)
    pub id: String,
    /// Channel type
    pub channel_type: ChannelType,
    /// Where replies go (Discord channel ID, "cli", ...)
    pub channel_id: String,
    /// Author identifier, the key for conversation history
    pub user_id: String,
    /// Author display name
    #[serde(default)]
    pub user_name: String,
    /// Raw message text
    pub content: String,
    /// Attachments (images, files, ...)
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID for following the message through the logs
    pub trace_id: String,
}

/// File attached to an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Download URL
    pub url: String,
    /// Filename
    pub filename: Option<String>,
    /// MIME type
    pub content_type: Option<String>,
    /// Size in bytes
    pub size_bytes: Option<u64>,
}

impl Attachment {
    /// Whether the attachment is, or may be, an image. Unknown types count as images.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.starts_with("image/"))
    }
}

impl ChannelMessage {
    /// The attachment forwarded to the backend with a chat prompt.
    pub fn image_attachment(&self) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.is_image())
    }
}

/// Outgoing message to send to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target channel type
    pub channel_type: ChannelType,
    /// Target channel ID
    pub channel_id: String,
    /// Reply to message ID (optional)
    pub reply_to: Option<String>,
    /// Message content
    pub content: OutgoingContent,
}

impl OutgoingMessage {
    /// Plain text addressed to the channel `message` came from.
    pub fn text_to(message: &ChannelMessage, text: impl Into<String>) -> Self {
        Self {
            channel_type: message.channel_type,
            channel_id: message.channel_id.clone(),
            reply_to: None,
            content: OutgoingContent::Text { text: text.into() },
        }
    }

    /// Set the message this one replies to.
    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

/// Outgoing message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingContent {
    /// Plain text
    Text { text: String },
    /// Image referenced by URL
    Image {
        url: String,
        caption: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with(attachments: Vec<Attachment>) -> ChannelMessage {
        ChannelMessage {
            id: "123".into(),
            channel_type: ChannelType::Discord,
            channel_id: "456".into(),
            user_id: "user1".into(),
            user_name: "alice".into(),
            content: "!chat hi".into(),
            attachments,
            timestamp: 1234567890000,
            trace_id: "trace".into(),
        }
    }

    fn attachment(url: &str, content_type: Option<&str>) -> Attachment {
        Attachment {
            url: url.into(),
            filename: None,
            content_type: content_type.map(Into::into),
            size_bytes: None,
        }
    }

    #[test]
    fn test_image_attachment_skips_non_images() {
        let msg = message_with(vec![
            attachment("https://cdn/a.pdf", Some("application/pdf")),
            attachment("https://cdn/b.png", Some("image/png")),
        ]);
        assert_eq!(msg.image_attachment().unwrap().url, "https://cdn/b.png");
    }

    #[test]
    fn test_unknown_content_type_counts_as_image() {
        let msg = message_with(vec![attachment("https://cdn/c", None)]);
        assert!(msg.image_attachment().is_some());
        assert!(message_with(vec![]).image_attachment().is_none());
    }

    #[test]
    fn test_outgoing_text_to() {
        let msg = message_with(vec![]);
        let out = OutgoingMessage::text_to(&msg, "hello").replying_to("123");
        assert_eq!(out.channel_id, "456");
        assert_eq!(out.reply_to.as_deref(), Some("123"));
        assert_eq!(out.content, OutgoingContent::Text { text: "hello".into() });
    }

    #[test]
    fn test_outgoing_content_serialization() {
        let content = OutgoingContent::Image {
            url: "https://img".into(),
            caption: None,
        };
        let json = serde_json::to_string(&content).unwrap();
        assert!(json.contains("\"type\":\"image\""));
    }
}
