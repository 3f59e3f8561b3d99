//! Generation backend client.
//!
//! Talks to an OpenAI-compatible g4f server:
//! - `POST /v1/chat/completions` for text (optionally with an image URL)
//! - `POST /v1/images/generate` for images

use async_trait::async_trait;
use relay_common::config::BackendConfig;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Answer used when the backend response carries no message content.
pub const NO_CONTENT: &str = "No content.";

/// Backend error type. The display text is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("G4F Error : {status}")]
    Status { status: u16, body: String },

    #[error("Connection error to G4F : {0}")]
    Connection(String),

    #[error("Malformed backend response: {0}")]
    Malformed(String),
}

/// A chat completion with the raw payload kept for `--debug`.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub answer: String,
    pub raw: Value,
}

/// A generated image reference with the raw payload kept for `--debug`.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub url: String,
    pub raw: Value,
}

/// Text and image generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Complete `prompt`, optionally with an image the model should look at.
    async fn chat(&self, prompt: &str, image_url: Option<&str>)
        -> Result<ChatCompletion, BackendError>;

    /// Generate an image from `prompt`.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, BackendError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    /// Provider-side timeout in seconds
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
}

/// `choices[0].message.content`, or [`NO_CONTENT`].
pub fn extract_answer(raw: &Value) -> String {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or(NO_CONTENT)
        .to_string()
}

/// `data[0].url`.
pub fn extract_image_url(raw: &Value) -> Option<String> {
    raw.pointer("/data/0/url")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

// ============================================================================
// Client
// ============================================================================

/// reqwest client for a g4f server.
pub struct G4fBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl G4fBackend {
    /// Create a new client.
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs)) // generation can be slow
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        tracing::debug!(
            endpoint = %url,
            status = status.as_u16(),
            body = %relay_common::util::truncate_with_ellipsis(&text, 500),
            "Backend responded"
        );

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl GenerationBackend for G4fBackend {
    async fn chat(
        &self,
        prompt: &str,
        image_url: Option<&str>,
    ) -> Result<ChatCompletion, BackendError> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            timeout: self.config.request_timeout_secs,
            image: image_url,
        };

        let raw = self.post_json(&self.config.chat_url(), &request).await?;
        Ok(ChatCompletion {
            answer: extract_answer(&raw),
            raw,
        })
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, BackendError> {
        let request = ImageGenerationRequest {
            model: &self.config.image_model,
            prompt,
        };

        let raw = self.post_json(&self.config.image_url(), &request).await?;
        let url = extract_image_url(&raw)
            .ok_or_else(|| BackendError::Malformed("no image url in response".into()))?;
        Ok(GeneratedImage { url, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> G4fBackend {
        G4fBackend::new(BackendConfig {
            endpoint: server.uri(),
            ..BackendConfig::default()
        })
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatCompletionRequest {
            model: "",
            messages: vec![ChatMessage {
                role: "user",
                content: "Hello",
            }],
            timeout: 60,
            image: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"content\":\"Hello\""));
        assert!(json.contains("\"timeout\":60"));
        assert!(!json.contains("\"image\"")); // Should be skipped when None
    }

    #[test]
    fn test_extract_answer() {
        let raw = json!({"choices": [{"message": {"content": "Hi!"}}]});
        assert_eq!(extract_answer(&raw), "Hi!");
        assert_eq!(extract_answer(&json!({"choices": []})), NO_CONTENT);
        assert_eq!(extract_answer(&json!({})), NO_CONTENT);
    }

    #[test]
    fn test_extract_image_url() {
        let raw = json!({"data": [{"url": "https://img/1.png"}]});
        assert_eq!(extract_image_url(&raw).as_deref(), Some("https://img/1.png"));
        assert_eq!(extract_image_url(&json!({"data": []})), None);
    }

    #[test]
    fn test_error_display_matches_user_messages() {
        let err = BackendError::Status {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "G4F Error : 502");
        assert_eq!(
            BackendError::Connection("refused".into()).to_string(),
            "Connection error to G4F : refused"
        );
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "",
                "messages": [{"role": "user", "content": "User: hi\nAssistant:"}],
                "timeout": 60,
                "image": "https://cdn/cat.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "meow"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = backend_for(&server)
            .chat("User: hi\nAssistant:", Some("https://cdn/cat.png"))
            .await
            .unwrap();
        assert_eq!(completion.answer, "meow");
        assert_eq!(completion.raw["choices"][0]["message"]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_chat_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = backend_for(&server).chat("hi", None).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn test_chat_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = backend_for(&server).chat("hi", None).await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_connection_error() {
        let backend = G4fBackend::new(BackendConfig {
            endpoint: "http://127.0.0.1:1".into(),
            ..BackendConfig::default()
        });
        let err = backend.chat("hi", None).await.unwrap_err();
        assert!(matches!(err, BackendError::Connection(_)));
    }

    #[tokio::test]
    async fn test_generate_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .and(body_partial_json(json!({"model": "flux", "prompt": "a fox"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://img/fox.png"}]
            })))
            .mount(&server)
            .await;

        let image = backend_for(&server).generate_image("a fox").await.unwrap();
        assert_eq!(image.url, "https://img/fox.png");
    }

    #[tokio::test]
    async fn test_generate_image_without_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate_image("a fox").await.unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }
}
