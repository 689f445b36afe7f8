//! Outbound messaging through the WhatsApp Cloud API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default Graph API root; the phone number id and `/messages` are appended.
pub const DEFAULT_GRAPH_API_URL: &str = "https://graph.facebook.com/v17.0";

/// Longest text body the Cloud API accepts in one message.
pub const MAX_TEXT_BODY_CHARS: usize = 4096;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("whatsapp api returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("refusing to send an empty message")]
    EmptyBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryResult {
    /// One id per message actually sent; long bodies are split.
    pub message_ids: Vec<String>,
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, recipient_id: &str, body: &str) -> Result<DeliveryResult, SendError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), SendError>;
}

#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    api_base_url: String,
}

impl WhatsAppClient {
    pub fn new(
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/{}/messages", self.api_base_url, self.phone_number_id)
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<serde_json::Value, SendError> {
        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or(text);
            return Err(SendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppClient {
    async fn send_text(&self, recipient_id: &str, body: &str) -> Result<DeliveryResult, SendError> {
        let chunks = split_text_body(body, MAX_TEXT_BODY_CHARS);
        if chunks.is_empty() {
            return Err(SendError::EmptyBody);
        }
        if chunks.len() > 1 {
            info!(
                "splitting reply to {} into {} messages",
                recipient_id,
                chunks.len()
            );
        }

        let mut result = DeliveryResult::default();
        for chunk in chunks {
            let request = SendMessageRequest {
                messaging_product: "whatsapp",
                recipient_type: "individual",
                to: recipient_id,
                message_type: "text",
                text: TextContent { body: chunk },
            };
            let response = self.post(&request).await?;
            let parsed: SendMessageResponse =
                serde_json::from_value(response).unwrap_or_default();
            match parsed.messages.into_iter().next() {
                Some(message) => {
                    debug!("sent whatsapp message {} to {}", message.id, recipient_id);
                    result.message_ids.push(message.id);
                }
                None => warn!("whatsapp send to {} returned no message id", recipient_id),
            }
        }
        Ok(result)
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), SendError> {
        let request = serde_json::json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
        });
        self.post(&request).await?;
        debug!("marked whatsapp message {} as read", message_id);
        Ok(())
    }
}

/// Split `body` into chunks of at most `max_chars` characters, never inside a
/// character. Blank bodies yield no chunks.
pub fn split_text_body(body: &str, max_chars: usize) -> Vec<&str> {
    if body.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        chunks.push(&rest[..end]);
        rest = &rest[end..];
    }
    chunks
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'a str,
    recipient_type: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'a str,
    text: TextContent<'a>,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    body: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}
