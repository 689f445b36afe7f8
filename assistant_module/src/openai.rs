//! HTTP client for the OpenAI Assistants v2 API.
//!
//! Configuration:
//! - `api_key`: bearer token sent on every request
//! - `base_url`: API root (default: `https://api.openai.com/v1`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::runtime::{
    AssistantApiError, AssistantRun, AssistantRuntime, ListOrder, MessageRole, ThreadMessage,
    ToolOutput,
};

/// Default OpenAI API URL
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Timeout for a single API request; run polling has its own deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

#[derive(Debug, Clone)]
pub struct OpenAiAssistantsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiAssistantsClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch an assistant by id; a missing assistant is `AssistantApiError::NotFound`.
    pub async fn retrieve_assistant(&self, assistant_id: &str) -> Result<String, AssistantApiError> {
        let assistant: IdResponse = self
            .send(self.request(Method::GET, &format!("/assistants/{}", assistant_id)))
            .await?;
        Ok(assistant.id)
    }

    /// Create an assistant and return its id.
    pub async fn create_assistant(
        &self,
        name: &str,
        model: &str,
        instructions: &str,
        tools: &[serde_json::Value],
    ) -> Result<String, AssistantApiError> {
        let body = json!({
            "name": name,
            "model": model,
            "instructions": instructions,
            "tools": tools,
        });
        let created: IdResponse = self
            .send(self.request(Method::POST, "/assistants").json(&body))
            .await?;
        Ok(created.id)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("assistants api {} {}", method, url);
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA_HEADER)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AssistantApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantApiError::NotFound(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| AssistantApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl AssistantRuntime for OpenAiAssistantsClient {
    async fn create_thread(&self) -> Result<String, AssistantApiError> {
        let thread: IdResponse = self
            .send(self.request(Method::POST, "/threads").json(&json!({})))
            .await?;
        Ok(thread.id)
    }

    async fn append_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, AssistantApiError> {
        let body = json!({
            "role": role.as_str(),
            "content": content,
        });
        let message: IdResponse = self
            .send(
                self.request(Method::POST, &format!("/threads/{}/messages", thread_id))
                    .json(&body),
            )
            .await?;
        Ok(message.id)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<String, AssistantApiError> {
        let run: IdResponse = self
            .send(
                self.request(Method::POST, &format!("/threads/{}/runs", thread_id))
                    .json(&json!({ "assistant_id": assistant_id })),
            )
            .await?;
        Ok(run.id)
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<AssistantRun, AssistantApiError> {
        self.send(self.request(
            Method::GET,
            &format!("/threads/{}/runs/{}", thread_id, run_id),
        ))
        .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<(), AssistantApiError> {
        let _run: AssistantRun = self
            .send(
                self.request(
                    Method::POST,
                    &format!(
                        "/threads/{}/runs/{}/submit_tool_outputs",
                        thread_id, run_id
                    ),
                )
                .json(&json!({ "tool_outputs": outputs })),
            )
            .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantApiError> {
        let page: MessagePage = self
            .send(
                self.request(Method::GET, &format!("/threads/{}/messages", thread_id))
                    .query(&[("order", order.as_str().to_string()), ("limit", limit.to_string())]),
            )
            .await?;
        Ok(page.data)
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}
