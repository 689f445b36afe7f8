//! Assistant runtime contract and the thread/run/message types it exchanges.
//!
//! The types mirror the Assistants v2 wire format closely enough to be
//! deserialized straight from the HTTP responses, while staying usable by
//! in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AssistantApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("assistant api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Remote status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }

    /// Terminal states that did not produce an answer.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLastError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    #[serde(default)]
    pub function: Option<FunctionCall>,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: "function".to_string(),
            function: Some(FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputsAction {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputsAction>,
}

/// One request/response cycle on a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRun {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
}

impl AssistantRun {
    pub fn new(id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            status,
            required_action: None,
            last_error: None,
        }
    }

    pub fn requiring_tools(id: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            id: id.into(),
            status: RunStatus::RequiresAction,
            required_action: Some(RequiredAction {
                action_type: "submit_tool_outputs".to_string(),
                submit_tool_outputs: Some(SubmitToolOutputsAction { tool_calls }),
            }),
            last_error: None,
        }
    }

    pub fn failed(id: impl Into<String>, status: RunStatus, code: &str, message: &str) -> Self {
        Self {
            id: id.into(),
            status,
            required_action: None,
            last_error: Some(RunLastError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }

    /// Tool calls the runtime is waiting on, in request order.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .and_then(|action| action.submit_tool_outputs.as_ref())
            .map(|submit| submit.tool_calls.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Asc,
    Desc,
}

impl ListOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrder::Asc => "asc",
            ListOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextAnnotation {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<TextAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    pub fn text(id: impl Into<String>, role: MessageRole, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: vec![MessageContent {
                content_type: "text".to_string(),
                text: Some(TextContent {
                    value: value.into(),
                    annotations: Vec::new(),
                }),
            }],
            run_id: None,
        }
    }

    /// Concatenated text blocks with citation markers removed.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if block.content_type != "text" {
                continue;
            }
            let Some(text) = block.text.as_ref() else {
                continue;
            };
            let mut value = text.value.clone();
            for annotation in &text.annotations {
                if !annotation.text.is_empty() {
                    value = value.replace(&annotation.text, "");
                }
            }
            if !out.is_empty() && !value.is_empty() {
                out.push('\n');
            }
            out.push_str(&value);
        }
        out
    }
}

/// Client side of the remote assistant runtime.
#[async_trait]
pub trait AssistantRuntime: Send + Sync {
    async fn create_thread(&self) -> Result<String, AssistantApiError>;

    /// Returns the id of the created message.
    async fn append_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, AssistantApiError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str)
        -> Result<String, AssistantApiError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<AssistantRun, AssistantApiError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<(), AssistantApiError>;

    async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantApiError>;
}
