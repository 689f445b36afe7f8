//! Conversation-thread correlation and assistant-run driving.
//!
//! Every inbound user message is mapped to a remote assistant thread, a run is
//! started on that thread and driven to a terminal state (answering tool calls
//! on the way), and the terminal state is turned into a reply string.

pub mod bootstrap;
pub mod driver;
pub mod gateway;
pub mod openai;
pub mod registry;
pub mod runtime;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use bootstrap::{ensure_assistant, AssistantProfile, ProfileError, FORCE_NEW_ASSISTANT};
pub use driver::{PollConfig, RunDriver, RunOutcome};
pub use gateway::{AssistantGateway, GatewayConfig, ReplyTexts};
pub use openai::{OpenAiAssistantsClient, DEFAULT_OPENAI_URL};
pub use registry::{ConversationThread, RegistryLimits, ThreadRegistry};
pub use runtime::{
    AssistantApiError, AssistantRun, AssistantRuntime, ListOrder, MessageRole, RunLastError,
    RunStatus, ThreadMessage, ToolCall, ToolOutput,
};
pub use tools::{ToolConfigError, ToolContext, ToolExecutor, ToolKind};
