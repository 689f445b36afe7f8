//! Assistant profile loading and remote assistant provisioning.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::gateway::ReplyTexts;
use crate::openai::OpenAiAssistantsClient;
use crate::runtime::AssistantApiError;

/// `ASSISTANT_ID` value that always provisions a new assistant.
pub const FORCE_NEW_ASSISTANT: &str = "force_new";

const TODAY_PLACEHOLDER: &str = "{today}";

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read assistant profile: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse assistant profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid assistant profile: {0}")]
    Invalid(String),
}

fn default_tools() -> Vec<String> {
    vec!["add_contact".to_string(), "get_event_info".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantProfile {
    pub name: String,
    pub model: String,
    /// `{today}` is replaced with the current date when the assistant is created.
    pub instructions: String,
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
    #[serde(default)]
    pub replies: ReplyTexts,
}

impl AssistantProfile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        let profile: AssistantProfile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        for (field, value) in [
            ("name", &self.name),
            ("model", &self.model),
            ("instructions", &self.instructions),
        ] {
            if value.trim().is_empty() {
                return Err(ProfileError::Invalid(format!("{} must not be empty", field)));
            }
        }
        for (field, value) in [
            ("replies.fallback_no_text", &self.replies.fallback_no_text),
            ("replies.run_failed", &self.replies.run_failed),
            ("replies.timeout", &self.replies.timeout),
            ("replies.generic_error", &self.replies.generic_error),
        ] {
            if value.trim().is_empty() {
                return Err(ProfileError::Invalid(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    pub fn render_instructions(&self, today: NaiveDate) -> String {
        self.instructions
            .replace(TODAY_PLACEHOLDER, &today.format("%Y-%m-%d").to_string())
    }
}

/// Resolve the assistant to talk to. A configured id is reused when the
/// runtime still knows it; otherwise (unset, `force_new`, or not found) a new
/// assistant is created from `profile` with the given function tools.
pub async fn ensure_assistant(
    client: &OpenAiAssistantsClient,
    configured_id: Option<&str>,
    profile: &AssistantProfile,
    function_tools: &[Value],
) -> Result<String, AssistantApiError> {
    match configured_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(FORCE_NEW_ASSISTANT) => {
            info!("ASSISTANT_ID is {}; creating a new assistant", FORCE_NEW_ASSISTANT);
        }
        Some(assistant_id) => match client.retrieve_assistant(assistant_id).await {
            Ok(assistant_id) => {
                info!("using existing assistant {}", assistant_id);
                return Ok(assistant_id);
            }
            Err(AssistantApiError::NotFound(_)) => {
                warn!("assistant {} not found; creating a new one", assistant_id);
            }
            Err(err) => return Err(err),
        },
        None => info!("no ASSISTANT_ID configured; creating a new assistant"),
    }

    let instructions = profile.render_instructions(chrono::Utc::now().date_naive());
    let assistant_id = client
        .create_assistant(&profile.name, &profile.model, &instructions, function_tools)
        .await?;
    warn!(
        "created assistant {}; set ASSISTANT_ID={} to reuse it across restarts",
        assistant_id, assistant_id
    );
    Ok(assistant_id)
}
