//! Side-effecting functions the remote assistant can invoke.
//!
//! `ToolExecutor::execute` never fails: validation problems, unknown function
//! names and store errors all come back as `{"status": "error", "message": ..}`
//! so the run can always be resumed.

pub mod contacts;
pub mod declarations;
pub mod knowledge;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use contacts::{ContactRecord, ContactStore};
use declarations::{ToolDeclaration, ADD_CONTACT, GET_EVENT_INFO};
use knowledge::KnowledgeBase;

/// Closed set of handlers; every variant has exactly one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    AddContact,
    GetEventInfo,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add_contact" => Some(ToolKind::AddContact),
            "get_event_info" => Some(ToolKind::GetEventInfo),
            _ => None,
        }
    }

    pub fn declaration(&self) -> &'static ToolDeclaration {
        match self {
            ToolKind::AddContact => &ADD_CONTACT,
            ToolKind::GetEventInfo => &GET_EVENT_INFO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolConfigError {
    #[error("tool '{0}' has no registered handler")]
    UnknownTool(String),
    #[error("tool '{0}' is enabled more than once")]
    Duplicate(String),
    #[error("tool '{0}' needs a knowledge file (KNOWLEDGE_PATH)")]
    MissingKnowledge(String),
}

/// Per-call information about who the assistant is talking to.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub user_id: &'a str,
}

pub fn success_output(mut fields: serde_json::Map<String, Value>) -> Value {
    fields.insert("status".to_string(), json!("success"));
    Value::Object(fields)
}

pub fn error_output(message: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "message": message.into(),
    })
}

pub struct ToolExecutor {
    enabled: Vec<ToolKind>,
    contacts: Arc<dyn ContactStore>,
    knowledge: Option<KnowledgeBase>,
}

impl ToolExecutor {
    /// Validate the enabled tool names against the handler table.
    pub fn new(
        enabled: &[String],
        contacts: Arc<dyn ContactStore>,
        knowledge: Option<KnowledgeBase>,
    ) -> Result<Self, ToolConfigError> {
        let mut kinds = Vec::with_capacity(enabled.len());
        for name in enabled {
            let kind = ToolKind::from_name(name)
                .ok_or_else(|| ToolConfigError::UnknownTool(name.clone()))?;
            if kinds.contains(&kind) {
                return Err(ToolConfigError::Duplicate(name.clone()));
            }
            if kind == ToolKind::GetEventInfo && knowledge.is_none() {
                return Err(ToolConfigError::MissingKnowledge(name.clone()));
            }
            kinds.push(kind);
        }
        info!(
            "ToolExecutor initialized with tools: {}",
            kinds
                .iter()
                .map(|kind| kind.declaration().name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self {
            enabled: kinds,
            contacts,
            knowledge,
        })
    }

    /// Declarations to advertise to the remote assistant.
    pub fn declarations(&self) -> Vec<&'static ToolDeclaration> {
        self.enabled.iter().map(ToolKind::declaration).collect()
    }

    pub fn function_tools(&self) -> Vec<Value> {
        self.declarations()
            .into_iter()
            .map(ToolDeclaration::to_function_tool)
            .collect()
    }

    pub async fn execute(&self, function_name: &str, arguments: &Value, ctx: &ToolContext<'_>) -> Value {
        let Some(kind) = ToolKind::from_name(function_name).filter(|kind| self.enabled.contains(kind))
        else {
            warn!(
                "assistant requested unknown function {} for user {}",
                function_name, ctx.user_id
            );
            return error_output(format!("unknown function: {}", function_name));
        };

        let Some(fields) = arguments.as_object() else {
            return error_output(format!(
                "arguments for {} must be a JSON object",
                function_name
            ));
        };

        let declaration = kind.declaration();
        let unexpected: Vec<&str> = fields
            .keys()
            .map(String::as_str)
            .filter(|key| declaration.field(key).is_none())
            .collect();
        if !unexpected.is_empty() {
            debug!(
                "ignoring unexpected arguments for {}: {}",
                function_name,
                unexpected.join(", ")
            );
        }
        for field in declaration.required_fields {
            let present = fields
                .get(field.name)
                .map(|value| !value.is_null() && value.as_str().map_or(true, |s| !s.trim().is_empty()))
                .unwrap_or(false);
            if !present {
                return error_output(format!(
                    "missing required field '{}' for {}",
                    field.name, function_name
                ));
            }
        }

        match kind {
            ToolKind::AddContact => self.add_contact(fields, ctx).await,
            ToolKind::GetEventInfo => self.get_event_info(fields),
        }
    }

    async fn add_contact(
        &self,
        fields: &serde_json::Map<String, Value>,
        ctx: &ToolContext<'_>,
    ) -> Value {
        let record = match ContactRecord::from_fields(fields, Some(ctx.user_id)) {
            Ok(record) => record,
            Err(err) => {
                info!("add_contact validation failed for user {}: {}", ctx.user_id, err);
                return error_output(err.to_string());
            }
        };
        match self.contacts.insert(&record).await {
            Ok(contact_id) => {
                info!("stored contact {} for user {}", contact_id, ctx.user_id);
                let mut fields = serde_json::Map::new();
                fields.insert("contact_id".to_string(), json!(contact_id));
                success_output(fields)
            }
            Err(err) => {
                error!("failed to store contact for user {}: {}", ctx.user_id, err);
                error_output("the contact could not be saved right now")
            }
        }
    }

    fn get_event_info(&self, fields: &serde_json::Map<String, Value>) -> Value {
        let Some(knowledge) = self.knowledge.as_ref() else {
            return error_output("event information is not available");
        };
        let category = fields.get("category").and_then(Value::as_str).unwrap_or("");
        let subcategory = fields
            .get("subcategory")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty());
        match knowledge.lookup(category, subcategory) {
            Some(data) => {
                let mut fields = serde_json::Map::new();
                fields.insert("data".to_string(), data.clone());
                success_output(fields)
            }
            None => error_output(format!(
                "category '{}' not found; available: {}",
                category,
                knowledge.categories().join(", ")
            )),
        }
    }
}
