use std::path::Path;

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse knowledge file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("knowledge document must be a JSON object of categories")]
    NotAnObject,
}

/// Read-only event information keyed by category, then subcategory.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    categories: Map<String, Value>,
}

impl KnowledgeBase {
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, KnowledgeError> {
        match value {
            Value::Object(categories) => Ok(Self { categories }),
            _ => Err(KnowledgeError::NotAnObject),
        }
    }

    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// An unknown subcategory falls back to the whole category.
    pub fn lookup(&self, category: &str, subcategory: Option<&str>) -> Option<&Value> {
        let entry = self.categories.get(category)?;
        match subcategory.and_then(|key| entry.get(key)) {
            Some(nested) => Some(nested),
            None => Some(entry),
        }
    }
}
