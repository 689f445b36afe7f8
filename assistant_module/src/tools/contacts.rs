//! Contact records captured from conversations or the CRM form.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub event_type: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub attendees: Option<u32>,
    pub plan_interest: Option<String>,
    pub notes: Option<String>,
    pub added_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredContact {
    pub id: String,
    #[serde(flatten)]
    pub record: ContactRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ContactStoreError {
    #[error("contact store unavailable: {0}")]
    Unavailable(String),
    #[error("contact store backend error: {0}")]
    Backend(String),
}

impl ContactRecord {
    /// Validate a loosely typed field map. Blank strings count as absent and
    /// unrecognized keys are ignored; `default_phone` fills a missing phone.
    pub fn from_fields(
        fields: &Map<String, Value>,
        default_phone: Option<&str>,
    ) -> Result<Self, ContactValidationError> {
        let name = text_field(fields, "name")?.ok_or(ContactValidationError::MissingField("name"))?;
        let phone = text_field(fields, "phone")?
            .or_else(|| default_phone.map(str::to_string).filter(|value| !value.trim().is_empty()));
        let email = match text_field(fields, "email")? {
            Some(value) if !looks_like_email(&value) => {
                return Err(ContactValidationError::InvalidField {
                    field: "email",
                    reason: format!("'{}' is not an email address", value),
                })
            }
            other => other,
        };
        let event_date = match text_field(fields, "event_date")? {
            Some(value) => Some(NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                ContactValidationError::InvalidField {
                    field: "event_date",
                    reason: format!("'{}' is not a YYYY-MM-DD date", value),
                }
            })?),
            None => None,
        };

        Ok(Self {
            name,
            phone,
            email,
            company: text_field(fields, "company")?,
            event_type: text_field(fields, "event_type")?,
            event_date,
            attendees: count_field(fields, "attendees")?,
            plan_interest: text_field(fields, "plan_interest")?,
            notes: text_field(fields, "notes")?,
            added_on: Utc::now(),
        })
    }
}

fn text_field(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ContactValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(ContactValidationError::InvalidField {
            field,
            reason: format!("expected text, got {}", other),
        }),
    }
}

fn count_field(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<u32>, ContactValidationError> {
    let invalid = |raw: String| ContactValidationError::InvalidField {
        field,
        reason: format!("'{}' is not a non-negative whole number", raw),
    };
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(value)) => value
            .as_u64()
            .and_then(|count| u32::try_from(count).ok())
            .map(Some)
            .ok_or_else(|| invalid(value.to_string())),
        Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
        Some(Value::String(value)) => value
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(value.clone())),
        Some(other) => Err(invalid(other.to_string())),
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

/// Append-only sink for captured contacts.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Persist a record and return its id.
    async fn insert(&self, record: &ContactRecord) -> Result<String, ContactStoreError>;

    /// Most recently added contacts first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredContact>, ContactStoreError>;
}

/// Process-local store used when no database is configured.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    contacts: Mutex<Vec<StoredContact>>,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn insert(&self, record: &ContactRecord) -> Result<String, ContactStoreError> {
        let id = Uuid::new_v4().to_string();
        let mut contacts = self
            .contacts
            .lock()
            .map_err(|_| ContactStoreError::Unavailable("contact list lock poisoned".to_string()))?;
        contacts.push(StoredContact {
            id: id.clone(),
            record: record.clone(),
        });
        Ok(id)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredContact>, ContactStoreError> {
        let contacts = self
            .contacts
            .lock()
            .map_err(|_| ContactStoreError::Unavailable("contact list lock poisoned".to_string()))?;
        Ok(contacts.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn minimal_record_uses_default_phone() {
        let record = ContactRecord::from_fields(&fields(json!({"name": "Ana"})), Some("5215550001"))
            .unwrap();
        assert_eq!(record.name, "Ana");
        assert_eq!(record.phone.as_deref(), Some("5215550001"));
        assert_eq!(record.email, None);
    }

    #[test]
    fn full_record_is_parsed() {
        let record = ContactRecord::from_fields(
            &fields(json!({
                "name": "  Ana López ",
                "phone": "+34 600 000 000",
                "email": "ana@example.com",
                "company": "Eventos SA",
                "event_type": "boda",
                "event_date": "2025-05-17",
                "attendees": "120",
                "plan_interest": "Profesional B2B",
                "notes": "",
                "unexpected": "ignored"
            })),
            Some("5215550001"),
        )
        .unwrap();
        assert_eq!(record.name, "Ana López");
        assert_eq!(record.phone.as_deref(), Some("+34 600 000 000"));
        assert_eq!(record.event_date, NaiveDate::from_ymd_opt(2025, 5, 17));
        assert_eq!(record.attendees, Some(120));
        assert_eq!(record.notes, None);
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = ContactRecord::from_fields(&fields(json!({"name": "   "})), None).unwrap_err();
        assert_eq!(err, ContactValidationError::MissingField("name"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_email = ContactRecord::from_fields(
            &fields(json!({"name": "Ana", "email": "ana.example.com"})),
            None,
        );
        assert!(matches!(
            bad_email,
            Err(ContactValidationError::InvalidField { field: "email", .. })
        ));

        let bad_date = ContactRecord::from_fields(
            &fields(json!({"name": "Ana", "event_date": "17/05/2025"})),
            None,
        );
        assert!(matches!(
            bad_date,
            Err(ContactValidationError::InvalidField { field: "event_date", .. })
        ));

        let bad_count =
            ContactRecord::from_fields(&fields(json!({"name": "Ana", "attendees": -3})), None);
        assert!(matches!(
            bad_count,
            Err(ContactValidationError::InvalidField { field: "attendees", .. })
        ));
    }

    #[tokio::test]
    async fn in_memory_store_lists_newest_first() {
        let store = InMemoryContactStore::new();
        for name in ["Ana", "Luis", "Marta"] {
            let record =
                ContactRecord::from_fields(&fields(json!({ "name": name })), None).unwrap();
            store.insert(&record).await.unwrap();
        }

        let recent = store.list_recent(2).await.unwrap();
        let names: Vec<&str> = recent.iter().map(|c| c.record.name.as_str()).collect();
        assert_eq!(names, vec!["Marta", "Luis"]);
        assert_ne!(recent[0].id, recent[1].id);
    }
}
