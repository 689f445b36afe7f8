//! MongoDB-backed contact store.

use assistant_module::tools::contacts::{
    ContactRecord, ContactStore, ContactStoreError, StoredContact,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_DATABASE: &str = "eventek";
const CONTACTS_COLLECTION: &str = "contacts";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContactDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    event_date: Option<String>,
    #[serde(default)]
    attendees: Option<i64>,
    #[serde(default)]
    plan_interest: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    added_on: BsonDateTime,
}

impl From<&ContactRecord> for ContactDocument {
    fn from(record: &ContactRecord) -> Self {
        Self {
            id: None,
            name: record.name.clone(),
            phone: record.phone.clone(),
            email: record.email.clone(),
            company: record.company.clone(),
            event_type: record.event_type.clone(),
            event_date: record
                .event_date
                .map(|date| date.format("%Y-%m-%d").to_string()),
            attendees: record.attendees.map(i64::from),
            plan_interest: record.plan_interest.clone(),
            notes: record.notes.clone(),
            added_on: BsonDateTime::from_chrono(record.added_on),
        }
    }
}

impl ContactDocument {
    fn into_stored(self) -> StoredContact {
        StoredContact {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            record: ContactRecord {
                name: self.name,
                phone: self.phone,
                email: self.email,
                company: self.company,
                event_type: self.event_type,
                event_date: self
                    .event_date
                    .and_then(|value| NaiveDate::parse_from_str(&value, "%Y-%m-%d").ok()),
                attendees: self.attendees.and_then(|value| u32::try_from(value).ok()),
                plan_interest: self.plan_interest,
                notes: self.notes,
                added_on: self.added_on.to_chrono(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoContactStore {
    collection: Collection<ContactDocument>,
}

impl MongoContactStore {
    /// Connect and ping. The database comes from `database`, else the URI's
    /// default database, else `eventek`.
    pub async fn connect(uri: &str, database: Option<&str>) -> Result<Self, ContactStoreError> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|err| ContactStoreError::Unavailable(err.to_string()))?;
        let database = database
            .map(str::to_string)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        let client = Client::with_options(options)
            .map_err(|err| ContactStoreError::Unavailable(err.to_string()))?;
        let db = client.database(&database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|err| ContactStoreError::Unavailable(err.to_string()))?;
        info!("connected to MongoDB database {}", database);
        Ok(Self {
            collection: db.collection(CONTACTS_COLLECTION),
        })
    }
}

#[async_trait]
impl ContactStore for MongoContactStore {
    async fn insert(&self, record: &ContactRecord) -> Result<String, ContactStoreError> {
        let result = self
            .collection
            .insert_one(ContactDocument::from(record), None)
            .await
            .map_err(|err| ContactStoreError::Backend(err.to_string()))?;
        match result.inserted_id {
            Bson::ObjectId(id) => Ok(id.to_hex()),
            other => {
                warn!("contact inserted with non-ObjectId id {}", other);
                Ok(other.to_string())
            }
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredContact>, ContactStoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "added_on": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();
        let cursor = self
            .collection
            .find(None, options)
            .await
            .map_err(|err| ContactStoreError::Backend(err.to_string()))?;
        let documents: Vec<ContactDocument> = cursor
            .try_collect()
            .await
            .map_err(|err| ContactStoreError::Backend(err.to_string()))?;
        Ok(documents.into_iter().map(ContactDocument::into_stored).collect())
    }
}
