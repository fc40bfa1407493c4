//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the only way the query layer touches
//! persistence. Records are JSON objects addressed by collection slug;
//! filtering, sorting and limits are expressed with [`FindQuery`] and
//! [`Where`], and every data operation can run inside a transaction opened
//! with [`DocumentStore::begin_transaction`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes and
//! must run [`CollectionSchema::prepare`] on every write.

pub mod filter;
pub mod memory;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::models::{timestamp, CREATED_AT, UPDATED_AT};
use crate::schema::{CollectionRegistry, CollectionSchema, WriteOperation};

pub use filter::{Condition, Op, Where};

/// A persisted record: a JSON object with at least `id` and `createdAt`.
pub type Record = serde_json::Map<String, Value>;

/// Handle of an open transaction. Owned by the operation that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: Where,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new(filter: Where) -> Self {
        Self {
            filter,
            sort: None,
            limit: None,
        }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What a delete call removes.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    /// Exactly one record; deleting a missing id is an error.
    Id(String),
    /// Every matching record; zero matches is not an error.
    Where(Where),
}

/// Abstract persistence backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find`](DocumentStore::find) | Filtered, sorted, limited scan |
/// | [`find_by_id`](DocumentStore::find_by_id) | Point lookup |
/// | [`create`](DocumentStore::create) | Insert after running schema hooks |
/// | [`update`](DocumentStore::update) | Merge a patch after running schema hooks |
/// | [`delete`](DocumentStore::delete) | Remove by id or filter, returns count |
/// | [`count`](DocumentStore::count) | Count matching records |
/// | [`begin_transaction`](DocumentStore::begin_transaction) | Open a transaction, `None` if unsupported |
/// | [`commit_transaction`](DocumentStore::commit_transaction) | Apply and close |
/// | [`rollback_transaction`](DocumentStore::rollback_transaction) | Discard and close |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<Record>>;

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Option<Record>>;

    async fn create(
        &self,
        collection: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record>;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record>;

    async fn delete(
        &self,
        collection: &str,
        target: &DeleteTarget,
        tx: Option<&TransactionId>,
    ) -> Result<u64>;

    /// `None` when the backend cannot report a total.
    async fn count(
        &self,
        collection: &str,
        filter: &Where,
        tx: Option<&TransactionId>,
    ) -> Result<Option<u64>>;

    async fn begin_transaction(&self) -> Result<Option<TransactionId>>;

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()>;

    async fn rollback_transaction(&self, tx: &TransactionId) -> Result<()>;
}

// ============ Helpers shared by backends ============

/// Serializes a typed value into a record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, got {}", other),
    }
}

/// Deserializes a record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

pub fn record_id(record: &Record) -> Result<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("record has no string id"))
}

pub fn lookup_schema<'a>(
    registry: &'a CollectionRegistry,
    collection: &str,
) -> Result<&'a CollectionSchema> {
    registry
        .get(collection)
        .ok_or_else(|| anyhow!("unknown collection: {}", collection))
}

/// Builds the record to insert: assigns `id` when absent, normalizes or
/// stamps `createdAt`, stamps `updatedAt`, then runs the schema pipeline.
pub fn prepare_create(schema: &CollectionSchema, mut data: Record) -> Result<Record> {
    let now = timestamp::format(&Utc::now());

    match data.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        _ => {
            data.insert(
                "id".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }

    let created_at = match data.get(CREATED_AT).and_then(Value::as_str) {
        Some(raw) => timestamp::normalize(raw)?,
        None => now.clone(),
    };
    data.insert(CREATED_AT.to_string(), Value::String(created_at));
    data.insert(UPDATED_AT.to_string(), Value::String(now));

    schema.prepare(WriteOperation::Create, &mut data)?;
    Ok(data)
}

/// Merges `patch` over `existing` and runs the schema pipeline on the
/// full candidate. `id` and `createdAt` are immutable.
pub fn prepare_update(
    schema: &CollectionSchema,
    existing: &Record,
    patch: Record,
) -> Result<Record> {
    let mut merged = existing.clone();
    for (key, value) in patch {
        if key == "id" || key == CREATED_AT {
            continue;
        }
        merged.insert(key, value);
    }
    merged.insert(
        UPDATED_AT.to_string(),
        Value::String(timestamp::format(&Utc::now())),
    );

    schema.prepare(WriteOperation::Update, &mut merged)?;
    Ok(merged)
}

/// Returns the first unique field of `candidate` whose value is already
/// held by another record.
pub fn unique_violation<'a>(
    schema: &CollectionSchema,
    candidate: &Record,
    existing: impl IntoIterator<Item = &'a Record>,
) -> Option<&'static str> {
    let candidate_id = candidate.get("id");
    let unique: Vec<_> = schema.unique_fields().collect();
    if unique.is_empty() {
        return None;
    }
    for other in existing {
        if other.get("id") == candidate_id {
            continue;
        }
        for field in &unique {
            match (candidate.get(field.name), other.get(field.name)) {
                (Some(a), Some(b)) if !a.is_null() && a == b => return Some(field.name),
                _ => {}
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{chats, users, ValidationErrors};
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_prepare_create_assigns_id_and_timestamps() {
        let r = prepare_create(&chats(), record(json!({ "userId": "u1", "title": "t" }))).unwrap();
        assert!(!record_id(&r).unwrap().is_empty());
        assert!(r[CREATED_AT].as_str().unwrap().ends_with('Z'));
        assert_eq!(r[CREATED_AT], r[UPDATED_AT]);
    }

    #[test]
    fn test_prepare_create_keeps_supplied_id_and_normalizes_created_at() {
        let r = prepare_create(
            &chats(),
            record(json!({
                "id": "c1", "userId": "u1", "title": "t",
                "createdAt": "2025-01-01T00:00:00Z"
            })),
        )
        .unwrap();
        assert_eq!(r["id"], "c1");
        assert_eq!(r[CREATED_AT], "2025-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_prepare_create_surfaces_validation_errors() {
        let err = prepare_create(&chats(), record(json!({ "title": "t" }))).unwrap_err();
        let validation = err.downcast_ref::<ValidationErrors>().unwrap();
        assert!(validation.get("userId").is_some());
    }

    #[test]
    fn test_prepare_update_keeps_identity() {
        let existing = prepare_create(
            &chats(),
            record(json!({ "id": "c1", "userId": "u1", "title": "t" })),
        )
        .unwrap();
        let updated = prepare_update(
            &chats(),
            &existing,
            record(json!({
                "id": "other",
                "createdAt": "1999-01-01T00:00:00Z",
                "visibility": "public"
            })),
        )
        .unwrap();
        assert_eq!(updated["id"], "c1");
        assert_eq!(updated[CREATED_AT], existing[CREATED_AT]);
        assert_eq!(updated["visibility"], "public");
    }

    #[test]
    fn test_unique_violation() {
        let a = record(json!({ "id": "1", "email": "a@x.io" }));
        let b = record(json!({ "id": "2", "email": "a@x.io" }));
        let c = record(json!({ "id": "3", "email": "c@x.io" }));
        assert_eq!(unique_violation(&users(), &b, [&a]), Some("email"));
        assert_eq!(unique_violation(&users(), &c, [&a]), None);
        assert_eq!(unique_violation(&users(), &a, [&a]), None);
    }
}
