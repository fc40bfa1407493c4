//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Records of every collection live in the `records` table created by
//! [`migrate`](crate::migrate), one row per record with the JSON body in
//! `data`. A [`Where`] is translated into SQL over `json_extract` and
//! `json_type`, so filtering, ordering and limits run inside SQLite and
//! agree with [`Where::matches`]:
//!
//! | Condition | SQL |
//! |-----------|-----|
//! | `eq` text / number / bool | type check plus `json_extract(data, '$.f') = ?` |
//! | `eq` null | field missing or JSON `null` |
//! | `is_in` | disjunction of the equalities, `0` when empty |
//! | `gt` / `lt` | type check plus comparison, `0` for null, array or object bounds |
//! | `createdAt` ordering | the indexed `created_at` column |
//!
//! Sorted results break ties by insertion order. Records missing the sort
//! field sort before every present value.
//!
//! Unique fields are enforced by the `unique_keys` table: each write
//! inserts its record row and key rows inside one (nested) transaction,
//! and the primary key on `(collection, field, value)` rejects the loser
//! of a concurrent race.
//!
//! Transactions are real SQLite transactions. An open transaction is
//! parked in a map keyed by [`TransactionId`]; calls that carry the id run
//! on that transaction's connection until it is committed or rolled back.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use chatstore_core::models::CREATED_AT;
use chatstore_core::schema::{CollectionRegistry, CollectionSchema};
use chatstore_core::store::filter::{Condition, Op};
use chatstore_core::store::{
    lookup_schema, prepare_create, prepare_update, record_id, DeleteTarget, DocumentStore,
    FindQuery, Record, Sort, TransactionId, Where,
};

type OpenTransactions = HashMap<TransactionId, Transaction<'static, Sqlite>>;

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    registry: CollectionRegistry,
    transactions: Mutex<OpenTransactions>,
}

/// The connection a call runs on: a pooled one, or the one owned by an
/// open transaction.
enum Conn<'a> {
    Pool(PoolConnection<Sqlite>),
    Tx(MutexGuard<'a, OpenTransactions>, TransactionId),
}

impl Conn<'_> {
    fn get(&mut self) -> Result<&mut SqliteConnection> {
        match self {
            Conn::Pool(conn) => Ok(&mut **conn),
            Conn::Tx(open, id) => open
                .get_mut(id)
                .map(|tx| &mut **tx)
                .ok_or_else(|| anyhow!("unknown transaction: {}", id)),
        }
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, registry: CollectionRegistry) -> Self {
        Self {
            pool,
            registry,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of transactions begun but not yet committed or rolled back.
    pub async fn open_transactions(&self) -> usize {
        self.transactions.lock().await.len()
    }

    async fn conn(&self, tx: Option<&TransactionId>) -> Result<Conn<'_>> {
        match tx {
            Some(id) => {
                let open = self.transactions.lock().await;
                if !open.contains_key(id) {
                    bail!("unknown transaction: {}", id);
                }
                Ok(Conn::Tx(open, id.clone()))
            }
            None => Ok(Conn::Pool(self.pool.acquire().await?)),
        }
    }
}

/// JSON path for a record field. Field names are inlined into SQL, so only
/// identifier characters are accepted.
fn json_path(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid field name: {:?}", field);
    }
    Ok(format!("'$.{}'", field))
}

/// Binds a scalar JSON value in the form `json_extract` returns it.
fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or(f64::NAN));
            }
        },
        other => {
            qb.push_bind(other.to_string());
        }
    }
}

fn push_equals(qb: &mut QueryBuilder<'_, Sqlite>, path: &str, expected: &Value) {
    match expected {
        Value::Null => {
            qb.push(format!(
                "(json_type(data, {p}) IS NULL OR json_type(data, {p}) = 'null')",
                p = path
            ));
        }
        Value::Bool(b) => {
            qb.push(format!("json_type(data, {}) = '{}'", path, b));
        }
        _ => {
            let kind = match expected {
                Value::String(_) => "text",
                Value::Number(n) if n.is_f64() => "real",
                Value::Number(_) => "integer",
                Value::Array(_) => "array",
                _ => "object",
            };
            qb.push(format!("(json_extract(data, {}) = ", path));
            push_scalar(qb, expected);
            qb.push(format!(" AND json_type(data, {}) = '{}')", path, kind));
        }
    }
}

fn push_ordering(
    qb: &mut QueryBuilder<'_, Sqlite>,
    field: &str,
    path: &str,
    op: &str,
    bound: &Value,
) {
    let kinds = match bound {
        Value::String(_) if field == CREATED_AT => {
            qb.push(format!("created_at {} ", op));
            push_scalar(qb, bound);
            return;
        }
        Value::String(_) => "('text')",
        Value::Number(_) => "('integer', 'real')",
        Value::Bool(_) => "('true', 'false')",
        _ => {
            qb.push("0");
            return;
        }
    };
    qb.push(format!(
        "(json_type(data, {p}) IN {k} AND json_extract(data, {p}) {op} ",
        p = path,
        k = kinds,
        op = op
    ));
    push_scalar(qb, bound);
    qb.push(")");
}

fn push_condition(qb: &mut QueryBuilder<'_, Sqlite>, condition: &Condition) -> Result<()> {
    let path = json_path(&condition.field)?;
    match &condition.op {
        Op::Equals(expected) => push_equals(qb, &path, expected),
        Op::In(candidates) if candidates.is_empty() => {
            qb.push("0");
        }
        Op::In(candidates) => {
            qb.push("(");
            for (i, candidate) in candidates.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_equals(qb, &path, candidate);
            }
            qb.push(")");
        }
        Op::GreaterThan(bound) => push_ordering(qb, &condition.field, &path, ">", bound),
        Op::LessThan(bound) => push_ordering(qb, &condition.field, &path, "<", bound),
    }
    Ok(())
}

/// Appends ` WHERE collection = ? AND ...` for `filter`.
fn push_filter(
    qb: &mut QueryBuilder<'_, Sqlite>,
    collection: &str,
    filter: &Where,
) -> Result<()> {
    qb.push(" WHERE collection = ");
    qb.push_bind(collection.to_string());
    for condition in filter.conditions() {
        qb.push(" AND ");
        push_condition(qb, condition)?;
    }
    Ok(())
}

fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, sort: Option<&Sort>) -> Result<()> {
    let Some(sort) = sort else {
        qb.push(" ORDER BY rowid");
        return Ok(());
    };
    let key = if sort.field == CREATED_AT {
        "created_at".to_string()
    } else {
        format!("json_extract(data, {})", json_path(&sort.field)?)
    };
    let direction = if sort.descending { "DESC" } else { "ASC" };
    qb.push(format!(" ORDER BY {} {}, rowid ASC", key, direction));
    Ok(())
}

fn decode(rows: Vec<String>) -> Result<Vec<Record>> {
    rows.iter()
        .map(|data| serde_json::from_str::<Record>(data).map_err(anyhow::Error::from))
        .collect()
}

async fn load_one(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
) -> Result<Option<Record>> {
    let row: Option<String> =
        sqlx::query_scalar("SELECT data FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row
        .map(|data| serde_json::from_str::<Record>(&data))
        .transpose()?)
}

fn created_at(record: &Record) -> Result<&str> {
    record
        .get(CREATED_AT)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("record has no {}", CREATED_AT))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Claims the unique values of `record`. A value already claimed by
/// another record fails with the field name.
async fn insert_unique_keys(
    conn: &mut SqliteConnection,
    schema: &CollectionSchema,
    collection: &str,
    record: &Record,
) -> Result<()> {
    let id = record_id(record)?;
    for field in schema.unique_fields() {
        let value = match record.get(field.name) {
            Some(value) if !value.is_null() => value.to_string(),
            _ => continue,
        };
        let inserted = sqlx::query(
            "INSERT INTO unique_keys (collection, field, value, id) VALUES (?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(field.name)
        .bind(&value)
        .bind(id)
        .execute(&mut *conn)
        .await;
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                bail!("duplicate value for unique field '{}' in {}", field.name, collection)
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn insert_record(
    conn: &mut SqliteConnection,
    schema: &CollectionSchema,
    collection: &str,
    record: &Record,
) -> Result<()> {
    let id = record_id(record)?;
    let inserted =
        sqlx::query("INSERT INTO records (collection, id, created_at, data) VALUES (?, ?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(created_at(record)?)
            .bind(serde_json::to_string(record)?)
            .execute(&mut *conn)
            .await;
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => bail!("duplicate id in {}: {}", collection, id),
        Err(e) => return Err(e.into()),
    }
    insert_unique_keys(conn, schema, collection, record).await
}

async fn replace_record(
    conn: &mut SqliteConnection,
    schema: &CollectionSchema,
    collection: &str,
    id: &str,
    patch: Record,
) -> Result<Record> {
    let existing = load_one(conn, collection, id)
        .await?
        .ok_or_else(|| anyhow!("record not found: {}/{}", collection, id))?;
    let updated = prepare_update(schema, &existing, patch)?;

    sqlx::query("UPDATE records SET created_at = ?, data = ? WHERE collection = ? AND id = ?")
        .bind(created_at(&updated)?)
        .bind(serde_json::to_string(&updated)?)
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM unique_keys WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    insert_unique_keys(conn, schema, collection, &updated).await?;

    Ok(updated)
}

async fn delete_by_id(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<u64> {
    sqlx::query("DELETE FROM unique_keys WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
        .bind(collection)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        bail!("record not found: {}/{}", collection, id);
    }
    Ok(result.rows_affected())
}

async fn delete_matching(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Where,
) -> Result<u64> {
    let mut keys = QueryBuilder::<Sqlite>::new("DELETE FROM unique_keys WHERE collection = ");
    keys.push_bind(collection.to_string());
    keys.push(" AND id IN (SELECT id FROM records");
    push_filter(&mut keys, collection, filter)?;
    keys.push(")");
    keys.build().execute(&mut *conn).await?;

    let mut records = QueryBuilder::<Sqlite>::new("DELETE FROM records");
    push_filter(&mut records, collection, filter)?;
    let deleted = records.build().execute(&mut *conn).await?.rows_affected();
    Ok(deleted)
}

/// Commits `write` when `result` is ok, rolls it back otherwise.
async fn finish<T>(write: Transaction<'_, Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            write.commit().await?;
            Ok(value)
        }
        Err(err) => {
            write.rollback().await?;
            Err(err)
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<Record>> {
        lookup_schema(&self.registry, collection)?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT data FROM records");
        push_filter(&mut qb, collection, &query.filter)?;
        push_order(&mut qb, query.sort.as_ref())?;
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let mut conn = self.conn(tx).await?;
        let rows = qb
            .build_query_scalar::<String>()
            .fetch_all(conn.get()?)
            .await?;
        decode(rows)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Option<Record>> {
        lookup_schema(&self.registry, collection)?;
        let mut conn = self.conn(tx).await?;
        load_one(conn.get()?, collection, id).await
    }

    async fn create(
        &self,
        collection: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record> {
        let schema = lookup_schema(&self.registry, collection)?;
        let record = prepare_create(schema, data)?;

        let mut conn = self.conn(tx).await?;
        let mut write = conn.get()?.begin().await?;
        let result = insert_record(&mut write, schema, collection, &record).await;
        finish(write, result).await?;
        debug!(collection, id = record_id(&record)?, "record created");

        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record> {
        let schema = lookup_schema(&self.registry, collection)?;
        let mut conn = self.conn(tx).await?;
        let mut write = conn.get()?.begin().await?;
        let result = replace_record(&mut write, schema, collection, id, data).await;
        finish(write, result).await
    }

    async fn delete(
        &self,
        collection: &str,
        target: &DeleteTarget,
        tx: Option<&TransactionId>,
    ) -> Result<u64> {
        lookup_schema(&self.registry, collection)?;
        let mut conn = self.conn(tx).await?;
        let mut write = conn.get()?.begin().await?;

        let result = match target {
            DeleteTarget::Id(id) => delete_by_id(&mut write, collection, id).await,
            DeleteTarget::Where(filter) => delete_matching(&mut write, collection, filter).await,
        };
        let deleted = finish(write, result).await?;
        debug!(collection, deleted, "records deleted");
        Ok(deleted)
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Where,
        tx: Option<&TransactionId>,
    ) -> Result<Option<u64>> {
        lookup_schema(&self.registry, collection)?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records");
        push_filter(&mut qb, collection, filter)?;

        let mut conn = self.conn(tx).await?;
        let total = qb
            .build_query_scalar::<i64>()
            .fetch_one(conn.get()?)
            .await?;
        Ok(Some(u64::try_from(total)?))
    }

    async fn begin_transaction(&self) -> Result<Option<TransactionId>> {
        let tx = self.pool.begin().await?;
        let id = TransactionId::generate();
        self.transactions.lock().await.insert(id.clone(), tx);
        debug!(tx = %id, "sqlite transaction opened");
        Ok(Some(id))
    }

    async fn commit_transaction(&self, id: &TransactionId) -> Result<()> {
        let tx = self
            .transactions
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| anyhow!("unknown transaction: {}", id))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback_transaction(&self, id: &TransactionId) -> Result<()> {
        let tx = self
            .transactions
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| anyhow!("unknown transaction: {}", id))?;
        tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use chatstore_core::store::filter::sort_records;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store_with(registry: CollectionRegistry) -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool, registry)
    }

    async fn memory_store() -> SqliteStore {
        store_with(CollectionRegistry::builtin()).await
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ids(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| record_id(r).unwrap().to_string())
            .collect()
    }

    /// A free-form collection seeded with mixed-type values, plus the same
    /// records as stored for evaluating filters in memory.
    async fn things() -> (SqliteStore, Vec<Record>) {
        let mut registry = CollectionRegistry::new();
        registry.register(CollectionSchema::new("things"));
        let store = store_with(registry).await;
        let seed = [
            ("a", 1, json!({ "n": 3, "s": "pear", "b": true, "tags": ["x"] })),
            ("b", 3, json!({ "n": 1.5, "s": "apple", "b": false })),
            ("c", 2, json!({ "n": "3", "s": null, "tags": ["x", "y"] })),
            ("d", 4, json!({ "n": 10, "s": "fig", "b": true })),
            ("e", 5, json!({ "s": "Zucchini" })),
        ];
        let mut stored = Vec::new();
        for (id, day, fields) in seed {
            let mut data = record(fields);
            data.insert("id".to_string(), json!(id));
            let created = format!("2025-03-0{}T00:00:00Z", day);
            data.insert(CREATED_AT.to_string(), json!(created));
            stored.push(store.create("things", data, None).await.unwrap());
        }
        (store, stored)
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = memory_store().await;
        let created = store
            .create(
                "chats",
                record(json!({ "userId": "u1", "title": "Hello" })),
                None,
            )
            .await
            .unwrap();
        let id = record_id(&created).unwrap();
        let found = store.find_by_id("chats", id, None).await.unwrap().unwrap();
        assert_eq!(found["title"], "Hello");
        assert_eq!(found["visibility"], "private");
    }

    #[tokio::test]
    async fn test_unique_email() {
        let store = memory_store().await;
        let user = json!({ "email": "a@example.com", "password": "x" });
        store.create("users", record(user.clone()), None).await.unwrap();
        let err = store.create("users", record(user), None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate value for unique field 'email' in users"
        );
        assert_eq!(store.count("users", &Where::new(), None).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_unique_email_follows_updates_and_deletes() {
        let store = memory_store().await;
        let a = store
            .create("users", record(json!({ "email": "a@example.com", "password": "x" })), None)
            .await
            .unwrap();
        let a_id = record_id(&a).unwrap().to_string();
        store
            .update("users", &a_id, record(json!({ "email": "b@example.com" })), None)
            .await
            .unwrap();

        // The old address is free again, the new one is taken.
        store
            .create("users", record(json!({ "email": "a@example.com", "password": "y" })), None)
            .await
            .unwrap();
        let err = store
            .create("users", record(json!({ "email": "b@example.com", "password": "z" })), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'email'"));

        store
            .delete("users", &DeleteTarget::Id(a_id), None)
            .await
            .unwrap();
        store
            .create("users", record(json!({ "email": "b@example.com", "password": "z" })), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let store = memory_store().await;
        let chat = json!({ "id": "c1", "userId": "u1", "title": "Hello" });
        store.create("chats", record(chat.clone()), None).await.unwrap();
        let err = store.create("chats", record(chat), None).await.unwrap_err();
        assert_eq!(err.to_string(), "duplicate id in chats: c1");
    }

    #[tokio::test]
    async fn test_delete_missing_id_fails() {
        let store = memory_store().await;
        let err = store
            .delete("chats", &DeleteTarget::Id("ghost".into()), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("record not found"));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = memory_store().await;
        let err = store
            .find("widgets", &FindQuery::default(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown collection"));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_field_names() {
        let store = memory_store().await;
        let filter = Where::new().eq("title') OR 1=1 --", "x");
        let err = store
            .find("chats", &FindQuery::new(filter), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid field name"));
    }

    #[tokio::test]
    async fn test_filters_agree_with_matches() {
        let (store, stored) = things().await;
        let filters = vec![
            Where::new(),
            Where::new().eq("n", 3),
            Where::new().eq("n", "3"),
            Where::new().eq("n", 1.5),
            Where::new().eq("s", Value::Null),
            Where::new().eq("b", true),
            Where::new().eq("b", false),
            Where::new().eq("tags", json!(["x"])),
            Where::new().is_in("s", ["fig", "pear", "kiwi"]),
            Where::new().is_in("s", Vec::<Value>::new()),
            Where::new().gt("n", 2),
            Where::new().lt("n", 3),
            Where::new().gt("s", "b"),
            Where::new().lt("s", "a"),
            Where::new().gt("b", false),
            Where::new().gt("n", Value::Null),
            Where::new().gt(CREATED_AT, "2025-03-02T00:00:00Z"),
            Where::new().lt(CREATED_AT, "2025-03-04T00:00:00Z").eq("b", true),
        ];

        for filter in filters {
            let expected: Vec<Record> = stored
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            let found = store
                .find("things", &FindQuery::new(filter.clone()), None)
                .await
                .unwrap();
            assert_eq!(ids(&found), ids(&expected), "filter {:?}", filter);
            let counted = store.count("things", &filter, None).await.unwrap();
            assert_eq!(counted, Some(expected.len() as u64), "filter {:?}", filter);
        }
    }

    #[tokio::test]
    async fn test_sort_and_limit_agree_with_sort_records() {
        let (store, stored) = things().await;
        let only_strings = Where::new().is_in("s", ["pear", "apple", "fig", "Zucchini"]);
        for sort in [
            Sort::asc("s"),
            Sort::desc("s"),
            Sort::asc(CREATED_AT),
            Sort::desc(CREATED_AT),
        ] {
            let mut expected: Vec<Record> = stored
                .iter()
                .filter(|r| only_strings.matches(r))
                .cloned()
                .collect();
            sort_records(&mut expected, &sort.field, sort.descending);
            expected.truncate(3);

            let query = FindQuery::new(only_strings.clone()).sort(sort.clone()).limit(3);
            let found = store.find("things", &query, None).await.unwrap();
            assert_eq!(ids(&found), ids(&expected), "sort {:?}", sort);
        }
    }

    #[tokio::test]
    async fn test_sort_ties_keep_insertion_order() {
        let (store, _) = things().await;
        let query = FindQuery::new(Where::new().eq("b", true)).sort(Sort::desc("b"));
        let found = store.find("things", &query, None).await.unwrap();
        assert_eq!(ids(&found), vec!["a", "d"]);
    }

    #[tokio::test]
    async fn test_delete_where_removes_only_matches() {
        let (store, stored) = things().await;
        let filter = Where::new().gt("n", 2);
        let expected = stored.iter().filter(|r| filter.matches(r)).count() as u64;

        let deleted = store
            .delete("things", &DeleteTarget::Where(filter.clone()), None)
            .await
            .unwrap();
        assert_eq!(deleted, expected);
        let left = store
            .find("things", &FindQuery::default(), None)
            .await
            .unwrap();
        assert_eq!(ids(&left), vec!["b", "c", "e"]);
        assert_eq!(store.count("things", &filter, None).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_failed_write_inside_transaction_keeps_earlier_writes() {
        let store = memory_store().await;
        let tx = store.begin_transaction().await.unwrap().unwrap();
        let user = json!({ "email": "a@example.com", "password": "x" });
        store.create("users", record(user.clone()), Some(&tx)).await.unwrap();
        assert!(store.create("users", record(user), Some(&tx)).await.is_err());
        store.commit_transaction(&tx).await.unwrap();

        assert_eq!(store.count("users", &Where::new(), None).await.unwrap(), Some(1));
        assert_eq!(store.open_transactions().await, 0);
    }
}
