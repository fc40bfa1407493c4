//! In-memory [`DocumentStore`] implementation for tests and embedding.
//!
//! Records live in a `HashMap<collection, Vec<Record>>` behind
//! `std::sync::RwLock`; insertion order is the tie-break for sorts.
//! Transactions are snapshots: `begin` copies the current state, `rollback`
//! restores it and `commit` drops it. With overlapping transactions a
//! rollback also discards the other transaction's writes, so callers are
//! expected to run one transaction at a time.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::schema::CollectionRegistry;

use super::filter::sort_records;
use super::{
    lookup_schema, prepare_create, prepare_update, record_id, unique_violation, DeleteTarget,
    DocumentStore, FindQuery, Record, TransactionId, Where,
};

type Collections = HashMap<String, Vec<Record>>;

pub struct InMemoryStore {
    registry: CollectionRegistry,
    data: RwLock<Collections>,
    snapshots: RwLock<HashMap<TransactionId, Collections>>,
    transactions_enabled: bool,
}

impl InMemoryStore {
    pub fn new(registry: CollectionRegistry) -> Self {
        Self {
            registry,
            data: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            transactions_enabled: true,
        }
    }

    /// A store whose `begin_transaction` always yields `None`.
    pub fn without_transactions(mut self) -> Self {
        self.transactions_enabled = false;
        self
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Number of transactions begun but not yet committed or rolled back.
    pub fn open_transactions(&self) -> usize {
        self.snapshots.read().map(|s| s.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.data.read().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.data.write().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn snapshots(&self) -> Result<RwLockWriteGuard<'_, HashMap<TransactionId, Collections>>> {
        self.snapshots
            .write()
            .map_err(|_| anyhow!("transaction lock poisoned"))
    }

    fn check_transaction(&self, tx: Option<&TransactionId>) -> Result<()> {
        if let Some(tx) = tx {
            let open = self
                .snapshots
                .read()
                .map_err(|_| anyhow!("transaction lock poisoned"))?
                .contains_key(tx);
            if !open {
                bail!("unknown transaction: {}", tx);
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(CollectionRegistry::builtin())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<Record>> {
        lookup_schema(&self.registry, collection)?;
        self.check_transaction(tx)?;
        let data = self.read()?;
        let mut matched: Vec<Record> = data
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(sort) = &query.sort {
            sort_records(&mut matched, &sort.field, sort.descending);
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Option<Record>> {
        lookup_schema(&self.registry, collection)?;
        self.check_transaction(tx)?;
        let data = self.read()?;
        Ok(data.get(collection).and_then(|records| {
            records
                .iter()
                .find(|r| record_id(r).map(|rid| rid == id).unwrap_or(false))
                .cloned()
        }))
    }

    async fn create(
        &self,
        collection: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record> {
        let schema = lookup_schema(&self.registry, collection)?;
        self.check_transaction(tx)?;
        let record = prepare_create(schema, data)?;
        let id = record_id(&record)?.to_string();

        let mut all = self.write()?;
        let records = all.entry(collection.to_string()).or_default();
        if records
            .iter()
            .any(|r| record_id(r).map(|rid| rid == id).unwrap_or(false))
        {
            bail!("duplicate id in {}: {}", collection, id);
        }
        if let Some(field) = unique_violation(schema, &record, records.iter()) {
            bail!("duplicate value for unique field '{}' in {}", field, collection);
        }
        records.push(record.clone());
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
        self.check_transaction(tx)?;

        let mut all = self.write()?;
        let records = all.entry(collection.to_string()).or_default();
        let position = records
            .iter()
            .position(|r| record_id(r).map(|rid| rid == id).unwrap_or(false))
            .ok_or_else(|| anyhow!("record not found: {}/{}", collection, id))?;
        let updated = prepare_update(schema, &records[position], data)?;
        if let Some(field) = unique_violation(schema, &updated, records.iter()) {
            bail!("duplicate value for unique field '{}' in {}", field, collection);
        }
        records[position] = updated.clone();
        Ok(updated)
    }

    async fn delete(
        &self,
        collection: &str,
        target: &DeleteTarget,
        tx: Option<&TransactionId>,
    ) -> Result<u64> {
        lookup_schema(&self.registry, collection)?;
        self.check_transaction(tx)?;

        let mut all = self.write()?;
        let records = all.entry(collection.to_string()).or_default();
        match target {
            DeleteTarget::Id(id) => {
                let position = records
                    .iter()
                    .position(|r| record_id(r).map(|rid| rid == id).unwrap_or(false))
                    .ok_or_else(|| anyhow!("record not found: {}/{}", collection, id))?;
                records.remove(position);
                Ok(1)
            }
            DeleteTarget::Where(filter) => {
                let before = records.len();
                records.retain(|r| !filter.matches(r));
                Ok((before - records.len()) as u64)
            }
        }
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Where,
        tx: Option<&TransactionId>,
    ) -> Result<Option<u64>> {
        lookup_schema(&self.registry, collection)?;
        self.check_transaction(tx)?;
        let data = self.read()?;
        let total = data
            .get(collection)
            .map(|records| records.iter().filter(|r| filter.matches(r)).count())
            .unwrap_or(0);
        Ok(Some(total as u64))
    }

    async fn begin_transaction(&self) -> Result<Option<TransactionId>> {
        if !self.transactions_enabled {
            return Ok(None);
        }
        let snapshot = self.read()?.clone();
        let tx = TransactionId::generate();
        self.snapshots()?.insert(tx.clone(), snapshot);
        Ok(Some(tx))
    }

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()> {
        self.snapshots()?
            .remove(tx)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown transaction: {}", tx))
    }

    async fn rollback_transaction(&self, tx: &TransactionId) -> Result<()> {
        let snapshot = self
            .snapshots()?
            .remove(tx)
            .ok_or_else(|| anyhow!("unknown transaction: {}", tx))?;
        *self.write()? = snapshot;
        Ok(())
    }
}
