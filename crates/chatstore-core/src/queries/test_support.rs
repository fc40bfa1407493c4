//! Fixtures for query-layer tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::collections;
use crate::queries::Queries;
use crate::rag::{rag_plugin, Plugin, RagPluginConfig};
use crate::schema::CollectionRegistry;
use crate::store::memory::InMemoryStore;
use crate::store::{DeleteTarget, DocumentStore, FindQuery, Record, TransactionId, Where};

/// Which store call should fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FailOn {
    /// The n-th `create` (1-based) into a collection.
    Create(&'static str, usize),
    /// Any `delete` against a collection.
    Delete(&'static str),
    /// Any `find` against a collection.
    Find(&'static str),
    /// `count` reports no total.
    CountMissing,
}

/// Wraps an [`InMemoryStore`] and injects one failure.
pub struct FaultyStore {
    pub inner: InMemoryStore,
    fail_on: Mutex<Option<FailOn>>,
    creates: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_on: Mutex::new(None),
            creates: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, fail: FailOn) {
        self.creates.store(0, Ordering::SeqCst);
        *self.fail_on.lock().unwrap() = Some(fail);
    }

    fn should_fail(&self, candidate: &FailOn) -> bool {
        self.fail_on.lock().unwrap().as_ref() == Some(candidate)
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn find(
        &self,
        collection: &str,
        query: &FindQuery,
        tx: Option<&TransactionId>,
    ) -> Result<Vec<Record>> {
        self.log(format!("find {}", collection));
        let failing = matches!(
            self.fail_on.lock().unwrap().as_ref(),
            Some(FailOn::Find(c)) if *c == collection
        );
        if failing {
            bail!("injected find failure on {}", collection);
        }
        self.inner.find(collection, query, tx).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        tx: Option<&TransactionId>,
    ) -> Result<Option<Record>> {
        self.log(format!("find_by_id {} {}", collection, id));
        self.inner.find_by_id(collection, id, tx).await
    }

    async fn create(
        &self,
        collection: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record> {
        self.log(format!("create {}", collection));
        let target = match self.fail_on.lock().unwrap().as_ref() {
            Some(FailOn::Create(c, n)) if *c == collection => Some(*n),
            _ => None,
        };
        if let Some(n) = target {
            let seen = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
            if seen == n {
                bail!("injected create failure on {} #{}", collection, n);
            }
        }
        self.inner.create(collection, data, tx).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        data: Record,
        tx: Option<&TransactionId>,
    ) -> Result<Record> {
        self.log(format!("update {} {}", collection, id));
        self.inner.update(collection, id, data, tx).await
    }

    async fn delete(
        &self,
        collection: &str,
        target: &DeleteTarget,
        tx: Option<&TransactionId>,
    ) -> Result<u64> {
        self.log(format!("delete {}", collection));
        let failing = matches!(
            self.fail_on.lock().unwrap().as_ref(),
            Some(FailOn::Delete(c)) if *c == collection
        );
        if failing {
            bail!("injected delete failure on {}", collection);
        }
        self.inner.delete(collection, target, tx).await
    }

    async fn count(
        &self,
        collection: &str,
        filter: &Where,
        tx: Option<&TransactionId>,
    ) -> Result<Option<u64>> {
        self.log(format!("count {}", collection));
        if self.should_fail(&FailOn::CountMissing) {
            return Ok(None);
        }
        self.inner.count(collection, filter, tx).await
    }

    async fn begin_transaction(&self) -> Result<Option<TransactionId>> {
        self.log("begin".to_string());
        self.inner.begin_transaction().await
    }

    async fn commit_transaction(&self, tx: &TransactionId) -> Result<()> {
        self.log("commit".to_string());
        self.inner.commit_transaction(tx).await
    }

    async fn rollback_transaction(&self, tx: &TransactionId) -> Result<()> {
        self.log("rollback".to_string());
        self.inner.rollback_transaction(tx).await
    }
}

/// A store serving the first-party collections plus the knowledge pair.
pub fn faulty() -> (Arc<FaultyStore>, Queries) {
    let registry = rag_plugin(RagPluginConfig::default()).apply(CollectionRegistry::builtin());
    let store = Arc::new(FaultyStore::new(InMemoryStore::new(registry)));
    let queries = Queries::new(store.clone());
    (store, queries)
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
}

pub async fn count_all(store: &dyn DocumentStore, collection: &str) -> u64 {
    store
        .count(collection, &Where::new(), None)
        .await
        .unwrap()
        .unwrap()
}

pub async fn chat_count(store: &dyn DocumentStore) -> u64 {
    count_all(store, collections::CHATS).await
}
