//! Query layer: one operation per domain action.
//!
//! [`Queries`] wraps a shared [`DocumentStore`] and exposes typed
//! operations grouped by collection. Each operation catches every store
//! failure, logs the cause, and re-signals it as a [`DbError`]:
//! `bad_request:database` by default, `not_found:database` for cursor ids
//! that must resolve.
//!
//! Multi-collection deletes go through [`Queries::run_in_transaction`],
//! which finalizes the transaction exactly once on every exit path.
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`users`] | `get_user`, `create_user`, `create_guest_user` |
//! | [`chats`] | `save_chat`, `get_chat_by_id`, `get_chats_by_user_id`, `delete_chat_by_id`, `update_chat_visibility_by_id` |
//! | [`messages`] | `save_messages`, `get_message_by_id`, `get_messages_by_chat_id`, `get_message_count_by_user_id`, `delete_messages_by_chat_id_after_timestamp` |
//! | [`votes`] | `vote_message`, `get_votes_by_chat_id` |
//! | [`documents`] | `save_document`, `get_document_by_id`, `get_documents_by_id`, `get_documents_by_chat_id`, `delete_documents_by_id_after_timestamp` |
//! | [`suggestions`] | `save_suggestions`, `get_suggestions_by_document_id` |
//! | [`streams`] | `create_stream_id`, `get_stream_ids_by_chat_id` |
//! | [`knowledge`] | `create_knowledge_doc`, `get_knowledge_doc_by_id`, `get_knowledge_docs_by_status`, `update_knowledge_doc_status`, `ingest_knowledge_doc` |

pub mod chats;
pub mod documents;
pub mod knowledge;
pub mod messages;
pub mod streams;
pub mod suggestions;
pub mod users;
pub mod votes;

#[cfg(test)]
pub(crate) mod test_support;

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::store::{from_record, to_record, DocumentStore, FindQuery, TransactionId};

/// Stateless query operations over a shared store.
#[derive(Clone)]
pub struct Queries {
    store: Arc<dyn DocumentStore>,
}

impl Queries {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn find_one_by_id<T>(&self, collection: &str, id: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.store
            .find_by_id(collection, id, None)
            .await?
            .map(from_record)
            .transpose()
    }

    async fn find_all<T>(&self, collection: &str, query: &FindQuery) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.store
            .find(collection, query, None)
            .await?
            .into_iter()
            .map(from_record)
            .collect()
    }

    async fn create_one<T, N>(&self, collection: &str, data: &N) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Send,
        N: Serialize + Sync,
    {
        let record = to_record(data)?;
        from_record(self.store.create(collection, record, None).await?)
    }

    /// Creates `items` one at a time, in order. The first failure aborts
    /// the remaining creates; records already created stay in place.
    async fn create_sequentially<T, N>(
        &self,
        collection: &str,
        items: &[N],
    ) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
        N: Serialize + Sync,
    {
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            created.push(self.create_one(collection, item).await?);
        }
        Ok(created)
    }

    /// Runs `op` inside a transaction.
    ///
    /// Fails immediately with `bad_request:database` when the store cannot
    /// open a transaction. Commits when `op` succeeds; rolls back and
    /// surfaces `failure` when `op` or the commit fails.
    pub async fn run_in_transaction<T, F, Fut>(
        &self,
        failure: &'static str,
        op: F,
    ) -> Result<T, DbError>
    where
        F: FnOnce(Arc<dyn DocumentStore>, TransactionId) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let tx = match self.store.begin_transaction().await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                warn!(operation = failure, "store did not open a transaction");
                return Err(DbError::bad_request("Failed to begin transaction"));
            }
            Err(err) => {
                error!(operation = failure, error = %err, "begin transaction failed");
                return Err(DbError::bad_request("Failed to begin transaction"));
            }
        };
        debug!(tx = %tx, operation = failure, "transaction opened");

        match op(self.store.clone(), tx.clone()).await {
            Ok(value) => match self.store.commit_transaction(&tx).await {
                Ok(()) => {
                    debug!(tx = %tx, "transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    error!(tx = %tx, error = %err, "{}", failure);
                    self.rollback(&tx).await;
                    Err(DbError::bad_request(failure))
                }
            },
            Err(err) => {
                error!(tx = %tx, error = %err, "{}", failure);
                self.rollback(&tx).await;
                Err(DbError::bad_request(failure))
            }
        }
    }

    async fn rollback(&self, tx: &TransactionId) {
        match self.store.rollback_transaction(tx).await {
            Ok(()) => debug!(tx = %tx, "transaction rolled back"),
            Err(err) => error!(tx = %tx, error = %err, "rollback failed"),
        }
    }
}

/// Error mapper for the default kind. Logs the cause and discards it.
pub(crate) fn bad_request(message: &'static str) -> impl FnOnce(anyhow::Error) -> DbError {
    move |err| {
        error!(error = %err, "{}", message);
        DbError::bad_request(message)
    }
}
