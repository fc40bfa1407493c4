use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{collections, timestamp, Document, NewDocument, CREATED_AT};
use crate::store::{DeleteTarget, FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Saves a new version of a document. Versions share `document_id` and
    /// are told apart by `created_at`.
    pub async fn save_document(&self, document: &NewDocument) -> Result<Document, DbError> {
        self.create_one(collections::DOCUMENTS, document)
            .await
            .map_err(bad_request("Failed to save document"))
    }

    /// All versions of a document, oldest first.
    pub async fn get_documents_by_id(&self, id: &str) -> Result<Vec<Document>, DbError> {
        let query = FindQuery::new(Where::new().eq("documentId", id)).sort(Sort::asc(CREATED_AT));
        self.find_all(collections::DOCUMENTS, &query)
            .await
            .map_err(bad_request("Failed to get documents by id"))
    }

    /// The latest version of a document.
    pub async fn get_document_by_id(&self, id: &str) -> Result<Option<Document>, DbError> {
        let query = FindQuery::new(Where::new().eq("documentId", id))
            .sort(Sort::desc(CREATED_AT))
            .limit(1);
        let mut latest: Vec<Document> = self
            .find_all(collections::DOCUMENTS, &query)
            .await
            .map_err(bad_request("Failed to get document by id"))?;
        Ok(latest.pop())
    }

    pub async fn get_documents_by_chat_id(&self, chat_id: &str) -> Result<Vec<Document>, DbError> {
        let query =
            FindQuery::new(Where::new().eq("chatId", chat_id)).sort(Sort::desc(CREATED_AT));
        self.find_all(collections::DOCUMENTS, &query)
            .await
            .map_err(bad_request("Failed to get documents by chat id"))
    }

    /// Discards every version of a document created strictly after `after`,
    /// together with the suggestions made against those versions. Returns
    /// the number of versions removed.
    pub async fn delete_documents_by_id_after_timestamp(
        &self,
        id: &str,
        after: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let cutoff = timestamp::format(&after);
        let suggestions = Where::new()
            .eq("documentId", id)
            .gt("documentCreatedAt", cutoff.clone());
        let documents = Where::new().eq("documentId", id).gt(CREATED_AT, cutoff);

        self.run_in_transaction(
            "Failed to delete documents by id after timestamp",
            |store, tx| async move {
                store
                    .delete(
                        collections::SUGGESTIONS,
                        &DeleteTarget::Where(suggestions),
                        Some(&tx),
                    )
                    .await?;
                store
                    .delete(collections::DOCUMENTS, &DeleteTarget::Where(documents), Some(&tx))
                    .await
            },
        )
        .await
    }
}
