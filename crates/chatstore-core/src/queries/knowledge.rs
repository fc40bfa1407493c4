use serde_json::json;
use tracing::{info, warn};

use crate::error::DbError;
use crate::models::{collections, KnowledgeDoc, KnowledgeDocStatus, NewKnowledgeDoc, CREATED_AT};
use crate::rag::{KnowledgeIngestor, KnowledgeRetriever, RagPluginConfig, RankedResult};
use crate::store::{from_record, to_record, FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Creates a knowledge document. The store's schema hooks reject raw
    /// documents without title or content and advance raw `pending`
    /// documents to `fulfilled`.
    pub async fn create_knowledge_doc(
        &self,
        doc: &NewKnowledgeDoc,
    ) -> Result<KnowledgeDoc, DbError> {
        self.create_one(collections::KNOWLEDGE_DOCS, doc)
            .await
            .map_err(bad_request("Failed to create knowledge doc"))
    }

    pub async fn get_knowledge_doc_by_id(&self, id: &str) -> Result<Option<KnowledgeDoc>, DbError> {
        self.find_one_by_id(collections::KNOWLEDGE_DOCS, id)
            .await
            .map_err(bad_request("Failed to get knowledge doc by id"))
    }

    /// Knowledge documents in `status`, newest first.
    pub async fn get_knowledge_docs_by_status(
        &self,
        status: KnowledgeDocStatus,
    ) -> Result<Vec<KnowledgeDoc>, DbError> {
        let query = FindQuery::new(Where::new().eq("status", status.as_str()))
            .sort(Sort::desc(CREATED_AT));
        self.find_all(collections::KNOWLEDGE_DOCS, &query)
            .await
            .map_err(bad_request("Failed to get knowledge docs by status"))
    }

    pub async fn update_knowledge_doc_status(
        &self,
        id: &str,
        status: KnowledgeDocStatus,
    ) -> Result<KnowledgeDoc, DbError> {
        let result: anyhow::Result<KnowledgeDoc> = async {
            let patch = to_record(&json!({ "status": status }))?;
            from_record(
                self.store
                    .update(collections::KNOWLEDGE_DOCS, id, patch, None)
                    .await?,
            )
        }
        .await;
        result.map_err(bad_request("Failed to update knowledge doc status"))
    }

    /// Hands a document to `ingestor` and records the resulting status.
    /// An ingestor failure is recorded as `error` rather than surfaced.
    pub async fn ingest_knowledge_doc(
        &self,
        id: &str,
        ingestor: &dyn KnowledgeIngestor,
    ) -> Result<KnowledgeDoc, DbError> {
        let doc = self
            .get_knowledge_doc_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Knowledge doc with id {} not found", id)))?;

        let status = match ingestor.ingest(&doc).await {
            Ok(status) => {
                info!(doc = id, status = status.as_str(), "knowledge doc ingested");
                status
            }
            Err(err) => {
                warn!(doc = id, error = %err, "knowledge doc ingestion failed");
                KnowledgeDocStatus::Error
            }
        };
        self.update_knowledge_doc_status(id, status).await
    }

    /// Asks `retriever` for passages matching `query` and keeps those the
    /// retrieval settings allow, best first.
    pub async fn retrieve_knowledge(
        &self,
        retriever: &dyn KnowledgeRetriever,
        query: &str,
        config: &RagPluginConfig,
    ) -> Result<Vec<RankedResult>, DbError> {
        let results = retriever
            .retrieve(query, config)
            .await
            .map_err(bad_request("Failed to retrieve knowledge"))?;
        Ok(config.retrieval.select(results))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::faulty;
    use crate::models::{KnowledgeDoc, KnowledgeDocStatus, KnowledgeDocType, NewKnowledgeDoc};
    use crate::rag::{KnowledgeIngestor, KnowledgeRetriever, RagPluginConfig, RankedResult};
    use async_trait::async_trait;

    struct FixedIngestor(Option<KnowledgeDocStatus>);

    #[async_trait]
    impl KnowledgeIngestor for FixedIngestor {
        async fn ingest(&self, _doc: &KnowledgeDoc) -> anyhow::Result<KnowledgeDocStatus> {
            self.0.ok_or_else(|| anyhow::anyhow!("embedding backend offline"))
        }
    }

    struct CannedRetriever(Option<Vec<(&'static str, f64)>>);

    #[async_trait]
    impl KnowledgeRetriever for CannedRetriever {
        async fn retrieve(
            &self,
            _query: &str,
            _config: &RagPluginConfig,
        ) -> anyhow::Result<Vec<RankedResult>> {
            let hits = self
                .0
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("vector index unavailable"))?;
            Ok(hits
                .iter()
                .map(|(id, score)| RankedResult {
                    knowledge_doc_id: id.to_string(),
                    score: *score,
                    text: format!("passage from {}", id),
                })
                .collect())
        }
    }

    fn raw(title: &str, content: &str) -> NewKnowledgeDoc {
        NewKnowledgeDoc {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_raw_pending_is_promoted_to_fulfilled() {
        let (_store, queries) = faulty();
        let doc = queries
            .create_knowledge_doc(&raw("Handbook", "Be kind."))
            .await
            .unwrap();
        assert_eq!(doc.doc_type, KnowledgeDocType::Raw);
        assert_eq!(doc.status, KnowledgeDocStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_raw_without_title_is_rejected() {
        let (_store, queries) = faulty();
        let err = queries
            .create_knowledge_doc(&raw("", "Be kind."))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request:database");
        assert!(queries
            .get_knowledge_docs_by_status(KnowledgeDocStatus::Fulfilled)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_webpage_stays_pending() {
        let (_store, queries) = faulty();
        let doc = queries
            .create_knowledge_doc(&NewKnowledgeDoc {
                doc_type: Some(KnowledgeDocType::Webpage),
                url: Some("https://example.com".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(doc.status, KnowledgeDocStatus::Pending);

        let pending = queries
            .get_knowledge_docs_by_status(KnowledgeDocStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, doc.id);
    }

    #[tokio::test]
    async fn test_ingest_records_status() {
        let (_store, queries) = faulty();
        let doc = queries.create_knowledge_doc(&raw("A", "B")).await.unwrap();

        let ingested = queries
            .ingest_knowledge_doc(&doc.id, &FixedIngestor(Some(KnowledgeDocStatus::Indexed)))
            .await
            .unwrap();
        assert_eq!(ingested.status, KnowledgeDocStatus::Indexed);
    }

    #[tokio::test]
    async fn test_ingest_failure_marks_error() {
        let (_store, queries) = faulty();
        let doc = queries.create_knowledge_doc(&raw("A", "B")).await.unwrap();

        let ingested = queries
            .ingest_knowledge_doc(&doc.id, &FixedIngestor(None))
            .await
            .unwrap();
        assert_eq!(ingested.status, KnowledgeDocStatus::Error);
    }

    #[tokio::test]
    async fn test_ingest_unknown_doc_is_not_found() {
        let (_store, queries) = faulty();
        let err = queries
            .ingest_knowledge_doc("ghost", &FixedIngestor(None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_retrieve_knowledge_applies_settings() {
        let (_store, queries) = faulty();
        let mut config = RagPluginConfig::default();
        config.retrieval.max_results = 2;
        let retriever = CannedRetriever(Some(vec![
            ("faq", 0.55),
            ("noise", 0.1),
            ("handbook", 0.92),
            ("policy", 0.7),
        ]));

        let picked = queries
            .retrieve_knowledge(&retriever, "vacation days", &config)
            .await
            .unwrap();
        let ids: Vec<_> = picked.iter().map(|r| r.knowledge_doc_id.as_str()).collect();
        assert_eq!(ids, vec!["handbook", "policy"]);
    }

    #[tokio::test]
    async fn test_retrieve_knowledge_failure_is_bad_request() {
        let (_store, queries) = faulty();
        let err = queries
            .retrieve_knowledge(&CannedRetriever(None), "anything", &RagPluginConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request:database");
        assert_eq!(err.message(), "Failed to retrieve knowledge");
    }
}
