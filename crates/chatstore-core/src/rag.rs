//! Retrieval-augmented generation plugin descriptor.
//!
//! The RAG plugin contributes the knowledge-document collections to a
//! [`CollectionRegistry`] and carries the settings an external ingestion
//! and retrieval pipeline needs. The pipeline itself is not part of this
//! crate: [`KnowledgeIngestor`] and [`KnowledgeRetriever`] are the seams a
//! backend implements.
//!
//! ```text
//! CollectionRegistry::builtin()
//!         │
//!         ▼
//! rag_plugin(config).apply(registry)   ← adds knowledge-docs,
//!         │                               knowledge-docs-upload
//!         ▼
//!   InMemoryStore / SqliteStore
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{KnowledgeDoc, KnowledgeDocStatus};
use crate::schema::{knowledge_docs, knowledge_docs_upload, CollectionRegistry};

/// Settings for the RAG pipeline. Every section and field is optional in
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagPluginConfig {
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub query_rewrite: QueryRewriteSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Minimum similarity score in `[0, 1]` for a result to be kept.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            model: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRewriteSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_max_results() -> usize {
    5
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl RagPluginConfig {
    pub fn validate(&self) -> Result<()> {
        let retrieval = &self.retrieval;
        if !(0.0..=1.0).contains(&retrieval.threshold) {
            bail!(
                "rag.retrieval.threshold must be between 0 and 1, got {}",
                retrieval.threshold
            );
        }
        if retrieval.max_results == 0 {
            bail!("rag.retrieval.max_results must be at least 1");
        }

        let embedding = &self.embedding;
        if embedding.chunk_size == 0 {
            bail!("rag.embedding.chunk_size must be greater than zero");
        }
        if embedding.chunk_overlap >= embedding.chunk_size {
            bail!(
                "rag.embedding.chunk_overlap ({}) must be smaller than chunk_size ({})",
                embedding.chunk_overlap,
                embedding.chunk_size
            );
        }

        if self.query_rewrite.enabled && self.query_rewrite.model.is_none() {
            bail!("rag.query_rewrite.model is required when query rewriting is enabled");
        }
        Ok(())
    }
}

impl RetrievalSettings {
    /// Drops results under the threshold and keeps the best `max_results`,
    /// highest score first.
    pub(crate) fn select(&self, mut results: Vec<RankedResult>) -> Vec<RankedResult> {
        results.retain(|r| r.score >= self.threshold);
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(self.max_results);
        results
    }
}

/// Something that contributes collections to a registry.
pub trait Plugin {
    fn apply(&self, registry: CollectionRegistry) -> CollectionRegistry;
}

pub struct RagPlugin {
    config: RagPluginConfig,
}

impl Plugin for RagPlugin {
    fn apply(&self, mut registry: CollectionRegistry) -> CollectionRegistry {
        debug!(
            threshold = self.config.retrieval.threshold,
            max_results = self.config.retrieval.max_results,
            chunk_size = self.config.embedding.chunk_size,
            "rag plugin enabled"
        );
        registry.register(knowledge_docs());
        registry.register(knowledge_docs_upload());
        registry
    }
}

pub fn rag_plugin(config: RagPluginConfig) -> RagPlugin {
    RagPlugin { config }
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub knowledge_doc_id: String,
    pub score: f64,
    pub text: String,
}

/// Turns a stored knowledge document into indexed chunks.
///
/// Returns the status the document should move to, normally `indexed`.
#[async_trait]
pub trait KnowledgeIngestor: Send + Sync {
    async fn ingest(&self, doc: &KnowledgeDoc) -> Result<KnowledgeDocStatus>;
}

#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, config: &RagPluginConfig) -> Result<Vec<RankedResult>>;
}
