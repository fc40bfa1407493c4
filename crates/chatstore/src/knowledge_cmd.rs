//! Knowledge document commands for the RAG collections.

use anyhow::{bail, Result};

use chatstore_core::models::{KnowledgeDocStatus, KnowledgeDocType, NewKnowledgeDoc};

use crate::config::Config;
use crate::db;

/// Registers a knowledge document.
///
/// A raw document needs both `title` and `content`; a webpage needs `url`.
pub async fn run_knowledge_add(
    config: &Config,
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let doc_type = match (&url, &content) {
        (Some(_), None) => KnowledgeDocType::Webpage,
        (None, Some(_)) => KnowledgeDocType::Raw,
        (Some(_), Some(_)) => bail!("--url and --content cannot be combined"),
        (None, None) => bail!("one of --url or --content is required"),
    };

    let queries = db::open_queries(config).await?;
    let doc = queries
        .create_knowledge_doc(&NewKnowledgeDoc {
            doc_type: Some(doc_type),
            url,
            title,
            content,
            ..Default::default()
        })
        .await?;

    println!("Created knowledge doc {} ({})", doc.id, doc.status.as_str());
    Ok(())
}

pub async fn run_knowledge_list(config: &Config, status: &str) -> Result<()> {
    let status: KnowledgeDocStatus = status.parse()?;
    let queries = db::open_queries(config).await?;
    let docs = queries.get_knowledge_docs_by_status(status).await?;

    if docs.is_empty() {
        println!("No {} knowledge docs.", status.as_str());
        return Ok(());
    }

    for doc in &docs {
        let label = doc
            .title
            .as_deref()
            .or(doc.url.as_deref())
            .unwrap_or("(untitled)");
        println!("{}  {}", doc.id, label);
    }
    println!();
    println!("{} {} knowledge docs", docs.len(), status.as_str());
    Ok(())
}

pub async fn run_knowledge_set_status(config: &Config, id: &str, status: &str) -> Result<()> {
    let status: KnowledgeDocStatus = status.parse()?;
    let queries = db::open_queries(config).await?;
    let doc = queries.update_knowledge_doc_status(id, status).await?;
    println!("Knowledge doc {} is now {}", doc.id, doc.status.as_str());
    Ok(())
}
