//! SQLite connection management.
//!
//! The database file and its parent directories are created on first
//! connect. WAL mode lets the HTTP server keep serving reads while a
//! transactional delete holds the write lock.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use chatstore_core::rag::{rag_plugin, Plugin};
use chatstore_core::schema::CollectionRegistry;
use chatstore_core::Queries;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Create a connection pool to the configured SQLite database.
///
/// Returns a pool with up to 5 connections.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// The collections served by the application: the first-party chat
/// collections plus those contributed by the RAG plugin.
pub fn registry(config: &Config) -> CollectionRegistry {
    rag_plugin(config.rag.clone()).apply(CollectionRegistry::builtin())
}

/// Connects and wraps the pool in a query layer.
pub async fn open_queries(config: &Config) -> Result<Queries> {
    let pool = connect(config).await?;
    let store = SqliteStore::new(pool, registry(config));
    Ok(Queries::new(Arc::new(store)))
}
