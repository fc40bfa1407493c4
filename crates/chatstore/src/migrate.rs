//! Database schema migrations.
//!
//! Every collection shares one `records` table keyed by
//! `(collection, id)`; the record body is stored as JSON text. Values of
//! unique fields are claimed in `unique_keys`. All statements are
//! idempotent, so `chatctl init` can run repeatedly.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

const RELATION_FIELDS: [&str; 3] = ["userId", "chatId", "documentId"];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    info!(path = %config.db.path.display(), "migrations applied");
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unique_keys (
            collection TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            id TEXT NOT NULL,
            PRIMARY KEY (collection, field, value)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_unique_keys_record ON unique_keys(collection, id)",
    )
    .execute(pool)
    .await?;

    // Databases created before unique_keys existed.
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO unique_keys (collection, field, value, id)
        SELECT collection, 'email', json_quote(json_extract(data, '$.email')), id
        FROM records
        WHERE collection = 'users' AND json_type(data, '$.email') = 'text'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_records_collection_created_at \
         ON records(collection, created_at)",
    )
    .execute(pool)
    .await?;

    // Foreign-key style lookups: chats by user, messages and votes by chat,
    // suggestions by document.
    for field in RELATION_FIELDS {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_records_{field} \
             ON records(collection, json_extract(data, '$.{field}'))"
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}
