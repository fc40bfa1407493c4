//! Chat history and usage reports.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;

/// Prints one page of a user's chats, newest first.
pub async fn run_history(
    config: &Config,
    user_id: &str,
    limit: usize,
    starting_after: Option<String>,
    ending_before: Option<String>,
) -> Result<()> {
    if starting_after.is_some() && ending_before.is_some() {
        bail!("--starting-after and --ending-before cannot be combined");
    }

    let queries = db::open_queries(config).await?;
    let page = queries
        .get_chats_by_user_id(
            user_id,
            limit,
            starting_after.as_deref(),
            ending_before.as_deref(),
        )
        .await?;

    if page.items.is_empty() {
        println!("No chats.");
        return Ok(());
    }

    println!("{:<38} {:<28} {:<8} TITLE", "ID", "CREATED", "VIS");
    for chat in &page.items {
        println!(
            "{:<38} {:<28} {:<8} {}",
            chat.id,
            chat.created_at.to_rfc3339(),
            chat.visibility.as_str(),
            chat.title
        );
    }

    if page.has_more {
        let (_, last) = page.cursor_ids(|c| c.id.clone());
        if let Some(last) = last {
            println!();
            println!("Older chats available: --ending-before {}", last);
        }
    }

    Ok(())
}

/// Prints how many messages a user sent in the last `hours` hours.
pub async fn run_usage(config: &Config, user_id: &str, hours: i64) -> Result<()> {
    let queries = db::open_queries(config).await?;
    let count = queries.get_message_count_by_user_id(user_id, hours).await?;
    println!("{} messages in the last {}h", count, hours);
    Ok(())
}
