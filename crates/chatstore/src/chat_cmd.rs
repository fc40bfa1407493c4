//! Chat and message inspection and maintenance commands.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use chatstore_core::models::{timestamp, Message, Visibility};

use crate::config::Config;
use crate::db;

/// Prints a chat with its messages and votes.
pub async fn run_chat_show(config: &Config, id: &str) -> Result<()> {
    let queries = db::open_queries(config).await?;
    let chat = match queries.get_chat_by_id(id).await? {
        Some(chat) => chat,
        None => bail!("chat not found: {}", id),
    };

    println!("{}", chat.title);
    println!("  id:         {}", chat.id);
    println!("  user:       {}", chat.user_id);
    println!("  visibility: {}", chat.visibility.as_str());
    println!("  created:    {}", chat.created_at.to_rfc3339());

    let messages = queries.get_messages_by_chat_id(id).await?;
    let votes = queries.get_votes_by_chat_id(id).await?;
    println!();
    for message in &messages {
        let vote = votes
            .iter()
            .find(|v| v.message_id == message.id)
            .map(|v| if v.is_upvoted { " [+]" } else { " [-]" })
            .unwrap_or("");
        println!(
            "[{}] {}{}: {}",
            message.created_at.to_rfc3339(),
            message.role.as_str(),
            vote,
            message_text(message)
        );
    }

    let streams = queries.get_stream_ids_by_chat_id(id).await?;
    if !streams.is_empty() {
        println!();
        println!("streams: {}", streams.join(", "));
    }
    Ok(())
}

pub async fn run_chat_delete(config: &Config, id: &str) -> Result<()> {
    let queries = db::open_queries(config).await?;
    queries.delete_chat_by_id(id).await?;
    println!("Deleted chat {}", id);
    Ok(())
}

pub async fn run_chat_visibility(config: &Config, id: &str, visibility: &str) -> Result<()> {
    let visibility: Visibility = visibility.parse()?;
    let queries = db::open_queries(config).await?;
    queries.update_chat_visibility_by_id(id, visibility).await?;
    println!("Chat {} is now {}", id, visibility.as_str());
    Ok(())
}

/// Deletes the messages of a chat newer than `after`.
///
/// With `dry_run`, only reports what would be removed.
pub async fn run_messages_prune(
    config: &Config,
    chat_id: &str,
    after: &str,
    dry_run: bool,
) -> Result<()> {
    let after: DateTime<Utc> = timestamp::parse(after)?;
    let queries = db::open_queries(config).await?;

    if dry_run {
        let doomed = queries
            .get_messages_by_chat_id(chat_id)
            .await?
            .into_iter()
            .filter(|m| m.created_at > after)
            .count();
        println!("Would delete {} messages (dry run)", doomed);
        return Ok(());
    }

    let deleted = queries
        .delete_messages_by_chat_id_after_timestamp(chat_id, after)
        .await?;
    println!("Deleted {} messages", deleted);
    Ok(())
}

/// Flattens the text parts of a message for terminal display.
fn message_text(message: &Message) -> String {
    match &message.content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
