use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde_json::Value;

use crate::error::DbError;
use crate::models::{collections, timestamp, Message, NewMessage, Role, CREATED_AT};
use crate::store::{record_id, DeleteTarget, FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Saves `messages` in order. Stops at the first failure; earlier
    /// messages stay saved.
    pub async fn save_messages(&self, messages: &[NewMessage]) -> Result<Vec<Message>, DbError> {
        self.create_sequentially(collections::MESSAGES, messages)
            .await
            .map_err(bad_request("Failed to save messages"))
    }

    pub async fn get_message_by_id(&self, id: &str) -> Result<Option<Message>, DbError> {
        self.find_one_by_id(collections::MESSAGES, id)
            .await
            .map_err(bad_request("Failed to get message by id"))
    }

    /// Messages of a chat, oldest first.
    pub async fn get_messages_by_chat_id(&self, id: &str) -> Result<Vec<Message>, DbError> {
        let query = FindQuery::new(Where::new().eq("chatId", id)).sort(Sort::asc(CREATED_AT));
        self.find_all(collections::MESSAGES, &query)
            .await
            .map_err(bad_request("Failed to get messages by chat id"))
    }

    /// Number of user-role messages sent by `id` within the last
    /// `difference_in_hours` hours.
    pub async fn get_message_count_by_user_id(
        &self,
        id: &str,
        difference_in_hours: i64,
    ) -> Result<u64, DbError> {
        let since = TimeDelta::try_hours(difference_in_hours)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        let mut filter = Where::new().eq("userId", id).eq("role", Role::User.as_str());
        match since {
            Some(since) if (0..=9999).contains(&since.year()) => {
                filter = filter.gt(CREATED_AT, timestamp::format(&since));
            }
            // Windows ending in the far future match nothing.
            _ if difference_in_hours < 0 => return Ok(0),
            // Windows reaching before year 0 cover every message.
            _ => {}
        }
        let count = self
            .store
            .count(collections::MESSAGES, &filter, None)
            .await
            .map_err(bad_request("Failed to get message count by user id"))?;
        Ok(count.unwrap_or(0))
    }

    /// Deletes the messages of a chat created strictly after `after`,
    /// together with their votes. Returns the number of messages removed.
    pub async fn delete_messages_by_chat_id_after_timestamp(
        &self,
        chat_id: &str,
        after: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let filter = Where::new()
            .eq("chatId", chat_id)
            .gt(CREATED_AT, timestamp::format(&after));
        self.run_in_transaction(
            "Failed to delete messages by chat id after timestamp",
            |store, tx| async move {
                let doomed = store
                    .find(collections::MESSAGES, &FindQuery::new(filter), Some(&tx))
                    .await?;
                if doomed.is_empty() {
                    return Ok(0);
                }
                let ids = doomed
                    .iter()
                    .map(|m| record_id(m).map(|id| Value::String(id.to_string())))
                    .collect::<anyhow::Result<Vec<_>>>()?;

                store
                    .delete(
                        collections::VOTES,
                        &DeleteTarget::Where(Where::new().is_in("messageId", ids.clone())),
                        Some(&tx),
                    )
                    .await?;
                store
                    .delete(
                        collections::MESSAGES,
                        &DeleteTarget::Where(Where::new().is_in("id", ids)),
                        Some(&tx),
                    )
                    .await
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{at, count_all, faulty, FailOn};
    use crate::models::{collections, NewMessage, Role, VoteType};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn message(id: &str, chat: &str, role: Role, created_at: chrono::DateTime<Utc>) -> NewMessage {
        NewMessage {
            id: Some(id.to_string()),
            chat_id: chat.to_string(),
            user_id: Some("u1".to_string()),
            role,
            content: json!([{ "type": "text", "text": id }]),
            attachments: None,
            created_at: Some(created_at),
        }
    }

    #[tokio::test]
    async fn test_save_messages_in_order() {
        let (_store, queries) = faulty();
        let saved = queries
            .save_messages(&[
                message("m2", "c1", Role::Assistant, at(1, 2)),
                message("m1", "c1", Role::User, at(1, 1)),
            ])
            .await
            .unwrap();
        assert_eq!(saved[0].id, "m2");
        assert_eq!(saved[1].attachments, json!([]));

        let listed = queries.get_messages_by_chat_id("c1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_save_messages_stops_at_first_failure() {
        let (store, queries) = faulty();
        store.fail_on(FailOn::Create(collections::MESSAGES, 2));

        let err = queries
            .save_messages(&[
                message("m1", "c1", Role::User, at(1, 1)),
                message("m2", "c1", Role::Assistant, at(1, 2)),
                message("m3", "c1", Role::User, at(1, 3)),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Failed to save messages");

        assert!(queries.get_message_by_id("m1").await.unwrap().is_some());
        assert!(queries.get_message_by_id("m3").await.unwrap().is_none());
        let creates = store
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("create"))
            .count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn test_message_count_window_and_role() {
        let (_store, queries) = faulty();
        let now = Utc::now();
        queries
            .save_messages(&[
                message("recent-user", "c1", Role::User, now - Duration::hours(1)),
                message("recent-assistant", "c1", Role::Assistant, now - Duration::hours(1)),
                message("old-user", "c1", Role::User, now - Duration::hours(30)),
            ])
            .await
            .unwrap();

        assert_eq!(queries.get_message_count_by_user_id("u1", 24).await.unwrap(), 1);
        assert_eq!(queries.get_message_count_by_user_id("u1", 48).await.unwrap(), 2);
        assert_eq!(queries.get_message_count_by_user_id("u2", 48).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_message_count_with_out_of_range_windows() {
        let (_store, queries) = faulty();
        queries
            .save_messages(&[
                message("m1", "c1", Role::User, Utc::now() - Duration::hours(1)),
                message("m2", "c1", Role::User, at(1, 1)),
            ])
            .await
            .unwrap();

        for hours in [3_000_000_000, i64::MAX] {
            assert_eq!(queries.get_message_count_by_user_id("u1", hours).await.unwrap(), 2);
        }
        for hours in [-1_000_000_000, i64::MIN] {
            assert_eq!(queries.get_message_count_by_user_id("u1", hours).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_message_count_missing_total_is_zero() {
        let (store, queries) = faulty();
        queries
            .save_messages(&[message("m1", "c1", Role::User, Utc::now())])
            .await
            .unwrap();
        store.fail_on(FailOn::CountMissing);
        assert_eq!(queries.get_message_count_by_user_id("u1", 24).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_after_timestamp_is_strict() {
        let (store, queries) = faulty();
        let saved = queries
            .save_messages(&[
                message("m1", "c1", Role::User, at(1, 1)),
                message("m2", "c1", Role::Assistant, at(1, 2)),
                message("m3", "c1", Role::User, at(1, 3)),
                message("other", "c2", Role::User, at(1, 4)),
            ])
            .await
            .unwrap();
        queries.vote_message("c1", &saved[1].id, VoteType::Up).await.unwrap();
        queries.vote_message("c1", &saved[2].id, VoteType::Down).await.unwrap();
        queries.vote_message("c1", &saved[0].id, VoteType::Up).await.unwrap();

        let deleted = queries
            .delete_messages_by_chat_id_after_timestamp("c1", at(1, 2))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let left: Vec<_> = queries
            .get_messages_by_chat_id("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(left, vec!["m1", "m2"]);
        assert_eq!(count_all(store.as_ref(), collections::VOTES).await, 2);
        assert_eq!(count_all(store.as_ref(), collections::MESSAGES).await, 3);
        assert_eq!(store.inner.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_delete_after_timestamp_with_nothing_to_delete_commits() {
        let (store, queries) = faulty();
        queries
            .save_messages(&[message("m1", "c1", Role::User, at(1, 1))])
            .await
            .unwrap();

        let deleted = queries
            .delete_messages_by_chat_id_after_timestamp("c1", at(2, 0))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.inner.open_transactions(), 0);

        let calls = store.calls.lock().unwrap();
        assert!(calls.contains(&"commit".to_string()));
        assert!(!calls.iter().any(|c| c.starts_with("delete")));
    }

    #[tokio::test]
    async fn test_delete_after_timestamp_rolls_back_votes() {
        let (store, queries) = faulty();
        let saved = queries
            .save_messages(&[message("m1", "c1", Role::User, at(1, 1))])
            .await
            .unwrap();
        queries.vote_message("c1", &saved[0].id, VoteType::Up).await.unwrap();
        store.fail_on(FailOn::Delete(collections::MESSAGES));

        let err = queries
            .delete_messages_by_chat_id_after_timestamp("c1", at(1, 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request:database");
        assert_eq!(count_all(store.as_ref(), collections::VOTES).await, 1);
        assert_eq!(count_all(store.as_ref(), collections::MESSAGES).await, 1);
        assert_eq!(store.inner.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_get_messages_failure_is_bad_request() {
        let (store, queries) = faulty();
        store.fail_on(FailOn::Find(collections::MESSAGES));
        let err = queries.get_messages_by_chat_id("c1").await.unwrap_err();
        assert_eq!(err.message(), "Failed to get messages by chat id");
    }
}
