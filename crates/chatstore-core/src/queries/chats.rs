use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::DbError;
use crate::models::{collections, Chat, NewChat, Visibility, CREATED_AT};
use crate::pagination::{overfetch_limit, Page};
use crate::store::{to_record, DeleteTarget, FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    pub async fn save_chat(&self, chat: &NewChat) -> Result<Chat, DbError> {
        self.create_one(collections::CHATS, chat)
            .await
            .map_err(bad_request("Failed to save chat"))
    }

    pub async fn get_chat_by_id(&self, id: &str) -> Result<Option<Chat>, DbError> {
        self.find_one_by_id(collections::CHATS, id)
            .await
            .map_err(bad_request("Failed to get chat by id"))
    }

    /// Deletes a chat together with its votes and messages, atomically.
    pub async fn delete_chat_by_id(&self, id: &str) -> Result<(), DbError> {
        let id = id.to_string();
        self.run_in_transaction("Failed to delete chat", |store, tx| async move {
            let by_chat = Where::new().eq("chatId", id.as_str());
            store
                .delete(collections::VOTES, &DeleteTarget::Where(by_chat.clone()), Some(&tx))
                .await?;
            store
                .delete(collections::MESSAGES, &DeleteTarget::Where(by_chat), Some(&tx))
                .await?;
            store
                .delete(collections::CHATS, &DeleteTarget::Id(id), Some(&tx))
                .await?;
            Ok(())
        })
        .await
    }

    /// A page of a user's chats, newest first.
    ///
    /// `starting_after` and `ending_before` are chat ids; each is resolved
    /// to its creation time and the page holds chats strictly between the
    /// two bounds. An unknown cursor id fails with `not_found:database`
    /// before the range query runs.
    pub async fn get_chats_by_user_id(
        &self,
        id: &str,
        limit: usize,
        starting_after: Option<&str>,
        ending_before: Option<&str>,
    ) -> Result<Page<Chat>, DbError> {
        let mut filter = Where::new().eq("userId", id);
        if let Some(cursor) = starting_after {
            filter = filter.gt(CREATED_AT, self.chat_cursor_timestamp(cursor).await?);
        }
        if let Some(cursor) = ending_before {
            filter = filter.lt(CREATED_AT, self.chat_cursor_timestamp(cursor).await?);
        }

        let query = FindQuery::new(filter)
            .sort(Sort::desc(CREATED_AT))
            .limit(overfetch_limit(limit));
        let chats: Vec<Chat> = self
            .find_all(collections::CHATS, &query)
            .await
            .map_err(bad_request("Failed to get chats by user id"))?;
        debug!(user = id, fetched = chats.len(), limit, "chat history page");

        Ok(Page::from_overfetch(chats, limit))
    }

    async fn chat_cursor_timestamp(&self, chat_id: &str) -> Result<Value, DbError> {
        let not_found = || DbError::not_found(format!("Chat with id {} not found", chat_id));
        match self.store.find_by_id(collections::CHATS, chat_id, None).await {
            Ok(Some(record)) => record.get(CREATED_AT).cloned().ok_or_else(not_found),
            Ok(None) => Err(not_found()),
            Err(err) => {
                error!(chat = chat_id, error = %err, "cursor lookup failed");
                Err(not_found())
            }
        }
    }

    pub async fn update_chat_visibility_by_id(
        &self,
        chat_id: &str,
        visibility: Visibility,
    ) -> Result<(), DbError> {
        let patch = to_record(&json!({ "visibility": visibility }))
            .map_err(bad_request("Failed to update chat visibility by id"))?;
        self.store
            .update(collections::CHATS, chat_id, patch, None)
            .await
            .map(|_| ())
            .map_err(bad_request("Failed to update chat visibility by id"))
    }
}
