use crate::error::DbError;
use crate::models::{collections, NewVote, Vote, VoteType, CREATED_AT};
use crate::store::{FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Records one vote on a message. Every call creates a new record;
    /// earlier votes on the same message are left in place.
    pub async fn vote_message(
        &self,
        chat_id: &str,
        message_id: &str,
        vote_type: VoteType,
    ) -> Result<Vote, DbError> {
        self.create_one(
            collections::VOTES,
            &NewVote {
                chat_id,
                message_id,
                is_upvoted: vote_type == VoteType::Up,
            },
        )
        .await
        .map_err(bad_request("Failed to vote message"))
    }

    /// Votes cast in a chat, newest first.
    pub async fn get_votes_by_chat_id(&self, id: &str) -> Result<Vec<Vote>, DbError> {
        let query = FindQuery::new(Where::new().eq("chatId", id)).sort(Sort::desc(CREATED_AT));
        self.find_all(collections::VOTES, &query)
            .await
            .map_err(bad_request("Failed to get votes by chat id"))
    }
}
