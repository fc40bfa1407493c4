use crate::error::DbError;
use crate::models::{collections, NewStream, Stream, CREATED_AT};
use crate::store::{FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    pub async fn create_stream_id(&self, stream_id: &str, chat_id: &str) -> Result<(), DbError> {
        self.create_one::<Stream, _>(
            collections::STREAMS,
            &NewStream {
                id: stream_id,
                chat: chat_id,
            },
        )
        .await
        .map(|_| ())
        .map_err(bad_request("Failed to create stream id"))
    }

    /// Stream ids of a chat in creation order.
    pub async fn get_stream_ids_by_chat_id(&self, chat_id: &str) -> Result<Vec<String>, DbError> {
        let query = FindQuery::new(Where::new().eq("chat", chat_id)).sort(Sort::asc(CREATED_AT));
        let streams: Vec<Stream> = self
            .find_all(collections::STREAMS, &query)
            .await
            .map_err(bad_request("Failed to get stream ids by chat id"))?;
        Ok(streams.into_iter().map(|s| s.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::faulty;

    #[tokio::test]
    async fn test_stream_ids_in_creation_order() {
        let (_store, queries) = faulty();
        queries.create_stream_id("s1", "c1").await.unwrap();
        queries.create_stream_id("s2", "c1").await.unwrap();
        queries.create_stream_id("s3", "c2").await.unwrap();

        assert_eq!(queries.get_stream_ids_by_chat_id("c1").await.unwrap(), vec!["s1", "s2"]);
        assert!(queries.get_stream_ids_by_chat_id("c9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_stream_id_is_bad_request() {
        let (_store, queries) = faulty();
        queries.create_stream_id("s1", "c1").await.unwrap();
        let err = queries.create_stream_id("s1", "c1").await.unwrap_err();
        assert_eq!(err.message(), "Failed to create stream id");
    }
}
