use crate::error::DbError;
use crate::models::{collections, NewSuggestion, Suggestion, CREATED_AT};
use crate::store::{FindQuery, Sort, Where};

use super::{bad_request, Queries};

impl Queries {
    /// Saves `suggestions` in order. Stops at the first failure; earlier
    /// suggestions stay saved.
    pub async fn save_suggestions(
        &self,
        suggestions: &[NewSuggestion],
    ) -> Result<Vec<Suggestion>, DbError> {
        self.create_sequentially(collections::SUGGESTIONS, suggestions)
            .await
            .map_err(bad_request("Failed to save suggestions"))
    }

    pub async fn get_suggestions_by_document_id(
        &self,
        document_id: &str,
    ) -> Result<Vec<Suggestion>, DbError> {
        let query = FindQuery::new(Where::new().eq("documentId", document_id))
            .sort(Sort::desc(CREATED_AT));
        self.find_all(collections::SUGGESTIONS, &query)
            .await
            .map_err(bad_request("Failed to get suggestions by document id"))
    }
}
