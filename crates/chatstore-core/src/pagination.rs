//! Cursor pagination helpers.
//!
//! List queries fetch `limit + 1` rows; the extra row only signals that a
//! further page exists and is dropped before returning. This avoids a
//! separate count query.

use serde::Serialize;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Builds a page from a result set fetched with `limit + 1` rows.
    pub fn from_overfetch(items: Vec<T>, limit: usize) -> Self {
        let (items, has_more) = paginate(items, limit);
        Self { items, has_more }
    }

    /// First and last ids of the page, for building the next cursor.
    pub fn cursor_ids<ID, F>(&self, id_extractor: F) -> (Option<ID>, Option<ID>)
    where
        F: Fn(&T) -> ID,
    {
        let first = self.items.first().map(&id_extractor);
        let last = self.items.last().map(&id_extractor);
        (first, last)
    }
}

/// The number of rows a paginated query must fetch for `limit`.
pub fn overfetch_limit(limit: usize) -> usize {
    limit.saturating_add(1)
}

/// Truncates `items` to `limit` and reports whether anything was cut.
pub fn paginate<T>(mut items: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = items.len() > limit;
    if has_more {
        items.truncate(limit);
    }
    (items, has_more)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_under_limit() {
        let (items, has_more) = paginate(vec![1, 2, 3], 5);
        assert_eq!(items, vec![1, 2, 3]);
        assert!(!has_more);
    }

    #[test]
    fn test_paginate_exactly_limit() {
        let (items, has_more) = paginate(vec![1, 2, 3], 3);
        assert_eq!(items.len(), 3);
        assert!(!has_more);
    }

    #[test]
    fn test_paginate_overfetched_row_dropped() {
        let page = Page::from_overfetch(vec![3, 2, 1], 2);
        assert_eq!(page.items, vec![3, 2]);
        assert!(page.has_more);
    }

    #[test]
    fn test_cursor_ids() {
        let page = Page::from_overfetch(vec!["c3", "c2", "c1"], 5);
        assert_eq!(page.cursor_ids(|c| c.to_string()), (Some("c3".into()), Some("c1".into())));
    }

    #[test]
    fn test_cursor_ids_empty() {
        let page: Page<i32> = Page::from_overfetch(vec![], 5);
        assert_eq!(page.cursor_ids(|i| *i), (None, None));
    }

    #[test]
    fn test_overfetch_limit_saturates() {
        assert_eq!(overfetch_limit(2), 3);
        assert_eq!(overfetch_limit(usize::MAX), usize::MAX);
    }
}
