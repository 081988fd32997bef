//! Deterministic cursor pagination over cached messages.
//!
//! Every page is ordered by the composite key `(internal_date, message_id)`
//! descending, with the provider tag as a final tie-break. Because the key of
//! a stored message never changes, chaining cursors visits each item exactly
//! once even while new messages are being inserted.

use crate::EngineConfig;
use crate::model::{CachedMessage, CursorPosition, PaginationCursor, ProviderType, UserId};

/// A normalized page request as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Owning user.
    pub user_id: UserId,
    /// Restrict to one provider, or `None` for all of the user's messages.
    pub provider: Option<ProviderType>,
    /// Maximum number of items, always at least 1.
    pub limit: usize,
    /// Continue strictly after this position.
    pub after: Option<CursorPosition>,
}

/// Turns client cursors into store queries and orders in-memory result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPaginator {
    default_limit: usize,
    max_limit: usize,
}

impl Default for CursorPaginator {
    fn default() -> Self {
        Self::new(50, 500)
    }
}

impl CursorPaginator {
    /// Creates a paginator with explicit limits.
    #[must_use]
    pub const fn new(default_limit: usize, max_limit: usize) -> Self {
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Creates a paginator from engine configuration.
    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_page_limit, config.max_page_limit)
    }

    /// Replaces `limit <= 0` with the default and clamps to the maximum.
    #[must_use]
    pub fn normalize_limit(&self, limit: i64) -> usize {
        usize::try_from(limit)
            .ok()
            .filter(|&l| l > 0)
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }

    /// Builds the store query for a cursor.
    ///
    /// A cursor carrying only one of its two position fields resets to the
    /// first page.
    #[must_use]
    pub fn query(
        &self,
        user_id: &UserId,
        provider: Option<ProviderType>,
        cursor: &PaginationCursor,
    ) -> PageQuery {
        PageQuery {
            user_id: user_id.clone(),
            provider,
            limit: self.normalize_limit(cursor.limit),
            after: cursor.position(),
        }
    }

    /// Applies a query to an arbitrary set of messages: sort descending,
    /// drop everything not strictly after the cursor, truncate.
    #[must_use]
    pub fn paginate(&self, mut items: Vec<CachedMessage>, query: &PageQuery) -> Vec<CachedMessage> {
        if let Some(after) = &query.after {
            items.retain(|m| after.admits(&m.order_key()));
        }
        sort_descending(&mut items);
        items.truncate(query.limit);
        items
    }

    /// Cursor for the page after `page`, if `page` was full.
    #[must_use]
    pub fn next_cursor(&self, page: &[CachedMessage], query: &PageQuery) -> Option<PaginationCursor> {
        if page.len() < query.limit {
            return None;
        }
        page.last().map(|last| {
            #[allow(clippy::cast_possible_wrap)]
            let limit = query.limit as i64;
            PaginationCursor::after(&last.order_key(), limit)
        })
    }
}

/// Sorts messages by descending order key.
pub fn sort_descending(items: &mut [CachedMessage]) {
    items.sort_by(|a, b| {
        b.internal_date
            .cmp(&a.internal_date)
            .then_with(|| b.message_id.cmp(&a.message_id))
            .then_with(|| b.provider.cmp(&a.provider))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn message(provider: ProviderType, id: &str, internal_date: i64) -> CachedMessage {
        CachedMessage::new(UserId::from("u1"), provider, id, internal_date)
    }

    fn ids(items: &[CachedMessage]) -> Vec<&str> {
        items.iter().map(|m| m.message_id.as_str()).collect()
    }

    #[test]
    fn test_normalize_limit() {
        let paginator = CursorPaginator::new(50, 500);
        assert_eq!(paginator.normalize_limit(0), 50);
        assert_eq!(paginator.normalize_limit(-3), 50);
        assert_eq!(paginator.normalize_limit(20), 20);
        assert_eq!(paginator.normalize_limit(10_000), 500);
    }

    #[test]
    fn test_sort_tie_breaks_by_message_id_descending() {
        let mut items = vec![
            message(ProviderType::Gmail, "a", 100),
            message(ProviderType::Gmail, "c", 100),
            message(ProviderType::Gmail, "b", 100),
            message(ProviderType::Gmail, "z", 50),
            message(ProviderType::Gmail, "y", 150),
        ];
        sort_descending(&mut items);
        assert_eq!(ids(&items), vec!["y", "c", "b", "a", "z"]);
    }

    #[test]
    fn test_paginate_respects_cursor_and_limit() {
        let paginator = CursorPaginator::default();
        let items: Vec<_> = (1..=5)
            .map(|i| message(ProviderType::Gmail, &format!("m{i}"), i * 10))
            .collect();

        let first = paginator.query(&UserId::from("u1"), None, &PaginationCursor::first(2));
        let page = paginator.paginate(items.clone(), &first);
        assert_eq!(ids(&page), vec!["m5", "m4"]);

        let next = paginator.next_cursor(&page, &first).unwrap();
        let second = paginator.query(&UserId::from("u1"), None, &next);
        let page = paginator.paginate(items, &second);
        assert_eq!(ids(&page), vec!["m3", "m2"]);
    }

    #[test]
    fn test_cursor_past_oldest_is_empty() {
        let paginator = CursorPaginator::default();
        let items = vec![message(ProviderType::Gmail, "m1", 10)];
        let cursor = PaginationCursor {
            after_message_id: "m0".into(),
            after_internal_date: Some(1),
            after_provider: None,
            limit: 10,
        };
        let query = paginator.query(&UserId::from("u1"), None, &cursor);
        assert!(paginator.paginate(items, &query).is_empty());
    }

    #[test]
    fn test_partial_cursor_resets_to_first_page() {
        let paginator = CursorPaginator::default();
        let items = vec![
            message(ProviderType::Gmail, "new", 300),
            message(ProviderType::Gmail, "old", 100),
        ];
        let partial = PaginationCursor {
            after_internal_date: Some(200),
            limit: 10,
            ..PaginationCursor::default()
        };
        let query = paginator.query(&UserId::from("u1"), None, &partial);
        assert!(query.after.is_none());
        assert_eq!(ids(&paginator.paginate(items, &query)), vec!["new", "old"]);
    }

    #[test]
    fn test_short_page_has_no_next_cursor() {
        let paginator = CursorPaginator::default();
        let query = paginator.query(&UserId::from("u1"), None, &PaginationCursor::first(3));
        let page = vec![message(ProviderType::Gmail, "m1", 1)];
        assert!(paginator.next_cursor(&page, &query).is_none());
    }

    proptest! {
        #[test]
        fn chained_pages_visit_every_item_once(
            dates in proptest::collection::vec(0i64..20, 0..60),
            limit in 1i64..7,
        ) {
            let paginator = CursorPaginator::default();
            let user = UserId::from("u1");
            let providers = [ProviderType::Gmail, ProviderType::Outlook];
            let items: Vec<_> = dates
                .iter()
                .enumerate()
                .map(|(i, &d)| message(providers[i % 2], &format!("m{}", i / 2), d))
                .collect();

            let mut seen = Vec::new();
            let mut cursor = PaginationCursor::first(limit);
            loop {
                let query = paginator.query(&user, None, &cursor);
                let page = paginator.paginate(items.clone(), &query);
                seen.extend(page.iter().map(CachedMessage::order_key));
                match paginator.next_cursor(&page, &query) {
                    Some(next) => cursor = next,
                    None => break,
                }
            }

            let mut expected: Vec<_> = items.iter().map(CachedMessage::order_key).collect();
            expected.sort_by(|a, b| b.cmp(a));
            prop_assert_eq!(seen, expected);
        }
    }
}
