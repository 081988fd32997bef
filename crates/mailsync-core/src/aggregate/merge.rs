//! Cross-provider merge.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::model::{CachedMessage, ProviderType};
use crate::pagination::{CursorPaginator, PageQuery};

/// How duplicate entries in a merged set are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Entries are identified by `(provider, message_id)`. The same local id
    /// from two providers yields two entries; a repeated pair keeps the copy
    /// with the newest `cached_at`, then the newest `internal_date`.
    #[default]
    ProviderScoped,
}

impl DedupPolicy {
    /// Collapses duplicates. Output order is unspecified.
    #[must_use]
    pub fn apply(self, items: Vec<CachedMessage>) -> Vec<CachedMessage> {
        match self {
            Self::ProviderScoped => {
                let mut unique: HashMap<(ProviderType, String), CachedMessage> =
                    HashMap::with_capacity(items.len());
                for item in items {
                    match unique.entry((item.provider, item.message_id.clone())) {
                        Entry::Vacant(slot) => {
                            slot.insert(item);
                        }
                        Entry::Occupied(mut slot) => {
                            let current = slot.get();
                            if (item.cached_at, item.internal_date)
                                > (current.cached_at, current.internal_date)
                            {
                                slot.insert(item);
                            }
                        }
                    }
                }
                unique.into_values().collect()
            }
        }
    }
}

/// Concatenates per-provider pages, collapses duplicates, then applies the
/// query's cursor and limit over the merged sequence.
#[must_use]
pub fn merge_pages(
    pages: Vec<Vec<CachedMessage>>,
    policy: DedupPolicy,
    paginator: &CursorPaginator,
    query: &PageQuery,
) -> Vec<CachedMessage> {
    let merged = policy.apply(pages.into_iter().flatten().collect());
    paginator.paginate(merged, query)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{CursorPosition, UserId};
    use proptest::prelude::*;

    fn message(provider: ProviderType, id: &str, internal_date: i64) -> CachedMessage {
        CachedMessage::new(UserId::from("u1"), provider, id, internal_date)
    }

    fn query(limit: usize) -> PageQuery {
        PageQuery {
            user_id: UserId::from("u1"),
            provider: None,
            limit,
            after: None,
        }
    }

    #[test]
    fn test_merge_is_strictly_descending() {
        let a = vec![
            message(ProviderType::Gmail, "a1", 200),
            message(ProviderType::Gmail, "a2", 100),
        ];
        let b = vec![
            message(ProviderType::Outlook, "b1", 300),
            message(ProviderType::Outlook, "b2", 150),
        ];

        let merged = merge_pages(vec![a, b], DedupPolicy::ProviderScoped, &CursorPaginator::default(), &query(50));
        let dates: Vec<i64> = merged.iter().map(|m| m.internal_date).collect();
        assert_eq!(dates, vec![300, 200, 150, 100]);
    }

    #[test]
    fn test_same_local_id_from_two_providers_is_kept_twice() {
        let a = vec![message(ProviderType::Gmail, "a", 200)];
        let b = vec![message(ProviderType::Outlook, "a", 300)];

        let merged = merge_pages(vec![a, b], DedupPolicy::ProviderScoped, &CursorPaginator::default(), &query(50));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].provider, ProviderType::Outlook);
        assert_eq!(merged[1].provider, ProviderType::Gmail);
    }

    #[test]
    fn test_repeated_pair_keeps_newest_copy() {
        let old = message(ProviderType::Gmail, "a", 200);
        let mut newer = old.clone();
        newer.cached_at = old.cached_at + chrono::Duration::seconds(5);
        newer.subject = "fresh".into();

        let merged = DedupPolicy::ProviderScoped.apply(vec![newer, old.clone(), old]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].subject, "fresh");
    }

    #[test]
    fn test_merge_applies_cursor_after_merging() {
        let a = vec![
            message(ProviderType::Gmail, "a1", 200),
            message(ProviderType::Gmail, "a2", 100),
        ];
        let b = vec![message(ProviderType::Outlook, "b1", 150)];
        let mut q = query(1);
        q.after = Some(CursorPosition {
            internal_date: 200,
            message_id: "a1".into(),
            provider: Some(ProviderType::Gmail),
        });

        let merged = merge_pages(vec![a, b], DedupPolicy::ProviderScoped, &CursorPaginator::default(), &q);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].message_id, "b1");
    }

    proptest! {
        #[test]
        fn prop_merge_output_is_sorted_and_unique(
            dates in proptest::collection::vec((0i64..50, 0usize..3, 0u8..20), 0..60)
        ) {
            let pages: Vec<Vec<CachedMessage>> = ProviderType::ALL
                .iter()
                .enumerate()
                .map(|(i, &provider)| {
                    dates
                        .iter()
                        .filter(|(_, p, _)| *p == i)
                        .map(|(d, _, id)| message(provider, &format!("m{id}"), *d))
                        .collect()
                })
                .collect();

            let merged = merge_pages(pages, DedupPolicy::ProviderScoped, &CursorPaginator::new(50, 500), &query(500));
            for pair in merged.windows(2) {
                prop_assert!(pair[0].order_key() > pair[1].order_key());
            }
        }
    }
}
