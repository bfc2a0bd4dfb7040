//! Last-writer-wins merge over record collections.
//!
//! This is the one pure function at the heart of the sync engine: it
//! reconciles the local and remote copies of a collection into a single
//! canonical collection, keyed by record id. Conflicts between two versions
//! of the same record are resolved by the larger effective timestamp, ties
//! keeping the local side. There are no tombstones: a record deleted
//! locally but still present remotely reappears after merge.

use indexmap::IndexMap;

use crate::record::SyncRecord;

/// Merge `local` and `remote` into one canonical collection.
///
/// 1. Seed a map from every local record's id to itself (local order).
/// 2. For each remote record: insert if its id is absent; otherwise keep
///    whichever side has the strictly larger effective timestamp, ties
///    keeping the local version.
/// 3. Return the map's values sorted descending by effective timestamp.
///    The sort is stable, so records with equal timestamps keep local
///    insertion order with remote-only records after them.
///
/// For records with no timestamps at all this degenerates to an
/// order-preserving set union.
pub fn merge<T: SyncRecord + Clone>(local: &[T], remote: &[T]) -> Vec<T> {
    let mut by_id: IndexMap<&str, &T> = IndexMap::new();

    for record in local {
        by_id.insert(record.record_id(), record);
    }

    for record in remote {
        match by_id.get_mut(record.record_id()) {
            None => {
                by_id.insert(record.record_id(), record);
            }
            Some(existing) => {
                if record.effective_timestamp() > existing.effective_timestamp() {
                    *existing = record;
                }
            }
        }
    }

    let mut merged: Vec<T> = by_id.into_values().cloned().collect();
    merged.sort_by(|a, b| b.effective_timestamp().cmp(&a.effective_timestamp()));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        value: String,
        updated_at: Option<i64>,
        created_at: Option<i64>,
    }

    impl Item {
        fn new(id: &str, value: &str, updated_at: Option<i64>, created_at: Option<i64>) -> Self {
            Self {
                id: id.into(),
                value: value.into(),
                updated_at,
                created_at,
            }
        }
    }

    impl SyncRecord for Item {
        fn record_id(&self) -> &str {
            &self.id
        }
        fn updated_at(&self) -> Option<i64> {
            self.updated_at
        }
        fn created_at(&self) -> Option<i64> {
            self.created_at
        }
    }

    fn ids(items: &[Item]) -> HashSet<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    #[test]
    fn newer_remote_wins() {
        let local = vec![Item::new("x", "old", Some(10), None)];
        let remote = vec![Item::new("x", "new", Some(20), None)];

        let merged = merge(&local, &remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "new");
        assert_eq!(merged[0].updated_at, Some(20));
    }

    #[test]
    fn newer_local_wins() {
        let local = vec![Item::new("x", "mine", Some(30), None)];
        let remote = vec![Item::new("x", "theirs", Some(20), None)];

        let merged = merge(&local, &remote);
        assert_eq!(merged[0].value, "mine");
    }

    #[test]
    fn tie_keeps_local() {
        let local = vec![Item::new("x", "mine", Some(10), None)];
        let remote = vec![Item::new("x", "theirs", Some(10), None)];

        let merged = merge(&local, &remote);
        assert_eq!(merged[0].value, "mine");
    }

    #[test]
    fn remote_only_records_are_inserted() {
        let local = vec![Item::new("a", "a", Some(1), None)];
        let remote = vec![Item::new("b", "b", Some(2), None)];

        let merged = merge(&local, &remote);
        assert_eq!(ids(&merged), ids(&[local[0].clone(), remote[0].clone()]));
    }

    #[test]
    fn commutative_on_id_sets() {
        let a = vec![
            Item::new("1", "a1", Some(5), None),
            Item::new("2", "a2", None, Some(3)),
        ];
        let b = vec![
            Item::new("2", "b2", Some(7), None),
            Item::new("3", "b3", None, None),
        ];

        assert_eq!(ids(&merge(&a, &b)), ids(&merge(&b, &a)));
    }

    #[test]
    fn idempotent() {
        let a = vec![
            Item::new("1", "a1", Some(5), None),
            Item::new("2", "a2", None, Some(3)),
        ];
        let merged = merge(&a, &a);
        assert_eq!(ids(&merged), ids(&a));
        assert_eq!(merged.len(), a.len());
    }

    #[test]
    fn empty_remote_returns_local() {
        let local = vec![Item::new("1", "a", Some(2), None)];
        let merged = merge(&local, &[]);
        assert_eq!(merged, local);
    }

    #[test]
    fn empty_local_returns_remote() {
        let remote = vec![Item::new("1", "a", Some(2), None)];
        let merged = merge(&[], &remote);
        assert_eq!(merged, remote);
    }

    #[test]
    fn created_at_is_the_fallback_timestamp() {
        let local = vec![Item::new("x", "old", None, Some(10))];
        let remote = vec![Item::new("x", "new", None, Some(20))];

        let merged = merge(&local, &remote);
        assert_eq!(merged[0].value, "new");
    }

    #[test]
    fn output_sorted_descending_by_timestamp() {
        let local = vec![
            Item::new("a", "a", Some(1), None),
            Item::new("b", "b", Some(9), None),
        ];
        let remote = vec![Item::new("c", "c", Some(5), None)];

        let merged = merge(&local, &remote);
        let stamps: Vec<i64> = merged.iter().map(|i| i.effective_timestamp()).collect();
        assert_eq!(stamps, vec![9, 5, 1]);
    }

    #[test]
    fn untimestamped_ids_union() {
        let local = vec!["a".to_string()];
        let remote = vec!["b".to_string()];

        let merged = merge(&local, &remote);
        let set: HashSet<_> = merged.iter().cloned().collect();
        assert_eq!(
            set,
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn untimestamped_union_deduplicates() {
        let local = vec!["a".to_string(), "b".to_string()];
        let remote = vec!["b".to_string(), "c".to_string()];

        let merged = merge(&local, &remote);
        assert_eq!(merged, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
