//! Record capability trait for merge.
//!
//! The merge engine does not care what a record is, only that it has a
//! stable identity and an effective timestamp. Domains implement this
//! trait on their record types; identifier-only collections (favorites)
//! implement it on `String` with no timestamps at all, which degenerates
//! the merge to set union.

/// A record that can participate in last-writer-wins merge.
pub trait SyncRecord {
    /// Stable unique identifier, shared across devices.
    fn record_id(&self) -> &str;

    /// When the record was last edited, in epoch milliseconds.
    fn updated_at(&self) -> Option<i64> {
        None
    }

    /// When the record was created, in epoch milliseconds.
    fn created_at(&self) -> Option<i64> {
        None
    }

    /// The timestamp used for conflict resolution: `updated_at`, falling
    /// back to `created_at`, falling back to 0.
    fn effective_timestamp(&self) -> i64 {
        self.updated_at().or_else(|| self.created_at()).unwrap_or(0)
    }
}

/// Bare string identifiers carry no timestamps; merging them is set union.
impl SyncRecord for String {
    fn record_id(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stamped {
        updated: Option<i64>,
        created: Option<i64>,
    }

    impl SyncRecord for Stamped {
        fn record_id(&self) -> &str {
            "x"
        }
        fn updated_at(&self) -> Option<i64> {
            self.updated
        }
        fn created_at(&self) -> Option<i64> {
            self.created
        }
    }

    #[test]
    fn effective_timestamp_prefers_updated_at() {
        let r = Stamped {
            updated: Some(20),
            created: Some(10),
        };
        assert_eq!(r.effective_timestamp(), 20);
    }

    #[test]
    fn effective_timestamp_falls_back_to_created_at() {
        let r = Stamped {
            updated: None,
            created: Some(10),
        };
        assert_eq!(r.effective_timestamp(), 10);
    }

    #[test]
    fn effective_timestamp_defaults_to_zero() {
        let r = Stamped {
            updated: None,
            created: None,
        };
        assert_eq!(r.effective_timestamp(), 0);
        assert_eq!("id".to_string().effective_timestamp(), 0);
    }
}
