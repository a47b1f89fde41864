//! One-time conversion of legacy bare-list records to the watermark shape.

use chrono::{DateTime, Utc};

use super::types::{FeedState, PersistedFeedState, PersistedStateMap, StateMap};

/// Outcome of [`migrate`].
#[derive(Debug)]
pub struct Migration {
    /// Every record in the current shape.
    pub states: StateMap,
    /// Feeds whose record was converted, in key order.
    pub migrated: Vec<String>,
}

impl Migration {
    /// True if any record changed shape, meaning the document should be rewritten.
    pub fn changed(&self) -> bool {
        !self.migrated.is_empty()
    }
}

/// Convert every legacy record, leaving current records untouched.
///
/// A legacy list becomes a [`FeedState`] whose watermark is `now`: entries
/// published before the migration are treated as already handled, and the old
/// id list is carried over verbatim as the seen-set. Running this on a document
/// that has no legacy records returns it unchanged with nothing migrated.
pub fn migrate(persisted: PersistedStateMap, now: DateTime<Utc>) -> Migration {
    let mut migrated = Vec::new();

    let states = persisted
        .into_iter()
        .map(|(feed, record)| {
            let state = match record {
                PersistedFeedState::Current(state) => state,
                PersistedFeedState::Legacy(ids) => {
                    tracing::info!(
                        feed = %feed,
                        ids = ids.len(),
                        first_seen = %now.to_rfc3339(),
                        "Migrating legacy state record"
                    );
                    migrated.push(feed.clone());
                    FeedState {
                        first_seen: now,
                        seen_ids: ids.into(),
                    }
                }
            };
            (feed, state)
        })
        .collect();

    Migration { states, migrated }
}
