use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// A state or stats document could not be read or written.
///
/// Absence of a document is never an error; callers get an empty value.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file exists but could not be read, or could not be written.
    #[error("Storage unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but does not hold a valid document.
    #[error("Corrupt document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Unavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StorageError::Corrupt {
            path: path.into(),
            source,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// In-memory dedup state for every known feed, keyed by feed URL.
pub type StateMap = BTreeMap<String, FeedState>;

/// State document as read from disk, before legacy records are converted.
pub type PersistedStateMap = BTreeMap<String, PersistedFeedState>;

/// Watermark and seen-set for a single feed.
///
/// `first_seen` is fixed when the feed is registered (or migrated) and never
/// changes afterwards. `seen_ids` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedState {
    pub first_seen: DateTime<Utc>,
    pub seen_ids: SeenIds,
}

impl FeedState {
    /// Fresh state with an empty seen-set and the watermark at `first_seen`.
    pub fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            first_seen,
            seen_ids: SeenIds::default(),
        }
    }
}

/// One record of the state document.
///
/// The current shape is an object with a watermark; the legacy shape is the
/// bare id list written before watermarks existed. `untagged` tries them in
/// declaration order, so a record is only `Legacy` when it is a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedFeedState {
    Current(FeedState),
    Legacy(Vec<String>),
}

/// Append-only set of entry ids, kept in the order they were first seen.
///
/// Serialized as a plain JSON array so the on-disk shape matches the legacy
/// list and stays readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SeenIds {
    order: Vec<String>,
    index: HashSet<String>,
}

impl SeenIds {
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.index.contains(id) {
            return false;
        }
        self.index.insert(id.to_string());
        self.order.push(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Duplicates in a persisted list (possible in hand-edited files) collapse to
/// their first occurrence.
impl From<Vec<String>> for SeenIds {
    fn from(ids: Vec<String>) -> Self {
        let mut seen = SeenIds::default();
        for id in &ids {
            seen.insert(id);
        }
        seen
    }
}

impl From<SeenIds> for Vec<String> {
    fn from(seen: SeenIds) -> Self {
        seen.order
    }
}
