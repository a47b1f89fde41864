use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::migrate::{migrate, Migration};
use super::types::{PersistedFeedState, PersistedStateMap, StateMap, StorageError};
use crate::util::atomic_write;

/// Sole owner of the dedup state document on disk.
///
/// The whole document is read once at startup and rewritten after each poll
/// cycle; there is no per-feed write path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document as stored, legacy records included.
    ///
    /// - Missing file → empty map
    /// - Empty or whitespace-only file → `StorageError::Corrupt` (a truncated
    ///   write must not be mistaken for a cold start)
    /// - Unreadable file → `StorageError::Unavailable`
    /// - Malformed document → `StorageError::Corrupt`
    pub fn load_persisted(&self) -> Result<PersistedStateMap, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No state file found, starting empty");
                return Ok(PersistedStateMap::new());
            }
            Err(e) => return Err(StorageError::unavailable(&self.path, e)),
        };

        serde_json::from_str(&content).map_err(|e| StorageError::corrupt(&self.path, e))
    }

    /// Read the document and convert any legacy records.
    ///
    /// If anything was migrated the converted document is written back right
    /// away, so the migration moment recorded as the watermark is durable even
    /// if the first cycle never completes. A failed write-back is logged and
    /// the in-memory result is still returned; the next cycle's save retries it.
    pub fn load(&self, now: DateTime<Utc>) -> Result<StateMap, StorageError> {
        let migration: Migration = migrate(self.load_persisted()?, now);

        if migration.changed() {
            match self.save(&migration.states) {
                Ok(()) => tracing::info!(
                    path = %self.path.display(),
                    migrated = migration.migrated.len(),
                    "Persisted migrated state"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    "Failed to persist migrated state, will retry after the next cycle"
                ),
            }
        }

        tracing::info!(
            path = %self.path.display(),
            feeds = migration.states.len(),
            "Loaded dedup state"
        );
        Ok(migration.states)
    }

    /// Atomically replace the document with `states`.
    ///
    /// On failure the previously persisted document is left as it was.
    pub fn save(&self, states: &StateMap) -> Result<(), StorageError> {
        let persisted: PersistedStateMap = states
            .iter()
            .map(|(feed, state)| (feed.clone(), PersistedFeedState::Current(state.clone())))
            .collect();
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| StorageError::corrupt(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::unavailable(parent, e))?;
        }

        atomic_write(&self.path, json.as_bytes())
            .map_err(|e| StorageError::unavailable(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), feeds = states.len(), "Saved dedup state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FeedState;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_file_yields_empty_map() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("seen.json"));

        assert!(store.load(at(0)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");

        for content in ["", "  \n"] {
            std::fs::write(&path, content).unwrap();
            let err = StateStore::new(&path).load(at(0)).unwrap_err();
            assert!(matches!(err, StorageError::Corrupt { .. }));
        }

        // The truncated file is left for the operator to inspect.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "  \n");
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = StateStore::new(&path).load(at(0)).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn test_wrong_document_shape_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(&path, r#"["not", "a", "map"]"#).unwrap();

        let err = StateStore::new(&path).load(at(0)).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn test_directory_in_place_of_file_is_unavailable() {
        let dir = tempdir().unwrap();

        let err = StateStore::new(dir.path()).load(at(0)).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }

    #[test]
    fn test_save_then_load_preserves_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("seen.json"));

        let mut state = FeedState::new(at(3));
        state.seen_ids.insert("b");
        state.seen_ids.insert("a");
        let states = StateMap::from([("https://example.com/feed".to_string(), state)]);

        store.save(&states).unwrap();
        assert_eq!(store.load(at(9)).unwrap(), states);
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("seen.json"));

        store.save(&StateMap::new()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_load_migrates_and_persists_legacy_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        std::fs::write(
            &path,
            r#"{
  "https://legacy.example/feed": ["old-1", "old-2"],
  "https://current.example/feed": {"first_seen": "2024-01-01T00:00:00+00:00", "seen_ids": ["x"]}
}"#,
        )
        .unwrap();
        let store = StateStore::new(&path);

        let states = store.load(at(9)).unwrap();
        let legacy = &states["https://legacy.example/feed"];
        assert_eq!(legacy.first_seen, at(9));
        assert_eq!(legacy.seen_ids.iter().collect::<Vec<_>>(), vec!["old-1", "old-2"]);

        // The rewritten document has no legacy records left.
        let on_disk = store.load_persisted().unwrap();
        assert!(on_disk
            .values()
            .all(|r| matches!(r, PersistedFeedState::Current(_))));

        // Loading again later keeps the original migration watermark.
        let reloaded = store.load(at(20)).unwrap();
        assert_eq!(reloaded, states);
    }

    #[test]
    fn test_failed_save_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen.json");
        let store = StateStore::new(&path);
        let states = StateMap::from([("feed".to_string(), FeedState::new(at(1)))]);
        store.save(&states).unwrap();

        // A state path whose parent is a regular file cannot be written.
        let blocked = StateStore::new(path.join("child.json"));
        let err = blocked.save(&states).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));

        assert_eq!(store.load(at(2)).unwrap(), states);
    }
}
