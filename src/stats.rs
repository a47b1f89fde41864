//! Per-feed detection counters.
//!
//! Each feed gets its own small JSON document under the stats directory,
//! named after [`stats_key`] of the feed URL. Documents written under the
//! older lossy [`safe_key`] name are read as a fallback and superseded by the
//! next write. Counters are written as soon as a
//! cycle finds new entries, independently of the batched state save, so they
//! can only ever run ahead of the dedup state, never behind it.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::state::StorageError;
use crate::util::{atomic_write, safe_key, stats_key};

/// Counter record for one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    /// Entries ever classified as new for the feed.
    pub videos_detected: u64,
}

#[derive(Debug, Clone)]
pub struct StatsTracker {
    dir: PathBuf,
}

impl StatsTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the stats document for `feed`.
    pub fn path_for(&self, feed: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stats_key(feed)))
    }

    /// Pre-digest location, shared by feeds whose URLs differ only in punctuation.
    fn legacy_path_for(&self, feed: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_key(feed)))
    }

    /// Read the counters for `feed`; a missing document reads as zero.
    pub fn load(&self, feed: &str) -> Result<FeedStats, StorageError> {
        match read_stats(&self.path_for(feed))? {
            Some(stats) => Ok(stats),
            None => Ok(read_stats(&self.legacy_path_for(feed))?.unwrap_or_default()),
        }
    }

    /// Add `count` to the feed's counter and persist it immediately.
    ///
    /// A zero count is a no-op and touches nothing on disk.
    pub fn record(&self, feed: &str, count: u64) -> Result<FeedStats, StorageError> {
        if count == 0 {
            return self.load(feed);
        }

        let path = self.path_for(feed);
        let mut stats = self.load(feed)?;
        stats.videos_detected = stats.videos_detected.saturating_add(count);

        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::unavailable(&self.dir, e))?;
        let json =
            serde_json::to_string_pretty(&stats).map_err(|e| StorageError::corrupt(&path, e))?;
        atomic_write(&path, json.as_bytes()).map_err(|e| StorageError::unavailable(&path, e))?;

        tracing::debug!(
            feed = %feed,
            added = count,
            total = stats.videos_detected,
            "Recorded detections"
        );
        Ok(stats)
    }
}

/// `Ok(None)` when the document does not exist.
fn read_stats(path: &Path) -> Result<Option<FeedStats>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::corrupt(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::unavailable(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FEED: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=UC1";

    #[test]
    fn test_load_missing_is_zero() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path().join("stats"));

        assert_eq!(tracker.load(FEED).unwrap(), FeedStats { videos_detected: 0 });
        assert!(!dir.path().join("stats").exists());
    }

    #[test]
    fn test_record_accumulates() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path().join("stats"));

        assert_eq!(tracker.record(FEED, 2).unwrap().videos_detected, 2);
        assert_eq!(tracker.record(FEED, 0).unwrap().videos_detected, 2);
        assert_eq!(tracker.record(FEED, 3).unwrap().videos_detected, 5);
        assert_eq!(tracker.load(FEED).unwrap().videos_detected, 5);
    }

    #[test]
    fn test_zero_record_creates_nothing() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path().join("stats"));

        tracker.record(FEED, 0).unwrap();
        assert!(!tracker.path_for(FEED).exists());
    }

    #[test]
    fn test_feeds_are_independent() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path());

        tracker.record("https://a.example/feed", 1).unwrap();
        tracker.record("https://b.example/feed", 4).unwrap();

        assert_eq!(tracker.load("https://a.example/feed").unwrap().videos_detected, 1);
        assert_eq!(tracker.load("https://b.example/feed").unwrap().videos_detected, 4);
    }

    #[test]
    fn test_file_name_and_format() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path());
        tracker.record(FEED, 7).unwrap();

        let path = tracker.path_for(FEED);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("https_www_youtube_com_feeds_videos_xml_channel_id_UC1_"));
        assert!(name.ends_with(".json"));
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"videos_detected": 7}));
    }

    #[test]
    fn test_feeds_with_colliding_tokens_are_independent() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path());
        let dash = "https://www.youtube.com/feeds/videos.xml?channel_id=UCab-cd";
        let underscore = "https://www.youtube.com/feeds/videos.xml?channel_id=UCab_cd";

        tracker.record(dash, 2).unwrap();
        tracker.record(underscore, 5).unwrap();

        assert_eq!(tracker.load(dash).unwrap().videos_detected, 2);
        assert_eq!(tracker.load(underscore).unwrap().videos_detected, 5);
    }

    #[test]
    fn test_legacy_file_carries_over() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path());
        let legacy = dir
            .path()
            .join("https_www_youtube_com_feeds_videos_xml_channel_id_UC1.json");
        std::fs::write(&legacy, r#"{"videos_detected": 10}"#).unwrap();

        assert_eq!(tracker.load(FEED).unwrap().videos_detected, 10);
        assert_eq!(tracker.record(FEED, 3).unwrap().videos_detected, 13);
        assert!(tracker.path_for(FEED).exists());

        // Once the new document exists the legacy one is no longer consulted.
        std::fs::write(&legacy, r#"{"videos_detected": 99}"#).unwrap();
        assert_eq!(tracker.load(FEED).unwrap().videos_detected, 13);
    }

    #[test]
    fn test_corrupt_stats_is_error() {
        let dir = tempdir().unwrap();
        let tracker = StatsTracker::new(dir.path());
        std::fs::write(tracker.path_for(FEED), "garbage").unwrap();

        assert!(matches!(
            tracker.record(FEED, 1),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
