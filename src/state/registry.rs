use chrono::{DateTime, Utc};

use super::types::{FeedState, StateMap};

/// Make sure `feed` has a state record, creating one with watermark `now`.
///
/// Returns `true` if the feed was registered by this call. Existing records are
/// never touched, so repeated calls cannot reset a watermark or clear ids.
pub fn ensure_feed(states: &mut StateMap, feed: &str, now: DateTime<Utc>) -> bool {
    if states.contains_key(feed) {
        return false;
    }

    tracing::info!(
        feed = %feed,
        first_seen = %now.to_rfc3339(),
        "Registering new feed"
    );
    states.insert(feed.to_string(), FeedState::new(now));
    true
}
