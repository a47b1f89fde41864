//! Decides which fetched entries are new for a feed.
//!
//! An entry is new when all of these hold:
//!
//! 1. it has a publish timestamp (undated entries can't be compared to the
//!    watermark, so they are never announced),
//! 2. it was published at or after the feed's `first_seen` watermark,
//! 3. its id is not already in the feed's seen-set.
//!
//! Entries are examined oldest-first so that announcements and seen-set
//! appends follow publish order even when one cycle finds several new items.

use crate::feed::Entry;
use crate::state::FeedState;

/// Return the new entries of `entries`, oldest first, recording each in `state`.
///
/// Every returned id is appended to `state.seen_ids` before the next entry is
/// examined, so an id repeated within the batch is reported once. The
/// watermark is never modified and nothing is persisted here.
///
/// Ordering: the batch is reversed (feeds list newest first) and then stably
/// sorted by publish time, so entries sharing a timestamp keep the reversed
/// native order.
pub fn detect_new(mut entries: Vec<Entry>, state: &mut FeedState) -> Vec<Entry> {
    entries.reverse();
    entries.sort_by_key(|entry| entry.published);

    let mut new_entries = Vec::new();
    for entry in entries {
        let Some(published) = entry.published else {
            continue;
        };
        if published < state.first_seen {
            continue;
        }
        if !state.seen_ids.insert(&entry.id) {
            continue;
        }

        tracing::info!(
            id = %entry.id,
            title = %entry.title,
            link = %entry.link,
            published = %published.to_rfc3339(),
            "New entry detected"
        );
        new_entries.push(entry);
    }

    new_entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, published: Option<DateTime<Utc>>) -> Entry {
        Entry {
            id: id.to_string(),
            title: format!("Title {id}"),
            link: format!("https://example.com/{id}"),
            published,
        }
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_watermark_scenario_any_input_order() {
        let a = entry("A", Some(t0() - Duration::seconds(1)));
        let b = entry("B", Some(t0() + Duration::seconds(1)));
        let c = entry("C", Some(t0() + Duration::seconds(2)));

        let orders = [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), b.clone(), a.clone()],
            vec![b.clone(), a.clone(), c.clone()],
            vec![c.clone(), a.clone(), b.clone()],
        ];
        for order in orders {
            let mut state = FeedState::new(t0());
            let new = detect_new(order, &mut state);

            assert_eq!(new, vec![b.clone(), c.clone()]);
            assert_eq!(state.seen_ids.iter().collect::<Vec<_>>(), vec!["B", "C"]);
        }
    }

    #[test]
    fn test_rerun_returns_nothing() {
        let batch = vec![
            entry("2", Some(t0() + Duration::minutes(2))),
            entry("1", Some(t0() + Duration::minutes(1))),
        ];
        let mut state = FeedState::new(t0());

        assert_eq!(ids(&detect_new(batch.clone(), &mut state)), vec!["1", "2"]);
        assert!(detect_new(batch, &mut state).is_empty());
    }

    #[test]
    fn test_entry_at_watermark_is_new() {
        let mut state = FeedState::new(t0());
        let new = detect_new(vec![entry("edge", Some(t0()))], &mut state);
        assert_eq!(ids(&new), vec!["edge"]);
    }

    #[test]
    fn test_undated_entries_ignored() {
        let mut state = FeedState::new(t0());
        let new = detect_new(
            vec![entry("undated", None), entry("dated", Some(t0() + Duration::hours(1)))],
            &mut state,
        );

        assert_eq!(ids(&new), vec!["dated"]);
        assert!(!state.seen_ids.contains("undated"));
    }

    #[test]
    fn test_already_seen_skipped() {
        let mut state = FeedState::new(t0());
        state.seen_ids.insert("old");

        let new = detect_new(
            vec![
                entry("old", Some(t0() + Duration::hours(1))),
                entry("fresh", Some(t0() + Duration::hours(2))),
            ],
            &mut state,
        );
        assert_eq!(ids(&new), vec!["fresh"]);
    }

    #[test]
    fn test_duplicate_id_in_batch_reported_once() {
        let mut state = FeedState::new(t0());
        let new = detect_new(
            vec![
                entry("dup", Some(t0() + Duration::hours(2))),
                entry("dup", Some(t0() + Duration::hours(1))),
            ],
            &mut state,
        );

        assert_eq!(new.len(), 1);
        assert_eq!(new[0].published, Some(t0() + Duration::hours(1)));
        assert_eq!(state.seen_ids.len(), 1);
    }

    #[test]
    fn test_equal_timestamps_follow_reversed_native_order() {
        let same = Some(t0() + Duration::hours(1));
        let mut state = FeedState::new(t0());

        // Native feed order is newest first, so "second" is listed before "first".
        let new = detect_new(vec![entry("second", same), entry("first", same)], &mut state);
        assert_eq!(ids(&new), vec!["first", "second"]);
    }

    #[test]
    fn test_watermark_untouched() {
        let mut state = FeedState::new(t0());
        detect_new(vec![entry("x", Some(t0() + Duration::days(3)))], &mut state);
        assert_eq!(state.first_seen, t0());
    }

    fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
        prop::collection::vec((0u8..20, prop::option::of(-100i64..100)), 0..40)
            .prop_map(|raw| {
                raw.into_iter()
                    .map(|(id, offset)| {
                        entry(
                            &format!("id-{id}"),
                            offset.map(|secs| t0() + Duration::seconds(secs)),
                        )
                    })
                    .collect()
            })
    }

    fn arb_seen() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec((0u8..20).prop_map(|id| format!("id-{id}")), 0..10)
    }

    proptest! {
        #[test]
        fn prop_never_returns_previously_seen(entries in arb_entries(), seen in arb_seen()) {
            let mut state = FeedState::new(t0());
            for id in &seen {
                state.seen_ids.insert(id);
            }

            let new = detect_new(entries, &mut state);
            for e in &new {
                prop_assert!(!seen.contains(&e.id));
            }
        }

        #[test]
        fn prop_only_dated_entries_at_or_after_watermark(entries in arb_entries()) {
            let mut state = FeedState::new(t0());
            let new = detect_new(entries, &mut state);

            for e in &new {
                let published = e.published;
                prop_assert!(published.is_some());
                prop_assert!(published >= Some(t0()));
            }
        }

        #[test]
        fn prop_result_is_chronological_and_recorded(entries in arb_entries()) {
            let mut state = FeedState::new(t0());
            let new = detect_new(entries, &mut state);

            for pair in new.windows(2) {
                prop_assert!(pair[0].published <= pair[1].published);
            }
            for e in &new {
                prop_assert!(state.seen_ids.contains(&e.id));
            }
            prop_assert_eq!(state.seen_ids.len(), new.len());
        }

        #[test]
        fn prop_second_run_is_empty(entries in arb_entries()) {
            let mut state = FeedState::new(t0());
            detect_new(entries.clone(), &mut state);
            prop_assert!(detect_new(entries, &mut state).is_empty());
        }
    }
}
