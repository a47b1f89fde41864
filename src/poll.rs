//! The poll cycle: one sequential pass over every configured feed.
//!
//! Per feed: register if unseen, fetch, dedup, announce each new entry,
//! bump the detection counter. After the last feed the whole state map is
//! saved once. A failure in any step is confined to its feed (or entry);
//! nothing aborts the cycle.
//!
//! Persistence happens once per cycle. If the process dies mid-cycle, ids
//! recorded in memory for feeds already processed are lost and those entries
//! are announced again next run (at-least-once, never zero times).

use chrono::Utc;
use std::future::Future;
use std::time::Duration;

use crate::dedup::detect_new;
use crate::feed::FeedSource;
use crate::notify::Notifier;
use crate::state::{ensure_feed, StateMap, StateStore};
use crate::stats::StatsTracker;

/// What happened during one cycle, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Feeds registered for the first time.
    pub feeds_registered: usize,
    /// Feeds whose fetch failed.
    pub feeds_failed: usize,
    /// Entries classified as new across all feeds.
    pub new_entries: usize,
    /// Announcements that could not be delivered.
    pub notify_failures: usize,
    /// Counter updates that could not be written.
    pub stats_failures: usize,
    /// Whether the end-of-cycle state save succeeded.
    pub persisted: bool,
}

/// Orchestrates collaborators for the poll loop.
///
/// `notifier` is optional; without one, new entries are only logged.
pub struct PollCycle<S, N> {
    feeds: Vec<String>,
    source: S,
    notifier: Option<N>,
    store: StateStore,
    stats: StatsTracker,
}

impl<S: FeedSource, N: Notifier> PollCycle<S, N> {
    pub fn new(
        feeds: Vec<String>,
        source: S,
        notifier: Option<N>,
        store: StateStore,
        stats: StatsTracker,
    ) -> Self {
        Self {
            feeds,
            source,
            notifier,
            store,
            stats,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one full pass over the configured feeds and persist `states`.
    pub async fn run_cycle(&self, states: &mut StateMap) -> CycleReport {
        let mut report = CycleReport::default();

        for feed in &self.feeds {
            if ensure_feed(states, feed, Utc::now()) {
                report.feeds_registered += 1;
            }

            let entries = match self.source.fetch(feed).await {
                Ok(entries) if entries.is_empty() => {
                    tracing::info!(feed = %feed, "Feed returned no entries");
                    continue;
                }
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        feed = %feed,
                        error = %e,
                        "Failed to fetch feed, skipping this cycle"
                    );
                    report.feeds_failed += 1;
                    continue;
                }
            };

            // Exclusive borrow of this feed's record, released before the next feed.
            let new_entries = match states.get_mut(feed) {
                Some(state) => detect_new(entries, state),
                None => continue,
            };
            if new_entries.is_empty() {
                continue;
            }

            for entry in &new_entries {
                let Some(notifier) = &self.notifier else {
                    continue;
                };
                if let Err(e) = notifier.notify(&entry.title, &entry.link).await {
                    tracing::warn!(
                        feed = %feed,
                        id = %entry.id,
                        error = %e,
                        "Failed to deliver notification"
                    );
                    report.notify_failures += 1;
                }
            }

            report.new_entries += new_entries.len();
            if let Err(e) = self.stats.record(feed, new_entries.len() as u64) {
                tracing::error!(feed = %feed, error = %e, "Failed to record detection stats");
                report.stats_failures += 1;
            }
        }

        match self.store.save(states) {
            Ok(()) => report.persisted = true,
            Err(e) => tracing::error!(
                error = %e,
                "Failed to persist state, entries from this cycle may be announced again"
            ),
        }

        report
    }

    /// Poll forever, sleeping `interval` between cycles, until `shutdown` resolves.
    ///
    /// Shutdown is only observed while sleeping, so a cycle that has started
    /// always finishes and saves before the loop exits.
    pub async fn run(
        &self,
        mut states: StateMap,
        interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> StateMap {
        tokio::pin!(shutdown);

        loop {
            let report = self.run_cycle(&mut states).await;
            tracing::info!(
                feeds = self.feeds.len(),
                registered = report.feeds_registered,
                failed = report.feeds_failed,
                new = report.new_entries,
                notify_failures = report.notify_failures,
                persisted = report.persisted,
                "Poll cycle complete"
            );

            tracing::info!(interval_secs = interval.as_secs(), "Waiting for next cycle");
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping poll loop");
                    return states;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
