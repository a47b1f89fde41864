//! Feed retrieval: HTTP fetching plus RSS/Atom parsing.
//!
//! The poll cycle only depends on the [`FeedSource`] trait, so tests can drive
//! it with canned entries instead of a network.
//!
//! - `parser` - maps `feed-rs` entries to [`Entry`]
//! - `fetcher` - [`HttpFeedSource`], retrying HTTP retrieval with size and time limits

mod fetcher;
mod parser;

use std::future::Future;

pub use fetcher::{FetchError, HttpFeedSource};
pub use parser::{parse_entries, Entry};

/// Something that can produce the current entries of a feed.
///
/// Entries come back in whatever order the source has them; callers must not
/// rely on it.
pub trait FeedSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<Entry>, FetchError>> + Send;
}
