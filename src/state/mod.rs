//! Durable per-feed dedup state.
//!
//! - [`StateStore`] reads and atomically rewrites the state document
//! - [`migrate`] converts legacy bare-list records to the watermark shape
//! - [`ensure_feed`] registers feeds the first time they are polled

mod migrate;
mod registry;
mod store;
mod types;

pub use migrate::{migrate, Migration};
pub use registry::ensure_feed;
pub use store::StateStore;
pub use types::{
    FeedState, PersistedFeedState, PersistedStateMap, SeenIds, StateMap, StorageError,
};
