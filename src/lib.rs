//! Feed watcher that announces each newly published entry exactly once.
//!
//! Dedup rests on two pieces of per-feed state: a watermark fixed when the
//! feed is first seen (nothing published before it is ever announced) and an
//! append-only set of ids already announced.

pub mod config;
pub mod dedup;
pub mod feed;
pub mod http;
pub mod notify;
pub mod poll;
pub mod state;
pub mod stats;
pub mod util;
