//! Small helpers shared by the storage and delivery layers.
//!
//! - **Filesystem**: crash-safe whole-file replacement and key encoding for
//!   per-feed files
//! - **URL validation**: feed URLs from the config must be absolute http(s)
//! - **Text**: cleaning feed-supplied titles before they reach a webhook

mod fs;
mod text;
mod url_validator;

pub use fs::{atomic_write, safe_key, stats_key};
pub use text::{clean_title, truncate_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
