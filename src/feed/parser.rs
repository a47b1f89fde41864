use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One entry of a fetched feed. Transient; only its id is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Feed-scoped identifier (not globally unique).
    pub id: String,
    pub title: String,
    pub link: String,
    /// Publish time. Entries without one are never announced.
    pub published: Option<DateTime<Utc>>,
}

/// Parse RSS/Atom/JSON Feed bytes into entries, in the feed's native order.
///
/// Only the entry's own publish time is used. `updated` is deliberately not a
/// fallback: an edit to an old entry must not move it past the watermark.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<Entry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            let published = entry.published;
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let id = generate_id(existing_id, &link, &title, published);

            Entry {
                id,
                title,
                link,
                published,
            }
        })
        .collect();

    Ok(entries)
}

/// Use the feed's own id when present, otherwise a stable content hash.
fn generate_id(
    existing: Option<&str>,
    link: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(id) = existing {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
