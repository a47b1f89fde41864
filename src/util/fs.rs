use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Per-process counter so two writes in the same nanosecond get distinct temp names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hex characters of the URL digest appended to [`stats_key`].
const KEY_DIGEST_LEN: usize = 16;

/// Atomically replace `dst` with `content` using write-to-temp-then-rename.
///
/// The destination is never left in a partial state: either the old file is
/// intact or the new content is fully on disk. The parent directory is synced
/// after the rename so the new directory entry survives a power loss.
pub fn atomic_write(dst: &Path, content: &[u8]) -> io::Result<()> {
    // Temp name is unique per call (pid, counter, clock), not unpredictable;
    // `create_new` below refuses any pre-existing path, symlinks included.
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = dst.with_extension(format!(
        "tmp.{}.{}.{:016x}",
        std::process::id(),
        seq,
        nanos
    ));

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create_new(true) // Fails atomically if file exists (prevents symlink race)
        .open(&temp_path)?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, dst) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    sync_parent_dir(dst)
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    OpenOptions::new().read(true).open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Lossy file-name token for a feed identity.
///
/// Every run of characters outside `[A-Za-z0-9]` collapses to a single `_`,
/// so `https://example.com/feed?id=1` becomes `https_example_com_feed_id_1`.
/// Distinct identities can share a token (`a-b` and `a_b`); use [`stats_key`]
/// for new files. Kept for reading files named by the older scheme.
pub fn safe_key(identity: &str) -> String {
    let mut out = String::with_capacity(identity.len());
    let mut in_run = false;
    for c in identity.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// Collision-free file-name token: the readable [`safe_key`] plus a short
/// SHA-256 digest of the full identity.
pub fn stats_key(identity: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(identity.as_bytes()));
    format!("{}_{}", safe_key(identity), &digest[..KEY_DIGEST_LEN])
}
