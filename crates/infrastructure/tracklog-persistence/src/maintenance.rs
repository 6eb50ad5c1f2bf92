use camino::Utf8Path;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::TRACKLOG_REDB_FILENAME;

/// Moves an unreadable database aside so the next open starts from an empty cache.
pub fn quarantine_corrupt_file(path: &Utf8Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let ts = Utc::now().format("%Y%m%dT%H%M%S%.f");
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let new_name = format!(
        "{}.corrupt.{ts}.{}.{n}",
        path.file_name().unwrap_or(TRACKLOG_REDB_FILENAME),
        std::process::id()
    );
    let new_path = path.with_file_name(new_name);
    tracing::warn!(from = %path, to = %new_path, "local cache unreadable, quarantining");
    std::fs::rename(path, &new_path)
}
