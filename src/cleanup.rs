use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

use crate::cookies::COPY_PREFIX;

/// Remove cookie copies older than max_age. Returns number of files removed.
pub fn cleanup_stale_copies(work_dir: &Path, max_age: Duration) -> usize {
    if !work_dir.exists() {
        return 0;
    }

    let now = SystemTime::now();
    let mut removed = 0usize;

    let entries = match std::fs::read_dir(work_dir) {
        Ok(e) => e,
        Err(e) => {
            error!("Error scanning directory {}: {e}", work_dir.display());
            return 0;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_copy = path.is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(COPY_PREFIX));
        if !is_copy {
            continue;
        }

        let mtime = match entry.metadata().and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => continue,
        };

        let age = now.duration_since(mtime).unwrap_or_default();
        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(_) => {
                    removed += 1;
                    info!("Removed stale cookie copy: {} (age: {}s)", path.display(), age.as_secs());
                }
                Err(e) => error!("Error removing {}: {e}", path.display()),
            }
        }
    }

    removed
}

/// Spawn a background task that sweeps the work directory every 15 minutes.
/// Call this once at startup.
pub fn spawn_cleanup_task(work_dir: std::path::PathBuf) {
    tokio::spawn(async move {
        info!("Initializing cleanup schedule for: {}", work_dir.display());
        let mut interval = tokio::time::interval(Duration::from_secs(15 * 60));
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;
            let dir = work_dir.clone();
            let removed = tokio::task::spawn_blocking(move || {
                cleanup_stale_copies(&dir, Duration::from_secs(3600))
            })
            .await
            .unwrap_or(0);

            if removed > 0 {
                info!("Scheduled cleanup: removed {removed} stale cookie copies");
            }
        }
    });
}
