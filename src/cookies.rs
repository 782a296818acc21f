use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

pub const COPY_PREFIX: &str = "cookies-";

/// A writable, request-private copy of the origin cookie file.
///
/// yt-dlp rewrites its cookie file after a login, and the origin usually
/// lives on a read-only filesystem, so each request works on its own copy.
/// The file is deleted when the value is dropped.
#[derive(Debug)]
pub struct CookieCopy {
    path: PathBuf,
}

impl CookieCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CookieCopy {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(_) => debug!("Removed cookie copy: {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Error removing cookie copy {}: {e}", self.path.display()),
        }
    }
}

/// Copy `origin` into a uniquely named file under `work_dir`.
///
/// The copy is a freshly created file, so it is writable even when the
/// origin is read-only. A missing origin surfaces as
/// `io::ErrorKind::NotFound`.
pub async fn copy_to_workdir(origin: &Path, work_dir: &Path) -> io::Result<CookieCopy> {
    let mut source = File::open(origin).await?;
    tokio::fs::create_dir_all(work_dir).await?;

    let path = work_dir.join(format!("{COPY_PREFIX}{}.txt", Uuid::new_v4()));
    let mut target = File::create(&path).await?;
    // Guard from here on so a partial copy is cleaned up too.
    let copy = CookieCopy { path };
    tokio::io::copy(&mut source, &mut target).await?;
    target.flush().await?;
    debug!("Copied {} -> {}", origin.display(), copy.path().display());

    Ok(copy)
}
