//! Single-instance lock for applying runs.
//!
//! Exclusivity against other schedulers or hosts stays an operational
//! concern; this flock only stops two local wgsteer processes from
//! rewriting OS state at the same time.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::Error;

const LOCK_FILE: &str = "/var/run/wgsteer.lock";

/// Holds the exclusive lock; released on drop.
pub struct LockGuard {
    _file: File,
}

impl LockGuard {
    /// Acquire the lock, failing immediately if another instance holds it.
    ///
    /// Open with create+read+write and no truncate so there is no window
    /// between file creation and lock acquisition.
    pub fn acquire() -> Result<Self, Error> {
        Self::acquire_path(Path::new(LOCK_FILE))
    }

    pub(crate) fn acquire_path(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        file.try_lock_exclusive().map_err(|_| {
            Error::Config(format!(
                "another wgsteer instance is already running (lock file: {})",
                path.display()
            ))
        })?;

        Ok(Self { _file: file })
    }
}
