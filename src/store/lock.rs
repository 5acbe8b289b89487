//! Store file locking
//!
//! Prevents two processes (or two `Store`s in one process) from opening the
//! same file. Uses `fs2` (flock on Unix, LockFile on Windows); the lock is
//! polled so a held lock surfaces as `LockTimeout` instead of hanging.

use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Result, RuleDbError};

/// Delay between lock attempts
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Take an exclusive lock on `file`, waiting at most `timeout`
pub(crate) fn lock_exclusive(file: &File, path: &Path, timeout: Duration) -> Result<()> {
    let contended = fs2::lock_contended_error().raw_os_error();
    let start = Instant::now();

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.raw_os_error() == contended => {}
            Err(e) => return Err(RuleDbError::Io(e)),
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(RuleDbError::LockTimeout {
                path: path.to_path_buf(),
                waited_ms: waited.as_millis() as u64,
            });
        }

        thread::sleep(POLL_INTERVAL.min(timeout - waited));
    }
}
