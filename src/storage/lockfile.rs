//! Process lock file
//!
//! One monitoring node per data directory: a second instance would fight
//! the first over the sled event database and the uplink rate budget.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// PID lock file held for the lifetime of the node process.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".oceanviewer.lock";

    /// Acquire the lock for `data_dir`, creating the directory if needed.
    ///
    /// Fails when a live oceanviewer process already holds it; a lock left by
    /// a dead process is replaced.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);
        if lock_path.exists() {
            match Self::holder_pid(&lock_path) {
                Ok(Some(pid)) => bail!(
                    "Another oceanviewer instance is already running (PID: {pid})\n\
                     If no other instance is running, remove the stale lock file:\n  rm {}",
                    lock_path.display()
                ),
                Ok(None) => {
                    tracing::info!(path = %lock_path.display(), "Removing stale lock file");
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable lock file, replacing it");
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        let pid = std::process::id();
        fs::write(&lock_path, format!("{pid}\n"))
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
        tracing::debug!(pid, path = %lock_path.display(), "Acquired process lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// `Some(pid)` when the recorded process is still alive.
    fn holder_pid(lock_path: &Path) -> Result<Option<u32>> {
        let contents = fs::read_to_string(lock_path).context("Failed to read lock file")?;
        let pid: u32 = contents
            .trim()
            .parse()
            .context("Failed to parse PID from lock file")?;
        Ok(Self::is_node_process(pid).then_some(pid))
    }

    #[cfg(unix)]
    fn is_node_process(pid: u32) -> bool {
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map(|cmdline| cmdline.contains("oceanviewer"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_node_process(_pid: u32) -> bool {
        true
    }

    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove lock file");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
