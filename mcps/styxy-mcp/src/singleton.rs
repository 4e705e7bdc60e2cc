//! Single-instance coordination
//!
//! Only one adapter process may talk to the daemon at a time. Ownership is
//! an exclusive `flock` on the lock file, held for as long as the
//! [`SingletonLock`] keeps the file open. The file body is a JSON
//! [`LockRecord`] describing the holder, for diagnostics.
//!
//! The kernel drops the `flock` when the holder exits, however it exits, so a
//! lock file left behind by a dead process is simply re-locked and rewritten.
//! The record is read and written only under the `flock`; a record naming a
//! live process other than this one is still honoured, for holders that
//! predate the `flock`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Attempts before giving up on a lock file that keeps being replaced
const MAX_ATTEMPTS: usize = 3;

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub started: DateTime<Utc>,
    pub hostname: String,
    pub command: String,
}

impl LockRecord {
    /// Record describing the current process
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            started: Utc::now(),
            hostname: hostname(),
            command: std::env::args().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Default lock file location
pub fn default_lock_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("styxy-mcp")
        .join("mcp-server.lock")
}

/// File-backed claim on the adapter role
///
/// All methods take `&self` so one instance can be shared with the shutdown
/// guard through an `Arc`.
#[derive(Debug)]
pub struct SingletonLock {
    path: PathBuf,
    /// Open, `flock`ed lock file while held
    file: Mutex<Option<File>>,
}

impl SingletonLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to claim the adapter role
    ///
    /// Returns `false` when another holder has the lock, including this
    /// instance on a second call. Any I/O error also yields `false`.
    pub fn acquire(&self) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            debug!("Singleton lock already held by this instance");
            return false;
        }

        match self.try_acquire() {
            Ok(Some(file)) => {
                *slot = Some(file);
                info!("Acquired singleton lock at {}", self.path.display());
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to acquire lock {}: {}", self.path.display(), e);
                false
            }
        }
    }

    fn try_acquire(&self) -> io::Result<Option<File>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        for _ in 0..MAX_ATTEMPTS {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(0o644)
                .open(&self.path)?;

            if !try_flock(&file)? {
                debug!("Lock {} is flocked by another holder", self.path.display());
                return Ok(None);
            }

            // A releasing holder unlinks the path before unlocking
            if !is_same_file(&file, &self.path)? {
                debug!("Lock file was replaced while locking, retrying");
                continue;
            }

            let mut content = String::new();
            file.read_to_string(&mut content)?;
            match serde_json::from_str::<LockRecord>(&content) {
                Ok(record)
                    if record.pid != std::process::id() && is_process_alive(record.pid) =>
                {
                    debug!(pid = record.pid, "Lock held by live process");
                    return Ok(None);
                }
                Ok(record) if record.pid != std::process::id() => {
                    warn!(pid = record.pid, "Replacing stale lock left by dead process");
                }
                Err(_) if !content.trim().is_empty() => {
                    warn!("Replacing unreadable lock file {}", self.path.display());
                }
                _ => {}
            }

            write_current_record(&mut file)?;
            return Ok(Some(file));
        }

        Err(io::Error::other(format!(
            "lock file {} kept being replaced",
            self.path.display()
        )))
    }

    fn read_record(&self) -> Option<LockRecord> {
        let content = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Remove the lock file and drop the `flock` if this instance holds it
    ///
    /// Idempotent. The path is unlinked before the `flock` is dropped, so a
    /// waiter that opened the old file sees it replaced and retries.
    pub fn release(&self) {
        let Some(file) = self.slot().take() else {
            return;
        };

        match is_same_file(&file, &self.path) {
            Ok(true) => match fs::remove_file(&self.path) {
                Ok(()) => info!("Released singleton lock"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove lock {}: {}", self.path.display(), e),
            },
            Ok(false) => warn!("Lock file was replaced by another holder, leaving it"),
            Err(e) => warn!("Failed to inspect lock {}: {}", self.path.display(), e),
        }
        drop(file);
    }

    pub fn is_held(&self) -> bool {
        self.slot().is_some()
    }

    /// Current lock holder, if a readable lock file exists
    ///
    /// Reads without the `flock`, so a record being rewritten reads as `None`.
    pub fn holder_info(&self) -> Option<LockRecord> {
        self.read_record()
    }
}

/// Non-blocking exclusive `flock`; `Ok(false)` when someone else holds it
fn try_flock(file: &File) -> io::Result<bool> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

/// Whether `path` still names the open `file`
fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    let open = file.metadata()?;
    match fs::metadata(path) {
        Ok(on_disk) => Ok(open.dev() == on_disk.dev() && open.ino() == on_disk.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn write_current_record(file: &mut File) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(&LockRecord::current()).map_err(io::Error::from)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&json)?;
    file.sync_all()
}

/// Probe a process with signal 0
pub fn is_process_alive(pid: u32) -> bool {
    // pid 0 and negative values address process groups
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
