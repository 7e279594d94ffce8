//! Single-instance execution guard backed by a pid token file.
//!
//! A token file holding the owner's process id means a run is in progress as
//! long as that process is alive. Tokens left behind by a killed run are
//! reclaimed by the next invocation after a liveness probe.
//!
//! Reclaiming is serialized through an exclusive `flock` on a sibling
//! `<token>.reclaim` file, and the owner is read again under that lock, so
//! two invocations racing over one stale token never both win. The reclaim
//! file is left in place.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Attempts to claim the token before giving up on a contended path.
const MAX_ACQUIRE_ATTEMPTS: usize = 5;
/// Pause after finding another invocation mid-reclaim.
const RECLAIM_BACKOFF: Duration = Duration::from_millis(50);

/// Errors from guard operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A live process already holds the guard.
    #[error("Another run (pid {pid}) holds {path}")]
    AlreadyRunning { pid: u32, path: PathBuf },
    /// The token could not be created, read or removed.
    #[error("Lock token {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    /// The token kept changing underneath us.
    #[error("Lock token {0} is contended; giving up")]
    Contended(PathBuf),
}

/// Exclusive claim on a run, released explicitly or on drop.
#[derive(Debug)]
pub struct ExecutionGuard {
    path: PathBuf,
    released: bool,
}

impl ExecutionGuard {
    /// Claim the token at `path`, reclaiming it from a dead owner if needed.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| GuardError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            match create_token(&path) {
                Ok(()) => {
                    info!(path = %path.display(), pid = std::process::id(), "Acquired run lock");
                    return Ok(Self {
                        path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(GuardError::Io { path, source }),
            }

            match read_owner(&path)? {
                TokenOwner::Missing => continue,
                TokenOwner::Pid(pid) if is_foreign_pid_alive(pid) => {
                    return Err(GuardError::AlreadyRunning { pid, path });
                }
                _ => {
                    if !reclaim_stale(&path)? {
                        thread::sleep(RECLAIM_BACKOFF);
                    }
                }
            }
        }
        Err(GuardError::Contended(path))
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the token. Errors are returned for reporting; the guard is
    /// considered released either way.
    pub fn release(mut self) -> Result<(), GuardError> {
        self.released = true;
        remove_token(&self.path)?;
        if self.path.exists() {
            return Err(GuardError::Io {
                path: self.path.clone(),
                source: io::Error::other("token still present after removal"),
            });
        }
        debug!(path = %self.path.display(), "Released run lock");
        Ok(())
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = remove_token(&self.path) {
            warn!("Failed to release run lock on drop: {err}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenOwner {
    /// The token vanished between create and read.
    Missing,
    Pid(u32),
    /// Empty or garbage content; no process can be probed.
    Unreadable,
}

/// Publish a token holding our pid.
///
/// The pid is written to a private file first and hard-linked into place, so
/// the token never exists without its content. Fails with `AlreadyExists`
/// when another token is present.
fn create_token(path: &Path) -> io::Result<()> {
    let pid = std::process::id();
    let staging = sibling(path, &format!(".{pid}.tmp"));
    let written = write_staging(&staging, pid);
    let linked = written.and_then(|()| fs::hard_link(&staging, path));
    let _ = fs::remove_file(&staging);
    linked
}

fn write_staging(staging: &Path, pid: u32) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(staging)?;
    file.write_all(pid.to_string().as_bytes())?;
    file.sync_all()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Remove a stale token while holding the reclaim lock.
///
/// Returns `false` when another invocation holds the lock. The owner is read
/// again under the lock; a live owner that replaced the stale token wins.
fn reclaim_stale(path: &Path) -> Result<bool, GuardError> {
    let Some(_lock) = ReclaimLock::try_acquire(path)? else {
        return Ok(false);
    };
    match read_owner(path)? {
        TokenOwner::Missing => {}
        TokenOwner::Pid(pid) if is_foreign_pid_alive(pid) => {
            return Err(GuardError::AlreadyRunning {
                pid,
                path: path.to_path_buf(),
            });
        }
        owner => {
            warn!(path = %path.display(), ?owner, "Discarding stale run lock");
            remove_token(path)?;
        }
    }
    Ok(true)
}

/// Exclusive `flock` on `<token>.reclaim`, dropped with the file handle.
struct ReclaimLock {
    _file: File,
}

impl ReclaimLock {
    fn try_acquire(token: &Path) -> Result<Option<Self>, GuardError> {
        let path = sibling(token, ".reclaim");
        let io_err = |source| GuardError::Io {
            path: path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        if try_flock_exclusive(&file).map_err(io_err)? {
            Ok(Some(Self { _file: file }))
        } else {
            Ok(None)
        }
    }
}

fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: fd is a valid descriptor owned by `file`; LOCK_NB never blocks.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

fn read_owner(path: &Path) -> Result<TokenOwner, GuardError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(TokenOwner::Missing),
        Err(source) => {
            return Err(GuardError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(parse_owner(&text))
}

fn parse_owner(text: &str) -> TokenOwner {
    text.lines()
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .map(TokenOwner::Pid)
        .unwrap_or(TokenOwner::Unreadable)
}

fn remove_token(path: &Path) -> Result<(), GuardError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(GuardError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Our own pid in a token means a previous incarnation (pid reuse after a
/// reboot or in a container), never a concurrent holder.
fn is_foreign_pid_alive(pid: u32) -> bool {
    pid != std::process::id() && is_pid_alive(pid)
}

/// Check whether a given pid is alive.
///
/// Uses `kill(pid, 0)`, which probes for existence without sending a signal.
fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    #[cfg(unix)]
    {
        // SAFETY: signal 0 performs error checking only; no signal is delivered.
        let result = unsafe { libc::kill(pid_i32, 0) };
        if result == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else.
        io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        // No cheap probe; assume alive so two runs never overlap.
        let _ = pid_i32;
        true
    }
}
