// ABOUTME: Deploy lock to prevent concurrent operations on the same application.
// ABOUTME: Uses atomic file creation with lock info stored under the XDG state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diagnostics::{Diagnostics, Warning};
use crate::types::AppName;

use super::DeployError;

/// Directory under the state home holding lock files.
const STATE_SUBDIR: &str = "bluegreen";
/// State home relative to `$HOME` when `$XDG_STATE_HOME` is unset.
const DEFAULT_STATE_HOME: &str = ".local/state";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Application being deployed.
    pub app: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(app: &AppName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            app: app.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for an application.
    pub fn lock_path(dir: &Path, app: &AppName) -> PathBuf {
        dir.join(format!("{app}.lock"))
    }
}

/// Directory holding lock files, from `$XDG_STATE_HOME` or `$HOME`.
pub fn state_dir() -> Result<PathBuf, DeployError> {
    state_dir_from(
        std::env::var_os("XDG_STATE_HOME"),
        std::env::var_os("HOME"),
    )
    .ok_or_else(|| DeployError::lock_error("neither XDG_STATE_HOME nor HOME is set"))
}

fn state_dir_from(xdg_state_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let non_empty = |v: OsString| (!v.is_empty()).then(|| PathBuf::from(v));
    xdg_state_home
        .and_then(non_empty)
        .or_else(|| home.and_then(non_empty).map(|h| h.join(DEFAULT_STATE_HOME)))
        .map(|base| base.join(STATE_SUBDIR))
}

/// How long an unreadable lock is left alone before it counts as corrupt.
pub const UNREADABLE_GRACE: Duration = Duration::from_secs(60);

/// State of a lock file found on disk.
enum Existing {
    /// Held by a live invocation.
    Held(LockInfo),
    /// Unreadable but recent; its owner may still be writing it.
    Busy,
    /// Stale, corrupt, or forced.
    Breakable,
}

/// Private file the lock info is written to before it is linked into place.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(name)
}

/// Whether `path` was modified less than `window` ago. A modification time
/// in the future counts as recent.
async fn modified_within(path: &Path, window: Duration) -> bool {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified.elapsed().map_or(true, |age| age < window),
        Err(_) => false,
    }
}

/// A held deploy lock. Released explicitly with [`DeployLock::release`].
#[derive(Debug)]
pub struct DeployLock {
    path: PathBuf,
}

impl DeployLock {
    /// Acquire the deploy lock for `app` inside `dir`.
    ///
    /// The lock info is written to a private file first and then hard-linked
    /// into place, so the lock path never exists without its contents and two
    /// invocations can never both succeed. Stale (>1 hour) locks are broken
    /// with a warning, as are unreadable ones once they are older than
    /// [`UNREADABLE_GRACE`]; `force` breaks any lock.
    pub async fn acquire(dir: &Path, app: &AppName, force: bool) -> Result<Self, DeployError> {
        let path = LockInfo::lock_path(dir, app);

        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            DeployError::lock_error(format!(
                "failed to create state directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let info = LockInfo::new(app);
        let json = serde_json::to_string(&info)
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        if Self::try_publish(&path, &json).await? {
            return Ok(Self { path });
        }

        match Self::existing_holder(&path, force).await {
            Existing::Held(existing) => {
                return Err(DeployError::LockHeld {
                    app: existing.app,
                    holder: existing.holder,
                    pid: existing.pid,
                    started_at: existing.started_at,
                });
            }
            Existing::Busy => {
                return Err(DeployError::lock_error(format!(
                    "lock {} is being written by another invocation; retry or pass --force",
                    path.display()
                )));
            }
            Existing::Breakable => {}
        }

        tracing::debug!("Removing stale/forced lock at {}", path.display());
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DeployError::lock_error(format!(
                    "failed to break lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        if Self::try_publish(&path, &json).await? {
            Ok(Self { path })
        } else {
            Err(DeployError::lock_error(
                "lock acquired by another process during break",
            ))
        }
    }

    /// Write `json` to a private file beside `path` and link it into place.
    /// Returns false when the lock file already exists.
    async fn try_publish(path: &Path, json: &str) -> Result<bool, DeployError> {
        let staging = staging_path(path);

        tokio::fs::write(&staging, json).await.map_err(|e| {
            DeployError::lock_error(format!(
                "failed to write lock {}: {}",
                staging.display(),
                e
            ))
        })?;

        let linked = tokio::fs::hard_link(&staging, path).await;

        if let Err(e) = tokio::fs::remove_file(&staging).await {
            tracing::debug!("Leaving staging file {}: {}", staging.display(), e);
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to create lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Decide what to do about a lock file that is already present.
    async fn existing_holder(path: &Path, force: bool) -> Existing {
        let parsed = tokio::fs::read_to_string(path)
            .await
            .ok()
            .and_then(|content| serde_json::from_str::<LockInfo>(&content).ok());

        match parsed {
            Some(existing) if force => {
                tracing::warn!(
                    "Breaking lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Existing::Breakable
            }
            Some(existing) if existing.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lock held by {} (pid {}) since {}",
                    existing.holder,
                    existing.pid,
                    existing.started_at
                );
                Existing::Breakable
            }
            Some(existing) => Existing::Held(existing),
            None if force => {
                tracing::warn!("Breaking unreadable lock at {}", path.display());
                Existing::Breakable
            }
            None if modified_within(path, UNREADABLE_GRACE).await => Existing::Busy,
            None => {
                tracing::warn!("Lock info corrupted, breaking lock");
                Existing::Breakable
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeployError::lock_error(format!(
                "failed to remove lock {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Run `operation` while holding the lock. The lock is released whether
    /// or not the operation succeeds; a failed release is only a warning.
    pub async fn with_lock<F, T, E>(
        dir: &Path,
        app: &AppName,
        force: bool,
        diag: &mut Diagnostics,
        operation: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DeployError>,
    {
        let lock = Self::acquire(dir, app, force).await?;
        let result = operation.await;

        if let Err(e) = lock.release().await {
            diag.warn(Warning::lock_release(e.to_string()));
        }

        result
    }
}
