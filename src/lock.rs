//! Advisory cross-process locking on a task's artifact path (spec §5, §9
//! design note 4).
//!
//! The Execution Engine holds one of these while it checks whether a
//! task's output already exists and, if not, computes and persists it, so
//! two processes racing to compute the same fingerprint serialize instead
//! of clobbering each other's output.

use std::fs::OpenOptions;

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;

use crate::error::{LockError, TaskChainError};

/// Opens (creating if needed) the `.lock` sidecar next to `artifact_path`,
/// acquires an exclusive lock, runs `body` while holding it, and releases
/// the lock when `body` returns — whether it succeeded or not.
///
/// The lock file lives alongside the artifact as `<artifact>.lock` rather
/// than locking the artifact file directly, so a data handler never has to
/// distinguish "the artifact doesn't exist yet" from "someone is holding a
/// lock on it".
pub fn hold<T>(
    artifact_path: &Utf8Path,
    body: impl FnOnce() -> Result<T, TaskChainError>,
) -> Result<T, TaskChainError> {
    let lock_path = lock_file_path(artifact_path);

    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LockError::Open(lock_path.clone(), e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| LockError::Open(lock_path.clone(), e))?;

    let mut lock = RwLock::new(file);
    let _guard = lock.write().map_err(|e| LockError::Acquire(lock_path.clone(), e))?;

    body()
}

fn lock_file_path(artifact_path: &Utf8Path) -> Utf8PathBuf {
    let mut path = artifact_path.to_owned();
    let file_name = path.file_name().unwrap_or("artifact").to_string();
    path.set_file_name(format!("{file_name}.lock"));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_path_is_named_after_the_artifact() {
        let p = lock_file_path(Utf8Path::new("/cache/ab/cdef1234.json"));
        assert_eq!(p, Utf8PathBuf::from("/cache/ab/cdef1234.json.lock"));
    }

    #[test]
    fn hold_creates_parent_directories_and_runs_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Utf8PathBuf::from_path_buf(dir.path().join("nested").join("out.json")).unwrap();

        let ran = hold(&artifact, || Ok::<_, TaskChainError>(42)).unwrap();
        assert_eq!(ran, 42);
        assert!(lock_file_path(&artifact).exists());
    }

    #[test]
    fn lock_is_released_after_hold_returns_so_a_second_call_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Utf8PathBuf::from_path_buf(dir.path().join("out.json")).unwrap();

        hold(&artifact, || Ok::<_, TaskChainError>(())).unwrap();
        let second = hold(&artifact, || Ok::<_, TaskChainError>(()));
        assert!(second.is_ok());
    }

    #[test]
    fn body_error_still_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Utf8PathBuf::from_path_buf(dir.path().join("out.json")).unwrap();

        let _ = hold(&artifact, || {
            Err::<(), _>(TaskChainError::DuplicateChainName("x".to_string()))
        });
        let second = hold(&artifact, || Ok::<_, TaskChainError>(()));
        assert!(second.is_ok());
    }
}
