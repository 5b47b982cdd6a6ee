use std::{
    io::ErrorKind,
    path::Path,
    time::{Duration, SystemTime},
};

use tokio::fs;
use uuid::Uuid;

use super::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The directory did not exist and was created by this call.
    Created,
    Existing,
}

/// Makes sure `path` exists as a directory, creating missing parents.
pub async fn ensure_dir(path: &Path) -> Result<Provisioned, StorageError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(Provisioned::Existing),
        Ok(_) => Err(StorageError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(path)
                .await
                .map_err(|e| StorageError::io("create directory", path, e))?;
            tracing::debug!("Provisioned {}", path.display());
            Ok(Provisioned::Created)
        }
        Err(e) => Err(StorageError::io("inspect", path, e)),
    }
}

/// Moves a file into place. A failed rename (for example across filesystems) falls back to
/// copying into a hidden sibling of `to` and renaming that, so `to` never holds a partial file.
pub async fn relocate(from: &Path, to: &Path) -> Result<(), StorageError> {
    let rename_err = match fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::io("move", from, e));
        }
        Err(e) => e,
    };
    tracing::debug!("Rename of {} failed ({}), copying instead", from.display(), rename_err);

    let sibling = to.with_file_name(format!(".{}.partial", Uuid::new_v4()));
    if let Err(e) = fs::copy(from, &sibling).await {
        remove_file_logged(&sibling).await;
        return Err(StorageError::io("copy", from, e));
    }
    if let Err(e) = fs::rename(&sibling, to).await {
        remove_file_logged(&sibling).await;
        return Err(StorageError::io("move", to, e));
    }
    remove_file_logged(from).await;
    Ok(())
}

/// Best-effort recursive removal. Failures are logged, a missing directory is fine.
pub async fn remove_dir_logged(path: &Path) -> bool {
    match fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::error!("Failed to remove directory {}: {}", path.display(), e);
            false
        }
    }
}

/// Best-effort file removal. Failures are logged, a missing file is fine.
pub async fn remove_file_logged(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::error!("Failed to remove file {}: {}", path.display(), e);
            false
        }
    }
}

/// Deletes regular files in `dir` last modified more than `max_age` ago.
pub async fn sweep_stale(dir: &Path, max_age: Duration) -> Result<usize, StorageError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::io("read directory", dir, e)),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io("read directory", dir, e))?
    {
        let meta = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta,
            _ => continue,
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();

        if age > max_age && remove_file_logged(&entry.path()).await {
            removed += 1;
        }
    }

    Ok(removed)
}
