//! Filesystem-backed artifact store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gifclip_models::is_clip_identifier;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Prefix of in-progress GIFs written by the renderer.
const PARTIAL_PREFIX: &str = ".partial_";

/// Store rooted at the clip output directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, identifier: &str) -> StorageResult<PathBuf> {
        if !is_clip_identifier(identifier) {
            return Err(StorageError::invalid_identifier(identifier));
        }
        Ok(self.root.join(identifier))
    }

    /// Resolve an identifier to the path of an existing artifact.
    pub async fn resolve(&self, identifier: &str) -> StorageResult<PathBuf> {
        let path = self.path_for(identifier)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::not_found(identifier)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(identifier))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an artifact.
    pub async fn remove(&self, identifier: &str) -> StorageResult<()> {
        let path = self.path_for(identifier)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(identifier = %identifier, "Removed artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(identifier))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Identifiers of all stored artifacts, sorted.
    pub async fn list(&self) -> StorageResult<Vec<String>> {
        let mut identifiers = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(identifiers),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_clip_identifier(&name) {
                identifiers.push(name);
            }
        }

        identifiers.sort();
        Ok(identifiers)
    }

    /// Remove artifacts (and abandoned partial renders) last modified at
    /// least `max_age` ago. Returns how many files were deleted.
    ///
    /// Unrelated files in the directory are never touched.
    pub async fn sweep_older_than(&self, max_age: Duration) -> StorageResult<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_sweepable(&name) {
                continue;
            }

            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };

            // Clock skew makes `elapsed` fail; treat those files as fresh
            let stale = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .is_some_and(|age| age >= max_age);
            if !stale {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %name, "Failed to sweep artifact: {}", e),
            }
        }

        if removed > 0 {
            info!(removed = removed, root = %self.root.display(), "Swept stale artifacts");
        }
        Ok(removed)
    }
}

fn is_sweepable(name: &str) -> bool {
    is_clip_identifier(name) || (name.starts_with(PARTIAL_PREFIX) && name.ends_with(".gif"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifclip_models::new_clip_identifier;
    use tempfile::TempDir;

    async fn store_with(files: &[&str]) -> (TempDir, LocalArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        for name in files {
            tokio::fs::write(dir.path().join(name), b"GIF89a").await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_resolve_and_remove() {
        let id = new_clip_identifier();
        let (_dir, store) = store_with(&[id.as_str()]).await;

        let path = store.resolve(&id).await.unwrap();
        assert!(path.ends_with(&id));

        store.remove(&id).await.unwrap();
        assert!(matches!(
            store.resolve(&id).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(store.remove(&id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let (_dir, store) = store_with(&[]).await;
        for bad in ["../secret.gif", "/etc/passwd", "clip.gif", ""] {
            assert!(matches!(
                store.resolve(bad).await,
                Err(StorageError::InvalidIdentifier(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let a = new_clip_identifier();
        let b = new_clip_identifier();
        let (_dir, store) = store_with(&[a.as_str(), b.as_str(), "notes.txt", ".partial_x1.gif"]).await;

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.list().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_sweep() {
        let id = new_clip_identifier();
        let (dir, store) = store_with(&[id.as_str(), "notes.txt", ".partial_abc.gif"]).await;

        assert_eq!(store.sweep_older_than(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(store.sweep_older_than(Duration::ZERO).await.unwrap(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("not-yet"));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.sweep_older_than(Duration::ZERO).await.unwrap(), 0);

        store.ensure_root().await.unwrap();
        assert!(store.root().is_dir());
    }
}
