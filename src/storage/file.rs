use super::SegmentStorage;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Error, ErrorKind, Result};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;

/// Filesystem backend. Keys map to paths under `base_path`; manifest
/// updates go through a temp file and an atomic rename so a reader
/// never sees a half-written playlist.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Rejects traversal: keys must stay below the base path.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("unsafe storage key: {key}"),
            ));
        }
        Ok(self.base_path.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn cleanup_dir(
        dir: PathBuf,
        cutoff: SystemTime,
        deleted: &mut usize,
    ) -> Result<()> {
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                if modified < cutoff && fs::remove_file(&path).await.is_ok() {
                    tracing::trace!(?path, "removed expired segment");
                    *deleted += 1;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SegmentStorage for FileStorage {
    async fn write(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.resolve(key)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.resolve(key)?;
        Self::ensure_parent(&path).await?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        fs::try_exists(&path).await
    }

    async fn cleanup(&self, older_than: Duration) -> Result<usize> {
        if !fs::try_exists(&self.base_path).await.unwrap_or(false) {
            return Ok(0);
        }
        let cutoff = SystemTime::now() - older_than;
        let mut deleted = 0;
        Self::cleanup_dir(self.base_path.clone(), cutoff, &mut deleted).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (_dir, storage) = storage();
        storage
            .write("live/foo/0.ts", Bytes::from_static(b"segment"))
            .await
            .unwrap();
        assert_eq!(
            storage.read("live/foo/0.ts").await.unwrap(),
            Bytes::from_static(b"segment")
        );
        storage.delete("live/foo/0.ts").await.unwrap();
        assert!(!storage.exists("live/foo/0.ts").await.unwrap());
    }

    #[tokio::test]
    async fn test_atomic_write_replaces_content() {
        let (_dir, storage) = storage();
        storage
            .write_atomic("live/foo.m3u8", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        storage
            .write_atomic("live/foo.m3u8", Bytes::from_static(b"v2"))
            .await
            .unwrap();
        assert_eq!(
            storage.read("live/foo.m3u8").await.unwrap(),
            Bytes::from_static(b"v2")
        );
    }

    #[tokio::test]
    async fn test_traversal_key_rejected() {
        let (_dir, storage) = storage();
        let result = storage
            .write("../escape.ts", Bytes::from_static(b"nope"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_old_files() {
        let (_dir, storage) = storage();
        storage
            .write("live/foo/old.ts", Bytes::from_static(b"old"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        storage
            .write("live/foo/new.ts", Bytes::from_static(b"new"))
            .await
            .unwrap();

        let deleted = storage.cleanup(Duration::from_millis(40)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!storage.exists("live/foo/old.ts").await.unwrap());
        assert!(storage.exists("live/foo/new.ts").await.unwrap());
    }
}
