use super::SegmentStorage;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Error, ErrorKind, Result};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry {
    data: Bytes,
    written_at: Instant,
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn key_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl SegmentStorage for MemoryStorage {
    async fn write(&self, key: &str, data: Bytes) -> Result<()> {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                data,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        self.entries
            .lock()
            .await
            .get(key)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no such key: {key}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(key))
    }

    async fn cleanup(&self, older_than: Duration) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.written_at.elapsed() < older_than);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.read("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cleanup_counts() {
        let storage = MemoryStorage::new();
        storage.write("a", Bytes::from_static(b"1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let deleted = storage.cleanup(Duration::from_millis(10)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(storage.key_count().await, 0);
    }
}
