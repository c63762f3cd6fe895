// Segment lifecycle: the playlists forget evicted segments
// immediately, the files age out of storage here.

use crate::storage::SegmentStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often the sweep runs.
    pub interval: Duration,
    /// Files older than this are deleted.
    pub retention: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            retention: Duration::from_secs(150),
        }
    }
}

pub struct SegmentManager {
    storage: Arc<dyn SegmentStorage>,
    config: CleanupConfig,
}

impl SegmentManager {
    #[must_use]
    pub fn new(storage: Arc<dyn SegmentStorage>, config: CleanupConfig) -> Self {
        Self { storage, config }
    }

    pub fn start_cleanup_task(self: Arc<Self>, cancel_token: CancellationToken) {
        let manager = Arc::clone(&self);
        tokio::spawn(async move {
            manager.run_cleanup_loop(cancel_token).await;
        });
    }

    async fn run_cleanup_loop(&self, cancel_token: CancellationToken) {
        let mut interval = time::interval(self.config.interval);
        tracing::info!(
            "segment cleanup task started: interval={:?}, retention={:?}",
            self.config.interval,
            self.config.retention
        );

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("segment cleanup task stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.storage.cleanup(self.config.retention).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!("cleaned up {deleted} expired segments");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!("segment cleanup failed: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_manual_cleanup_path() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write("live/foo/0.ts", Bytes::from_static(b"old"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let deleted = storage.cleanup(Duration::from_millis(10)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(storage.key_count().await, 0);
    }
}
