// Segment/manifest storage abstraction.
//
// The HLS and DASH segmenters write through this trait so the on-disk
// layout stays a detail: the file backend serves production, the
// memory backend serves tests. Keys are relative paths that mirror the
// URL space ("live/foo/3.ts", "live/foo.m3u8").

pub mod file;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Result;
use std::time::Duration;

#[async_trait]
pub trait SegmentStorage: Send + Sync {
    /// Write data under a key, overwriting.
    async fn write(&self, key: &str, data: Bytes) -> Result<()>;

    /// Write data so readers never observe a partial file. Manifests
    /// and playlists go through this.
    async fn write_atomic(&self, key: &str, data: Bytes) -> Result<()> {
        self.write(key, data).await
    }

    /// Read a key or fail with `NotFound`.
    async fn read(&self, key: &str) -> Result<Bytes>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete everything older than the given age; returns how many
    /// entries went away.
    async fn cleanup(&self, older_than: Duration) -> Result<usize>;
}
