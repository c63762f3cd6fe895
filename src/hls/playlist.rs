use {
    super::errors::HlsError,
    bytes::Bytes,
    crate::storage::SegmentStorage,
    std::collections::VecDeque,
    std::fmt::Write as _,
    std::sync::Arc,
};

/// One finished transport-stream segment as the playlist sees it.
#[derive(Debug, Clone)]
pub struct Segment {
    pub sequence: u64,
    pub duration_ms: i64,
    /// File name relative to the stream directory, e.g. "7.ts".
    pub name: String,
    /// Full storage key, e.g. "live/foo/7.ts".
    pub key: String,
    pub discontinuity: bool,
}

/// Sliding-window M3U8 playlist. The media sequence number advances by
/// one for every evicted segment, so
/// `MEDIA-SEQUENCE + len(window) == total segments emitted` holds at
/// all times.
pub struct M3u8 {
    window_count: usize,
    next_sequence: u64,
    segments: VecDeque<Segment>,

    segment_dir: String,
    playlist_key: String,
    storage: Arc<dyn SegmentStorage>,
}

impl M3u8 {
    #[must_use]
    pub fn new(
        app_name: &str,
        stream_name: &str,
        fragment_ms: i64,
        window_ms: i64,
        storage: Arc<dyn SegmentStorage>,
    ) -> Self {
        let window_count = usize::try_from((window_ms / fragment_ms).max(3)).unwrap_or(3);
        Self {
            window_count,
            next_sequence: 0,
            segments: VecDeque::new(),
            segment_dir: format!("{app_name}/{stream_name}"),
            playlist_key: format!("{app_name}/{stream_name}.m3u8"),
            storage,
        }
    }

    #[must_use]
    pub fn playlist_key(&self) -> &str {
        &self.playlist_key
    }

    #[must_use]
    pub fn media_sequence(&self) -> u64 {
        self.segments.front().map_or(self.next_sequence, |s| s.sequence)
    }

    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.next_sequence
    }

    #[must_use]
    pub fn window_len(&self) -> usize {
        self.segments.len()
    }

    /// Writes the segment file, slides the window and refreshes the
    /// playlist atomically.
    pub async fn add_segment(
        &mut self,
        duration_ms: i64,
        discontinuity: bool,
        data: Bytes,
    ) -> Result<&Segment, HlsError> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let name = format!("{sequence}.ts");
        let key = format!("{}/{name}", self.segment_dir);
        self.storage.write(&key, data).await?;

        self.segments.push_back(Segment {
            sequence,
            duration_ms,
            name,
            key,
            discontinuity,
        });
        while self.segments.len() > self.window_count {
            //expired files age out through the cleanup task; the
            //playlist forgets them immediately
            self.segments.pop_front();
        }

        self.write_playlist(false).await?;
        Ok(self.segments.back().expect("just pushed"))
    }

    /// Regenerates and atomically replaces the playlist; `ended`
    /// appends EXT-X-ENDLIST.
    pub async fn write_playlist(&self, ended: bool) -> Result<(), HlsError> {
        let content = self.generate(ended);
        self.storage
            .write_atomic(&self.playlist_key, Bytes::from(content))
            .await?;
        Ok(())
    }

    pub async fn delete_playlist(&self) -> Result<(), HlsError> {
        self.storage.delete(&self.playlist_key).await?;
        Ok(())
    }

    #[must_use]
    pub fn generate(&self, ended: bool) -> String {
        let mut m3u8 = String::new();
        m3u8.push_str("#EXTM3U\n");
        m3u8.push_str("#EXT-X-VERSION:3\n");
        m3u8.push_str("#EXT-X-ALLOW-CACHE:NO\n");

        let target_duration = self
            .segments
            .iter()
            .map(|segment| (segment.duration_ms + 999) / 1000)
            .max()
            .unwrap_or(0);
        let _ = writeln!(m3u8, "#EXT-X-TARGETDURATION:{target_duration}");
        let _ = writeln!(m3u8, "#EXT-X-MEDIA-SEQUENCE:{}", self.media_sequence());

        for segment in &self.segments {
            if segment.discontinuity {
                m3u8.push_str("#EXT-X-DISCONTINUITY\n");
            }
            let _ = writeln!(
                m3u8,
                "#EXTINF:{:.3},",
                segment.duration_ms as f64 / 1000.0
            );
            let _ = writeln!(m3u8, "{}", segment.name);
        }

        if ended {
            m3u8.push_str("#EXT-X-ENDLIST\n");
        }

        m3u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn playlist() -> M3u8 {
        M3u8::new(
            "live",
            "foo",
            10_000,
            30_000,
            Arc::new(MemoryStorage::new()),
        )
    }

    #[tokio::test]
    async fn test_window_slides_and_sequence_advances() {
        let mut m3u8 = playlist();
        for i in 0..6 {
            m3u8.add_segment(10_000, false, Bytes::from_static(b"ts"))
                .await
                .unwrap();
            assert_eq!(m3u8.total_emitted(), i + 1);
        }

        //window of 3 with 6 emitted: media sequence advanced by 3
        assert_eq!(m3u8.window_len(), 3);
        assert_eq!(m3u8.media_sequence(), 3);
        assert_eq!(
            m3u8.media_sequence() + m3u8.window_len() as u64,
            m3u8.total_emitted()
        );
    }

    #[tokio::test]
    async fn test_generated_playlist_shape() {
        let mut m3u8 = playlist();
        m3u8.add_segment(9_500, false, Bytes::from_static(b"a"))
            .await
            .unwrap();
        m3u8.add_segment(10_100, true, Bytes::from_static(b"b"))
            .await
            .unwrap();

        let content = m3u8.generate(false);
        assert!(content.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ALLOW-CACHE:NO\n"));
        //target duration is the ceiling of the longest segment
        assert!(content.contains("#EXT-X-TARGETDURATION:11"));
        assert!(content.contains("#EXT-X-MEDIA-SEQUENCE:0"));
        assert!(content.contains("#EXTINF:9.500,\n0.ts"));
        assert!(content.contains("#EXT-X-DISCONTINUITY\n#EXTINF:10.100,\n1.ts"));
        assert!(!content.contains("#EXT-X-ENDLIST"));
    }

    #[tokio::test]
    async fn test_endlist_written_on_end() {
        let mut m3u8 = playlist();
        m3u8.add_segment(10_000, false, Bytes::from_static(b"a"))
            .await
            .unwrap();
        assert!(m3u8.generate(true).ends_with("#EXT-X-ENDLIST\n"));
    }

    #[tokio::test]
    async fn test_segment_files_written() {
        let storage = Arc::new(MemoryStorage::new());
        let mut m3u8 = M3u8::new("live", "foo", 10_000, 30_000, storage.clone());
        m3u8.add_segment(10_000, false, Bytes::from_static(b"data"))
            .await
            .unwrap();

        assert_eq!(
            storage.read("live/foo/0.ts").await.unwrap(),
            Bytes::from_static(b"data")
        );
        assert!(storage.exists("live/foo.m3u8").await.unwrap());
    }
}
