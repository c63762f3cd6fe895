use {
    super::errors::{HlsError, HlsErrorValue},
    super::playlist::M3u8,
    bytes::{Bytes, BytesMut},
    crate::flv::define::frame_type,
    crate::flv::demuxer::{FlvAudioTagDemuxer, FlvVideoTagDemuxer},
    crate::mpegts::define::{epsi_stream_type, MPEG_FLAG_IDR_FRAME},
    crate::mpegts::TsMuxer,
    crate::rtmp::cache::{is_aac_sequence_header, is_avc_sequence_header},
    crate::storage::SegmentStorage,
    crate::streamhub::define::{
        BroadcastEvent, BroadcastEventReceiver, FrameData, FrameDataReceiver, NotifyInfo,
        StreamHubEvent, StreamHubEventSender, SubscribeType, SubscriberInfo,
    },
    crate::streamhub::stream::StreamIdentifier,
    crate::streamhub::utils::Uuid,
    std::sync::Arc,
    std::time::Duration,
    tokio::sync::oneshot,
    tokio_util::sync::CancellationToken,
};

/// Idle window after which a silent source is treated as ended.
const RECV_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HlsConfig {
    pub fragment_ms: i64,
    pub window_ms: i64,
    /// Close the playlist with EXT-X-ENDLIST when the source
    /// unpublishes; otherwise it is left open and deleted after the
    /// cleanup delay.
    pub endlist_on_unpublish: bool,
    /// Emit a discontinuity when an audio-only stream grows a video
    /// track (or the reverse).
    pub discontinuity_on_av_change: bool,
    /// A DTS jump beyond this forces a segment cut with a
    /// discontinuity marker.
    pub gap_threshold_ms: i64,
    /// How long finished playlists and expired segments stay on disk.
    pub cleanup_delay: Duration,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            fragment_ms: 10_000,
            window_ms: 60_000,
            endlist_on_unpublish: true,
            discontinuity_on_av_change: true,
            gap_threshold_ms: 10_000,
            cleanup_delay: Duration::from_secs(90),
        }
    }
}

/// Watches the hub for publishes and runs one segmenting handler per
/// live stream.
pub struct HlsRemuxer {
    client_event_consumer: BroadcastEventReceiver,
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
    config: HlsConfig,
    cancel_token: CancellationToken,
    handler_tasks: tokio::task::JoinSet<()>,
}

impl HlsRemuxer {
    #[must_use]
    pub fn new(
        client_event_consumer: BroadcastEventReceiver,
        event_producer: StreamHubEventSender,
        storage: Arc<dyn SegmentStorage>,
        config: HlsConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client_event_consumer,
            event_producer,
            storage,
            config,
            cancel_token,
            handler_tasks: tokio::task::JoinSet::new(),
        }
    }

    pub async fn run(&mut self) -> Result<(), HlsError> {
        tracing::info!("hls remuxer started");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    tracing::info!(
                        "hls remuxer shutting down, aborting {} handlers",
                        self.handler_tasks.len()
                    );
                    self.handler_tasks.abort_all();
                    while self.handler_tasks.join_next().await.is_some() {}
                    return Ok(());
                }
                Some(result) = self.handler_tasks.join_next(), if !self.handler_tasks.is_empty() => {
                    if let Err(err) = result {
                        if !err.is_cancelled() {
                            tracing::error!("hls handler task panicked: {err}");
                        }
                    }
                    continue;
                }
                result = self.client_event_consumer.recv() => {
                    match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("hls remuxer lagged {n} hub events");
                            continue;
                        }
                        Err(err @ tokio::sync::broadcast::error::RecvError::Closed) => {
                            return Err(HlsError {
                                value: HlsErrorValue::ReceiveError(err),
                            });
                        }
                    }
                }
            };

            if let BroadcastEvent::Publish { identifier } = event {
                tracing::info!(identifier = %identifier, "hls remuxer: new stream");
                let handler = HlsStreamHandler::new(
                    identifier,
                    self.event_producer.clone(),
                    self.storage.clone(),
                    self.config.clone(),
                );
                self.handler_tasks.spawn(async move {
                    if let Err(err) = handler.run().await {
                        tracing::error!("hls stream handler error: {err}");
                    }
                });
            }
        }
    }
}

/// Segments one live stream into MPEG-TS files plus a sliding
/// playlist.
struct HlsStreamHandler {
    identifier: StreamIdentifier,
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
    config: HlsConfig,
    subscriber_id: Uuid,
}

impl HlsStreamHandler {
    fn new(
        identifier: StreamIdentifier,
        event_producer: StreamHubEventSender,
        storage: Arc<dyn SegmentStorage>,
        config: HlsConfig,
    ) -> Self {
        Self {
            identifier,
            event_producer,
            storage,
            config,
            subscriber_id: Uuid::new(),
        }
    }

    fn subscriber_info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.subscriber_id,
            sub_type: SubscribeType::HlsRemux,
            notify_info: NotifyInfo::default(),
        }
    }

    async fn subscribe(&self) -> Result<FrameDataReceiver, HlsError> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.event_producer
            .try_send(StreamHubEvent::Subscribe {
                identifier: self.identifier.clone(),
                info: self.subscriber_info(),
                result_sender,
            })
            .map_err(|_| HlsError {
                value: HlsErrorValue::StreamHubEventSendError,
            })?;

        let (receiver, _statistic_sender) =
            result_receiver.await.map_err(|_| HlsError {
                value: HlsErrorValue::StreamHubEventSendError,
            })??;
        Ok(receiver)
    }

    fn unsubscribe(&self) {
        let event = StreamHubEvent::UnSubscribe {
            identifier: self.identifier.clone(),
            info: self.subscriber_info(),
        };
        if self.event_producer.try_send(event).is_err() {
            tracing::debug!("hls unsubscribe: hub event channel unavailable");
        }
    }

    async fn run(self) -> Result<(), HlsError> {
        let mut receiver = self.subscribe().await?;

        let mut processor = StreamProcessor::new(
            &self.identifier.app_name,
            &self.identifier.stream_name,
            self.storage.clone(),
            self.config.clone(),
        )?;

        loop {
            match tokio::time::timeout(RECV_TIMEOUT, receiver.recv()).await {
                Ok(Some(frame)) => processor.process_frame(frame).await?,
                Ok(None) => {
                    tracing::info!(identifier = %self.identifier, "hls: source drained");
                    break;
                }
                Err(_) => {
                    tracing::info!(identifier = %self.identifier, "hls: source idle, ending");
                    break;
                }
            }
        }

        processor.finish().await?;
        self.unsubscribe();

        //leave artifacts around long enough for players to finish
        tokio::time::sleep(self.config.cleanup_delay).await;
        processor.delete_playlist().await?;

        Ok(())
    }
}

struct StreamProcessor {
    config: HlsConfig,

    video_demuxer: FlvVideoTagDemuxer,
    audio_demuxer: FlvAudioTagDemuxer,

    ts_muxer: TsMuxer,
    video_pid: u16,
    audio_pid: u16,

    m3u8: M3u8,

    segment_start_dts: Option<i64>,
    last_dts: i64,
    pending_discontinuity: bool,

    has_video: bool,
    last_video_sh: Option<Bytes>,
    last_audio_sh: Option<Bytes>,
}

impl StreamProcessor {
    fn new(
        app_name: &str,
        stream_name: &str,
        storage: Arc<dyn SegmentStorage>,
        config: HlsConfig,
    ) -> Result<Self, HlsError> {
        let mut ts_muxer = TsMuxer::new();
        let audio_pid = ts_muxer.add_stream(epsi_stream_type::PSI_STREAM_AAC, BytesMut::new())?;
        let video_pid = ts_muxer.add_stream(epsi_stream_type::PSI_STREAM_H264, BytesMut::new())?;

        let m3u8 = M3u8::new(
            app_name,
            stream_name,
            config.fragment_ms,
            config.window_ms,
            storage,
        );

        Ok(Self {
            config,
            video_demuxer: FlvVideoTagDemuxer::new(),
            audio_demuxer: FlvAudioTagDemuxer::new(),
            ts_muxer,
            video_pid,
            audio_pid,
            m3u8,
            segment_start_dts: None,
            last_dts: 0,
            pending_discontinuity: false,
            has_video: false,
            last_video_sh: None,
            last_audio_sh: None,
        })
    }

    async fn process_frame(&mut self, frame: FrameData) -> Result<(), HlsError> {
        match frame {
            FrameData::Video { timestamp, data } => {
                self.observe_video_sequence_header(&data).await?;
                let body = BytesMut::from(&data[..]);
                let Some(video) = self.video_demuxer.demux(timestamp, body)? else {
                    return Ok(());
                };

                self.check_gap(video.dts).await?;

                let is_key = video.frame_type == frame_type::KEY_FRAME;
                if is_key {
                    if let Some(start) = self.segment_start_dts {
                        if video.dts - start >= self.config.fragment_ms {
                            self.finalize_segment(video.dts).await?;
                        }
                    }
                }

                self.segment_start_dts.get_or_insert(video.dts);
                self.last_dts = video.dts;

                let flags = if is_key { MPEG_FLAG_IDR_FRAME } else { 0 };
                self.ts_muxer.write(
                    self.video_pid,
                    video.pts * 90,
                    video.dts * 90,
                    flags,
                    video.data,
                )?;
            }
            FrameData::Audio { timestamp, data } => {
                self.observe_audio_sequence_header(&data);
                let body = BytesMut::from(&data[..]);
                let audio = self.audio_demuxer.demux(timestamp, body)?;
                if !audio.has_data {
                    return Ok(());
                }

                self.check_gap(audio.dts).await?;

                //pure-audio programs cut on audio frame boundaries
                if !self.has_video {
                    if let Some(start) = self.segment_start_dts {
                        if audio.dts - start >= self.config.fragment_ms {
                            self.finalize_segment(audio.dts).await?;
                        }
                    }
                }

                self.segment_start_dts.get_or_insert(audio.dts);
                self.last_dts = audio.dts;

                self.ts_muxer
                    .write(self.audio_pid, audio.pts * 90, audio.dts * 90, 0, audio.data)?;
            }
            FrameData::MetaData { .. } => {}
        }
        Ok(())
    }

    /// Sequence-header parameter changes and audio-only to A/V
    /// transitions mark the next segment discontinuous.
    async fn observe_video_sequence_header(&mut self, data: &Bytes) -> Result<(), HlsError> {
        if is_avc_sequence_header(data) {
            if let Some(previous) = &self.last_video_sh {
                if previous != data {
                    tracing::info!("hls: video codec parameters changed");
                    self.cut_now().await?;
                }
            }
            self.last_video_sh = Some(data.clone());
        }

        if !self.has_video {
            if self.config.discontinuity_on_av_change && self.m3u8.total_emitted() > 0 {
                tracing::info!("hls: audio-only stream grew a video track");
                self.cut_now().await?;
            }
            self.has_video = true;
        }
        Ok(())
    }

    fn observe_audio_sequence_header(&mut self, data: &Bytes) {
        if is_aac_sequence_header(data) {
            if let Some(previous) = &self.last_audio_sh {
                if previous != data {
                    tracing::info!("hls: audio codec parameters changed");
                    self.pending_discontinuity = true;
                }
            }
            self.last_audio_sh = Some(data.clone());
        }
    }

    async fn check_gap(&mut self, dts: i64) -> Result<(), HlsError> {
        if self.segment_start_dts.is_some() && dts - self.last_dts > self.config.gap_threshold_ms
        {
            tracing::warn!(
                gap_ms = dts - self.last_dts,
                "hls: publisher gap, forcing segment cut"
            );
            self.cut_now().await?;
        }
        Ok(())
    }

    /// Closes the current segment immediately and marks the next one
    /// discontinuous.
    async fn cut_now(&mut self) -> Result<(), HlsError> {
        if self.segment_start_dts.is_some() {
            self.finalize_segment(self.last_dts).await?;
            self.segment_start_dts = None;
        }
        self.pending_discontinuity = true;
        Ok(())
    }

    async fn finalize_segment(&mut self, end_dts: i64) -> Result<(), HlsError> {
        let data = self.ts_muxer.get_data();
        let Some(start) = self.segment_start_dts else {
            return Ok(());
        };
        if data.is_empty() {
            return Ok(());
        }

        let duration_ms = (end_dts - start).max(1);
        let discontinuity = self.pending_discontinuity;
        self.pending_discontinuity = false;

        let segment = self
            .m3u8
            .add_segment(duration_ms, discontinuity, data.freeze())
            .await?;
        tracing::debug!(
            key = %segment.key,
            duration_ms,
            discontinuity,
            "hls: wrote segment"
        );

        self.ts_muxer.reset();
        self.segment_start_dts = Some(end_dts);
        Ok(())
    }

    /// Flush on unpublish; optionally close the playlist.
    async fn finish(&mut self) -> Result<(), HlsError> {
        if self.segment_start_dts.is_some_and(|start| self.last_dts > start) {
            self.finalize_segment(self.last_dts).await?;
        }
        self.m3u8
            .write_playlist(self.config.endlist_on_unpublish)
            .await?;
        Ok(())
    }

    async fn delete_playlist(&self) -> Result<(), HlsError> {
        self.m3u8.delete_playlist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn processor(storage: Arc<MemoryStorage>) -> StreamProcessor {
        StreamProcessor::new(
            "live",
            "foo",
            storage,
            HlsConfig {
                fragment_ms: 2_000,
                window_ms: 6_000,
                ..HlsConfig::default()
            },
        )
        .unwrap()
    }

    fn aac_sequence_header() -> FrameData {
        FrameData::Audio {
            timestamp: 0,
            data: Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]),
        }
    }

    fn aac_frame(timestamp: u64) -> FrameData {
        FrameData::Audio {
            timestamp,
            data: Bytes::from_static(&[0xAF, 0x01, 0x21, 0x00, 0x49, 0x90, 0xAA]),
        }
    }

    #[tokio::test]
    async fn test_audio_only_segments_cut_by_duration() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor.process_frame(aac_sequence_header()).await.unwrap();
        for i in 0..220_u64 {
            //~23ms per AAC frame at 44.1kHz
            processor.process_frame(aac_frame(i * 23)).await.unwrap();
        }
        processor.finish().await.unwrap();

        //~5 seconds of audio at 2s fragments: at least 2 full segments
        assert!(processor.m3u8.total_emitted() >= 2);
        assert!(storage.exists("live/foo.m3u8").await.unwrap());
        assert!(storage.exists("live/foo/0.ts").await.unwrap());

        let playlist =
            String::from_utf8(storage.read("live/foo.m3u8").await.unwrap().to_vec()).unwrap();
        assert!(playlist.contains("#EXT-X-ENDLIST"));
    }

    #[tokio::test]
    async fn test_gap_forces_discontinuity() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor.process_frame(aac_sequence_header()).await.unwrap();
        processor.process_frame(aac_frame(0)).await.unwrap();
        processor.process_frame(aac_frame(23)).await.unwrap();
        //a jump far past the gap threshold
        processor.process_frame(aac_frame(60_000)).await.unwrap();
        processor.process_frame(aac_frame(60_023)).await.unwrap();
        processor.finish().await.unwrap();

        let playlist =
            String::from_utf8(storage.read("live/foo.m3u8").await.unwrap().to_vec()).unwrap();
        assert!(playlist.contains("#EXT-X-DISCONTINUITY"));
    }

    #[tokio::test]
    async fn test_playlist_invariant_sequence_accounting() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor.process_frame(aac_sequence_header()).await.unwrap();
        for i in 0..900_u64 {
            processor.process_frame(aac_frame(i * 23)).await.unwrap();
        }
        processor.finish().await.unwrap();

        let m3u8 = &processor.m3u8;
        assert_eq!(
            m3u8.media_sequence() + m3u8.window_len() as u64,
            m3u8.total_emitted()
        );
    }
}
