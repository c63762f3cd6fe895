use {
    super::errors::{DashError, DashErrorValue},
    super::mpd::{AudioTrackInfo, Mpd, TimelineSegment, VideoTrackInfo},
    bytes::{Bytes, BytesMut},
    crate::bytesio::bytes_reader::BytesReader,
    crate::flv::mpeg4_aac::Mpeg4AacProcessor,
    crate::flv::mpeg4_avc::Mpeg4AvcProcessor,
    crate::fmp4::{
        InitSegmentWriter, MediaSegmentWriter, Sample, TrackConfig, AUDIO_TRACK_ID,
        VIDEO_TRACK_ID,
    },
    crate::h264::SpsParser,
    crate::rtmp::cache::{is_aac_sequence_header, is_avc_sequence_header, is_video_keyframe},
    crate::storage::SegmentStorage,
    crate::streamhub::define::{
        BroadcastEvent, BroadcastEventReceiver, FrameData, FrameDataReceiver, NotifyInfo,
        StreamHubEvent, StreamHubEventSender, SubscribeType, SubscriberInfo,
    },
    crate::streamhub::stream::StreamIdentifier,
    crate::streamhub::utils::Uuid,
    std::sync::Arc,
    std::time::{Duration, Instant},
    tokio::sync::oneshot,
    tokio_util::sync::CancellationToken,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback per-sample durations until the next sample pins them down.
const DEFAULT_VIDEO_SAMPLE_MS: u32 = 33;
const DEFAULT_AUDIO_SAMPLE_MS: u32 = 23;

#[derive(Debug, Clone)]
pub struct DashConfig {
    pub fragment_ms: i64,
    /// Segments listed per track; also gates the first manifest.
    pub window_size: usize,
    pub update_period_secs: u64,
    pub cleanup_delay: Duration,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            fragment_ms: 10_000,
            window_size: 5,
            update_period_secs: 30,
            cleanup_delay: Duration::from_secs(90),
        }
    }
}

/// Watches the hub for publishes and runs one DASH handler per live
/// stream.
pub struct DashRemuxer {
    client_event_consumer: BroadcastEventReceiver,
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
    config: DashConfig,
    cancel_token: CancellationToken,
    handler_tasks: tokio::task::JoinSet<()>,
}

impl DashRemuxer {
    #[must_use]
    pub fn new(
        client_event_consumer: BroadcastEventReceiver,
        event_producer: StreamHubEventSender,
        storage: Arc<dyn SegmentStorage>,
        config: DashConfig,
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

    pub async fn run(&mut self) -> Result<(), DashError> {
        tracing::info!("dash remuxer started");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    self.handler_tasks.abort_all();
                    while self.handler_tasks.join_next().await.is_some() {}
                    return Ok(());
                }
                Some(result) = self.handler_tasks.join_next(), if !self.handler_tasks.is_empty() => {
                    if let Err(err) = result {
                        if !err.is_cancelled() {
                            tracing::error!("dash handler task panicked: {err}");
                        }
                    }
                    continue;
                }
                result = self.client_event_consumer.recv() => {
                    match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("dash remuxer lagged {n} hub events");
                            continue;
                        }
                        Err(err @ tokio::sync::broadcast::error::RecvError::Closed) => {
                            return Err(DashError {
                                value: DashErrorValue::ReceiveError(err),
                            });
                        }
                    }
                }
            };

            if let BroadcastEvent::Publish { identifier } = event {
                tracing::info!(identifier = %identifier, "dash remuxer: new stream");
                let handler = DashStreamHandler::new(
                    identifier,
                    self.event_producer.clone(),
                    self.storage.clone(),
                    self.config.clone(),
                );
                self.handler_tasks.spawn(async move {
                    if let Err(err) = handler.run().await {
                        tracing::error!("dash stream handler error: {err}");
                    }
                });
            }
        }
    }
}

struct DashStreamHandler {
    identifier: StreamIdentifier,
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
    config: DashConfig,
    subscriber_id: Uuid,
}

impl DashStreamHandler {
    fn new(
        identifier: StreamIdentifier,
        event_producer: StreamHubEventSender,
        storage: Arc<dyn SegmentStorage>,
        config: DashConfig,
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
            sub_type: SubscribeType::DashRemux,
            notify_info: NotifyInfo::default(),
        }
    }

    async fn subscribe(&self) -> Result<FrameDataReceiver, DashError> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.event_producer
            .try_send(StreamHubEvent::Subscribe {
                identifier: self.identifier.clone(),
                info: self.subscriber_info(),
                result_sender,
            })
            .map_err(|_| DashError {
                value: DashErrorValue::StreamHubEventSendError,
            })?;

        let (receiver, _statistic_sender) =
            result_receiver.await.map_err(|_| DashError {
                value: DashErrorValue::StreamHubEventSendError,
            })??;
        Ok(receiver)
    }

    fn unsubscribe(&self) {
        let event = StreamHubEvent::UnSubscribe {
            identifier: self.identifier.clone(),
            info: self.subscriber_info(),
        };
        if self.event_producer.try_send(event).is_err() {
            tracing::debug!("dash unsubscribe: hub event channel unavailable");
        }
    }

    async fn run(self) -> Result<(), DashError> {
        let mut receiver = self.subscribe().await?;
        let mut processor = DashProcessor::new(
            &self.identifier.app_name,
            &self.identifier.stream_name,
            self.storage.clone(),
            self.config.clone(),
        );

        loop {
            match tokio::time::timeout(RECV_TIMEOUT, receiver.recv()).await {
                Ok(Some(frame)) => processor.process_frame(frame).await?,
                Ok(None) => break,
                Err(_) => {
                    tracing::info!(identifier = %self.identifier, "dash: source idle, ending");
                    break;
                }
            }
        }

        processor.finish().await?;
        self.unsubscribe();

        tokio::time::sleep(self.config.cleanup_delay).await;
        processor.delete_manifest().await?;
        Ok(())
    }
}

/// Buffered samples for the fragment currently being assembled.
#[derive(Default)]
struct FragmentBuffer {
    start_dts: Option<i64>,
    dts_list: Vec<i64>,
    cts_list: Vec<i32>,
    keyframes: Vec<bool>,
    payload: BytesMut,
    sizes: Vec<u32>,
}

impl FragmentBuffer {
    fn push(&mut self, dts: i64, cts: i32, keyframe: bool, payload: &[u8]) {
        self.start_dts.get_or_insert(dts);
        self.dts_list.push(dts);
        self.cts_list.push(cts);
        self.keyframes.push(keyframe);
        self.sizes.push(payload.len() as u32);
        self.payload.extend_from_slice(payload);
    }

    fn duration_since_start(&self, dts: i64) -> i64 {
        self.start_dts.map_or(0, |start| dts - start)
    }

    fn is_empty(&self) -> bool {
        self.dts_list.is_empty()
    }

    /// Consumes the buffer into trun samples; the cut DTS pins the
    /// last sample's duration.
    fn take(&mut self, cut_dts: i64, default_duration: u32) -> (i64, Vec<Sample>, BytesMut) {
        let start = self.start_dts.take().unwrap_or(0);
        let mut samples = Vec::with_capacity(self.dts_list.len());

        for index in 0..self.dts_list.len() {
            let next_dts = self
                .dts_list
                .get(index + 1)
                .copied()
                .unwrap_or(cut_dts.max(self.dts_list[index]));
            let duration = (next_dts - self.dts_list[index]).max(1) as u32;
            let duration = if next_dts == self.dts_list[index] {
                default_duration
            } else {
                duration
            };
            samples.push(Sample {
                duration_ms: duration,
                size: self.sizes[index],
                is_keyframe: self.keyframes[index],
                composition_offset_ms: self.cts_list[index],
            });
        }

        let payload = std::mem::take(&mut self.payload);
        self.dts_list.clear();
        self.cts_list.clear();
        self.keyframes.clear();
        self.sizes.clear();

        (start, samples, payload)
    }
}

struct DashProcessor {
    storage: Arc<dyn SegmentStorage>,
    config: DashConfig,

    segment_dir: String,
    manifest_key: String,
    base_url: String,

    mpd: Mpd,
    last_mpd_write: Option<Instant>,

    video_sh: Option<Bytes>,
    audio_sh: Option<Bytes>,

    video_fragment: FragmentBuffer,
    audio_fragment: FragmentBuffer,
    video_sequence: u32,
    audio_sequence: u32,
}

impl DashProcessor {
    fn new(
        app_name: &str,
        stream_name: &str,
        storage: Arc<dyn SegmentStorage>,
        config: DashConfig,
    ) -> Self {
        let mpd = Mpd::new(config.window_size, config.update_period_secs);
        Self {
            storage,
            config,
            segment_dir: format!("{app_name}/{stream_name}"),
            manifest_key: format!("{app_name}/{stream_name}.mpd"),
            base_url: stream_name.to_string(),
            mpd,
            last_mpd_write: None,
            video_sh: None,
            audio_sh: None,
            video_fragment: FragmentBuffer::default(),
            audio_fragment: FragmentBuffer::default(),
            video_sequence: 0,
            audio_sequence: 0,
        }
    }

    async fn process_frame(&mut self, frame: FrameData) -> Result<(), DashError> {
        match frame {
            FrameData::Video { timestamp, data } => {
                if is_avc_sequence_header(&data) {
                    self.on_video_sequence_header(&data).await?;
                    return Ok(());
                }
                if data.len() < 5 || self.video_sh.is_none() {
                    return Ok(());
                }

                let dts = timestamp as i64;
                self.mpd.set_availability_start(timestamp);

                let keyframe = is_video_keyframe(&data);
                if keyframe
                    && !self.video_fragment.is_empty()
                    && self.video_fragment.duration_since_start(dts) >= self.config.fragment_ms
                {
                    self.flush_video(dts).await?;
                }

                //composition time is a signed 24-bit offset
                let cts_raw = (i32::from(data[2]) << 16)
                    | (i32::from(data[3]) << 8)
                    | i32::from(data[4]);
                let cts = (cts_raw << 8) >> 8;
                self.video_fragment.push(dts, cts, keyframe, &data[5..]);
            }
            FrameData::Audio { timestamp, data } => {
                if is_aac_sequence_header(&data) {
                    self.on_audio_sequence_header(&data).await?;
                    return Ok(());
                }
                if data.len() < 2 || self.audio_sh.is_none() {
                    return Ok(());
                }

                let dts = timestamp as i64;
                self.mpd.set_availability_start(timestamp);

                if !self.audio_fragment.is_empty()
                    && self.audio_fragment.duration_since_start(dts) >= self.config.fragment_ms
                {
                    self.flush_audio(dts).await?;
                }

                self.audio_fragment.push(dts, 0, false, &data[2..]);
            }
            FrameData::MetaData { .. } => {}
        }
        Ok(())
    }

    /// A fresh or changed sequence header refreshes the init segment.
    async fn on_video_sequence_header(&mut self, data: &Bytes) -> Result<(), DashError> {
        if self.video_sh.as_ref() == Some(data) {
            return Ok(());
        }
        self.video_sh = Some(data.clone());

        let avc_config = BytesMut::from(&data[5..]);
        let mut processor = Mpeg4AvcProcessor::new();
        let mut reader = BytesReader::new(avc_config.clone());
        processor
            .decoder_configuration_record_load(&mut reader)
            .map_err(DashError::from)?;

        let (width, height) = match processor.mpeg4_avc.first_sps() {
            Some(sps) => {
                let info = SpsParser::parse(sps.clone())?;
                (info.width, info.height)
            }
            None => (0, 0),
        };

        let track_config = TrackConfig::Video {
            width,
            height,
            avc_config,
        };
        let init = InitSegmentWriter::write(&track_config).map_err(DashError::from)?;
        self.storage
            .write_atomic(&format!("{}/video-init.mp4", self.segment_dir), init.freeze())
            .await?;

        self.mpd.set_video_info(VideoTrackInfo {
            codec_string: track_config.codec_string(),
            width,
            height,
        });
        tracing::info!(dir = %self.segment_dir, "dash: refreshed video init segment");
        Ok(())
    }

    async fn on_audio_sequence_header(&mut self, data: &Bytes) -> Result<(), DashError> {
        if self.audio_sh.as_ref() == Some(data) {
            return Ok(());
        }
        self.audio_sh = Some(data.clone());

        let audio_config = BytesMut::from(&data[2..]);
        let mut processor = Mpeg4AacProcessor::new();
        processor
            .extend_data(audio_config.clone())
            .and_then(Mpeg4AacProcessor::audio_specific_config_load)
            .map_err(DashError::from)?;

        let sample_rate = processor.mpeg4_aac.sampling_frequency;
        let channels = processor.mpeg4_aac.channel_configuration;

        let track_config = TrackConfig::Audio {
            channels,
            sample_rate,
            audio_config,
        };
        let init = InitSegmentWriter::write(&track_config).map_err(DashError::from)?;
        self.storage
            .write_atomic(&format!("{}/audio-init.mp4", self.segment_dir), init.freeze())
            .await?;

        self.mpd.set_audio_info(AudioTrackInfo {
            codec_string: track_config.codec_string(),
            sample_rate,
            channels,
        });
        tracing::info!(dir = %self.segment_dir, "dash: refreshed audio init segment");
        Ok(())
    }

    async fn flush_video(&mut self, cut_dts: i64) -> Result<(), DashError> {
        let (start, samples, payload) =
            self.video_fragment.take(cut_dts, DEFAULT_VIDEO_SAMPLE_MS);
        if samples.is_empty() {
            return Ok(());
        }

        self.video_sequence += 1;
        let segment = MediaSegmentWriter::write(
            VIDEO_TRACK_ID,
            self.video_sequence,
            start.max(0) as u64,
            &samples,
            &payload,
        )?;

        let duration_ms: u64 = samples.iter().map(|s| u64::from(s.duration_ms)).sum();
        let key = format!("{}/video-{}.m4s", self.segment_dir, start.max(0));
        self.storage.write(&key, segment.freeze()).await?;

        self.mpd.push_video_segment(TimelineSegment {
            start_ms: start.max(0) as u64,
            duration_ms,
        });
        tracing::debug!(key = %key, duration_ms, "dash: wrote video segment");

        self.maybe_write_manifest(false).await
    }

    async fn flush_audio(&mut self, cut_dts: i64) -> Result<(), DashError> {
        let (start, samples, payload) =
            self.audio_fragment.take(cut_dts, DEFAULT_AUDIO_SAMPLE_MS);
        if samples.is_empty() {
            return Ok(());
        }

        self.audio_sequence += 1;
        let segment = MediaSegmentWriter::write(
            AUDIO_TRACK_ID,
            self.audio_sequence,
            start.max(0) as u64,
            &samples,
            &payload,
        )?;

        let duration_ms: u64 = samples.iter().map(|s| u64::from(s.duration_ms)).sum();
        let key = format!("{}/audio-{}.m4s", self.segment_dir, start.max(0));
        self.storage.write(&key, segment.freeze()).await?;

        self.mpd.push_audio_segment(TimelineSegment {
            start_ms: start.max(0) as u64,
            duration_ms,
        });
        tracing::debug!(key = %key, duration_ms, "dash: wrote audio segment");

        self.maybe_write_manifest(false).await
    }

    /// Refreshes the manifest, rate-limited to the update period.
    async fn maybe_write_manifest(&mut self, force: bool) -> Result<(), DashError> {
        let due = force
            || self
                .last_mpd_write
                .is_none_or(|last| last.elapsed().as_secs() >= self.config.update_period_secs);
        if !due {
            return Ok(());
        }

        let Some(manifest) = self.mpd.generate(&self.base_url) else {
            return Ok(());
        };
        self.storage
            .write_atomic(&self.manifest_key, Bytes::from(manifest))
            .await?;
        self.last_mpd_write = Some(Instant::now());
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), DashError> {
        //flush what is buffered; the cut timestamps extend one nominal
        //frame past the last sample
        if let Some(last) = self.video_fragment.dts_list.last().copied() {
            self.flush_video(last + i64::from(DEFAULT_VIDEO_SAMPLE_MS))
                .await?;
        }
        if let Some(last) = self.audio_fragment.dts_list.last().copied() {
            self.flush_audio(last + i64::from(DEFAULT_AUDIO_SAMPLE_MS))
                .await?;
        }
        self.maybe_write_manifest(true).await
    }

    async fn delete_manifest(&self) -> Result<(), DashError> {
        self.storage.delete(&self.manifest_key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn video_sequence_header() -> FrameData {
        //1280x720 high profile
        let sps: &[u8] = &[0x67, 0x64, 0x00, 0x1f, 0xac, 0xe8, 0x05, 0x00, 0x5b, 0x90];
        let pps: &[u8] = &[0x68, 0xeb, 0xec, 0xb2, 0x2c];
        let mut body = vec![0x17, 0x00, 0x00, 0x00, 0x00];
        body.extend_from_slice(&[0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1]);
        body.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        body.extend_from_slice(sps);
        body.push(0x01);
        body.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        body.extend_from_slice(pps);
        FrameData::Video {
            timestamp: 0,
            data: Bytes::from(body),
        }
    }

    fn video_frame(timestamp: u64, keyframe: bool) -> FrameData {
        let flags: u8 = if keyframe { 0x17 } else { 0x27 };
        let nalu: &[u8] = if keyframe {
            &[0x65, 0x88, 0x84, 0x00]
        } else {
            &[0x41, 0x9a, 0x24, 0x6c]
        };
        let mut body = vec![flags, 0x01, 0x00, 0x00, 0x00];
        body.extend_from_slice(&(nalu.len() as u32).to_be_bytes());
        body.extend_from_slice(nalu);
        FrameData::Video {
            timestamp,
            data: Bytes::from(body),
        }
    }

    fn processor(storage: Arc<MemoryStorage>) -> DashProcessor {
        DashProcessor::new(
            "live",
            "foo",
            storage,
            DashConfig {
                fragment_ms: 2_000,
                window_size: 2,
                update_period_secs: 0,
                cleanup_delay: Duration::from_secs(0),
            },
        )
    }

    #[tokio::test]
    async fn test_init_segment_written_on_sequence_header() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor
            .process_frame(video_sequence_header())
            .await
            .unwrap();
        assert!(storage.exists("live/foo/video-init.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_video_segments_named_by_start_time() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor
            .process_frame(video_sequence_header())
            .await
            .unwrap();
        //two GOPs: keyframes at 0 and 2000
        processor.process_frame(video_frame(0, true)).await.unwrap();
        for i in 1..60_u64 {
            processor
                .process_frame(video_frame(i * 33, false))
                .await
                .unwrap();
        }
        processor
            .process_frame(video_frame(2_000, true))
            .await
            .unwrap();

        assert!(storage.exists("live/foo/video-0.m4s").await.unwrap());
    }

    #[tokio::test]
    async fn test_manifest_gated_on_window() {
        let storage = Arc::new(MemoryStorage::new());
        let mut processor = processor(storage.clone());

        processor
            .process_frame(video_sequence_header())
            .await
            .unwrap();
        //fill two windows' worth of segments: keyframes every 2s
        for gop in 0..3_u64 {
            processor
                .process_frame(video_frame(gop * 2_000, true))
                .await
                .unwrap();
            for i in 1..10_u64 {
                processor
                    .process_frame(video_frame(gop * 2_000 + i * 33, false))
                    .await
                    .unwrap();
            }
        }
        processor.finish().await.unwrap();

        assert!(storage.exists("live/foo.mpd").await.unwrap());
        let manifest =
            String::from_utf8(storage.read("live/foo.mpd").await.unwrap().to_vec()).unwrap();
        assert!(manifest.contains("video-init.mp4") || manifest.contains("$RepresentationID$-init.mp4"));
    }
}
