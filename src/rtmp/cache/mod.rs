pub mod errors;
pub mod gop;

use {
    bytes::{Bytes, BytesMut},
    crate::bytesio::bytes_reader::BytesReader,
    crate::flv::define::{
        aac_packet_type, avc_packet_type, frame_type, u8_2_avc_level, u8_2_avc_profile,
        AvcCodecId, SoundFormat,
    },
    crate::flv::mpeg4_aac::Mpeg4AacProcessor,
    crate::flv::mpeg4_avc::Mpeg4AvcProcessor,
    crate::flv::define::AacProfile,
    crate::h264::SpsParser,
    crate::streamhub::define::{FrameData, StatisticData, StatisticDataSender},
    crate::streamhub::utils::TimestampFixer,
    errors::CacheError,
    gop::Gops,
};

/// Per-source cache of everything a fresh subscriber needs before the
/// live tail: metadata, the two sequence headers, and the bounded GOP
/// window. Also owns the source's timestamp correction, so cached and
/// live frames share one contiguous timeline.
pub struct StreamCache {
    metadata: Option<FrameData>,
    audio_seq: Option<FrameData>,
    video_seq: Option<FrameData>,
    gops: Gops,
    fixer: TimestampFixer,
    statistic_sender: Option<StatisticDataSender>,
    //audio-only sources bypass the GOP cache entirely
    has_video: bool,
}

impl StreamCache {
    #[must_use]
    pub fn new(gop_num: usize, atc_threshold_ms: u64) -> Self {
        Self {
            metadata: None,
            audio_seq: None,
            video_seq: None,
            gops: Gops::new(gop_num),
            fixer: TimestampFixer::new(atc_threshold_ms),
            statistic_sender: None,
            has_video: false,
        }
    }

    pub fn set_statistic_sender(&mut self, sender: StatisticDataSender) {
        self.statistic_sender = Some(sender);
    }

    fn send_statistic(&self, data: StatisticData) {
        if let Some(sender) = &self.statistic_sender {
            if sender.try_send(data).is_err() {
                tracing::debug!("statistics channel full or closed");
            }
        }
    }

    /// Metadata (`onMetaData`) replaces any previous script object.
    pub fn save_metadata(&mut self, data: &Bytes, wire_timestamp: u32) -> u64 {
        let timestamp = self.fixer.correct(wire_timestamp);
        self.metadata = Some(FrameData::MetaData {
            timestamp,
            data: data.clone(),
        });
        timestamp
    }

    /// Feeds one audio tag body; absorbs sequence headers and caches
    /// everything else in the GOP window. Returns the corrected
    /// timestamp.
    pub fn save_audio(&mut self, data: &Bytes, wire_timestamp: u32) -> Result<u64, CacheError> {
        let timestamp = self.fixer.correct(wire_timestamp);
        let frame = FrameData::Audio {
            timestamp,
            data: data.clone(),
        };

        if is_aac_sequence_header(data) {
            self.parse_audio_codec_info(data)?;
            self.audio_seq = Some(frame);
            return Ok(timestamp);
        }

        //audio frames ride the GOP cache only when the source carries
        //video; a pure-audio stream replays nothing but its headers
        if self.has_video {
            self.gops.save_frame_data(frame, false);
        }
        Ok(timestamp)
    }

    /// Feeds one video tag body; same contract as `save_audio`.
    pub fn save_video(&mut self, data: &Bytes, wire_timestamp: u32) -> Result<u64, CacheError> {
        self.has_video = true;
        let timestamp = self.fixer.correct(wire_timestamp);
        let frame = FrameData::Video {
            timestamp,
            data: data.clone(),
        };

        if is_avc_sequence_header(data) {
            self.parse_video_codec_info(data)?;
            self.video_seq = Some(frame);
            return Ok(timestamp);
        }

        self.gops.save_frame_data(frame, is_video_keyframe(data));
        Ok(timestamp)
    }

    fn parse_audio_codec_info(&mut self, data: &Bytes) -> Result<(), CacheError> {
        let mut processor = Mpeg4AacProcessor::new();
        let body = BytesMut::from(&data[2..]);
        if body.len() < 2 {
            return Ok(());
        }
        processor.extend_data(body)?.audio_specific_config_load()?;

        let aac = &processor.mpeg4_aac;
        let profile = match aac.profile {
            1 => AacProfile::Main,
            2 => AacProfile::LC,
            3 => AacProfile::SSR,
            _ => AacProfile::Reserved,
        };
        self.send_statistic(StatisticData::AudioCodec {
            sound_format: SoundFormat::AAC,
            profile,
            samplerate: aac.sampling_frequency,
            channels: aac.channel_configuration,
        });
        Ok(())
    }

    fn parse_video_codec_info(&mut self, data: &Bytes) -> Result<(), CacheError> {
        if data.len() < 5 {
            return Ok(());
        }
        let mut processor = Mpeg4AvcProcessor::new();
        //skip frame/codec flags, packet type and composition time
        let mut reader = BytesReader::new(BytesMut::from(&data[5..]));
        processor.decoder_configuration_record_load(&mut reader)?;

        let Some(sps) = processor.mpeg4_avc.first_sps() else {
            return Ok(());
        };
        let info = SpsParser::parse(sps.clone())?;

        self.send_statistic(StatisticData::VideoCodec {
            codec: AvcCodecId::H264,
            profile: u8_2_avc_profile(info.profile_idc),
            level: u8_2_avc_level(info.level_idc),
            width: info.width,
            height: info.height,
        });
        Ok(())
    }

    /// The cold-start prefix in replay order: metadata, audio sequence
    /// header, video sequence header, then the cached GOPs.
    #[must_use]
    pub fn prior_data(&self) -> Vec<FrameData> {
        let mut frames = Vec::new();
        if let Some(metadata) = &self.metadata {
            frames.push(metadata.clone());
        }
        if let Some(audio_seq) = &self.audio_seq {
            frames.push(audio_seq.clone());
        }
        if let Some(video_seq) = &self.video_seq {
            frames.push(video_seq.clone());
        }
        if self.gops.setted() {
            for gop in self.gops.get_gops() {
                frames.extend_from_slice(gop.frame_data());
            }
        }
        frames
    }
}

#[must_use]
pub fn is_avc_sequence_header(data: &Bytes) -> bool {
    data.len() > 1
        && (data[0] >> 4) == frame_type::KEY_FRAME
        && data[1] == avc_packet_type::AVC_SEQHDR
}

#[must_use]
pub fn is_aac_sequence_header(data: &Bytes) -> bool {
    data.len() > 1
        && (data[0] >> 4) == SoundFormat::AAC as u8
        && data[1] == aac_packet_type::AAC_SEQHDR
}

#[must_use]
pub fn is_video_keyframe(data: &Bytes) -> bool {
    data.len() > 1
        && (data[0] >> 4) == frame_type::KEY_FRAME
        && data[1] == avc_packet_type::AVC_NALU
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_seq_header() -> Bytes {
        //640x480 baseline
        let sps: &[u8] = &[0x67, 0x42, 0xc0, 0x1e, 0xf4, 0x05, 0x01, 0xec, 0x80];
        let pps: &[u8] = &[0x68, 0xce, 0x38, 0x80];
        let mut body = vec![0x17, 0x00, 0x00, 0x00, 0x00];
        body.extend_from_slice(&[0x01, 0x42, 0xc0, 0x1e, 0xff, 0xe1]);
        body.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        body.extend_from_slice(sps);
        body.push(0x01);
        body.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        body.extend_from_slice(pps);
        Bytes::from(body)
    }

    fn keyframe() -> Bytes {
        Bytes::from_static(&[0x17, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x65, 0x88])
    }

    fn inter_frame() -> Bytes {
        Bytes::from_static(&[0x27, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x41, 0x9a])
    }

    #[test]
    fn test_prior_data_replay_order() {
        let mut cache = StreamCache::new(1, 90_000);

        cache.save_video(&keyframe(), 0).unwrap();
        cache.save_metadata(&Bytes::from_static(b"\x02\x00\x0a@setDataFrame"), 0);
        cache
            .save_audio(&Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]), 0)
            .unwrap();
        cache.save_video(&video_seq_header(), 0).unwrap();
        cache.save_video(&inter_frame(), 33).unwrap();

        let frames = cache.prior_data();
        assert!(matches!(frames[0], FrameData::MetaData { .. }));
        assert!(matches!(frames[1], FrameData::Audio { .. }));
        assert!(matches!(frames[2], FrameData::Video { .. }));
        //gop follows, starting at the keyframe
        match &frames[3] {
            FrameData::Video { data, .. } => assert!(is_video_keyframe(data)),
            _ => panic!("expected cached keyframe"),
        }
        assert_eq!(frames.len(), 5);
    }

    #[test]
    fn test_sequence_headers_not_in_gop() {
        let mut cache = StreamCache::new(1, 90_000);
        cache.save_video(&video_seq_header(), 0).unwrap();
        cache.save_video(&keyframe(), 10).unwrap();

        let frames = cache.prior_data();
        //video seq header once, then the keyframe
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_timeline_rebase_applies_to_cache_and_return() {
        let mut cache = StreamCache::new(1, 90_000);
        cache.save_video(&keyframe(), 1_000_000).unwrap();
        //publisher restarted at 50
        let corrected = cache.save_video(&keyframe(), 50).unwrap();
        assert_eq!(corrected, 1_000_001);
    }

    #[test]
    fn test_audio_only_stream_bypasses_gop_cache() {
        let mut cache = StreamCache::new(1, 90_000);
        cache
            .save_audio(&Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]), 0)
            .unwrap();
        for i in 0..50_u32 {
            cache
                .save_audio(&Bytes::from_static(&[0xAF, 0x01, 0x21, 0x00, 0x49]), i * 23)
                .unwrap();
        }

        //only the audio sequence header replays, no buffered frames
        let frames = cache.prior_data();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            FrameData::Audio { data, .. } => assert!(is_aac_sequence_header(data)),
            _ => panic!("expected audio sequence header"),
        }
    }

    #[test]
    fn test_audio_cached_once_video_appears() {
        let mut cache = StreamCache::new(1, 90_000);
        cache
            .save_audio(&Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]), 0)
            .unwrap();
        cache.save_video(&keyframe(), 10).unwrap();
        cache
            .save_audio(&Bytes::from_static(&[0xAF, 0x01, 0x21, 0x00, 0x49]), 23)
            .unwrap();

        //audio sh, then the gop holding the keyframe and the audio frame
        let frames = cache.prior_data();
        assert_eq!(frames.len(), 3);
        assert!(matches!(frames[1], FrameData::Video { .. }));
        assert!(matches!(frames[2], FrameData::Audio { .. }));
    }

    #[test]
    fn test_gop_cache_disabled_keeps_sequence_headers_only() {
        let mut cache = StreamCache::new(0, 90_000);
        cache.save_video(&video_seq_header(), 0).unwrap();
        cache.save_video(&keyframe(), 10).unwrap();
        cache.save_video(&inter_frame(), 43).unwrap();

        let frames = cache.prior_data();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], FrameData::Video { .. }));
    }
}
