use super::{
    flv_tag_header::{AudioTagHeader, VideoTagHeader},
    Unmarshal,
};

use {
    super::{
        define::{aac_packet_type, avc_packet_type, AvcCodecId, SoundFormat},
        errors::FlvDemuxerError,
        mpeg4_aac::Mpeg4AacProcessor,
        mpeg4_avc::Mpeg4AvcProcessor,
    },
    bytes::BytesMut,
    crate::bytesio::bytes_reader::BytesReader,
};

#[derive(Default)]
pub struct FlvDemuxerAudioData {
    pub has_data: bool,
    pub sound_format: u8,
    pub dts: i64,
    pub pts: i64,
    pub data: BytesMut,
}

impl FlvDemuxerAudioData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
pub struct FlvDemuxerVideoData {
    pub frame_type: u8,
    pub codec_id: u8,
    pub dts: i64,
    pub pts: i64,
    pub data: BytesMut,
}

/// Unwraps FLV video tag bodies into Annex-B access units for the TS
/// segmenter. Sequence headers are absorbed into the AVC processor and
/// yield `None`.
#[derive(Default)]
pub struct FlvVideoTagDemuxer {
    avc_processor: Mpeg4AvcProcessor,
}

impl FlvVideoTagDemuxer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn avc_processor(&self) -> &Mpeg4AvcProcessor {
        &self.avc_processor
    }

    pub fn demux(
        &mut self,
        timestamp: u64,
        data: BytesMut,
    ) -> Result<Option<FlvDemuxerVideoData>, FlvDemuxerError> {
        let mut reader = BytesReader::new(data);

        let tag_header = VideoTagHeader::unmarshal(&mut reader)?;
        if tag_header.codec_id != AvcCodecId::H264 as u8 {
            tracing::warn!(
                codec_id = tag_header.codec_id,
                "unsupported video codec for transport-stream remux, dropping frame"
            );
            return Ok(None);
        }

        match tag_header.avc_packet_type {
            avc_packet_type::AVC_SEQHDR => {
                self.avc_processor
                    .decoder_configuration_record_load(&mut reader)?;
                Ok(None)
            }
            avc_packet_type::AVC_NALU => {
                let data = self.avc_processor.h264_mp4toannexb(&mut reader)?;
                Ok(Some(FlvDemuxerVideoData {
                    codec_id: AvcCodecId::H264 as u8,
                    pts: timestamp as i64 + i64::from(tag_header.composition_time),
                    dts: timestamp as i64,
                    frame_type: tag_header.frame_type,
                    data,
                }))
            }
            _ => Ok(None),
        }
    }
}

/// Unwraps FLV audio tag bodies into ADTS frames. Sequence headers are
/// absorbed into the AAC processor and yield an empty result.
#[derive(Default)]
pub struct FlvAudioTagDemuxer {
    aac_processor: Mpeg4AacProcessor,
}

impl FlvAudioTagDemuxer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn aac_processor(&self) -> &Mpeg4AacProcessor {
        &self.aac_processor
    }

    pub fn demux(
        &mut self,
        timestamp: u64,
        data: BytesMut,
    ) -> Result<FlvDemuxerAudioData, FlvDemuxerError> {
        let mut reader = BytesReader::new(data);

        let tag_header = AudioTagHeader::unmarshal(&mut reader)?;
        if tag_header.sound_format != SoundFormat::AAC as u8 {
            tracing::warn!(
                sound_format = tag_header.sound_format,
                "unsupported audio codec for transport-stream remux, dropping frame"
            );
            return Ok(FlvDemuxerAudioData::new());
        }

        self.aac_processor
            .extend_data(reader.extract_remaining_bytes())?;

        match tag_header.aac_packet_type {
            aac_packet_type::AAC_SEQHDR => {
                if self.aac_processor.bytes_reader.len() >= 2 {
                    self.aac_processor.audio_specific_config_load()?;
                }
                Ok(FlvDemuxerAudioData::new())
            }
            aac_packet_type::AAC_RAW => {
                self.aac_processor.adts_save()?;
                Ok(FlvDemuxerAudioData {
                    has_data: true,
                    sound_format: tag_header.sound_format,
                    pts: timestamp as i64,
                    dts: timestamp as i64,
                    data: self.aac_processor.bytes_writer.extract_current_bytes(),
                })
            }
            _ => Ok(FlvDemuxerAudioData::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_demux_empty_body_fails() {
        let mut demuxer = FlvVideoTagDemuxer::new();
        assert!(demuxer.demux(0, BytesMut::new()).is_err());
    }

    #[test]
    fn test_video_demux_non_h264_dropped() {
        let mut demuxer = FlvVideoTagDemuxer::new();
        // frame_type 2, codec H263
        let data = BytesMut::from(&[0x22_u8, 0x00, 0x00, 0x00, 0x00][..]);
        assert!(demuxer.demux(1000, data).unwrap().is_none());
    }

    #[test]
    fn test_audio_demux_non_aac_dropped() {
        let mut demuxer = FlvAudioTagDemuxer::new();
        // sound format 0 (PCM)
        let data = BytesMut::from(&[0x00_u8, 0x00][..]);
        let result = demuxer.demux(1000, data).unwrap();
        assert!(!result.has_data);
    }

    #[test]
    fn test_audio_demux_sequence_header_then_raw() {
        let mut demuxer = FlvAudioTagDemuxer::new();

        // AAC sequence header: flags + packet type + ASC (LC 44.1k stereo)
        let sh = BytesMut::from(&[0xAF_u8, 0x00, 0x12, 0x10][..]);
        let result = demuxer.demux(0, sh).unwrap();
        assert!(!result.has_data);

        // AAC raw frame
        let raw = BytesMut::from(&[0xAF_u8, 0x01, 0xAA, 0xBB, 0xCC][..]);
        let result = demuxer.demux(23, raw).unwrap();
        assert!(result.has_data);
        assert_eq!(result.dts, 23);
        // 7-byte ADTS header + 3 payload bytes
        assert_eq!(result.data.len(), 10);
        assert_eq!(result.data[0], 0xFF);
    }

    #[test]
    fn test_video_demux_sequence_header_then_nalu() {
        let mut demuxer = FlvVideoTagDemuxer::new();

        // video sequence header: keyframe+h264, seqhdr, cts 0, then AVC record
        let mut sh = vec![0x17_u8, 0x00, 0x00, 0x00, 0x00];
        let sps: &[u8] = &[0x67, 0x42, 0x00, 0x1f];
        let pps: &[u8] = &[0x68, 0xce];
        sh.extend_from_slice(&[0x01, 0x42, 0x00, 0x1f, 0xff, 0xe1]);
        sh.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        sh.extend_from_slice(sps);
        sh.push(0x01);
        sh.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        sh.extend_from_slice(pps);
        assert!(demuxer.demux(0, BytesMut::from(&sh[..])).unwrap().is_none());

        // one IDR nalu with cts 40
        let mut frame = vec![0x17_u8, 0x01, 0x00, 0x00, 0x28];
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x02, 0x65, 0x88]);
        let result = demuxer
            .demux(1000, BytesMut::from(&frame[..]))
            .unwrap()
            .unwrap();

        assert_eq!(result.dts, 1000);
        assert_eq!(result.pts, 1040);
        assert_eq!(result.frame_type, 1);
        // sps + pps inserted before the idr slice
        assert_eq!(&result.data[..4], &[0, 0, 0, 1]);
        assert_eq!(result.data[4], 0x67);
    }
}
