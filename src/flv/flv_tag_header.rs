use {
    super::{
        errors::{FlvDemuxerError, FlvMuxerError},
        Marshal, Unmarshal,
    },
    byteorder::BigEndian,
    bytes::BytesMut,
    crate::bytesio::{bytes_reader::BytesReader, bytes_writer::BytesWriter},
};

/*
 **** Video Tag ****
 +--------------------------------------------------------------------------------------------+
 | FrameType(4 bits) | CodecID(4 bits) | AVCPacketType(1 byte) | CompositionTime(3 bytes) | ..|
 +--------------------------------------------------------------------------------------------+
*/
#[derive(Debug, Clone, Default)]
pub struct VideoTagHeader {
    pub frame_type: u8,
    pub codec_id: u8,
    pub avc_packet_type: u8,
    pub composition_time: i32,
}

impl Unmarshal<&mut BytesReader, Result<Self, FlvDemuxerError>> for VideoTagHeader {
    fn unmarshal(reader: &mut BytesReader) -> Result<Self, FlvDemuxerError> {
        let flags = reader.read_u8()?;
        let mut header = Self {
            frame_type: flags >> 4,
            codec_id: flags & 0x0f,
            ..Self::default()
        };

        if header.codec_id == super::define::AvcCodecId::H264 as u8
            || header.codec_id == super::define::AvcCodecId::H265 as u8
        {
            header.avc_packet_type = reader.read_u8()?;
            let composition_time = reader.read_u24::<BigEndian>()?;
            //sign-extend the 24-bit composition time offset
            header.composition_time = ((composition_time as i32) << 8) >> 8;
        }

        Ok(header)
    }
}

impl Marshal<Result<BytesMut, FlvMuxerError>> for VideoTagHeader {
    fn marshal(&self) -> Result<BytesMut, FlvMuxerError> {
        let mut writer = BytesWriter::new();
        writer.write_u8((self.frame_type << 4) | (self.codec_id & 0x0f))?;
        writer.write_u8(self.avc_packet_type)?;
        writer.write_u24::<BigEndian>((self.composition_time as u32) & 0x00ff_ffff)?;
        Ok(writer.extract_current_bytes())
    }
}

/*
 **** Audio Tag ****
 +-----------------------------------------------------------------------------------------------------+
 | SoundFormat(4 bits) | SoundRate(2 bits) | SoundSize(1 bit) | SoundType(1 bit) | AACPacketType(1 byte)|
 +-----------------------------------------------------------------------------------------------------+
*/
#[derive(Debug, Clone, Default)]
pub struct AudioTagHeader {
    pub sound_format: u8,
    pub sound_rate: u8,
    pub sound_size: u8,
    pub sound_type: u8,
    pub aac_packet_type: u8,
}

impl Unmarshal<&mut BytesReader, Result<Self, FlvDemuxerError>> for AudioTagHeader {
    fn unmarshal(reader: &mut BytesReader) -> Result<Self, FlvDemuxerError> {
        let flags = reader.read_u8()?;
        let mut header = Self {
            sound_format: flags >> 4,
            sound_rate: (flags >> 2) & 0x03,
            sound_size: (flags >> 1) & 0x01,
            sound_type: flags & 0x01,
            ..Self::default()
        };

        if header.sound_format == super::define::SoundFormat::AAC as u8 {
            header.aac_packet_type = reader.read_u8()?;
        }

        Ok(header)
    }
}

impl Marshal<Result<BytesMut, FlvMuxerError>> for AudioTagHeader {
    fn marshal(&self) -> Result<BytesMut, FlvMuxerError> {
        let mut writer = BytesWriter::new();
        writer.write_u8(
            (self.sound_format << 4)
                | ((self.sound_rate & 0x03) << 2)
                | ((self.sound_size & 0x01) << 1)
                | (self.sound_type & 0x01),
        )?;
        if self.sound_format == super::define::SoundFormat::AAC as u8 {
            writer.write_u8(self.aac_packet_type)?;
        }
        Ok(writer.extract_current_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::define::{avc_packet_type, frame_type, AvcCodecId, SoundFormat};

    #[test]
    fn test_video_tag_header_unmarshal() {
        // keyframe + H264, NALU, cts = 0x000014
        let data = BytesMut::from(&[0x17, 0x01, 0x00, 0x00, 0x14][..]);
        let mut reader = BytesReader::new(data);
        let header = VideoTagHeader::unmarshal(&mut reader).unwrap();

        assert_eq!(header.frame_type, frame_type::KEY_FRAME);
        assert_eq!(header.codec_id, AvcCodecId::H264 as u8);
        assert_eq!(header.avc_packet_type, avc_packet_type::AVC_NALU);
        assert_eq!(header.composition_time, 0x14);
    }

    #[test]
    fn test_video_tag_header_negative_cts() {
        // cts = -1 (0xFFFFFF as 24-bit two's complement)
        let data = BytesMut::from(&[0x27, 0x01, 0xFF, 0xFF, 0xFF][..]);
        let mut reader = BytesReader::new(data);
        let header = VideoTagHeader::unmarshal(&mut reader).unwrap();
        assert_eq!(header.composition_time, -1);
    }

    #[test]
    fn test_audio_tag_header_round_trip() {
        let header = AudioTagHeader {
            sound_format: SoundFormat::AAC as u8,
            sound_rate: 3,
            sound_size: 1,
            sound_type: 1,
            aac_packet_type: 1,
        };
        let data = header.marshal().unwrap();
        let mut reader = BytesReader::new(data);
        let parsed = AudioTagHeader::unmarshal(&mut reader).unwrap();

        assert_eq!(parsed.sound_format, header.sound_format);
        assert_eq!(parsed.sound_rate, header.sound_rate);
        assert_eq!(parsed.aac_packet_type, header.aac_packet_type);
    }
}
