use {
    super::errors::FlvMuxerError,
    byteorder::BigEndian,
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
};

/// FLV tag header size: type(1) + data size(3) + timestamp(3+1) + stream id(3).
pub const HEADER_LENGTH: u32 = 11;

pub struct FlvMuxer {
    pub writer: BytesWriter,
}

impl Default for FlvMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl FlvMuxer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: BytesWriter::new(),
        }
    }

    pub fn write_flv_header(&mut self, has_audio: bool, has_video: bool) -> Result<(), FlvMuxerError> {
        /*signature*/
        self.writer.write(b"FLV")?;
        /*version*/
        self.writer.write_u8(0x01)?;
        /*flags: audio bit 2, video bit 0*/
        let flags = (u8::from(has_audio) << 2) | u8::from(has_video);
        self.writer.write_u8(flags)?;
        /*data offset*/
        self.writer.write_u32::<BigEndian>(9)?;
        Ok(())
    }

    pub fn write_flv_tag_header(
        &mut self,
        tag_type: u8,
        data_size: u32,
        timestamp: u32,
    ) -> Result<(), FlvMuxerError> {
        /*tag type*/
        self.writer.write_u8(tag_type)?;
        /*data size*/
        self.writer.write_u24::<BigEndian>(data_size)?;
        /*timestamp*/
        self.writer.write_u24::<BigEndian>(timestamp & 0x00ff_ffff)?;
        /*timestamp extended*/
        let timestamp_ext = ((timestamp >> 24) & 0xff) as u8;
        self.writer.write_u8(timestamp_ext)?;
        /*stream id*/
        self.writer.write_u24::<BigEndian>(0)?;
        Ok(())
    }

    pub fn write_flv_tag_body(&mut self, body: BytesMut) -> Result<(), FlvMuxerError> {
        self.writer.write(&body[..])?;
        Ok(())
    }

    pub fn write_previous_tag_size(&mut self, size: u32) -> Result<(), FlvMuxerError> {
        self.writer.write_u32::<BigEndian>(size)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flv_header() {
        let mut muxer = FlvMuxer::new();
        muxer.write_flv_header(true, true).unwrap();
        let data = muxer.writer.extract_current_bytes();
        assert_eq!(&data[..], &[0x46, 0x4C, 0x56, 0x01, 0x05, 0x00, 0x00, 0x00, 0x09]);
    }

    #[test]
    fn test_flv_header_audio_only() {
        let mut muxer = FlvMuxer::new();
        muxer.write_flv_header(true, false).unwrap();
        let data = muxer.writer.extract_current_bytes();
        assert_eq!(data[4], 0x04);
    }

    #[test]
    fn test_tag_header_timestamp_extension() {
        let mut muxer = FlvMuxer::new();
        muxer
            .write_flv_tag_header(9, 5, 0x7812_3456)
            .unwrap();
        let data = muxer.writer.extract_current_bytes();
        // 24-bit timestamp then the extended byte
        assert_eq!(&data[4..7], &[0x12, 0x34, 0x56]);
        assert_eq!(data[7], 0x78);
    }
}
