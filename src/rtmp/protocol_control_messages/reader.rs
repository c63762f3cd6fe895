use {
    super::errors::ProtocolControlMessageReaderError,
    byteorder::BigEndian,
    crate::bytesio::bytes_reader::BytesReader,
};

pub struct ProtocolControlMessageReader {
    reader: BytesReader,
}

impl ProtocolControlMessageReader {
    #[must_use]
    pub const fn new(reader: BytesReader) -> Self {
        Self { reader }
    }

    pub fn read_set_chunk_size(mut self) -> Result<u32, ProtocolControlMessageReaderError> {
        //the most significant bit must be zero; mask it off
        let chunk_size = self.reader.read_u32::<BigEndian>()? & 0x7fff_ffff;
        Ok(chunk_size)
    }

    pub fn read_abort_message(mut self) -> Result<u32, ProtocolControlMessageReaderError> {
        let chunk_stream_id = self.reader.read_u32::<BigEndian>()?;
        Ok(chunk_stream_id)
    }

    pub fn read_acknowledgement(mut self) -> Result<u32, ProtocolControlMessageReaderError> {
        let sequence_number = self.reader.read_u32::<BigEndian>()?;
        Ok(sequence_number)
    }

    pub fn read_window_acknowledgement_size(
        mut self,
    ) -> Result<u32, ProtocolControlMessageReaderError> {
        let window_size = self.reader.read_u32::<BigEndian>()?;
        Ok(window_size)
    }

    pub fn read_set_peer_bandwidth(
        mut self,
    ) -> Result<(u32, u8), ProtocolControlMessageReaderError> {
        let window_size = self.reader.read_u32::<BigEndian>()?;
        let limit_type = self.reader.read_u8()?;
        Ok((window_size, limit_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_read_set_chunk_size_masks_high_bit() {
        let reader = BytesReader::new(BytesMut::from(&[0x80, 0x00, 0x10, 0x00][..]));
        let chunk_size = ProtocolControlMessageReader::new(reader)
            .read_set_chunk_size()
            .unwrap();
        assert_eq!(chunk_size, 4096);
    }

    #[test]
    fn test_read_set_peer_bandwidth() {
        let reader = BytesReader::new(BytesMut::from(&[0x00, 0x26, 0x25, 0xA0, 0x02][..]));
        let (size, limit_type) = ProtocolControlMessageReader::new(reader)
            .read_set_peer_bandwidth()
            .unwrap();
        assert_eq!(size, 2_500_000);
        assert_eq!(limit_type, 2);
    }
}
