use {
    super::errors::ControlMessagesError,
    byteorder::BigEndian,
    crate::bytesio::bytes_writer::BytesWriter,
    crate::rtmp::chunk::define::csid_type,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::messages::define::msg_type_id,
};

/// Builds protocol control messages (message types 1-6) as ready
/// chunks on chunk stream 2, message stream 0.
pub struct ControlMessagesWriter;

impl ControlMessagesWriter {
    fn wrap(msg_type: u8, writer: &mut BytesWriter) -> ChunkInfo {
        let payload = writer.extract_current_bytes();
        ChunkInfo::new(
            csid_type::PROTOCOL_CONTROL,
            0,
            0,
            payload.len() as u32,
            msg_type,
            0,
            payload,
        )
    }

    pub fn write_set_chunk_size(chunk_size: u32) -> Result<ChunkInfo, ControlMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(chunk_size & 0x7fff_ffff)?;
        Ok(Self::wrap(msg_type_id::SET_CHUNK_SIZE, &mut writer))
    }

    pub fn write_abort_message(chunk_stream_id: u32) -> Result<ChunkInfo, ControlMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(chunk_stream_id)?;
        Ok(Self::wrap(msg_type_id::ABORT, &mut writer))
    }

    pub fn write_acknowledgement(sequence_number: u32) -> Result<ChunkInfo, ControlMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(sequence_number)?;
        Ok(Self::wrap(msg_type_id::ACKNOWLEDGEMENT, &mut writer))
    }

    pub fn write_window_acknowledgement_size(
        window_size: u32,
    ) -> Result<ChunkInfo, ControlMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(window_size)?;
        Ok(Self::wrap(msg_type_id::WIN_ACKNOWLEDGEMENT_SIZE, &mut writer))
    }

    pub fn write_set_peer_bandwidth(
        window_size: u32,
        limit_type: u8,
    ) -> Result<ChunkInfo, ControlMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(window_size)?;
        writer.write_u8(limit_type)?;
        Ok(Self::wrap(msg_type_id::SET_PEER_BANDWIDTH, &mut writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_chunk_size_chunk_shape() {
        let chunk = ControlMessagesWriter::write_set_chunk_size(4096).unwrap();
        assert_eq!(chunk.basic_header.chunk_stream_id, 2);
        assert_eq!(chunk.message_header.msg_type_id, msg_type_id::SET_CHUNK_SIZE);
        assert_eq!(&chunk.payload[..], &[0x00, 0x00, 0x10, 0x00]);
    }

    #[test]
    fn test_set_peer_bandwidth_payload() {
        let chunk = ControlMessagesWriter::write_set_peer_bandwidth(2_500_000, 2).unwrap();
        assert_eq!(chunk.payload.len(), 5);
        assert_eq!(chunk.payload[4], 2);
    }
}
