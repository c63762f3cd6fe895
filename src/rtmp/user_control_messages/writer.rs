use {
    super::errors::EventMessagesError,
    byteorder::BigEndian,
    crate::bytesio::bytes_writer::BytesWriter,
    crate::rtmp::chunk::define::csid_type,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::messages::define::{msg_type_id, user_control_event_type},
};

/// Builds user control events (message type 4) as ready chunks.
pub struct EventMessagesWriter;

impl EventMessagesWriter {
    fn wrap(writer: &mut BytesWriter) -> ChunkInfo {
        let payload = writer.extract_current_bytes();
        ChunkInfo::new(
            csid_type::PROTOCOL_CONTROL,
            0,
            0,
            payload.len() as u32,
            msg_type_id::USER_CONTROL_EVENT,
            0,
            payload,
        )
    }

    fn write_stream_event(
        event_type: u16,
        stream_id: u32,
    ) -> Result<ChunkInfo, EventMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u16::<BigEndian>(event_type)?;
        writer.write_u32::<BigEndian>(stream_id)?;
        Ok(Self::wrap(&mut writer))
    }

    pub fn write_stream_begin(stream_id: u32) -> Result<ChunkInfo, EventMessagesError> {
        Self::write_stream_event(user_control_event_type::STREAM_BEGIN, stream_id)
    }

    pub fn write_stream_eof(stream_id: u32) -> Result<ChunkInfo, EventMessagesError> {
        Self::write_stream_event(user_control_event_type::STREAM_EOF, stream_id)
    }

    pub fn write_stream_is_recorded(stream_id: u32) -> Result<ChunkInfo, EventMessagesError> {
        Self::write_stream_event(user_control_event_type::STREAM_IS_RECORDED, stream_id)
    }

    pub fn write_set_buffer_length(
        stream_id: u32,
        buffer_ms: u32,
    ) -> Result<ChunkInfo, EventMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u16::<BigEndian>(user_control_event_type::SET_BUFFER_LENGTH)?;
        writer.write_u32::<BigEndian>(stream_id)?;
        writer.write_u32::<BigEndian>(buffer_ms)?;
        Ok(Self::wrap(&mut writer))
    }

    pub fn write_ping_request(timestamp: u32) -> Result<ChunkInfo, EventMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u16::<BigEndian>(user_control_event_type::PING_REQUEST)?;
        writer.write_u32::<BigEndian>(timestamp)?;
        Ok(Self::wrap(&mut writer))
    }

    pub fn write_ping_response(timestamp: u32) -> Result<ChunkInfo, EventMessagesError> {
        let mut writer = BytesWriter::new();
        writer.write_u16::<BigEndian>(user_control_event_type::PING_RESPONSE)?;
        writer.write_u32::<BigEndian>(timestamp)?;
        Ok(Self::wrap(&mut writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_begin_payload() {
        let chunk = EventMessagesWriter::write_stream_begin(1).unwrap();
        assert_eq!(chunk.message_header.msg_type_id, msg_type_id::USER_CONTROL_EVENT);
        assert_eq!(&chunk.payload[..], &[0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_ping_round_trip() {
        let chunk = EventMessagesWriter::write_ping_request(777).unwrap();
        let reader = crate::bytesio::bytes_reader::BytesReader::new(chunk.payload);
        let event = super::super::reader::EventMessagesReader::new(reader)
            .read_event()
            .unwrap();
        assert_eq!(
            event,
            crate::rtmp::messages::define::UserControlEvent::PingRequest { timestamp: 777 }
        );
    }
}
