use {
    super::errors::{EventMessagesError, EventMessagesErrorValue},
    byteorder::BigEndian,
    crate::bytesio::bytes_reader::BytesReader,
    crate::rtmp::messages::define::{user_control_event_type, UserControlEvent},
};

pub struct EventMessagesReader {
    reader: BytesReader,
}

impl EventMessagesReader {
    #[must_use]
    pub const fn new(reader: BytesReader) -> Self {
        Self { reader }
    }

    pub fn read_event(mut self) -> Result<UserControlEvent, EventMessagesError> {
        let event_type = self.reader.read_u16::<BigEndian>()?;

        let event = match event_type {
            user_control_event_type::STREAM_BEGIN => UserControlEvent::StreamBegin {
                stream_id: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::STREAM_EOF => UserControlEvent::StreamEof {
                stream_id: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::STREAM_DRY => UserControlEvent::StreamDry {
                stream_id: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::SET_BUFFER_LENGTH => UserControlEvent::SetBufferLength {
                stream_id: self.reader.read_u32::<BigEndian>()?,
                buffer_ms: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded {
                stream_id: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::PING_REQUEST => UserControlEvent::PingRequest {
                timestamp: self.reader.read_u32::<BigEndian>()?,
            },
            user_control_event_type::PING_RESPONSE => UserControlEvent::PingResponse {
                timestamp: self.reader.read_u32::<BigEndian>()?,
            },
            other => {
                return Err(EventMessagesError {
                    value: EventMessagesErrorValue::UnknowEventMessageType(other),
                });
            }
        };

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_read_set_buffer_length() {
        let data = [0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x03, 0xE8];
        let reader = BytesReader::new(BytesMut::from(&data[..]));
        let event = EventMessagesReader::new(reader).read_event().unwrap();
        assert_eq!(
            event,
            UserControlEvent::SetBufferLength {
                stream_id: 1,
                buffer_ms: 1000
            }
        );
    }

    #[test]
    fn test_read_unknown_event_rejected() {
        let data = [0x00, 0x63, 0x00, 0x00, 0x00, 0x00];
        let reader = BytesReader::new(BytesMut::from(&data[..]));
        let result = EventMessagesReader::new(reader).read_event();
        assert!(matches!(
            result.unwrap_err().value,
            EventMessagesErrorValue::UnknowEventMessageType(0x63)
        ));
    }
}
