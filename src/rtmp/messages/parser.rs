use {
    super::{
        define::{msg_type_id, RtmpMessageData},
        errors::{MessageError, MessageErrorValue},
    },
    crate::bytesio::bytes_reader::BytesReader,
    crate::flv::amf0::Amf0Reader,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::protocol_control_messages::reader::ProtocolControlMessageReader,
    crate::rtmp::user_control_messages::reader::EventMessagesReader,
};

pub struct MessageParser {
    chunk_info: ChunkInfo,
}

impl MessageParser {
    #[must_use]
    pub const fn new(chunk_info: ChunkInfo) -> Self {
        Self { chunk_info }
    }

    pub fn parse(self) -> Result<Option<RtmpMessageData>, MessageError> {
        let mut reader = BytesReader::new(self.chunk_info.payload);

        match self.chunk_info.message_header.msg_type_id {
            msg_type_id::COMMAND_AMF0 | msg_type_id::COMMAND_AMF3 => {
                if self.chunk_info.message_header.msg_type_id == msg_type_id::COMMAND_AMF3 {
                    //AMF3 commands open with one format selector byte,
                    //then plain AMF0 encoding follows
                    reader.read_u8()?;
                }
                let mut amf_reader = Amf0Reader::new(reader);

                let command_name = amf_reader.read_with_type(
                    crate::flv::amf0::define::amf0_markers::STRING,
                )?;
                let transaction_id = amf_reader.read_with_type(
                    crate::flv::amf0::define::amf0_markers::NUMBER,
                )?;

                //the command object may legitimately be null
                let command_object = amf_reader.read_any()?;
                let others = amf_reader.read_all()?;

                Ok(Some(RtmpMessageData::Amf0Command {
                    command_name,
                    transaction_id,
                    command_object,
                    others,
                }))
            }
            msg_type_id::AUDIO => Ok(Some(RtmpMessageData::AudioData {
                data: reader.extract_remaining_bytes(),
            })),
            msg_type_id::VIDEO => Ok(Some(RtmpMessageData::VideoData {
                data: reader.extract_remaining_bytes(),
            })),
            msg_type_id::DATA_AMF0 | msg_type_id::DATA_AMF3 => {
                Ok(Some(RtmpMessageData::AmfData {
                    raw_data: reader.extract_remaining_bytes(),
                }))
            }
            msg_type_id::SET_CHUNK_SIZE => {
                let chunk_size = ProtocolControlMessageReader::new(reader).read_set_chunk_size()?;
                Ok(Some(RtmpMessageData::SetChunkSize { chunk_size }))
            }
            msg_type_id::ABORT => {
                let chunk_stream_id =
                    ProtocolControlMessageReader::new(reader).read_abort_message()?;
                Ok(Some(RtmpMessageData::AbortMessage { chunk_stream_id }))
            }
            msg_type_id::ACKNOWLEDGEMENT => {
                let sequence_number =
                    ProtocolControlMessageReader::new(reader).read_acknowledgement()?;
                Ok(Some(RtmpMessageData::Acknowledgement { sequence_number }))
            }
            msg_type_id::WIN_ACKNOWLEDGEMENT_SIZE => {
                let size = ProtocolControlMessageReader::new(reader)
                    .read_window_acknowledgement_size()?;
                Ok(Some(RtmpMessageData::WindowAcknowledgementSize { size }))
            }
            msg_type_id::SET_PEER_BANDWIDTH => {
                let (size, limit_type) =
                    ProtocolControlMessageReader::new(reader).read_set_peer_bandwidth()?;
                Ok(Some(RtmpMessageData::SetPeerBandwidth { size, limit_type }))
            }
            msg_type_id::USER_CONTROL_EVENT => {
                let event = EventMessagesReader::new(reader).read_event()?;
                Ok(Some(RtmpMessageData::UserControl(event)))
            }
            msg_type_id::SHARED_OBJ_AMF0 | msg_type_id::SHARED_OBJ_AMF3 | msg_type_id::AGGREGATE => {
                tracing::debug!(
                    msg_type_id = self.chunk_info.message_header.msg_type_id,
                    "ignoring unhandled message type"
                );
                Ok(None)
            }
            _ => Err(MessageError {
                value: MessageErrorValue::UnknowMessageType,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flv::amf0::Amf0ValueType;
    use bytes::BytesMut;

    fn chunk_with(msg_type: u8, payload: &[u8]) -> ChunkInfo {
        ChunkInfo::new(
            3,
            0,
            0,
            payload.len() as u32,
            msg_type,
            0,
            BytesMut::from(payload),
        )
    }

    #[test]
    fn test_parse_set_chunk_size() {
        let chunk = chunk_with(msg_type_id::SET_CHUNK_SIZE, &[0x00, 0x00, 0x10, 0x00]);
        let message = MessageParser::new(chunk).parse().unwrap().unwrap();
        assert!(matches!(
            message,
            RtmpMessageData::SetChunkSize { chunk_size: 4096 }
        ));
    }

    #[test]
    fn test_parse_connect_command() {
        let mut writer = crate::flv::amf0::Amf0Writer::new();
        writer.write_string("connect").unwrap();
        writer.write_number(1.0).unwrap();
        let mut properties = crate::flv::amf0::define::UnOrderedMap::new();
        properties.insert(
            String::from("app"),
            Amf0ValueType::UTF8String(String::from("live")),
        );
        writer.write_object(&properties).unwrap();
        let payload = writer.extract_current_bytes();

        let chunk = chunk_with(msg_type_id::COMMAND_AMF0, &payload);
        let message = MessageParser::new(chunk).parse().unwrap().unwrap();

        match message {
            RtmpMessageData::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                ..
            } => {
                assert_eq!(
                    command_name,
                    Amf0ValueType::UTF8String(String::from("connect"))
                );
                assert_eq!(transaction_id, Amf0ValueType::Number(1.0));
                assert!(matches!(command_object, Amf0ValueType::Object(_)));
            }
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn test_parse_audio_passthrough() {
        let chunk = chunk_with(msg_type_id::AUDIO, &[0xAF, 0x01, 0xAA]);
        let message = MessageParser::new(chunk).parse().unwrap().unwrap();
        match message {
            RtmpMessageData::AudioData { data } => assert_eq!(&data[..], &[0xAF, 0x01, 0xAA]),
            _ => panic!("expected audio"),
        }
    }

    #[test]
    fn test_parse_unknown_type_is_error() {
        let chunk = chunk_with(99, &[]);
        let result = MessageParser::new(chunk).parse();
        assert!(matches!(
            result.unwrap_err().value,
            MessageErrorValue::UnknowMessageType
        ));
    }
}
