pub mod errors;

use {
    crate::flv::amf0::{define::UnOrderedMap, Amf0ValueType, Amf0Writer},
    crate::rtmp::chunk::define::csid_type,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::messages::define::msg_type_id,
    errors::NetStreamError,
};

/// NetStream status code strings from the Adobe taxonomy.
pub mod status_code {
    pub const PUBLISH_START: &str = "NetStream.Publish.Start";
    pub const PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
    pub const UNPUBLISH_SUCCESS: &str = "NetStream.Unpublish.Success";
    pub const UNPUBLISH_NOTIFY: &str = "NetStream.Unpublish.Notify";
    pub const PLAY_START: &str = "NetStream.Play.Start";
    pub const PLAY_RESET: &str = "NetStream.Play.Reset";
    pub const PLAY_STOP: &str = "NetStream.Play.Stop";
    pub const PLAY_STREAM_NOT_FOUND: &str = "NetStream.Play.StreamNotFound";
    pub const CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
    pub const CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";
}

/// Builds NetStream-level AMF commands as ready chunks.
pub struct NetStreamWriter;

impl NetStreamWriter {
    fn wrap(writer: &mut Amf0Writer, msg_stream_id: u32) -> ChunkInfo {
        let payload = writer.extract_current_bytes();
        ChunkInfo::new(
            csid_type::COMMAND_AMF0_AMF3,
            0,
            0,
            payload.len() as u32,
            msg_type_id::COMMAND_AMF0,
            msg_stream_id,
            payload,
        )
    }

    pub fn write_play(
        transaction_id: f64,
        stream_name: &str,
        start: f64,
        duration: f64,
        reset: bool,
        msg_stream_id: u32,
    ) -> Result<ChunkInfo, NetStreamError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("play")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        writer.write_string(stream_name)?;
        writer.write_number(start)?;
        writer.write_number(duration)?;
        writer.write_bool(reset)?;
        Ok(Self::wrap(&mut writer, msg_stream_id))
    }

    pub fn write_publish(
        transaction_id: f64,
        stream_name: &str,
        stream_type: &str,
        msg_stream_id: u32,
    ) -> Result<ChunkInfo, NetStreamError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("publish")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        writer.write_string(stream_name)?;
        writer.write_string(stream_type)?;
        Ok(Self::wrap(&mut writer, msg_stream_id))
    }

    pub fn write_delete_stream(
        transaction_id: f64,
        stream_id: f64,
        msg_stream_id: u32,
    ) -> Result<ChunkInfo, NetStreamError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("deleteStream")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        writer.write_number(stream_id)?;
        Ok(Self::wrap(&mut writer, msg_stream_id))
    }

    pub fn write_on_status(
        transaction_id: f64,
        level: &str,
        code: &str,
        description: &str,
        msg_stream_id: u32,
    ) -> Result<ChunkInfo, NetStreamError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("onStatus")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;

        let mut information = UnOrderedMap::new();
        information.insert(
            "level".to_string(),
            Amf0ValueType::UTF8String(level.to_string()),
        );
        information.insert(
            "code".to_string(),
            Amf0ValueType::UTF8String(code.to_string()),
        );
        information.insert(
            "description".to_string(),
            Amf0ValueType::UTF8String(description.to_string()),
        );
        writer.write_object(&information)?;

        Ok(Self::wrap(&mut writer, msg_stream_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesio::bytes_reader::BytesReader;
    use crate::flv::amf0::Amf0Reader;

    #[test]
    fn test_on_status_publish_start() {
        let chunk = NetStreamWriter::write_on_status(
            0.0,
            "status",
            status_code::PUBLISH_START,
            "publish started",
            1,
        )
        .unwrap();

        assert_eq!(chunk.message_header.msg_stream_id, 1);
        let mut reader = Amf0Reader::new(BytesReader::new(chunk.payload));
        let values = reader.read_all().unwrap();
        assert_eq!(values[0], Amf0ValueType::UTF8String("onStatus".to_string()));
        match &values[3] {
            Amf0ValueType::Object(information) => {
                assert_eq!(
                    information.get("code"),
                    Some(&Amf0ValueType::UTF8String(
                        status_code::PUBLISH_START.to_string()
                    ))
                );
            }
            _ => panic!("expected info object"),
        }
    }

    #[test]
    fn test_play_command_shape() {
        let chunk = NetStreamWriter::write_play(2.0, "foo", -2.0, -1.0, true, 1).unwrap();
        let mut reader = Amf0Reader::new(BytesReader::new(chunk.payload));
        let values = reader.read_all().unwrap();
        assert_eq!(values[0], Amf0ValueType::UTF8String("play".to_string()));
        assert_eq!(values[3], Amf0ValueType::UTF8String("foo".to_string()));
        assert_eq!(values[6], Amf0ValueType::Boolean(true));
    }
}
