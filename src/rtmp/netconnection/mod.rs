pub mod errors;

use {
    crate::flv::amf0::{define::UnOrderedMap, Amf0ValueType, Amf0Writer},
    crate::rtmp::chunk::define::csid_type,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::messages::define::msg_type_id,
    errors::NetConnectionError,
};

/// Fields of the client `connect` command object.
#[derive(Debug, Clone, Default)]
pub struct ConnectProperties {
    pub app: String,
    pub tc_url: String,
    pub flash_ver: String,
    pub swf_url: String,
    pub fpad: bool,
    pub audio_codecs: f64,
    pub video_codecs: f64,
    pub video_function: f64,
    pub object_encoding: f64,
}

impl ConnectProperties {
    #[must_use]
    pub fn new(app: String, tc_url: String) -> Self {
        Self {
            app,
            tc_url,
            flash_ver: "LNX 9,0,124,2".to_string(),
            swf_url: String::new(),
            fpad: false,
            audio_codecs: 3575.0,
            video_codecs: 252.0,
            video_function: 1.0,
            object_encoding: 0.0,
        }
    }
}

/// Builds NetConnection-level AMF commands as ready chunks on the
/// command chunk stream.
pub struct NetConnection;

impl NetConnection {
    fn wrap(writer: &mut Amf0Writer) -> ChunkInfo {
        let payload = writer.extract_current_bytes();
        ChunkInfo::new(
            csid_type::COMMAND_AMF0_AMF3,
            0,
            0,
            payload.len() as u32,
            msg_type_id::COMMAND_AMF0,
            0,
            payload,
        )
    }

    pub fn write_connect(
        transaction_id: f64,
        properties: &ConnectProperties,
    ) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("connect")?;
        writer.write_number(transaction_id)?;

        let mut object = UnOrderedMap::new();
        object.insert(
            "app".to_string(),
            Amf0ValueType::UTF8String(properties.app.clone()),
        );
        object.insert(
            "flashVer".to_string(),
            Amf0ValueType::UTF8String(properties.flash_ver.clone()),
        );
        object.insert(
            "swfUrl".to_string(),
            Amf0ValueType::UTF8String(properties.swf_url.clone()),
        );
        object.insert(
            "tcUrl".to_string(),
            Amf0ValueType::UTF8String(properties.tc_url.clone()),
        );
        object.insert("fpad".to_string(), Amf0ValueType::Boolean(properties.fpad));
        object.insert(
            "audioCodecs".to_string(),
            Amf0ValueType::Number(properties.audio_codecs),
        );
        object.insert(
            "videoCodecs".to_string(),
            Amf0ValueType::Number(properties.video_codecs),
        );
        object.insert(
            "videoFunction".to_string(),
            Amf0ValueType::Number(properties.video_function),
        );
        object.insert(
            "objectEncoding".to_string(),
            Amf0ValueType::Number(properties.object_encoding),
        );
        writer.write_object(&object)?;

        Ok(Self::wrap(&mut writer))
    }

    pub fn write_connect_response(
        transaction_id: f64,
        fmsver: &str,
        capabilities: f64,
        code: &str,
        level: &str,
        description: &str,
        encoding: f64,
    ) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("_result")?;
        writer.write_number(transaction_id)?;

        let mut properties = UnOrderedMap::new();
        properties.insert(
            "fmsVer".to_string(),
            Amf0ValueType::UTF8String(fmsver.to_string()),
        );
        properties.insert(
            "capabilities".to_string(),
            Amf0ValueType::Number(capabilities),
        );
        writer.write_object(&properties)?;

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
        information.insert("objectEncoding".to_string(), Amf0ValueType::Number(encoding));
        writer.write_object(&information)?;

        Ok(Self::wrap(&mut writer))
    }

    pub fn write_create_stream(transaction_id: f64) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("createStream")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        Ok(Self::wrap(&mut writer))
    }

    pub fn write_create_stream_response(
        transaction_id: f64,
        stream_id: f64,
    ) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("_result")?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        writer.write_number(stream_id)?;
        Ok(Self::wrap(&mut writer))
    }

    /// `releaseStream` / `FCPublish` / `FCUnpublish` share the shape
    /// `name, transaction id, null, stream name`.
    pub fn write_stream_command(
        command_name: &str,
        transaction_id: f64,
        stream_name: &str,
    ) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string(command_name)?;
        writer.write_number(transaction_id)?;
        writer.write_null()?;
        writer.write_string(stream_name)?;
        Ok(Self::wrap(&mut writer))
    }

    pub fn write_error(
        transaction_id: f64,
        code: &str,
        level: &str,
        description: &str,
    ) -> Result<ChunkInfo, NetConnectionError> {
        let mut writer = Amf0Writer::new();
        writer.write_string("_error")?;
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

        Ok(Self::wrap(&mut writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytesio::bytes_reader::BytesReader;
    use crate::flv::amf0::Amf0Reader;

    #[test]
    fn test_connect_command_decodes() {
        let properties = ConnectProperties::new("live".to_string(), "rtmp://host/live".to_string());
        let chunk = NetConnection::write_connect(1.0, &properties).unwrap();

        let mut reader = Amf0Reader::new(BytesReader::new(chunk.payload));
        assert_eq!(
            reader.read_any().unwrap(),
            Amf0ValueType::UTF8String("connect".to_string())
        );
        assert_eq!(reader.read_any().unwrap(), Amf0ValueType::Number(1.0));
        match reader.read_any().unwrap() {
            Amf0ValueType::Object(object) => {
                assert_eq!(
                    object.get("app"),
                    Some(&Amf0ValueType::UTF8String("live".to_string()))
                );
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_create_stream_response_carries_stream_id() {
        let chunk = NetConnection::write_create_stream_response(4.0, 1.0).unwrap();
        let mut reader = Amf0Reader::new(BytesReader::new(chunk.payload));
        let values = reader.read_all().unwrap();
        assert_eq!(values[0], Amf0ValueType::UTF8String("_result".to_string()));
        assert_eq!(values[1], Amf0ValueType::Number(4.0));
        assert_eq!(values[3], Amf0ValueType::Number(1.0));
    }
}
