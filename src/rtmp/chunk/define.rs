use bytes::BytesMut;

pub const INIT_CHUNK_SIZE: u32 = 128;
pub const MAX_CHUNK_SIZE: u32 = 0x00ff_ffff;

/// Well-known chunk stream ids this server allocates for outgoing
/// messages.
pub mod csid_type {
    pub const PROTOCOL_CONTROL: u32 = 2;
    pub const COMMAND_AMF0_AMF3: u32 = 3;
    pub const AUDIO: u32 = 4;
    pub const VIDEO: u32 = 6;
    pub const DATA_AMF0_AMF3: u32 = 5;
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ChunkBasicHeader {
    pub format: u8,
    pub chunk_stream_id: u32,
}

impl ChunkBasicHeader {
    #[must_use]
    pub const fn new(format: u8, chunk_stream_id: u32) -> Self {
        Self {
            format,
            chunk_stream_id,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum ExtendTimestampType {
    /// No extended timestamp field follows the message header.
    #[default]
    NONE,
    /// Format 0: the extended field carries the absolute timestamp.
    FORMAT0,
    /// Format 1/2: the extended field carries the timestamp delta.
    FORMAT12,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ChunkMessageHeader {
    pub timestamp: u32,
    pub timestamp_delta: u32,
    pub msg_length: u32,
    pub msg_type_id: u8,
    pub msg_stream_id: u32,
    pub extended_timestamp_type: ExtendTimestampType,
}

impl ChunkMessageHeader {
    #[must_use]
    pub fn new(timestamp: u32, msg_length: u32, msg_type_id: u8, msg_stream_id: u32) -> Self {
        Self {
            timestamp,
            timestamp_delta: 0,
            msg_length,
            msg_type_id,
            msg_stream_id,
            extended_timestamp_type: ExtendTimestampType::NONE,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ChunkInfo {
    pub basic_header: ChunkBasicHeader,
    pub message_header: ChunkMessageHeader,
    pub payload: BytesMut,
}

impl ChunkInfo {
    #[must_use]
    pub fn new(
        csid: u32,
        format: u8,
        timestamp: u32,
        msg_length: u32,
        msg_type_id: u8,
        msg_stream_id: u32,
        payload: BytesMut,
    ) -> Self {
        Self {
            basic_header: ChunkBasicHeader::new(format, csid),
            message_header: ChunkMessageHeader::new(
                timestamp,
                msg_length,
                msg_type_id,
                msg_stream_id,
            ),
            payload,
        }
    }
}
