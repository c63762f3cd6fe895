use {
    super::{define::ChunkInfo, errors::PackError},
    byteorder::{BigEndian, LittleEndian},
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
    std::cmp::min,
};

/// Serializes complete messages into chunks: a format-0 header for the
/// first chunk, format-3 continuations for the rest. When the 24-bit
/// timestamp field saturates, the 4-byte extended timestamp is written
/// after every header of the message, continuations included, which is
/// what Flash Media Server expects.
pub struct ChunkPacketizer {
    max_chunk_size: usize,
}

impl Default for ChunkPacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkPacketizer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_chunk_size: super::define::INIT_CHUNK_SIZE as usize,
        }
    }

    pub fn update_max_chunk_size(&mut self, chunk_size: usize) {
        self.max_chunk_size = chunk_size;
    }

    fn write_basic_header(
        writer: &mut BytesWriter,
        format: u8,
        csid: u32,
    ) -> Result<(), PackError> {
        match csid {
            0..=63 => {
                writer.write_u8((format << 6) | (csid as u8))?;
            }
            64..=319 => {
                writer.write_u8(format << 6)?;
                writer.write_u8((csid - 64) as u8)?;
            }
            _ => {
                writer.write_u8((format << 6) | 1)?;
                let reduced = csid - 64;
                writer.write_u8((reduced % 256) as u8)?;
                writer.write_u8((reduced / 256) as u8)?;
            }
        }
        Ok(())
    }

    pub fn write_chunk(&mut self, chunk_info: &ChunkInfo) -> Result<BytesMut, PackError> {
        let mut writer = BytesWriter::new();

        let csid = chunk_info.basic_header.chunk_stream_id;
        let header = &chunk_info.message_header;
        let timestamp = header.timestamp;
        let needs_extended_timestamp = timestamp >= 0xff_ffff;

        /*format 0 message header*/
        Self::write_basic_header(&mut writer, 0, csid)?;
        writer.write_u24::<BigEndian>(min(timestamp, 0xff_ffff))?;
        writer.write_u24::<BigEndian>(chunk_info.payload.len() as u32)?;
        writer.write_u8(header.msg_type_id)?;
        writer.write_u32::<LittleEndian>(header.msg_stream_id)?;
        if needs_extended_timestamp {
            writer.write_u32::<BigEndian>(timestamp)?;
        }

        let mut offset = 0_usize;
        let payload_len = chunk_info.payload.len();
        loop {
            let chunk_len = min(self.max_chunk_size, payload_len - offset);
            writer.write(&chunk_info.payload[offset..offset + chunk_len])?;
            offset += chunk_len;

            if offset >= payload_len {
                break;
            }

            /*format 3 continuation*/
            Self::write_basic_header(&mut writer, 3, csid)?;
            if needs_extended_timestamp {
                writer.write_u32::<BigEndian>(timestamp)?;
            }
        }

        Ok(writer.extract_current_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::super::unpacketizer::{ChunkUnpacketizer, UnpackResult};
    use super::*;
    use crate::rtmp::messages::define::msg_type_id;

    fn payload_of(len: usize) -> BytesMut {
        let mut payload = BytesMut::with_capacity(len);
        for i in 0..len {
            payload.extend_from_slice(&[(i % 251) as u8]);
        }
        payload
    }

    fn round_trip(chunk_size: usize, chunk_info: &ChunkInfo) -> ChunkInfo {
        let mut packetizer = ChunkPacketizer::new();
        packetizer.update_max_chunk_size(chunk_size);
        let wire = packetizer.write_chunk(chunk_info).unwrap();

        let mut unpacketizer = ChunkUnpacketizer::new();
        unpacketizer.update_max_chunk_size(chunk_size);
        unpacketizer.extend_data(&wire).unwrap();
        match unpacketizer.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_single_chunk() {
        let chunk = ChunkInfo::new(4, 0, 1234, 10, msg_type_id::AUDIO, 1, payload_of(10));
        let parsed = round_trip(128, &chunk);
        assert_eq!(parsed.message_header.timestamp, 1234);
        assert_eq!(parsed.message_header.msg_type_id, msg_type_id::AUDIO);
        assert_eq!(parsed.payload, chunk.payload);
    }

    #[test]
    fn test_round_trip_multi_chunk() {
        let chunk = ChunkInfo::new(6, 0, 40, 1000, msg_type_id::VIDEO, 1, payload_of(1000));
        let parsed = round_trip(128, &chunk);
        assert_eq!(parsed.payload, chunk.payload);
    }

    #[test]
    fn test_round_trip_extended_timestamp_with_continuation() {
        //timestamp above 0xFFFFFF and a payload needing continuation
        //chunks: the extended timestamp must appear on each of them
        let chunk = ChunkInfo::new(
            6,
            0,
            0x0100_0000,
            300,
            msg_type_id::VIDEO,
            1,
            payload_of(300),
        );
        let parsed = round_trip(128, &chunk);
        assert_eq!(parsed.message_header.timestamp, 0x0100_0000);
        assert_eq!(parsed.payload, chunk.payload);
    }

    #[test]
    fn test_round_trip_large_csid() {
        let chunk = ChunkInfo::new(200, 0, 0, 8, msg_type_id::AUDIO, 1, payload_of(8));
        let parsed = round_trip(128, &chunk);
        assert_eq!(parsed.basic_header.chunk_stream_id, 200);
        assert_eq!(parsed.payload, chunk.payload);
    }

    #[test]
    fn test_round_trip_after_chunk_size_renegotiation() {
        for chunk_size in [64, 128, 4096] {
            let chunk = ChunkInfo::new(4, 0, 99, 500, msg_type_id::AUDIO, 1, payload_of(500));
            let parsed = round_trip(chunk_size, &chunk);
            assert_eq!(parsed.payload, chunk.payload, "chunk size {chunk_size}");
        }
    }
}
