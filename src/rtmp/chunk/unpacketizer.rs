use {
    super::{
        define,
        define::{ChunkBasicHeader, ChunkInfo, ChunkMessageHeader, ExtendTimestampType},
        errors::{UnpackError, UnpackErrorValue},
    },
    byteorder::{BigEndian, LittleEndian},
    bytes::BufMut,
    bytes::BytesMut,
    crate::bytesio::bytes_reader::BytesReader,
    crate::rtmp::messages::define::msg_type_id,
    std::{cmp::min, collections::HashMap},
};

/// Consecutive basic-header violations tolerated before the
/// connection is declared unparseable.
const PARSE_ERROR_NUMBER: usize = 5;
/// Cached per-chunk-stream headers kept before pruning. The protocol
/// allows 65599 chunk stream ids; real encoders use a handful.
const MAX_CACHED_CHUNK_HEADERS: usize = 256;
/// Single-message ceiling guarding against hostile length fields.
const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Eq, PartialEq, Debug)]
pub enum UnpackResult {
    ChunkBasicHeaderResult(ChunkBasicHeader),
    ChunkInfo(ChunkInfo),
    Chunks(Vec<ChunkInfo>),
    Success,
    NotEnoughBytes,
    Empty,
}

#[derive(Copy, Clone, Debug)]
enum ChunkReadState {
    ReadBasicHeader,
    ReadMessageHeader,
    ReadExtendedTimestamp,
    ReadMessagePayload,
    Finish,
}

/*
 * 5.3.1 Chunk Format
 * +--------------+----------------+--------------------+------------+
 * | Basic Header | Message Header | Extended Timestamp | Chunk Data |
 * +--------------+----------------+--------------------+------------+
 * |<------------------- Chunk Header ----------------->|
 */
pub struct ChunkUnpacketizer {
    pub reader: BytesReader,
    //One message may span several chunks; fields missing from
    //format 1/2/3 headers are inherited from the previous chunk on the
    //same chunk stream id.
    pub current_chunk_info: ChunkInfo,
    chunk_message_headers: HashMap<u32, ChunkMessageHeader>,
    chunk_read_state: ChunkReadState,
    max_chunk_size: usize,
    parse_error_number: usize,
}

impl Default for ChunkUnpacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkUnpacketizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BytesReader::new(BytesMut::new()),
            current_chunk_info: ChunkInfo::default(),
            chunk_message_headers: HashMap::new(),
            chunk_read_state: ChunkReadState::ReadBasicHeader,
            max_chunk_size: define::INIT_CHUNK_SIZE as usize,
            parse_error_number: 0,
        }
    }

    pub fn extend_data(&mut self, data: &[u8]) -> Result<(), UnpackError> {
        self.reader.extend_from_slice(data)?;
        Ok(())
    }

    pub fn update_max_chunk_size(&mut self, chunk_size: usize) {
        tracing::trace!("update max chunk size: {chunk_size}");
        self.max_chunk_size = chunk_size;
    }

    /// Parse as many complete messages as the buffer holds. Stops
    /// after a SetChunkSize message so the caller can apply the new
    /// size before the following chunks are parsed.
    pub fn read_chunks(&mut self) -> Result<UnpackResult, UnpackError> {
        let mut chunks: Vec<ChunkInfo> = Vec::new();

        loop {
            match self.read_chunk() {
                Ok(UnpackResult::ChunkInfo(chunk_info)) => {
                    let msg_type_id = chunk_info.message_header.msg_type_id;
                    chunks.push(chunk_info);

                    if msg_type_id == msg_type_id::SET_CHUNK_SIZE {
                        break;
                    }
                }
                Ok(_) => break,
                Err(err) => {
                    if matches!(err.value, UnpackErrorValue::CannotParse)
                        || matches!(err.value, UnpackErrorValue::MessageTooLarge(..))
                    {
                        return Err(err);
                    }
                    break;
                }
            }
        }

        if chunks.is_empty() {
            Err(UnpackError {
                value: UnpackErrorValue::EmptyChunks,
            })
        } else {
            Ok(UnpackResult::Chunks(chunks))
        }
    }

    pub fn read_chunk(&mut self) -> Result<UnpackResult, UnpackError> {
        loop {
            let result = match self.chunk_read_state {
                ChunkReadState::ReadBasicHeader => self.read_basic_header()?,
                ChunkReadState::ReadMessageHeader => self.read_message_header()?,
                ChunkReadState::ReadExtendedTimestamp => self.read_extended_timestamp()?,
                ChunkReadState::ReadMessagePayload => self.read_message_payload()?,
                ChunkReadState::Finish => {
                    self.chunk_read_state = ChunkReadState::ReadBasicHeader;
                    break;
                }
            };
            match result {
                UnpackResult::ChunkInfo(_) => {
                    self.chunk_read_state = ChunkReadState::ReadBasicHeader;
                    return Ok(result);
                }
                //hold the current state until more bytes arrive
                UnpackResult::NotEnoughBytes => return Ok(UnpackResult::NotEnoughBytes),
                _ => {}
            }
        }
        Ok(UnpackResult::Empty)
    }

    /*
     * 5.3.1.1. Chunk Basic Header: 1, 2 or 3 bytes.
     *  0 1 2 3 4 5 6 7
     * +-+-+-+-+-+-+-+-+
     * |fmt|   cs id   |      cs id 2..63
     * +-+-+-+-+-+-+-+-+
     * cs id == 0 -> one more byte, id = byte + 64      (64..319)
     * cs id == 1 -> two more bytes, id = b2*256+b1+64  (64..65599)
     */
    fn read_basic_header(&mut self) -> Result<UnpackResult, UnpackError> {
        //peek first: a 2/3-byte basic header split across reads must not
        //consume anything until it is whole
        let byte = self.reader.advance_u8()?;

        let format_id = (byte >> 6) & 0b0000_0011;
        let mut csid = u32::from(byte & 0b0011_1111);

        match csid {
            0 => {
                if self.reader.len() < 2 {
                    return Ok(UnpackResult::NotEnoughBytes);
                }
                self.reader.read_u8()?;
                csid = 64 + u32::from(self.reader.read_u8()?);
            }
            1 => {
                if self.reader.len() < 3 {
                    return Ok(UnpackResult::NotEnoughBytes);
                }
                self.reader.read_u8()?;
                csid = 64 + u32::from(self.reader.read_u8()?);
                csid += u32::from(self.reader.read_u8()?) * 256;
            }
            _ => {
                self.reader.read_u8()?;
            }
        }

        if csid != self.current_chunk_info.basic_header.chunk_stream_id {
            //restore the cached header so format 1/2/3 fields inherit
            //from the last message on this chunk stream
            match self.chunk_message_headers.get(&csid) {
                Some(header) => {
                    self.current_chunk_info.message_header = header.clone();
                }
                None => {
                    //the first chunk on a fresh chunk stream must carry a
                    //full (format 0) header
                    if format_id != 0 {
                        tracing::warn!(
                            "chunk stream {csid} started with format {format_id}, expected 0"
                        );
                        self.parse_error_number += 1;
                        if self.parse_error_number > PARSE_ERROR_NUMBER {
                            return Err(UnpackError {
                                value: UnpackErrorValue::CannotParse,
                            });
                        }
                    } else {
                        self.parse_error_number = 0;
                    }
                }
            }
        }

        if format_id == 0 {
            self.current_chunk_info.message_header.timestamp_delta = 0;
        }
        self.current_chunk_info.basic_header.chunk_stream_id = csid;
        self.current_chunk_info.basic_header.format = format_id;

        self.chunk_read_state = ChunkReadState::ReadMessageHeader;

        Ok(UnpackResult::ChunkBasicHeaderResult(ChunkBasicHeader::new(
            format_id, csid,
        )))
    }

    const fn current_message_header(&mut self) -> &mut ChunkMessageHeader {
        &mut self.current_chunk_info.message_header
    }

    /*
     * 5.3.1.2. Message headers by format:
     *  format 0: timestamp(3) msg_length(3) msg_type_id(1) msg_stream_id(4, LE)
     *  format 1: timestamp_delta(3) msg_length(3) msg_type_id(1)
     *  format 2: timestamp_delta(3)
     *  format 3: nothing
     */
    fn read_message_header(&mut self) -> Result<UnpackResult, UnpackError> {
        //format 3 inherits the presence of the extended timestamp from
        //the most recent format 0/1/2 header on this chunk stream
        if self.current_chunk_info.basic_header.format != 3 {
            self.current_message_header().extended_timestamp_type = ExtendTimestampType::NONE;
        }

        match self.current_chunk_info.basic_header.format {
            0 => {
                if self.reader.len() < 11 {
                    return Ok(UnpackResult::NotEnoughBytes);
                }
                self.current_message_header().timestamp = self.reader.read_u24::<BigEndian>()?;
                self.current_message_header().msg_length = self.reader.read_u24::<BigEndian>()?;
                self.current_message_header().msg_type_id = self.reader.read_u8()?;
                self.current_message_header().msg_stream_id =
                    self.reader.read_u32::<LittleEndian>()?;

                if self.current_message_header().timestamp >= 0xff_ffff {
                    self.current_message_header().extended_timestamp_type =
                        ExtendTimestampType::FORMAT0;
                }
            }
            1 => {
                if self.reader.len() < 7 {
                    return Ok(UnpackResult::NotEnoughBytes);
                }
                self.current_message_header().timestamp_delta =
                    self.reader.read_u24::<BigEndian>()?;
                self.current_message_header().msg_length = self.reader.read_u24::<BigEndian>()?;
                self.current_message_header().msg_type_id = self.reader.read_u8()?;

                if self.current_message_header().timestamp_delta >= 0xff_ffff {
                    self.current_message_header().extended_timestamp_type =
                        ExtendTimestampType::FORMAT12;
                }
            }
            2 => {
                self.current_message_header().timestamp_delta =
                    self.reader.read_u24::<BigEndian>()?;

                if self.current_message_header().timestamp_delta >= 0xff_ffff {
                    self.current_message_header().extended_timestamp_type =
                        ExtendTimestampType::FORMAT12;
                }
            }
            _ => {}
        }

        self.chunk_read_state = ChunkReadState::ReadExtendedTimestamp;
        Ok(UnpackResult::Success)
    }

    /*
     * 5.3.1.3. The extended timestamp is present whenever the 24-bit
     * field saturated, on every following chunk of the message --
     * including type 3 continuations, which is how Flash Media Server
     * behaves.
     */
    fn read_extended_timestamp(&mut self) -> Result<UnpackResult, UnpackError> {
        match self.current_message_header().extended_timestamp_type {
            ExtendTimestampType::FORMAT0 => {
                self.current_message_header().timestamp = self.reader.read_u32::<BigEndian>()?;
            }
            ExtendTimestampType::FORMAT12 => {
                self.current_message_header().timestamp_delta =
                    self.reader.read_u32::<BigEndian>()?;
            }
            ExtendTimestampType::NONE => {}
        }

        //fold the delta into the absolute timestamp once per message
        let cur_format_id = self.current_chunk_info.basic_header.format;
        if cur_format_id == 1
            || cur_format_id == 2
            || (cur_format_id == 3 && self.current_chunk_info.payload.is_empty())
        {
            let timestamp = self.current_message_header().timestamp;
            let timestamp_delta = self.current_message_header().timestamp_delta;
            let (abs_timestamp, overflowed) = timestamp.overflowing_add(timestamp_delta);
            if overflowed {
                tracing::warn!(
                    timestamp,
                    timestamp_delta,
                    "32-bit timestamp wrapped while accumulating deltas"
                );
            }
            self.current_message_header().timestamp = abs_timestamp;
        }

        self.chunk_read_state = ChunkReadState::ReadMessagePayload;
        Ok(UnpackResult::Success)
    }

    fn read_message_payload(&mut self) -> Result<UnpackResult, UnpackError> {
        let whole_msg_length = self.current_message_header().msg_length as usize;

        if whole_msg_length > MAX_MESSAGE_SIZE {
            return Err(UnpackError {
                value: UnpackErrorValue::MessageTooLarge(whole_msg_length, MAX_MESSAGE_SIZE),
            });
        }

        let remaining_bytes = whole_msg_length - self.current_chunk_info.payload.len();
        let need_read_length = min(remaining_bytes, self.max_chunk_size);

        let remaining_mut = self.current_chunk_info.payload.remaining_mut();
        if need_read_length > remaining_mut {
            self.current_chunk_info
                .payload
                .reserve(need_read_length - remaining_mut);
        }

        let payload_data = self.reader.read_bytes(need_read_length)?;
        self.current_chunk_info
            .payload
            .extend_from_slice(&payload_data[..]);

        if self.current_chunk_info.payload.len() == whole_msg_length {
            self.chunk_read_state = ChunkReadState::Finish;
            let chunk_info = self.current_chunk_info.clone();
            self.current_chunk_info.payload.clear();

            let csid = self.current_chunk_info.basic_header.chunk_stream_id;
            self.maybe_prune_headers();
            self.chunk_message_headers
                .insert(csid, self.current_chunk_info.message_header.clone());

            return Ok(UnpackResult::ChunkInfo(chunk_info));
        }

        self.chunk_read_state = ChunkReadState::ReadBasicHeader;
        Ok(UnpackResult::Success)
    }

    fn maybe_prune_headers(&mut self) {
        if self.chunk_message_headers.len() > MAX_CACHED_CHUNK_HEADERS {
            let to_remove: Vec<u32> = self
                .chunk_message_headers
                .keys()
                .take(self.chunk_message_headers.len() / 2)
                .copied()
                .collect();
            for key in to_remove {
                self.chunk_message_headers.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_chunk_size_message() {
        let mut unpacker = ChunkUnpacketizer::new();

        let data: [u8; 16] = [
            2, //format 0 + csid 2
            0, 0, 0, //timestamp
            0, 0, 4, //msg_length
            1, //msg_type_id: set chunk size
            0, 0, 0, 0, //msg_stream_id
            0, 0, 16, 0, //body
        ];
        unpacker.extend_data(&data[..]).unwrap();

        let mut body = BytesMut::new();
        body.extend_from_slice(&[0, 0, 16, 0]);
        let expected = ChunkInfo::new(2, 0, 0, 4, 1, 0, body);

        assert_eq!(
            unpacker.read_chunk().unwrap(),
            UnpackResult::ChunkInfo(expected)
        );
    }

    #[test]
    fn test_format1_delta_accumulates() {
        let mut unpacker = ChunkUnpacketizer::new();

        // format 0, csid 4, ts 100, 1-byte audio message
        let first: [u8; 13] = [
            0x04, 0, 0, 100, 0, 0, 1, 8, 1, 0, 0, 0, 0xAA,
        ];
        unpacker.extend_data(&first[..]).unwrap();
        let chunk = match unpacker.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(chunk.message_header.timestamp, 100);

        // format 1 on the same csid with delta 33
        let second: [u8; 9] = [0x44, 0, 0, 33, 0, 0, 1, 8, 0xBB];
        unpacker.extend_data(&second[..]).unwrap();
        let chunk = match unpacker.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(chunk.message_header.timestamp, 133);

        // format 3 inherits the delta wholesale
        let third: [u8; 2] = [0xC4, 0xCC];
        unpacker.extend_data(&third[..]).unwrap();
        let chunk = match unpacker.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(chunk.message_header.timestamp, 166);
    }

    #[test]
    fn test_payload_split_across_chunks() {
        let mut unpacker = ChunkUnpacketizer::new();
        unpacker.update_max_chunk_size(4);

        // 6-byte message split 4 + 2, type 3 continuation between
        let mut data = vec![
            0x04, 0, 0, 0, 0, 0, 6, 8, 1, 0, 0, 0, //header
            1, 2, 3, 4, //first chunk of payload
            0xC4, //type 3 continuation
            5, 6, //rest
        ];
        unpacker.extend_data(&data[..]).unwrap();
        data.clear();

        let chunk = match unpacker.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(&chunk.payload[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_extended_timestamp_format0() {
        let mut unpacker = ChunkUnpacketizer::new();

        let mut data = vec![
            0x04, //format 0 csid 4
            0xff, 0xff, 0xff, //saturated timestamp
            0, 0, 1, //length 1
            8, //audio
            0, 0, 0, 0, //stream id
            0x01, 0x00, 0x00, 0x00, //extended timestamp = 16777216
            0xAA,
        ];
        unpacker.extend_data(&data[..]).unwrap();
        data.clear();

        let chunk = match unpacker.read_chunk().unwrap() {
            UnpackResult::ChunkInfo(info) => info,
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(chunk.message_header.timestamp, 0x0100_0000);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut unpacker = ChunkUnpacketizer::new();
        // length field claims 11MB
        let data: [u8; 12] = [0x04, 0, 0, 0, 0xB0, 0x00, 0x00, 8, 1, 0, 0, 0];
        unpacker.extend_data(&data[..]).unwrap();
        let result = unpacker.read_chunk();
        assert!(matches!(
            result.unwrap_err().value,
            UnpackErrorValue::MessageTooLarge(..)
        ));
    }
}
