use {
    super::bytes_errors::{BytesReadError, BytesReadErrorValue},
    byteorder::ByteOrder,
    bytes::BytesMut,
};

/// Upper bound for buffered, not-yet-parsed input per reader.
/// A peer that streams data faster than we parse it cannot grow the
/// buffer past this point.
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

pub struct BytesReader {
    buffer: BytesMut,
}

impl BytesReader {
    #[must_use]
    pub const fn new(input: BytesMut) -> Self {
        Self { buffer: input }
    }

    pub fn extend_from_slice(&mut self, extend: &[u8]) -> Result<(), BytesReadError> {
        if self.buffer.len() + extend.len() > MAX_BUFFER_SIZE {
            return Err(BytesReadError {
                value: BytesReadErrorValue::BufferOverflow {
                    current: self.buffer.len(),
                    additional: extend.len(),
                    max: MAX_BUFFER_SIZE,
                },
            });
        }
        self.buffer.extend_from_slice(extend);
        Ok(())
    }

    pub fn read_bytes(&mut self, bytes_num: usize) -> Result<BytesMut, BytesReadError> {
        if self.buffer.len() < bytes_num {
            return Err(BytesReadError {
                value: BytesReadErrorValue::NotEnoughBytes,
            });
        }
        Ok(self.buffer.split_to(bytes_num))
    }

    /// Peek `bytes_num` bytes without consuming them.
    pub fn advance_bytes(&self, bytes_num: usize) -> Result<BytesMut, BytesReadError> {
        if self.buffer.len() < bytes_num {
            return Err(BytesReadError {
                value: BytesReadErrorValue::NotEnoughBytes,
            });
        }
        let mut data = BytesMut::with_capacity(bytes_num);
        data.extend_from_slice(&self.buffer[..bytes_num]);
        Ok(data)
    }

    pub fn read_u8(&mut self) -> Result<u8, BytesReadError> {
        let data = self.read_bytes(1)?;
        Ok(data[0])
    }

    /// Peek one byte without consuming it.
    pub fn advance_u8(&self) -> Result<u8, BytesReadError> {
        if self.buffer.is_empty() {
            return Err(BytesReadError {
                value: BytesReadErrorValue::NotEnoughBytes,
            });
        }
        Ok(self.buffer[0])
    }

    pub fn read_u16<T: ByteOrder>(&mut self) -> Result<u16, BytesReadError> {
        let data = self.read_bytes(2)?;
        Ok(T::read_u16(&data))
    }

    pub fn read_u24<T: ByteOrder>(&mut self) -> Result<u32, BytesReadError> {
        let data = self.read_bytes(3)?;
        Ok(T::read_u24(&data))
    }

    pub fn read_u32<T: ByteOrder>(&mut self) -> Result<u32, BytesReadError> {
        let data = self.read_bytes(4)?;
        Ok(T::read_u32(&data))
    }

    pub fn read_f64<T: ByteOrder>(&mut self) -> Result<f64, BytesReadError> {
        let data = self.read_bytes(8)?;
        Ok(T::read_f64(&data))
    }

    pub fn extract_remaining_bytes(&mut self) -> BytesMut {
        self.buffer.split_to(self.buffer.len())
    }

    #[must_use]
    pub fn get_remaining_bytes(&self) -> BytesMut {
        self.buffer.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};

    #[test]
    fn test_read_integers() {
        let data = BytesMut::from(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06][..]);
        let mut reader = BytesReader::new(data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16::<BigEndian>().unwrap(), 0x0203);
        assert_eq!(reader.read_u24::<BigEndian>().unwrap(), 0x040506);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_u32_little_endian() {
        let data = BytesMut::from(&[0x01, 0x00, 0x00, 0x00][..]);
        let mut reader = BytesReader::new(data);
        assert_eq!(reader.read_u32::<LittleEndian>().unwrap(), 1);
    }

    #[test]
    fn test_not_enough_bytes() {
        let data = BytesMut::from(&[0x01][..]);
        let mut reader = BytesReader::new(data);
        let result = reader.read_u32::<BigEndian>();
        assert!(matches!(
            result.unwrap_err().value,
            BytesReadErrorValue::NotEnoughBytes
        ));
    }

    #[test]
    fn test_advance_does_not_consume() {
        let data = BytesMut::from(&[0xAA, 0xBB][..]);
        let reader = BytesReader::new(data);
        assert_eq!(reader.advance_u8().unwrap(), 0xAA);
        assert_eq!(reader.len(), 2);
    }
}
