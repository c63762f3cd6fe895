use {
    super::bytes_errors::{BytesWriteError, BytesWriteErrorValue},
    byteorder::ByteOrder,
    bytes::BytesMut,
};

#[derive(Default)]
pub struct BytesWriter {
    pub bytes: Vec<u8>,
}

impl BytesWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn write_u8(&mut self, byte: u8) -> Result<(), BytesWriteError> {
        self.bytes.push(byte);
        Ok(())
    }

    pub fn write_u16<T: ByteOrder>(&mut self, bytes: u16) -> Result<(), BytesWriteError> {
        let mut temp = [0_u8; 2];
        T::write_u16(&mut temp, bytes);
        self.bytes.extend_from_slice(&temp);
        Ok(())
    }

    pub fn write_u24<T: ByteOrder>(&mut self, bytes: u32) -> Result<(), BytesWriteError> {
        let mut temp = [0_u8; 3];
        T::write_u24(&mut temp, bytes);
        self.bytes.extend_from_slice(&temp);
        Ok(())
    }

    pub fn write_u32<T: ByteOrder>(&mut self, bytes: u32) -> Result<(), BytesWriteError> {
        let mut temp = [0_u8; 4];
        T::write_u32(&mut temp, bytes);
        self.bytes.extend_from_slice(&temp);
        Ok(())
    }

    pub fn write_u64<T: ByteOrder>(&mut self, bytes: u64) -> Result<(), BytesWriteError> {
        let mut temp = [0_u8; 8];
        T::write_u64(&mut temp, bytes);
        self.bytes.extend_from_slice(&temp);
        Ok(())
    }

    pub fn write_f64<T: ByteOrder>(&mut self, bytes: f64) -> Result<(), BytesWriteError> {
        let mut temp = [0_u8; 8];
        T::write_f64(&mut temp, bytes);
        self.bytes.extend_from_slice(&temp);
        Ok(())
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<(), BytesWriteError> {
        self.bytes.extend_from_slice(buf);
        Ok(())
    }

    /// Overwrite already-written bytes at `position`. Used to backfill
    /// length fields after a variable-sized body is known.
    pub fn write_at(&mut self, position: usize, buf: &[u8]) -> Result<(), BytesWriteError> {
        if position + buf.len() > self.bytes.len() {
            return Err(BytesWriteError {
                value: BytesWriteErrorValue::OutofIndex,
            });
        }
        self.bytes[position..position + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    pub fn prepend(&mut self, buf: &[u8]) -> Result<(), BytesWriteError> {
        let mut new_bytes = Vec::with_capacity(buf.len() + self.bytes.len());
        new_bytes.extend_from_slice(buf);
        new_bytes.append(&mut self.bytes);
        self.bytes = new_bytes;
        Ok(())
    }

    pub fn extract_current_bytes(&mut self) -> BytesMut {
        let mut rv_data = BytesMut::new();
        rv_data.extend_from_slice(&self.bytes);
        self.bytes.clear();
        rv_data
    }

    #[must_use]
    pub fn get_current_bytes(&self) -> BytesMut {
        let mut rv_data = BytesMut::new();
        rv_data.extend_from_slice(&self.bytes);
        rv_data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::BigEndian;

    #[test]
    fn test_write_integers() {
        let mut writer = BytesWriter::new();
        writer.write_u8(0x01).unwrap();
        writer.write_u16::<BigEndian>(0x0203).unwrap();
        writer.write_u24::<BigEndian>(0x040506).unwrap();
        assert_eq!(&writer.get_current_bytes()[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_write_at_backfill() {
        let mut writer = BytesWriter::new();
        writer.write_u32::<BigEndian>(0).unwrap();
        writer.write(b"moof").unwrap();
        writer.write_at(0, &8_u32.to_be_bytes()).unwrap();
        assert_eq!(&writer.get_current_bytes()[..4], &[0, 0, 0, 8]);
    }

    #[test]
    fn test_write_at_out_of_index() {
        let mut writer = BytesWriter::new();
        writer.write_u8(0).unwrap();
        let result = writer.write_at(4, &[1, 2]);
        assert!(matches!(
            result.unwrap_err().value,
            BytesWriteErrorValue::OutofIndex
        ));
    }

    #[test]
    fn test_extract_clears() {
        let mut writer = BytesWriter::new();
        writer.write(b"abc").unwrap();
        let data = writer.extract_current_bytes();
        assert_eq!(&data[..], b"abc");
        assert!(writer.is_empty());
    }
}
