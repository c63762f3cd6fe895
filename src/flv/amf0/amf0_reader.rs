use {
    super::{
        define::{amf0_markers, Amf0ValueType, UnOrderedMap},
        errors::{Amf0ReadError, Amf0ReadErrorValue},
    },
    byteorder::BigEndian,
    crate::bytesio::bytes_reader::BytesReader,
};

pub struct Amf0Reader {
    reader: BytesReader,
}

impl Amf0Reader {
    #[must_use]
    pub const fn new(reader: BytesReader) -> Self {
        Self { reader }
    }

    pub fn read_all(&mut self) -> Result<Vec<Amf0ValueType>, Amf0ReadError> {
        let mut results = vec![];

        loop {
            let result = self.read_any()?;

            match result {
                Amf0ValueType::END => {
                    break;
                }
                _ => {
                    results.push(result);
                }
            }
        }

        Ok(results)
    }

    pub fn read_any(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        if self.reader.is_empty() {
            return Ok(Amf0ValueType::END);
        }

        let markers = self.reader.read_u8()?;

        if markers == amf0_markers::OBJECT_END {
            return Ok(Amf0ValueType::END);
        }

        match markers {
            amf0_markers::NUMBER => self.read_number(),
            amf0_markers::BOOLEAN => self.read_bool(),
            amf0_markers::STRING => self.read_string(),
            amf0_markers::OBJECT => self.read_object(),
            amf0_markers::NULL => self.read_null(),
            amf0_markers::UNDEFINED => self.read_undefined(),
            amf0_markers::ECMA_ARRAY => self.read_ecma_array(),
            amf0_markers::STRICT_ARRAY => self.read_strict_array(),
            amf0_markers::DATE => self.read_date(),
            amf0_markers::LONG_STRING => self.read_long_string(),
            _ => Err(Amf0ReadError {
                value: Amf0ReadErrorValue::UnknownMarker { marker: markers },
            }),
        }
    }

    pub fn read_with_type(
        &mut self,
        specified_marker: u8,
    ) -> Result<Amf0ValueType, Amf0ReadError> {
        let marker = self.reader.advance_u8()?;

        if marker != specified_marker {
            return Err(Amf0ReadError {
                value: Amf0ReadErrorValue::WrongType,
            });
        }

        self.read_any()
    }

    pub fn read_number(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let number = self.reader.read_f64::<BigEndian>()?;
        let value = Amf0ValueType::Number(number);
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let value = self.reader.read_u8()?;

        match value {
            1 => Ok(Amf0ValueType::Boolean(true)),
            _ => Ok(Amf0ValueType::Boolean(false)),
        }
    }

    fn read_raw_string(&mut self) -> Result<String, Amf0ReadError> {
        let l = self.reader.read_u16::<BigEndian>()?;
        let bytes = self.reader.read_bytes(l as usize)?;
        let val = String::from_utf8(bytes.to_vec())?;
        Ok(val)
    }

    pub fn read_string(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let raw_string = self.read_raw_string()?;
        Ok(Amf0ValueType::UTF8String(raw_string))
    }

    pub fn read_null(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        Ok(Amf0ValueType::Null)
    }

    pub fn read_undefined(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        Ok(Amf0ValueType::Undefined)
    }

    fn is_read_object_eof(&mut self) -> Result<bool, Amf0ReadError> {
        let marker = self.reader.advance_bytes(3)?;
        if marker[0] == 0x00 && marker[1] == 0x00 && marker[2] == amf0_markers::OBJECT_END {
            self.reader.read_bytes(3)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn read_object(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let mut properties = UnOrderedMap::new();

        loop {
            let is_eof = self.is_read_object_eof()?;

            if is_eof {
                break;
            }

            let key = self.read_raw_string()?;
            let val = self.read_any()?;

            properties.insert(key, val);
        }

        Ok(Amf0ValueType::Object(properties))
    }

    pub fn read_ecma_array(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let len = self.reader.read_u32::<BigEndian>()?;

        let mut properties = UnOrderedMap::new();

        //here we do not use length -- same as the object end marker loop,
        //some encoders write a wrong length.
        for _ in 0..len {
            let is_eof = self.is_read_object_eof()?;

            if is_eof {
                break;
            }

            let key = self.read_raw_string()?;
            let val = self.read_any()?;
            properties.insert(key, val);
        }

        if self.reader.len() >= 3 {
            self.is_read_object_eof()?;
        }

        Ok(Amf0ValueType::EcmaArray(properties))
    }

    pub fn read_strict_array(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let len = self.reader.read_u32::<BigEndian>()?;

        let mut values = Vec::with_capacity(len as usize);
        for _ in 0..len {
            values.push(self.read_any()?);
        }

        Ok(Amf0ValueType::StrictArray(values))
    }

    pub fn read_date(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let millis = self.reader.read_f64::<BigEndian>()?;
        let timezone = self.reader.read_u16::<BigEndian>()? as i16;
        Ok(Amf0ValueType::Date(millis, timezone))
    }

    pub fn read_long_string(&mut self) -> Result<Amf0ValueType, Amf0ReadError> {
        let l = self.reader.read_u32::<BigEndian>()?;

        let buff = self.reader.read_bytes(l as usize)?;

        let val = String::from_utf8(buff.to_vec())?;
        Ok(Amf0ValueType::LongUTF8String(val))
    }

    pub fn extract_remaining_bytes(&mut self) -> bytes::BytesMut {
        self.reader.extract_remaining_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reader.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn reader_over(data: &[u8]) -> Amf0Reader {
        Amf0Reader::new(BytesReader::new(BytesMut::from(data)))
    }

    #[test]
    fn test_read_number() {
        let mut data = vec![amf0_markers::NUMBER];
        data.extend_from_slice(&772.161_f64.to_be_bytes());
        let mut reader = reader_over(&data);
        assert_eq!(reader.read_any().unwrap(), Amf0ValueType::Number(772.161));
    }

    #[test]
    fn test_read_boolean() {
        let mut reader = reader_over(&[amf0_markers::BOOLEAN, 1]);
        assert_eq!(reader.read_any().unwrap(), Amf0ValueType::Boolean(true));
    }

    #[test]
    fn test_read_string() {
        let mut data = vec![amf0_markers::STRING, 0x00, 0x07];
        data.extend_from_slice(b"connect");
        let mut reader = reader_over(&data);
        assert_eq!(
            reader.read_any().unwrap(),
            Amf0ValueType::UTF8String(String::from("connect"))
        );
    }

    #[test]
    fn test_read_object() {
        // { app: "live" }
        let mut data = vec![amf0_markers::OBJECT];
        data.extend_from_slice(&[0x00, 0x03]);
        data.extend_from_slice(b"app");
        data.push(amf0_markers::STRING);
        data.extend_from_slice(&[0x00, 0x04]);
        data.extend_from_slice(b"live");
        data.extend_from_slice(&[0x00, 0x00, amf0_markers::OBJECT_END]);

        let mut reader = reader_over(&data);
        let mut expected = UnOrderedMap::new();
        expected.insert(
            String::from("app"),
            Amf0ValueType::UTF8String(String::from("live")),
        );
        assert_eq!(reader.read_any().unwrap(), Amf0ValueType::Object(expected));
    }

    #[test]
    fn test_read_unknown_marker() {
        let mut reader = reader_over(&[0x0d]);
        let result = reader.read_any();
        assert!(matches!(
            result.unwrap_err().value,
            Amf0ReadErrorValue::UnknownMarker { marker: 0x0d }
        ));
    }

    #[test]
    fn test_read_with_wrong_type() {
        let mut reader = reader_over(&[amf0_markers::BOOLEAN, 1]);
        let result = reader.read_with_type(amf0_markers::NUMBER);
        assert!(matches!(
            result.unwrap_err().value,
            Amf0ReadErrorValue::WrongType
        ));
    }
}
