use {
    super::{
        define::{amf0_markers, Amf0ValueType, UnOrderedMap},
        errors::{Amf0WriteError, Amf0WriteErrorValue},
    },
    byteorder::BigEndian,
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
};

#[derive(Default)]
pub struct Amf0Writer {
    writer: BytesWriter,
}

impl Amf0Writer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: BytesWriter::new(),
        }
    }

    pub fn write_any(&mut self, value: &Amf0ValueType) -> Result<(), Amf0WriteError> {
        match value {
            Amf0ValueType::Number(val) => self.write_number(*val),
            Amf0ValueType::Boolean(val) => self.write_bool(*val),
            Amf0ValueType::UTF8String(val) => self.write_string(val),
            Amf0ValueType::Object(val) => self.write_object(val),
            Amf0ValueType::Null => self.write_null(),
            Amf0ValueType::Undefined => self.write_undefined(),
            Amf0ValueType::EcmaArray(val) => self.write_ecma_array(val),
            Amf0ValueType::StrictArray(val) => self.write_strict_array(val),
            Amf0ValueType::Date(millis, timezone) => self.write_date(*millis, *timezone),
            Amf0ValueType::LongUTF8String(val) => self.write_long_string(val),
            Amf0ValueType::END => Ok(()),
        }
    }

    fn write_object_eof(&mut self) -> Result<(), Amf0WriteError> {
        self.writer
            .write_u24::<BigEndian>(amf0_markers::OBJECT_END as u32)?;
        Ok(())
    }

    pub fn write_number(&mut self, value: f64) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::NUMBER)?;
        self.writer.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::BOOLEAN)?;
        self.writer.write_u8(u8::from(value))?;
        Ok(())
    }

    fn write_raw_string(&mut self, value: &str) -> Result<(), Amf0WriteError> {
        if value.len() > u16::MAX as usize {
            return Err(Amf0WriteError {
                value: Amf0WriteErrorValue::NormalStringTooLong,
            });
        }
        self.writer.write_u16::<BigEndian>(value.len() as u16)?;
        self.writer.write(value.as_bytes())?;
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::STRING)?;
        self.write_raw_string(value)?;
        Ok(())
    }

    pub fn write_null(&mut self) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::NULL)?;
        Ok(())
    }

    pub fn write_undefined(&mut self) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::UNDEFINED)?;
        Ok(())
    }

    pub fn write_object(&mut self, properties: &UnOrderedMap) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::OBJECT)?;

        for (key, value) in properties {
            self.write_raw_string(key)?;
            self.write_any(value)?;
        }

        self.write_object_eof()?;
        Ok(())
    }

    pub fn write_ecma_array(&mut self, properties: &UnOrderedMap) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::ECMA_ARRAY)?;
        self.writer.write_u32::<BigEndian>(properties.len() as u32)?;

        for (key, value) in properties {
            self.write_raw_string(key)?;
            self.write_any(value)?;
        }

        self.write_object_eof()?;
        Ok(())
    }

    pub fn write_strict_array(
        &mut self,
        values: &[Amf0ValueType],
    ) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::STRICT_ARRAY)?;
        self.writer.write_u32::<BigEndian>(values.len() as u32)?;

        for value in values {
            self.write_any(value)?;
        }

        Ok(())
    }

    pub fn write_date(&mut self, millis: f64, timezone: i16) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::DATE)?;
        self.writer.write_f64::<BigEndian>(millis)?;
        self.writer.write_u16::<BigEndian>(timezone as u16)?;
        Ok(())
    }

    pub fn write_long_string(&mut self, value: &str) -> Result<(), Amf0WriteError> {
        self.writer.write_u8(amf0_markers::LONG_STRING)?;
        self.writer.write_u32::<BigEndian>(value.len() as u32)?;
        self.writer.write(value.as_bytes())?;
        Ok(())
    }

    pub fn extract_current_bytes(&mut self) -> BytesMut {
        self.writer.extract_current_bytes()
    }

    #[must_use]
    pub fn get_current_bytes(&self) -> BytesMut {
        self.writer.get_current_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::amf0_reader::Amf0Reader;
    use super::*;
    use crate::bytesio::bytes_reader::BytesReader;

    fn round_trip(value: &Amf0ValueType) -> Amf0ValueType {
        let mut writer = Amf0Writer::new();
        writer.write_any(value).unwrap();
        let bytes = writer.extract_current_bytes();
        let mut reader = Amf0Reader::new(BytesReader::new(bytes));
        reader.read_any().unwrap()
    }

    #[test]
    fn test_round_trip_scalars() {
        for value in [
            Amf0ValueType::Number(3.5),
            Amf0ValueType::Boolean(true),
            Amf0ValueType::UTF8String(String::from("createStream")),
            Amf0ValueType::Null,
            Amf0ValueType::Undefined,
            Amf0ValueType::Date(1_234_567_890.0, 0),
            Amf0ValueType::LongUTF8String("x".repeat(70_000)),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn test_round_trip_object() {
        let mut properties = UnOrderedMap::new();
        properties.insert(String::from("width"), Amf0ValueType::Number(1280.0));
        properties.insert(String::from("height"), Amf0ValueType::Number(720.0));
        let value = Amf0ValueType::Object(properties);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_round_trip_ecma_array() {
        let mut properties = UnOrderedMap::new();
        properties.insert(
            String::from("encoder"),
            Amf0ValueType::UTF8String(String::from("obs")),
        );
        let value = Amf0ValueType::EcmaArray(properties);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_round_trip_strict_array() {
        let value = Amf0ValueType::StrictArray(vec![
            Amf0ValueType::Number(1.0),
            Amf0ValueType::Boolean(false),
            Amf0ValueType::UTF8String(String::from("a")),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_object_property_order_is_preserved() {
        let mut properties = UnOrderedMap::new();
        properties.insert(String::from("z"), Amf0ValueType::Number(1.0));
        properties.insert(String::from("a"), Amf0ValueType::Number(2.0));

        if let Amf0ValueType::Object(read_back) = round_trip(&Amf0ValueType::Object(properties)) {
            let keys: Vec<&String> = read_back.keys().collect();
            assert_eq!(keys, vec!["z", "a"]);
        } else {
            panic!("expected object");
        }
    }
}
