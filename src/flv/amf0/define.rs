use indexmap::IndexMap;

pub mod amf0_markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIE_CLIP: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0a;
    pub const DATE: u8 = 0x0b;
    pub const LONG_STRING: u8 = 0x0c;
}

pub type UnOrderedMap = IndexMap<String, Amf0ValueType>;

#[derive(Debug, Clone, PartialEq)]
pub enum Amf0ValueType {
    Number(f64),
    Boolean(bool),
    UTF8String(String),
    Object(UnOrderedMap),
    Null,
    Undefined,
    EcmaArray(UnOrderedMap),
    StrictArray(Vec<Amf0ValueType>),
    /// Milliseconds since epoch plus a (reserved, zero) timezone.
    Date(f64, i16),
    LongUTF8String(String),
    END,
}
