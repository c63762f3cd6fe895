pub mod amf0_reader;
pub mod amf0_writer;
pub mod define;
pub mod errors;

pub use amf0_reader::Amf0Reader;
pub use amf0_writer::Amf0Writer;
pub use define::Amf0ValueType;
