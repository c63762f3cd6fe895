pub mod define;
pub mod errors;
pub mod packetizer;
pub mod unpacketizer;

pub use define::{ChunkBasicHeader, ChunkInfo, ChunkMessageHeader, ExtendTimestampType};
