//! rill: a live streaming media server.
//!
//! Publishers push over RTMP into a per-stream hub; subscribers pull
//! the same frames back out over RTMP, HTTP-FLV, HTTP-TS, HLS or
//! MPEG-DASH without re-encoding. The hub keeps sequence headers,
//! metadata and a bounded GOP cache per stream so a joining player
//! renders its first frame immediately.

pub mod bytesio;
pub mod config;
pub mod dash;
pub mod flv;
pub mod fmp4;
pub mod h264;
pub mod hls;
pub mod http;
pub mod httpflv;
pub mod httpts;
pub mod logging;
pub mod mpegts;
pub mod relay;
pub mod rtmp;
pub mod storage;
pub mod streamhub;
