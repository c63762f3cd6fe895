pub mod errors;
pub mod playlist;
pub mod remuxer;
pub mod segment_manager;

pub use playlist::M3u8;
pub use remuxer::{HlsConfig, HlsRemuxer};
pub use segment_manager::{CleanupConfig, SegmentManager};
