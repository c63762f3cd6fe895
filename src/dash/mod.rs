pub mod errors;
pub mod mpd;
pub mod remuxer;

pub use mpd::Mpd;
pub use remuxer::{DashConfig, DashRemuxer};
