pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

pub const PAT_PID: u16 = 0x0000;
pub const PMT_PID: u16 = 0x1000;
/// First elementary stream PID handed out by `add_stream`.
pub const FIRST_ES_PID: u16 = 0x0100;

/// PCR cadence on the 90 kHz clock; 80 ms keeps comfortably inside the
/// 100 ms ceiling the format requires.
pub const PCR_INTERVAL_90KHZ: i64 = 80 * 90;

pub mod epat_pid {
    pub const PAT_TID_PAS: u16 = 0x00;
    pub const PAT_TID_PMS: u16 = 0x02;
}

pub mod epes_stream_id {
    pub const PES_SID_AUDIO: u8 = 0xc0;
    pub const PES_SID_VIDEO: u8 = 0xe0;
}

pub mod epsi_stream_type {
    pub const PSI_STREAM_PRIVATE_DATA: u8 = 0x06;
    pub const PSI_STREAM_AAC: u8 = 0x0f;
    pub const PSI_STREAM_H264: u8 = 0x1b;
    pub const PSI_STREAM_H265: u8 = 0x24;
    pub const PSI_STREAM_AUDIO_OPUS: u8 = 0x9c;
}

pub const MPEG_FLAG_IDR_FRAME: u16 = 0x0001;
