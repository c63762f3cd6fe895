use bytes::BytesMut;
use serde::Serialize;
use std::fmt;

pub mod tag_type {
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const SCRIPT_DATA_AMF: u8 = 18;
}

pub mod frame_type {
    pub const KEY_FRAME: u8 = 1;
    pub const INTER_FRAME: u8 = 2;
    pub const DISPOSABLE_INTER_FRAME: u8 = 3;
    pub const GENERATED_KEY_FRAME: u8 = 4;
    pub const VIDEO_INFO_FRAME: u8 = 5;
}

pub mod avc_packet_type {
    pub const AVC_SEQHDR: u8 = 0;
    pub const AVC_NALU: u8 = 1;
    pub const AVC_EOS: u8 = 2;
}

pub mod aac_packet_type {
    pub const AAC_SEQHDR: u8 = 0;
    pub const AAC_RAW: u8 = 1;
}

/// FLV audio SoundFormat ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SoundFormat {
    #[default]
    PCM = 0,
    ADPCM = 1,
    MP3 = 2,
    PcmLe = 3,
    Nellymoser16 = 4,
    Nellymoser8 = 5,
    Nellymoser = 6,
    G711A = 7,
    G711MU = 8,
    AAC = 10,
    SPEEX = 11,
    MP3_8HZ = 14,
    DeviceSpecific = 15,
}

/// FLV video CodecID values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum AvcCodecId {
    #[default]
    UNKNOWN = 0,
    H263 = 2,
    SCREEN = 3,
    VP6 = 4,
    VP6Alpha = 5,
    Screen2 = 6,
    H264 = 7,
    H265 = 12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum AacProfile {
    #[default]
    Reserved = 3,
    Main = 0,
    LC = 1,
    SSR = 2,
}

impl fmt::Display for AacProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let profile = match self {
            Self::Main => "Main",
            Self::LC => "LC",
            Self::SSR => "SSR",
            Self::Reserved => "Reserved",
        };
        write!(f, "{profile}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum AvcProfile {
    #[default]
    Baseline = 66,
    Main = 77,
    Extended = 88,
    High = 100,
    High10 = 110,
    High422 = 122,
    High444 = 244,
}

impl fmt::Display for AvcProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let profile = match self {
            Self::Baseline => "Baseline",
            Self::Main => "Main",
            Self::Extended => "Extended",
            Self::High => "High",
            Self::High10 => "High(10)",
            Self::High422 => "High(422)",
            Self::High444 => "High(444)",
        };
        write!(f, "{profile}")
    }
}

/// AVC level_idc, stored as (level * 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum AvcLevel {
    #[default]
    Level1 = 10,
    Level11 = 11,
    Level12 = 12,
    Level13 = 13,
    Level2 = 20,
    Level21 = 21,
    Level22 = 22,
    Level3 = 30,
    Level31 = 31,
    Level32 = 32,
    Level4 = 40,
    Level41 = 41,
    Level42 = 42,
    Level5 = 50,
    Level51 = 51,
    Level52 = 52,
}

impl fmt::Display for AvcLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level = *self as u8;
        write!(f, "{}.{}", level / 10, level % 10)
    }
}

pub fn u8_2_avc_profile(profile: u8) -> AvcProfile {
    match profile {
        77 => AvcProfile::Main,
        88 => AvcProfile::Extended,
        100 => AvcProfile::High,
        110 => AvcProfile::High10,
        122 => AvcProfile::High422,
        244 => AvcProfile::High444,
        _ => AvcProfile::Baseline,
    }
}

pub fn u8_2_avc_level(level: u8) -> AvcLevel {
    match level {
        11 => AvcLevel::Level11,
        12 => AvcLevel::Level12,
        13 => AvcLevel::Level13,
        20 => AvcLevel::Level2,
        21 => AvcLevel::Level21,
        22 => AvcLevel::Level22,
        30 => AvcLevel::Level3,
        31 => AvcLevel::Level31,
        32 => AvcLevel::Level32,
        40 => AvcLevel::Level4,
        41 => AvcLevel::Level41,
        42 => AvcLevel::Level42,
        50 => AvcLevel::Level5,
        51 => AvcLevel::Level51,
        52 => AvcLevel::Level52,
        _ => AvcLevel::Level1,
    }
}

/// One demultiplexed FLV tag body with its timestamp on the hub's
/// virtual (monotonic, 64-bit) timeline. Wire formats truncate to
/// 32 bits when serializing.
#[derive(Clone)]
pub enum FlvData {
    Video { timestamp: u64, data: BytesMut },
    Audio { timestamp: u64, data: BytesMut },
    MetaData { timestamp: u64, data: BytesMut },
}
