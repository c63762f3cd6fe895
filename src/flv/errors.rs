use {
    super::amf0::errors::{Amf0ReadError, Amf0WriteError},
    crate::bytesio::{
        bits_errors::BitError,
        bytes_errors::{BytesReadError, BytesWriteError},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum FlvMuxerErrorValue {
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct FlvMuxerError {
    pub value: FlvMuxerErrorValue,
}

impl From<BytesWriteError> for FlvMuxerError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: FlvMuxerErrorValue::BytesWriteError(error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlvDemuxerErrorValue {
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("mpeg avc error: {0}")]
    MpegAvcError(MpegError),
    #[error("mpeg aac error: {0}")]
    MpegAacError(MpegError),
    #[error("amf write error: {0}")]
    Amf0WriteError(Amf0WriteError),
    #[error("amf read error: {0}")]
    Amf0ReadError(Amf0ReadError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct FlvDemuxerError {
    pub value: FlvDemuxerErrorValue,
}

impl From<BytesWriteError> for FlvDemuxerError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: FlvDemuxerErrorValue::BytesWriteError(error),
        }
    }
}

impl From<BytesReadError> for FlvDemuxerError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: FlvDemuxerErrorValue::BytesReadError(error),
        }
    }
}

impl From<MpegError> for FlvDemuxerError {
    fn from(error: MpegError) -> Self {
        Self {
            value: FlvDemuxerErrorValue::MpegAvcError(error),
        }
    }
}

impl From<Amf0WriteError> for FlvDemuxerError {
    fn from(error: Amf0WriteError) -> Self {
        Self {
            value: FlvDemuxerErrorValue::Amf0WriteError(error),
        }
    }
}

impl From<Amf0ReadError> for FlvDemuxerError {
    fn from(error: Amf0ReadError) -> Self {
        Self {
            value: FlvDemuxerErrorValue::Amf0ReadError(error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MpegErrorValue {
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("bits error: {0}")]
    BitError(BitError),
    #[error("there is not enough data to parse")]
    NotEnoughBytesToParse,
    #[error("should not come here")]
    ShouldNotComeHere,
    #[error("sps nalu is not found")]
    SPSNotFound,
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct MpegError {
    pub value: MpegErrorValue,
}

impl From<BytesReadError> for MpegError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: MpegErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for MpegError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: MpegErrorValue::BytesWriteError(error),
        }
    }
}

impl From<BitError> for MpegError {
    fn from(error: BitError) -> Self {
        Self {
            value: MpegErrorValue::BitError(error),
        }
    }
}
