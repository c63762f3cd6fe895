use crate::bytesio::{bits_errors::BitError, bytes_errors::BytesReadError};

#[derive(Debug, thiserror::Error)]
pub enum H264ErrorValue {
    #[error("bits error: {0}")]
    BitError(BitError),
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("not an sps nalu")]
    NotSpsNalu,
    #[error("unsupported chroma format: {0}")]
    UnsupportedChromaFormat(u64),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct H264Error {
    pub value: H264ErrorValue,
}

impl From<BitError> for H264Error {
    fn from(error: BitError) -> Self {
        Self {
            value: H264ErrorValue::BitError(error),
        }
    }
}

impl From<BytesReadError> for H264Error {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: H264ErrorValue::BytesReadError(error),
        }
    }
}
