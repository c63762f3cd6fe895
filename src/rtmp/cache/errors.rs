use {
    crate::bytesio::bytes_errors::{BytesReadError, BytesWriteError},
    crate::flv::errors::MpegError,
    crate::h264::errors::H264Error,
};

#[derive(Debug, thiserror::Error)]
pub enum CacheErrorValue {
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("mpeg error: {0}")]
    MpegError(MpegError),
    #[error("h264 error: {0}")]
    H264Error(H264Error),
    #[error("statistics channel closed")]
    StatisticsSendError,
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct CacheError {
    pub value: CacheErrorValue,
}

impl From<BytesReadError> for CacheError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: CacheErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for CacheError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: CacheErrorValue::BytesWriteError(error),
        }
    }
}

impl From<MpegError> for CacheError {
    fn from(error: MpegError) -> Self {
        Self {
            value: CacheErrorValue::MpegError(error),
        }
    }
}

impl From<H264Error> for CacheError {
    fn from(error: H264Error) -> Self {
        Self {
            value: CacheErrorValue::H264Error(error),
        }
    }
}
