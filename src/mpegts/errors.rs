use crate::bytesio::bytes_errors::{BytesReadError, BytesWriteError};

#[derive(Debug, thiserror::Error)]
pub enum MpegTsErrorValue {
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("stream count exceeds the program map capacity")]
    StreamCountExeceed,
    #[error("unknown pid: {0}")]
    UnknownPid(u16),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct MpegTsError {
    pub value: MpegTsErrorValue,
}

impl From<BytesReadError> for MpegTsError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: MpegTsErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for MpegTsError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: MpegTsErrorValue::BytesWriteError(error),
        }
    }
}
