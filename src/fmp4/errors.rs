use crate::bytesio::bytes_errors::BytesWriteError;

#[derive(Debug, thiserror::Error)]
pub enum Fmp4ErrorValue {
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("no samples in fragment")]
    EmptyFragment,
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct Fmp4Error {
    pub value: Fmp4ErrorValue,
}

impl From<BytesWriteError> for Fmp4Error {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: Fmp4ErrorValue::BytesWriteError(error),
        }
    }
}
