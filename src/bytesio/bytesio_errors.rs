use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BytesIOErrorValue {
    #[error("not enough bytes")]
    NotEnoughBytes,
    #[error("empty stream")]
    EmptyStream,
    #[error("io error")]
    IOError(io::Error),
    #[error("time out error")]
    TimeoutError(tokio::time::error::Elapsed),
    #[error("none return")]
    NoneReturn,
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct BytesIOError {
    pub value: BytesIOErrorValue,
}

impl From<BytesIOErrorValue> for BytesIOError {
    fn from(val: BytesIOErrorValue) -> Self {
        Self { value: val }
    }
}

impl From<io::Error> for BytesIOError {
    fn from(error: io::Error) -> Self {
        Self {
            value: BytesIOErrorValue::IOError(error),
        }
    }
}

impl From<tokio::time::error::Elapsed> for BytesIOError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self {
            value: BytesIOErrorValue::TimeoutError(error),
        }
    }
}
