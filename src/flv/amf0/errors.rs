use crate::bytesio::bytes_errors::{BytesReadError, BytesWriteError};
use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum Amf0ReadErrorValue {
    #[error("bytes read error: {0}")]
    BytesReadError(BytesReadError),
    #[error("unknown marker: {marker}")]
    UnknownMarker { marker: u8 },
    #[error("wrong type")]
    WrongType,
    #[error("string parse error: {0}")]
    StringParseError(FromUtf8Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct Amf0ReadError {
    pub value: Amf0ReadErrorValue,
}

impl From<Amf0ReadErrorValue> for Amf0ReadError {
    fn from(val: Amf0ReadErrorValue) -> Self {
        Self { value: val }
    }
}

impl From<BytesReadError> for Amf0ReadError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: Amf0ReadErrorValue::BytesReadError(error),
        }
    }
}

impl From<FromUtf8Error> for Amf0ReadError {
    fn from(error: FromUtf8Error) -> Self {
        Self {
            value: Amf0ReadErrorValue::StringParseError(error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Amf0WriteErrorValue {
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
    #[error("normal string too long")]
    NormalStringTooLong,
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct Amf0WriteError {
    pub value: Amf0WriteErrorValue,
}

impl From<Amf0WriteErrorValue> for Amf0WriteError {
    fn from(val: Amf0WriteErrorValue) -> Self {
        Self { value: val }
    }
}

impl From<BytesWriteError> for Amf0WriteError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: Amf0WriteErrorValue::BytesWriteError(error),
        }
    }
}
