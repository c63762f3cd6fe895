use {
    crate::bytesio::bytes_errors::BytesWriteError,
    crate::flv::amf0::errors::Amf0WriteError,
};

#[derive(Debug, thiserror::Error)]
pub enum NetStreamErrorValue {
    #[error("amf0 write error: {0}")]
    Amf0WriteError(Amf0WriteError),
    #[error("bytes write error: {0}")]
    BytesWriteError(BytesWriteError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct NetStreamError {
    pub value: NetStreamErrorValue,
}

impl From<Amf0WriteError> for NetStreamError {
    fn from(error: Amf0WriteError) -> Self {
        Self {
            value: NetStreamErrorValue::Amf0WriteError(error),
        }
    }
}

impl From<BytesWriteError> for NetStreamError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: NetStreamErrorValue::BytesWriteError(error),
        }
    }
}
