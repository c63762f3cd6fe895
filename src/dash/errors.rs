use {
    crate::flv::errors::MpegError,
    crate::fmp4::errors::Fmp4Error,
    crate::h264::errors::H264Error,
    crate::streamhub::errors::StreamHubError,
};

#[derive(Debug, thiserror::Error)]
pub enum DashErrorValue {
    #[error("stream hub event send error")]
    StreamHubEventSendError,
    #[error("subscribe error: {0}")]
    SubscribeError(StreamHubError),
    #[error("fmp4 error: {0}")]
    Fmp4Error(Fmp4Error),
    #[error("mpeg error: {0}")]
    MpegError(MpegError),
    #[error("h264 error: {0}")]
    H264Error(H264Error),
    #[error("storage error: {0}")]
    StorageError(std::io::Error),
    #[error("broadcast receive error: {0}")]
    ReceiveError(tokio::sync::broadcast::error::RecvError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct DashError {
    pub value: DashErrorValue,
}

impl From<StreamHubError> for DashError {
    fn from(error: StreamHubError) -> Self {
        Self {
            value: DashErrorValue::SubscribeError(error),
        }
    }
}

impl From<Fmp4Error> for DashError {
    fn from(error: Fmp4Error) -> Self {
        Self {
            value: DashErrorValue::Fmp4Error(error),
        }
    }
}

impl From<MpegError> for DashError {
    fn from(error: MpegError) -> Self {
        Self {
            value: DashErrorValue::MpegError(error),
        }
    }
}

impl From<H264Error> for DashError {
    fn from(error: H264Error) -> Self {
        Self {
            value: DashErrorValue::H264Error(error),
        }
    }
}

impl From<std::io::Error> for DashError {
    fn from(error: std::io::Error) -> Self {
        Self {
            value: DashErrorValue::StorageError(error),
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for DashError {
    fn from(error: tokio::sync::broadcast::error::RecvError) -> Self {
        Self {
            value: DashErrorValue::ReceiveError(error),
        }
    }
}
