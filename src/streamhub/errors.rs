use crate::bytesio::bytes_errors::BytesReadError;
use crate::bytesio::bytes_errors::BytesWriteError;
use tokio::sync::oneshot::error::RecvError;

#[derive(Debug, thiserror::Error)]
pub enum StreamHubErrorValue {
    #[error("no app name")]
    NoAppName,
    #[error("no stream name")]
    NoStreamName,
    #[error("no app or stream name")]
    NoAppOrStreamName,
    #[error("publisher already exists")]
    Exists,
    #[error("send error")]
    SendError,
    #[error("bytes read error")]
    BytesReadError(BytesReadError),
    #[error("bytes write error")]
    BytesWriteError(BytesWriteError),
    #[error("subscriber channel closed")]
    SubscriberClosed,
    #[error("subscriber queue overflow")]
    QueueOverflow,
    #[error("Tokio oneshot recv error")]
    RecvError(RecvError),
    #[error("Serde json error")]
    SerdeError(serde_json::error::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct StreamHubError {
    pub value: StreamHubErrorValue,
}

impl From<BytesReadError> for StreamHubError {
    fn from(error: BytesReadError) -> Self {
        Self {
            value: StreamHubErrorValue::BytesReadError(error),
        }
    }
}

impl From<BytesWriteError> for StreamHubError {
    fn from(error: BytesWriteError) -> Self {
        Self {
            value: StreamHubErrorValue::BytesWriteError(error),
        }
    }
}

impl From<RecvError> for StreamHubError {
    fn from(error: RecvError) -> Self {
        Self {
            value: StreamHubErrorValue::RecvError(error),
        }
    }
}

impl From<serde_json::error::Error> for StreamHubError {
    fn from(error: serde_json::error::Error) -> Self {
        Self {
            value: StreamHubErrorValue::SerdeError(error),
        }
    }
}
