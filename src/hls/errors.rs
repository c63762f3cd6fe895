use {
    crate::flv::errors::FlvDemuxerError,
    crate::mpegts::errors::MpegTsError,
    crate::streamhub::errors::StreamHubError,
};

#[derive(Debug, thiserror::Error)]
pub enum HlsErrorValue {
    #[error("stream hub event send error")]
    StreamHubEventSendError,
    #[error("subscribe error: {0}")]
    SubscribeError(StreamHubError),
    #[error("demux error: {0}")]
    DemuxError(FlvDemuxerError),
    #[error("mux error: {0}")]
    MuxError(MpegTsError),
    #[error("storage error: {0}")]
    StorageError(std::io::Error),
    #[error("broadcast receive error: {0}")]
    ReceiveError(tokio::sync::broadcast::error::RecvError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct HlsError {
    pub value: HlsErrorValue,
}

impl From<StreamHubError> for HlsError {
    fn from(error: StreamHubError) -> Self {
        Self {
            value: HlsErrorValue::SubscribeError(error),
        }
    }
}

impl From<FlvDemuxerError> for HlsError {
    fn from(error: FlvDemuxerError) -> Self {
        Self {
            value: HlsErrorValue::DemuxError(error),
        }
    }
}

impl From<MpegTsError> for HlsError {
    fn from(error: MpegTsError) -> Self {
        Self {
            value: HlsErrorValue::MuxError(error),
        }
    }
}

impl From<std::io::Error> for HlsError {
    fn from(error: std::io::Error) -> Self {
        Self {
            value: HlsErrorValue::StorageError(error),
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for HlsError {
    fn from(error: tokio::sync::broadcast::error::RecvError) -> Self {
        Self {
            value: HlsErrorValue::ReceiveError(error),
        }
    }
}
