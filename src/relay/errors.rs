use crate::rtmp::session::errors::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum RelayErrorValue {
    #[error("session error: {0}")]
    SessionError(SessionError),
    #[error("bad relay url: {0}")]
    UrlParseError(String),
    #[error("connect error: {0}")]
    ConnectError(std::io::Error),
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct RelayError {
    pub value: RelayErrorValue,
}

impl From<SessionError> for RelayError {
    fn from(error: SessionError) -> Self {
        Self {
            value: RelayErrorValue::SessionError(error),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(error: std::io::Error) -> Self {
        Self {
            value: RelayErrorValue::ConnectError(error),
        }
    }
}

impl From<String> for RelayError {
    fn from(error: String) -> Self {
        Self {
            value: RelayErrorValue::UrlParseError(error),
        }
    }
}
