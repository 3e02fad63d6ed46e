use serde::{Deserialize, Serialize};
use thiserror::Error;

/// REST failure surfaced to callers with the server-provided message when
/// one exists.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiFailure {
    pub status: u16,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Error body shape of the REST backend. Login failures carry `message`,
/// register failures carry `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn detail(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
