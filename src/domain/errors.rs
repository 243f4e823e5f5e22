use std::time::Duration;

use thiserror::Error;

/// Failure of a single page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode page: {0}")]
    Decode(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Transport,
    Decode,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Decode(_) => FetchErrorKind::Decode,
            FetchError::Transport(_) | FetchError::Status { .. } | FetchError::Timeout(_) => {
                FetchErrorKind::Transport
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("page index {0} is out of range")]
    InvalidPage(usize),
    #[error("page size must be positive, got {0}")]
    InvalidPageSize(usize),
}
