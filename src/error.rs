use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors thay may occur in this library.
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub enum Error {
    /// The reader is not connected.
    #[error("The reader is not alive")]
    ReaderNotAlive,

    /// The reader can't do what was asked in its current state.
    /// For example, connect twice.
    #[error("The reader is busy: {0}")]
    ReaderBusy(String),

    /// Something went wrong within the reader.
    #[error("Reader issue: {0}")]
    ReaderIssue(String),

    /// A tag report from the reader lacked required fields.
    #[error("Malformed tag report: {0}")]
    MalformedReport(String),

    /// The configuration is not valid.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// Reading or writing some resource failed.
    #[error("IO: {0}")]
    Io(String),
}

impl Error {
    /// Unwrap the problem if this is [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Result<String, Self> {
        if let Self::BadConfig(problem) = self {
            Ok(problem)
        } else {
            Err(self)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: self.to_string(),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
