use serde::{Deserialize, Serialize};

use crate::reader::ReaderState;

/// A plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    /// What happened.
    pub message: String,
}

impl MessageResponse {
    /// Acknowledge with the given message.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Whether the reader is connected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    /// True if connected.
    pub status: bool,
}

/// The reader's state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateResponse {
    /// The state's name, e.g. `STATE_INVENTORYING`.
    pub state: String,

    /// The state's numeric code.
    pub code: u8,
}

impl From<ReaderState> for StateResponse {
    fn from(state: ReaderState) -> Self {
        Self {
            state: state.name().into(),
            code: state.code(),
        }
    }
}

impl StateResponse {
    /// An example state response.
    pub fn example() -> Self {
        ReaderState::Inventorying.into()
    }
}
