use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{error::Error, tags::RawTagReport};

pub(crate) mod mock;

/// The states a reader can be in.
///
/// The numbering is the reader's own,
/// users see these as numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReaderState {
    /// Not connected.
    Disconnected,
    /// A connection is being established.
    Connecting,
    /// Connected and idle.
    Connected,
    /// Waiting for a reply to adding the reader operation spec.
    SentAddRospec,
    /// Waiting for a reply to enabling the reader operation spec.
    SentEnableRospec,
    /// Inventory is being paused.
    Pausing,
    /// Inventory is paused.
    Paused,
    /// Waiting for a reply to deleting the reader operation spec.
    SentDeleteRospec,
    /// Waiting for a reply to deleting the access spec.
    SentDeleteAccessspec,
    /// Waiting for the reader configuration.
    SentGetConfig,
    /// Waiting for a reply to setting the reader configuration.
    SentSetConfig,
    /// Reading tags.
    Inventorying,
}

impl ReaderState {
    /// The numeric code of this state.
    pub fn code(&self) -> u8 {
        match self {
            ReaderState::Disconnected => 1,
            ReaderState::Connecting => 2,
            ReaderState::Connected => 3,
            ReaderState::SentAddRospec => 4,
            ReaderState::SentEnableRospec => 5,
            ReaderState::Pausing => 6,
            ReaderState::Paused => 7,
            ReaderState::SentDeleteRospec => 8,
            ReaderState::SentDeleteAccessspec => 9,
            ReaderState::SentGetConfig => 10,
            ReaderState::SentSetConfig => 11,
            ReaderState::Inventorying => 12,
        }
    }

    /// The name of this state, as the reader spells it.
    pub fn name(&self) -> &'static str {
        match self {
            ReaderState::Disconnected => "STATE_DISCONNECTED",
            ReaderState::Connecting => "STATE_CONNECTING",
            ReaderState::Connected => "STATE_CONNECTED",
            ReaderState::SentAddRospec => "STATE_SENT_ADD_ROSPEC",
            ReaderState::SentEnableRospec => "STATE_SENT_ENABLE_ROSPEC",
            ReaderState::Pausing => "STATE_PAUSING",
            ReaderState::Paused => "STATE_PAUSED",
            ReaderState::SentDeleteRospec => "STATE_SENT_DELETE_ROSPEC",
            ReaderState::SentDeleteAccessspec => "STATE_SENT_DELETE_ACCESSSPEC",
            ReaderState::SentGetConfig => "STATE_SENT_GET_CONFIG",
            ReaderState::SentSetConfig => "STATE_SENT_SET_CONFIG",
            ReaderState::Inventorying => "STATE_INVENTORYING",
        }
    }

    /// Anything but [`ReaderState::Disconnected`] and [`ReaderState::Connecting`]
    /// means a connection is up.
    pub fn is_connected(&self) -> bool {
        !matches!(self, ReaderState::Disconnected | ReaderState::Connecting)
    }
}

impl Display for ReaderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// The outcome of trying to connect to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionAttemptStatus {
    /// Connected.
    Success,
    /// The reader already has a client connected.
    FailedClientConnectionExists,
    /// Some other failure.
    Failed(String),
}

/// Events a reader may notify about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderEvent {
    /// A general purpose input changed level.
    Gpi {
        /// The input port number.
        port: u16,

        /// True if the input went high.
        high: bool,
    },

    /// A connection attempt finished.
    ConnectionAttempt(ConnectionAttemptStatus),

    /// Anything else the reader tells us.
    Other(String),
}

impl Display for ReaderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderEvent::Gpi { port, high } => {
                let level = if *high { "high" } else { "low" };
                write!(f, "GPI port {port} {level}")
            }
            ReaderEvent::ConnectionAttempt(status) => write!(f, "connection attempt: {status:?}"),
            ReaderEvent::Other(other) => write!(f, "{other}"),
        }
    }
}

/// What a reader produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderOutput {
    /// A batch of tags read.
    TagReport(Vec<RawTagReport>),

    /// Something happened.
    Event(ReaderEvent),
}

/// A reader is something which can be connected to,
/// asked to run inventory, and which reports the tags it sees.
pub trait Reader {
    /// Connect to the reader.
    fn connect(&self) -> Result<(), Error>;

    /// Disconnect from the reader.
    /// Any running inventory stops.
    fn disconnect(&self) -> Result<(), Error>;

    /// Is a connection up.
    fn is_alive(&self) -> bool;

    /// Start reading tags.
    fn start_inventory(&self) -> Result<(), Error>;

    /// Stop reading tags, leaving the connection up.
    fn stop_politely(&self) -> Result<(), Error>;

    /// The current state.
    fn state(&self) -> ReaderState;

    /// Get a receiver of tag reports and events.
    /// Only output produced after subscribing is received.
    fn subscribe(&self) -> broadcast::Receiver<ReaderOutput>;
}

/// A reader which may be shared between tasks.
pub type SharedReader = Arc<dyn Reader + Send + Sync>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn codes_are_distinct_and_ordered() {
        let states = [
            ReaderState::Disconnected,
            ReaderState::Connecting,
            ReaderState::Connected,
            ReaderState::SentAddRospec,
            ReaderState::SentEnableRospec,
            ReaderState::Pausing,
            ReaderState::Paused,
            ReaderState::SentDeleteRospec,
            ReaderState::SentDeleteAccessspec,
            ReaderState::SentGetConfig,
            ReaderState::SentSetConfig,
            ReaderState::Inventorying,
        ];

        let codes = states.iter().map(ReaderState::code).collect::<Vec<_>>();
        assert_eq!(codes, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn connected_states() {
        assert!(!ReaderState::Disconnected.is_connected());
        assert!(!ReaderState::Connecting.is_connected());
        assert!(ReaderState::Connected.is_connected());
        assert!(ReaderState::Inventorying.is_connected());
    }

    #[test]
    fn display() {
        assert_eq!(
            ReaderState::Inventorying.to_string(),
            "STATE_INVENTORYING (12)"
        );
        assert_eq!(
            ReaderEvent::Gpi {
                port: 1,
                high: false
            }
            .to_string(),
            "GPI port 1 low"
        );
    }
}
