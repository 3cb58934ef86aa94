//! The mock as a [`Reader`].
//!
//! State transitions walk through the same states a real reader
//! passes while it is being set up or torn down.

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{ConnectionAttemptStatus, Reader, ReaderEvent, ReaderOutput, ReaderState};
use crate::{error::Error, mock::MockReaderHandle};

impl Reader for MockReaderHandle {
    fn connect(&self) -> Result<(), Error> {
        let state = self.state();
        if state != ReaderState::Disconnected {
            self.inject_event(ReaderEvent::ConnectionAttempt(
                ConnectionAttemptStatus::FailedClientConnectionExists,
            ));

            return Err(Error::ReaderBusy(format!(
                "can't connect to `{}` while in {state}",
                self.name()
            )));
        }

        self.inner.set_state(ReaderState::Connecting);
        self.inner.set_state(ReaderState::Connected);
        info!(reader = %self.name(), "Connected");
        self.connection_succeeded();

        if self.inner.reset_on_connect {
            debug!("Resetting reader configuration");
            self.inner.set_state(ReaderState::SentGetConfig);
            self.inner.set_state(ReaderState::SentSetConfig);
            self.inner.set_state(ReaderState::Connected);
        }

        if self.inner.start_inventory {
            self.start_inventory()?;
        }

        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        if self.state() == ReaderState::Disconnected {
            debug!("Already disconnected");
            return Ok(());
        }

        self.inner.set_state(ReaderState::Disconnected);
        info!(reader = %self.name(), "Disconnected");

        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.state().is_connected()
    }

    fn start_inventory(&self) -> Result<(), Error> {
        match self.state() {
            ReaderState::Inventorying => {
                debug!("Already inventorying");
                Ok(())
            }
            state if state.is_connected() => {
                self.inner.set_state(ReaderState::SentAddRospec);
                self.inner.set_state(ReaderState::SentEnableRospec);
                self.inner.set_state(ReaderState::Inventorying);
                self.spawn_inventory();

                info!(reader = %self.name(), "Inventory started");
                Ok(())
            }
            _ => Err(Error::ReaderNotAlive),
        }
    }

    fn stop_politely(&self) -> Result<(), Error> {
        match self.state() {
            ReaderState::Inventorying => {
                self.inner.set_state(ReaderState::SentDeleteAccessspec);
                self.inner.set_state(ReaderState::SentDeleteRospec);
                self.inner.set_state(ReaderState::Connected);

                info!(reader = %self.name(), "Inventory stopped");
                Ok(())
            }
            state if state.is_connected() => {
                debug!("Not inventorying, nothing to stop");
                Ok(())
            }
            _ => Err(Error::ReaderNotAlive),
        }
    }

    fn state(&self) -> ReaderState {
        *self.inner.state.borrow()
    }

    fn subscribe(&self) -> broadcast::Receiver<ReaderOutput> {
        self.inner.output.subscribe()
    }
}
