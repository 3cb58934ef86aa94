use std::{path::Path, time::Duration};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How the web server behaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// The port to listen on.
    pub port: u16,

    /// How often queued tag batches are pushed to websocket subscribers.
    /// In milliseconds.
    pub queue_poll_interval_ms: u64,

    /// How long `/start-stop` keeps inventory running.
    /// In milliseconds.
    pub start_stop_dwell_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: crate::server::DEFAULT_PORT,
            queue_poll_interval_ms: 100,
            start_stop_dwell_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// See [`ServerConfig::queue_poll_interval_ms`].
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    /// See [`ServerConfig::start_stop_dwell_ms`].
    pub fn start_stop_dwell(&self) -> Duration {
        Duration::from_millis(self.start_stop_dwell_ms)
    }
}

/// How the reader is set up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReaderConfig {
    /// A name for the reader, shows up in logs.
    pub name: String,

    /// Reset the reader's configuration when connecting to it.
    pub reset_on_connect: bool,

    /// Start inventory as soon as the reader is connected to.
    pub start_inventory: bool,

    /// Have the reader report general purpose input events.
    pub gpi_events: bool,

    /// The general purpose input which starts inventory when high
    /// and stops it when low.
    pub gpi_trigger_port: u16,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            name: "reader".into(),
            reset_on_connect: true,
            start_inventory: false,
            gpi_events: true,
            gpi_trigger_port: 1,
        }
    }
}

/// How the simulated reader behaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MockReaderConfig {
    /// The EPCs the simulated reader sees while inventorying.
    pub population: Vec<String>,

    /// How often a tag report is produced while inventorying.
    /// In milliseconds.
    pub report_interval_ms: u64,

    /// How many RF channels the reader hops between.
    pub channels: u16,
}

impl Default for MockReaderConfig {
    fn default() -> Self {
        Self {
            population: vec![
                "300833b2ddd9014000000001".into(),
                "300833b2ddd9014000000002".into(),
                "300833b2ddd9014000000003".into(),
            ],
            report_interval_ms: 500,
            channels: 4,
        }
    }
}

/// The configuration used for running the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// See [`ServerConfig`].
    pub server: ServerConfig,

    /// See [`ReaderConfig`].
    pub reader: ReaderConfig,

    /// See [`MockReaderConfig`].
    pub mock: MockReaderConfig,
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Not a valid config: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            server: ServerConfig {
                port: 4000,
                ..Default::default()
            },
            reader: ReaderConfig {
                name: "dock-door-1".into(),
                ..Default::default()
            },
            mock: MockReaderConfig {
                population: vec!["e2801160600002084e8d3f41".into(), "e2801160600002084e8d3f42".into()],
                report_interval_ms: 250,
                channels: 16,
            },
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize config: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        Self::deserialize(&s)
    }

    fn check_intervals(&self) -> Result<(), Error> {
        let intervals = [
            ("server.queue_poll_interval_ms", self.server.queue_poll_interval_ms),
            ("mock.report_interval_ms", self.mock.report_interval_ms),
        ];

        match intervals.iter().find(|(_, ms)| *ms == 0) {
            Some((name, _)) => Err(Error::BadConfig(format!(
                "The interval `{name}` is zero, please use a positive number of milliseconds."
            ))),
            None => Ok(()),
        }
    }

    fn check_channels(&self) -> Result<(), Error> {
        if self.mock.channels == 0 {
            Err(Error::BadConfig(
                "The mock reader needs at least one channel.".into(),
            ))
        } else {
            Ok(())
        }
    }

    fn check_population(&self) -> Result<(), Error> {
        let bad = self
            .mock
            .population
            .iter()
            .filter(|epc| epc.is_empty() || !epc.chars().all(|c| c.is_ascii_hexdigit()))
            .collect_vec();

        let duplicates = self.mock.population.iter().duplicates().collect_vec();

        if !bad.is_empty() {
            Err(Error::BadConfig(format!(
                "EPCs must be non-empty hex strings. Problematic EPCs: {bad:?}"
            )))
        } else if !duplicates.is_empty() {
            Err(Error::BadConfig(format!(
                "EPCs must be unique within the population. Duplicates: {duplicates:?}"
            )))
        } else {
            Ok(())
        }
    }

    /// Check the configuration makes sense.
    pub fn validate(&self) -> Result<(), Error> {
        self.check_intervals()?;
        self.check_channels()?;
        self.check_population()?;

        Ok(())
    }
}
