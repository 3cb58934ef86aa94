//! A simulated reader, useful to run the gateway without reader hardware.
//!
//! While inventorying, the mock reports its whole tag population once per report interval.
//! Events and tag reports can also be injected via the [`MockReaderHandle`].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::{
    config::{Config, MockReaderConfig, ReaderConfig},
    reader::{ConnectionAttemptStatus, ReaderEvent, ReaderOutput, ReaderState},
    tags::RawTagReport,
};

/// Builder for a [`MockReaderHandle`].
#[derive(Debug)]
pub struct MockReaderBuilder {
    name: String,
    population: Vec<String>,
    report_interval: Option<Duration>,
    channels: Option<u16>,
    reset_on_connect: bool,
    start_inventory: bool,
    gpi_events: bool,
}

impl MockReaderBuilder {
    /// Start a new builder.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            population: vec![],
            report_interval: None,
            channels: None,
            reset_on_connect: true,
            start_inventory: false,
            gpi_events: true,
        }
    }

    /// A builder set up as described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        let ReaderConfig {
            name,
            reset_on_connect,
            start_inventory,
            gpi_events,
            ..
        } = &config.reader;
        let MockReaderConfig {
            population,
            report_interval_ms,
            channels,
        } = &config.mock;

        Self::new(name)
            .set_population(population.clone())
            .set_report_interval(Duration::from_millis(*report_interval_ms))
            .set_channels(*channels)
            .set_reset_on_connect(*reset_on_connect)
            .set_start_inventory(*start_inventory)
            .set_gpi_events(*gpi_events)
    }

    /// Set the EPCs the mock will report while inventorying.
    pub fn set_population(mut self, population: Vec<String>) -> Self {
        self.population = population;
        self
    }

    /// Add a single EPC to the population.
    pub fn add_tag(mut self, epc: &str) -> Self {
        self.population.push(epc.into());
        self
    }

    /// Set how often tag reports are produced while inventorying.
    pub fn set_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = Some(interval);
        self
    }

    /// Set how many RF channels the reader hops between.
    pub fn set_channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Should the reader be reset when connected to.
    pub fn set_reset_on_connect(mut self, reset: bool) -> Self {
        self.reset_on_connect = reset;
        self
    }

    /// Should inventory start as soon as the reader is connected to.
    pub fn set_start_inventory(mut self, start: bool) -> Self {
        self.start_inventory = start;
        self
    }

    /// Should the reader report general purpose input events.
    pub fn set_gpi_events(mut self, enabled: bool) -> Self {
        self.gpi_events = enabled;
        self
    }

    #[must_use]
    /// Create the mock. It starts out disconnected.
    pub fn build(self) -> MockReaderHandle {
        info!(%self.name, tags = self.population.len(), "Building mock reader");

        let (state, _) = watch::channel(ReaderState::Disconnected);
        let (output, _) = broadcast::channel(1024);

        MockReaderHandle {
            inner: Arc::new(Shared {
                name: self.name,
                state,
                output,
                inventory_run: AtomicU64::new(0),
                population: self.population,
                report_interval: self
                    .report_interval
                    .unwrap_or(Duration::from_millis(500)),
                channels: self.channels.unwrap_or(1).max(1),
                reset_on_connect: self.reset_on_connect,
                start_inventory: self.start_inventory,
                gpi_events: self.gpi_events,
            }),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) name: String,

    // Users read the current state from here,
    // inventory tasks watch it to know when to stop.
    pub(crate) state: watch::Sender<ReaderState>,

    // Used for giving out receivers (via subscribe)
    pub(crate) output: broadcast::Sender<ReaderOutput>,

    // Bumped every time inventory starts.
    // An inventory task only runs while its run is the current one.
    pub(crate) inventory_run: AtomicU64,

    population: Vec<String>,
    report_interval: Duration,
    channels: u16,

    pub(crate) reset_on_connect: bool,
    pub(crate) start_inventory: bool,
    gpi_events: bool,
}

impl Shared {
    pub(crate) fn set_state(&self, state: ReaderState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(%previous, %state, "Reader state changed");
        }
    }

    pub(crate) fn emit(&self, output: ReaderOutput) {
        match self.output.send(output) {
            Ok(listeners) => trace!("Reader output sent to {listeners} listener(s)"),
            Err(_) => trace!("Reader output dropped, nobody listening"),
        }
    }

    fn report(&self, round: u64) -> Vec<RawTagReport> {
        let now = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or_default();
        let channels = u64::from(self.channels);

        self.population
            .iter()
            .enumerate()
            .map(|(index, epc)| {
                // Channels are indexed from 1
                let channel = (round + index as u64) % channels + 1;
                RawTagReport::new(epc, channel as u16, now, 1)
            })
            .collect()
    }

    fn is_current_run(&self, run: u64) -> bool {
        self.inventory_run.load(Ordering::SeqCst) == run
            && *self.state.borrow() == ReaderState::Inventorying
    }
}

async fn inventory(shared: Arc<Shared>, run: u64) {
    let mut state = shared.state.subscribe();
    let mut interval = tokio::time::interval(shared.report_interval);

    // The first tick completes immediately,
    // the first report should arrive after a full interval.
    interval.tick().await;

    let mut round = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !shared.is_current_run(run) {
                    break;
                }

                let report = shared.report(round);
                round += 1;

                trace!(round, tags = report.len(), "Reporting tags");
                shared.emit(ReaderOutput::TagReport(report));
            }
            changed = state.changed() => {
                let _ = state.borrow_and_update();

                if changed.is_err() || !shared.is_current_run(run) {
                    break;
                }
            }
        }
    }

    debug!(run, rounds = round, "Inventory stopped");
}

/// Handle to a mock reader.
/// Clones refer to the same reader.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    pub(crate) inner: Arc<Shared>,
}

impl MockReaderHandle {
    pub(crate) fn spawn_inventory(&self) {
        let run = self.inner.inventory_run.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(
            inventory(self.inner.clone(), run)
                .instrument(info_span!("Inventory", reader = %self.inner.name, run)),
        );
    }

    /// Pretend a general purpose input changed level.
    /// Ignored unless the reader reports GPI events.
    pub fn inject_gpi(&self, port: u16, high: bool) {
        if !self.inner.gpi_events {
            debug!(port, high, "GPI events disabled, ignoring");
            return;
        }

        self.inject_event(ReaderEvent::Gpi { port, high });
    }

    /// Pretend the reader notified about something.
    pub fn inject_event(&self, event: ReaderEvent) {
        debug!(%event, "Injecting event");
        self.inner.emit(ReaderOutput::Event(event));
    }

    /// Pretend the reader read these tags.
    pub fn inject_tags(&self, reports: Vec<RawTagReport>) {
        if !self.inner.state.borrow().is_connected() {
            warn!("Injecting tags into a disconnected reader");
        }

        self.inner.emit(ReaderOutput::TagReport(reports));
    }

    pub(crate) fn connection_succeeded(&self) {
        self.inner
            .emit(ReaderOutput::Event(ReaderEvent::ConnectionAttempt(
                ConnectionAttemptStatus::Success,
            )));
    }

    /// The name of the reader.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}
