//! The gateway owns everything shared between the reader, the web handlers
//! and the websocket subscribers.
//!
//! It listens to the reader's output: tag reports replace the latest tag list
//! and get queued for subscribers, events (like GPI triggers) may start or stop inventory.
//! A fan-out task periodically drains the queue and pushes to every subscriber.

use std::{collections::HashMap, fmt::Display, sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{
    sync::{
        broadcast,
        mpsc::{self, error::TrySendError},
        Mutex, RwLock,
    },
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    config::Config,
    error::Error,
    reader::{ReaderEvent, ReaderOutput, ReaderState, SharedReader},
    tags::{self, RawTagReport, RfidTag, TagsMessage},
};

/// How many batches a subscriber may have pending before it is dropped.
pub const SUBSCRIBER_BACKLOG: usize = 64;

/// Identifies a websocket subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Gateway {
    reader: SharedReader,

    // The most recent batch of tags.
    tags: RwLock<Vec<RfidTag>>,

    // Batches waiting to be pushed to subscribers.
    queue: mpsc::UnboundedSender<Vec<RfidTag>>,

    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<TagsMessage>>>,

    gpi_trigger_port: u16,
    start_stop_dwell: Duration,

    // Stops the background tasks.
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the gateway.
/// Clones refer to the same gateway.
#[derive(Clone)]
pub struct GatewayHandle(Arc<Gateway>);

impl std::fmt::Debug for GatewayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandle")
            .field("reader_state", &self.0.reader.state())
            .field("gpi_trigger_port", &self.0.gpi_trigger_port)
            .finish()
    }
}

async fn bridge(
    gateway: GatewayHandle,
    output: broadcast::Receiver<ReaderOutput>,
    cancel: CancellationToken,
) {
    info!("Starting reader bridge");

    let mut output = BroadcastStream::new(output);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = output.next() => match next {
                Some(Ok(ReaderOutput::TagReport(reports))) => gateway.on_tag_report(reports).await,
                Some(Ok(ReaderOutput::Event(event))) => gateway.on_event(event).await,
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "Bridge lagged behind reader output")
                }
                None => {
                    warn!("Reader output closed");
                    break;
                }
            }
        }
    }

    debug!("Reader bridge closed")
}

async fn fan_out(
    gateway: GatewayHandle,
    mut queue: mpsc::UnboundedReceiver<Vec<RfidTag>>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    info!(?poll_interval, "Starting fan-out");

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                while let Ok(tags) = queue.try_recv() {
                    gateway.push(TagsMessage::new(tags)).await;
                }
            }
        }
    }

    debug!("Fan-out closed")
}

impl GatewayHandle {
    /// Set up the gateway around a reader and connect to the reader.
    ///
    /// This spawns the tasks which listen to the reader
    /// and push tags to subscribers. See [`GatewayHandle::shutdown`].
    pub async fn start(reader: SharedReader, config: &Config) -> Result<Self, Error> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let gateway = Self(Arc::new(Gateway {
            reader,
            tags: RwLock::new(vec![]),
            queue: queue_tx,
            subscribers: Mutex::new(HashMap::new()),
            gpi_trigger_port: config.reader.gpi_trigger_port,
            start_stop_dwell: config.server.start_stop_dwell(),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(vec![]),
        }));

        // Subscribe before connecting, else the connection event is missed.
        let output = gateway.0.reader.subscribe();

        let bridge_handle = tokio::spawn(
            bridge(gateway.clone(), output, gateway.0.cancel.clone())
                .instrument(info_span!("Bridge")),
        );
        let fan_out_handle = tokio::spawn(
            fan_out(
                gateway.clone(),
                queue_rx,
                config.server.queue_poll_interval(),
                gateway.0.cancel.clone(),
            )
            .instrument(info_span!("Fan-out")),
        );
        gateway
            .0
            .tasks
            .lock()
            .await
            .extend([bridge_handle, fan_out_handle]);

        if let Err(e) = gateway.0.reader.connect() {
            error!(%e, "Could not connect to reader");
            gateway.stop_tasks().await;
            return Err(e);
        }

        info!("RFID reader initialized during startup");

        Ok(gateway)
    }

    async fn stop_tasks(&self) {
        self.0.cancel.cancel();

        let tasks = std::mem::take(&mut *self.0.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Task join error: {e:?}");
            }
        }
    }

    /// Stop the background tasks and disconnect the reader.
    /// Problems are logged, not returned.
    pub async fn shutdown(&self) {
        debug!("Shutting down");
        self.stop_tasks().await;

        // Dropping the senders ends every subscriber's websocket.
        let subscribers = std::mem::take(&mut *self.0.subscribers.lock().await);
        debug!(subscribers = subscribers.len(), "Closing subscribers");
        drop(subscribers);

        let reader = &self.0.reader;
        if !reader.is_alive() {
            debug!("Reader not alive, nothing to disconnect");
            return;
        }

        if let Err(e) = reader.stop_politely() {
            error!(%e, "Error stopping reader during shutdown");
        }

        match reader.disconnect() {
            Ok(()) => info!("RFID reader disconnected during shutdown"),
            Err(e) => error!(%e, "Error during reader shutdown"),
        }
    }

    /// Forget the tags read so far.
    pub async fn clear_tag_data(&self) {
        self.0.tags.write().await.clear();
        debug!("Tag data cleared");
    }

    /// Clear tag data and start inventory.
    /// Does nothing if the reader is not alive.
    pub async fn start_reading(&self) -> Result<(), Error> {
        if !self.0.reader.is_alive() {
            warn!("Reader not alive, can't start reading");
            return Ok(());
        }

        self.clear_tag_data().await;
        self.0.reader.start_inventory()
    }

    /// Stop inventory.
    /// Does nothing if the reader is not alive.
    pub fn stop_reading(&self) -> Result<(), Error> {
        if !self.0.reader.is_alive() {
            warn!("Reader not alive, can't stop reading");
            return Ok(());
        }

        self.0.reader.stop_politely()
    }

    /// Start inventory, let it run for the configured dwell time, then stop it.
    pub async fn start_stop(&self) -> Result<(), Error> {
        self.start_reading().await?;
        tokio::time::sleep(self.0.start_stop_dwell).await;
        self.stop_reading()
    }

    /// The most recent batch of tags.
    pub async fn last_read(&self) -> Vec<RfidTag> {
        self.0.tags.read().await.clone()
    }

    /// Is the reader connected.
    pub fn is_alive(&self) -> bool {
        self.0.reader.is_alive()
    }

    /// The reader's state.
    pub fn state(&self) -> ReaderState {
        self.0.reader.state()
    }

    /// Register a subscriber.
    /// Tag batches will arrive on the returned receiver.
    ///
    /// A subscriber which falls [`SUBSCRIBER_BACKLOG`] batches behind is removed.
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<TagsMessage>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BACKLOG);
        let id = SubscriberId::new();

        let mut subscribers = self.0.subscribers.lock().await;
        subscribers.insert(id, tx);
        info!(%id, subscribers = subscribers.len(), "Subscriber added");

        (id, rx)
    }

    /// Remove a subscriber.
    /// Returns false if it was already gone.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.0.subscribers.lock().await;
        let removed = subscribers.remove(&id).is_some();

        if removed {
            info!(%id, subscribers = subscribers.len(), "Subscriber removed");
        }

        removed
    }

    /// How many subscribers there are.
    pub async fn subscriber_count(&self) -> usize {
        self.0.subscribers.lock().await.len()
    }

    async fn push(&self, message: TagsMessage) {
        info!(%message, "Processing tags from queue");

        let mut subscribers = self.0.subscribers.lock().await;
        subscribers.retain(|id, sender| match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!(%id, backlog = SUBSCRIBER_BACKLOG, "Subscriber not keeping up, removing it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!(%id, "Error sending to subscriber, removing it");
                false
            }
        });

        debug!(subscribers = subscribers.len(), "Sent tags to subscribers");
    }

    async fn on_tag_report(&self, reports: Vec<RawTagReport>) {
        let received = reports.len();
        let tags = tags::translate_batch(reports);

        *self.0.tags.write().await = tags.clone();

        if self.0.queue.send(tags).is_err() {
            warn!("Tag queue closed, batch dropped");
        }

        info!("Received {received} tags");
    }

    async fn on_event(&self, event: ReaderEvent) {
        match &event {
            ReaderEvent::Gpi { port, high } => {
                info!(%event, "GPI event");

                if *port != self.0.gpi_trigger_port {
                    return;
                }

                let result = if *high {
                    info!("Starting inventory via GPI");
                    self.start_reading().await
                } else {
                    info!("Stopping inventory via GPI");
                    self.stop_reading()
                };

                if let Err(e) = result {
                    error!(%e, "Could not handle GPI event");
                }
            }
            ReaderEvent::ConnectionAttempt(_) => info!(%event, "Connection event"),
            ReaderEvent::Other(_) => info!(%event, "Other event"),
        }
    }
}
