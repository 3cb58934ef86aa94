use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::http::StatusCode;
use color_eyre::Result;
use common::*;
use pretty_assertions::assert_eq;
use rfid_gateway::{
    error::Error,
    gateway::GatewayHandle,
    reader::{Reader, ReaderOutput, ReaderState},
    tags::RawTagReport,
};
use serde_json::json;
use tokio::sync::broadcast;

mod common;

#[tokio::test]
async fn status_reflects_liveness() -> Result<()> {
    let TestGateway {
        gateway, reader, ..
    } = start_gateway("status_reflects_liveness").await;

    assert_eq!(get(&gateway, "/status").await?, json!({ "status": true }));

    reader.disconnect()?;
    assert_eq!(get(&gateway, "/status").await?, json!({ "status": false }));

    Ok(())
}

#[tokio::test]
async fn state_reflects_reader_state_code() -> Result<()> {
    let TestGateway {
        gateway, reader, ..
    } = start_gateway("state_reflects_reader_state_code").await;

    assert_eq!(
        get(&gateway, "/state").await?,
        json!({ "state": "STATE_CONNECTED", "code": 3 })
    );

    get(&gateway, "/start").await?;
    assert_eq!(
        get(&gateway, "/state").await?,
        json!({ "state": "STATE_INVENTORYING", "code": 12 })
    );

    reader.disconnect()?;
    assert_eq!(
        get(&gateway, "/state").await?,
        json!({ "state": "STATE_DISCONNECTED", "code": 1 })
    );

    Ok(())
}

#[tokio::test]
async fn start_clears_prior_tag_data() -> Result<()> {
    // Slow reports, so none arrive while checking
    let reader = reader("start_clears_prior_tag_data")
        .set_report_interval(Duration::from_secs(60))
        .build();
    let TestGateway {
        gateway, reader, ..
    } = start_gateway_with_reader(reader).await;

    reader.inject_tags(vec![RawTagReport::new("abcd", 2, 100, 5)]);
    eventually(|| async { !gateway.last_read().await.is_empty() }).await?;

    assert_eq!(
        get(&gateway, "/last-read").await?,
        json!({ "tags": [{ "epc": "abcd", "channel": 2, "last_seen": 100, "seen_count": 5 }] })
    );

    assert_eq!(
        get(&gateway, "/start").await?,
        json!({ "message": "Reading started" })
    );
    assert_eq!(get(&gateway, "/last-read").await?, json!({ "tags": [] }));

    Ok(())
}

#[tokio::test]
async fn last_read_has_latest_batch_only() -> Result<()> {
    let TestGateway {
        gateway, reader, ..
    } = start_gateway("last_read_has_latest_batch_only").await;

    reader.inject_tags(vec![
        RawTagReport::new("aaaa", 1, 1, 1),
        RawTagReport::new("bbbb", 1, 1, 1),
    ]);
    eventually(|| async { gateway.last_read().await.len() == 2 }).await?;

    reader.inject_tags(vec![RawTagReport::new("cccc", 3, 2, 1)]);
    eventually(|| async { gateway.last_read().await.len() == 1 }).await?;

    assert_eq!(
        get(&gateway, "/last-read").await?,
        json!({ "tags": [{ "epc": "cccc", "channel": 3, "last_seen": 2, "seen_count": 1 }] })
    );

    Ok(())
}

#[tokio::test]
async fn stop_ends_inventory() -> Result<()> {
    let TestGateway { gateway, .. } = start_gateway("stop_ends_inventory").await;

    get(&gateway, "/start").await?;
    assert_eq!(gateway.state(), ReaderState::Inventorying);

    assert_eq!(
        get(&gateway, "/stop").await?,
        json!({ "message": "Reading stopped" })
    );
    assert_eq!(gateway.state(), ReaderState::Connected);

    Ok(())
}

#[tokio::test]
async fn start_stop_runs_inventory_briefly() -> Result<()> {
    let TestGateway { gateway, .. } = start_gateway("start_stop_runs_inventory_briefly").await;

    assert_eq!(get(&gateway, "/start-stop").await?, json!(null));
    assert_eq!(gateway.state(), ReaderState::Connected);

    // The dwell is longer than the report interval, so tags were seen
    eventually(|| async { !gateway.last_read().await.is_empty() }).await?;

    Ok(())
}

#[tokio::test]
async fn clear_forgets_tags() -> Result<()> {
    let TestGateway {
        gateway, reader, ..
    } = start_gateway("clear_forgets_tags").await;

    reader.inject_tags(vec![RawTagReport::new("abcd", 1, 1, 1)]);
    eventually(|| async { !gateway.last_read().await.is_empty() }).await?;

    assert_eq!(
        get(&gateway, "/clear").await?,
        json!({ "message": "Tag data cleared" })
    );
    assert_eq!(get(&gateway, "/last-read").await?, json!({ "tags": [] }));

    Ok(())
}

#[tokio::test]
async fn start_without_reader_is_ok() -> Result<()> {
    let TestGateway {
        gateway, reader, ..
    } = start_gateway("start_without_reader_is_ok").await;
    reader.disconnect()?;

    assert_eq!(
        get(&gateway, "/start").await?,
        json!({ "message": "Reading started" })
    );
    assert_eq!(
        get(&gateway, "/stop").await?,
        json!({ "message": "Reading stopped" })
    );
    assert_eq!(gateway.state(), ReaderState::Disconnected);

    Ok(())
}

#[tokio::test]
async fn version() -> Result<()> {
    let TestGateway { gateway, .. } = start_gateway("version").await;

    let (status, body) = get_raw(&gateway, "/version").await?;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body)?.starts_with("RFID Gateway v"));

    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let TestGateway { gateway, .. } = start_gateway("unknown_route_is_not_found").await;

    let (status, _) = get_raw(&gateway, "/inventory").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

/// Connects fine, but refuses to run inventory.
struct RefusingReader {
    alive: AtomicBool,
    output: broadcast::Sender<ReaderOutput>,
}

impl RefusingReader {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(false),
            output: broadcast::channel(16).0,
        }
    }
}

impl Reader for RefusingReader {
    fn connect(&self) -> Result<(), Error> {
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), Error> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn start_inventory(&self) -> Result<(), Error> {
        Err(Error::ReaderIssue("antenna fault".into()))
    }

    fn stop_politely(&self) -> Result<(), Error> {
        Ok(())
    }

    fn state(&self) -> ReaderState {
        if self.is_alive() {
            ReaderState::Connected
        } else {
            ReaderState::Disconnected
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ReaderOutput> {
        self.output.subscribe()
    }
}

#[tokio::test]
async fn reader_error_is_internal_server_error() -> Result<()> {
    let gateway = GatewayHandle::start(Arc::new(RefusingReader::new()), &config()).await?;

    let (status, body) = get_raw(&gateway, "/start").await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body)?,
        json!({ "error": "Reader issue: antenna fault" })
    );

    gateway.shutdown().await;

    Ok(())
}
