#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use color_eyre::Result;
use rfid_gateway::{
    config::Config,
    gateway::GatewayHandle,
    mock::{MockReaderBuilder, MockReaderHandle},
    server,
};
use tokio::{net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;
use tracing::{info, Level};

pub const POPULATION: [&str; 2] = ["300833b2ddd9014000000001", "300833b2ddd9014000000002"];

pub struct TestGateway {
    pub gateway: GatewayHandle,
    pub reader: MockReaderHandle,
    pub port: u16,
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.server.queue_poll_interval_ms = 10;
    config.server.start_stop_dwell_ms = 50;
    config
}

pub fn reader(name: &str) -> MockReaderBuilder {
    MockReaderBuilder::new(name)
        .set_population(POPULATION.iter().map(|epc| epc.to_string()).collect())
        .set_report_interval(Duration::from_millis(20))
}

pub async fn start_gateway(name: &str) -> TestGateway {
    start_gateway_with_reader(reader(name).build()).await
}

pub async fn start_gateway_with_reader(reader: MockReaderHandle) -> TestGateway {
    rfid_gateway::logging::init(Level::DEBUG, None).await;

    let gateway = GatewayHandle::start(Arc::new(reader.clone()), &config())
        .await
        .expect("Gateway should start");

    let (port_tx, port_rx) = oneshot::channel();

    let server_gateway = gateway.clone();
    tokio::spawn(async move {
        server::serve(server_gateway, None, Some(port_tx), std::future::pending()).await
    });

    let port = port_rx
        .await
        .expect("Server should reply with allocated port");

    TestGateway {
        gateway,
        reader,
        port,
    }
}

pub async fn eventually<F, Fut>(mut condition: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    Ok(())
}

pub async fn wait_for_subscribers(gateway: &GatewayHandle, count: usize) -> Result<()> {
    eventually(|| async { gateway.subscriber_count().await == count }).await
}

/// Send a GET request to the gateway's routes, returning the status and body.
pub async fn get_raw(gateway: &GatewayHandle, uri: &str) -> Result<(StatusCode, Vec<u8>)> {
    let response = server::router(gateway.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;

    let status = response.status();
    let body = hyper::body::to_bytes(response.into_body()).await?;

    Ok((status, body.to_vec()))
}

/// Send a GET request to the gateway's routes, expecting a JSON reply.
pub async fn get(gateway: &GatewayHandle, uri: &str) -> Result<serde_json::Value> {
    let (status, body) = get_raw(gateway, uri).await?;
    assert_eq!(status, StatusCode::OK, "GET {uri}");

    Ok(serde_json::from_slice(&body)?)
}

pub async fn connect(port: u16) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    info!("Connecting to server on port {port}");
    let (stream, http_response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws")).await?;

    assert_eq!(http_response.status(), StatusCode::SWITCHING_PROTOCOLS);

    Ok(stream)
}
