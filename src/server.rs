use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{response::IntoResponse, routing::get, Extension, Json, Router};
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::Config,
    error::Error,
    gateway::GatewayHandle,
    mock::MockReaderBuilder,
    reader::SharedReader,
    responses::{MessageResponse, StateResponse, StatusResponse},
    tags::TagsMessage,
    websocket,
};

/// The default port to run the server on.
pub const DEFAULT_PORT: u16 = 4000;

/// The routes of the gateway.
pub fn router(gateway: GatewayHandle) -> Router {
    Router::new()
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/start-stop", get(start_stop))
        .route("/last-read", get(last_read))
        .route("/status", get(status))
        .route("/state", get(state))
        .route("/clear", get(clear))
        .route("/ws", get(websocket::ws_handler))
        .route("/version", get(show_version))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Browsers from anywhere may use the gateway
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                // Each handler and websocket needs to be able to reach the gateway
                .layer(Extension(gateway)),
        )
}

/// Serve the gateway until the shutdown future completes.
///
/// Binds any available port if none is given.
/// The port bound will be sent on the provided channel, if any.
pub async fn serve<F>(
    gateway: GatewayHandle,
    port: Option<u16>,
    allocated_port: Option<oneshot::Sender<u16>>,
    shutdown: F,
) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let app = router(gateway);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(0)));
    let server = axum::Server::try_bind(&addr)
        .map_err(|e| Error::Io(format!("Could not bind {addr}: {e}")))?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());
    let addr = server.local_addr();

    if let Some(port_reply) = allocated_port {
        if port_reply.send(addr.port()).is_err() {
            warn!("The receiver of which port was allocated was dropped");
        }
    }

    info!("listening on {}", addr);

    server
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Io(e.to_string()))
}

/// Connect to the reader, serve until the shutdown future completes,
/// then disconnect from the reader.
pub async fn run<F>(
    config: Config,
    reader: SharedReader,
    port: Option<u16>,
    allocated_port: Option<oneshot::Sender<u16>>,
    shutdown: F,
) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let gateway = GatewayHandle::start(reader, &config).await?;

    let served = serve(gateway.clone(), port, allocated_port, shutdown).await;

    gateway.shutdown().await;

    served
}

/// Run with the configured simulated reader on the given port.
pub async fn run_on_port<F>(config: Config, port: u16, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let reader = MockReaderBuilder::from_config(&config).build();

    run(config, Arc::new(reader), Some(port), None, shutdown).await
}

/// Run with the configured simulated reader on an arbitrary available port.
/// The port allocated will be sent on the provided channel.
/// Runs until an error occurs.
pub async fn run_any_port(config: Config, allocated_port: oneshot::Sender<u16>) -> Result<(), Error> {
    let reader = MockReaderBuilder::from_config(&config).build();

    run(
        config,
        Arc::new(reader),
        None,
        Some(allocated_port),
        std::future::pending(),
    )
    .await
}

async fn start(Extension(gateway): Extension<GatewayHandle>) -> Result<Json<MessageResponse>, Error> {
    gateway.start_reading().await?;

    Ok(Json(MessageResponse::new("Reading started")))
}

async fn stop(Extension(gateway): Extension<GatewayHandle>) -> Result<Json<MessageResponse>, Error> {
    gateway.stop_reading()?;

    Ok(Json(MessageResponse::new("Reading stopped")))
}

// Answers with a JSON `null`, browsers only wait for it to complete.
async fn start_stop(Extension(gateway): Extension<GatewayHandle>) -> Result<Json<()>, Error> {
    gateway.start_stop().await?;

    Ok(Json(()))
}

async fn last_read(Extension(gateway): Extension<GatewayHandle>) -> Json<TagsMessage> {
    Json(TagsMessage::new(gateway.last_read().await))
}

async fn status(Extension(gateway): Extension<GatewayHandle>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: gateway.is_alive(),
    })
}

async fn state(Extension(gateway): Extension<GatewayHandle>) -> Json<StateResponse> {
    Json(gateway.state().into())
}

async fn clear(Extension(gateway): Extension<GatewayHandle>) -> Json<MessageResponse> {
    gateway.clear_tag_data().await;

    Json(MessageResponse::new("Tag data cleared"))
}

async fn show_version() -> impl IntoResponse {
    format!("RFID Gateway v{}\n", env!("CARGO_PKG_VERSION"))
}
