use std::net::SocketAddr;
use tokio::sync::mpsc;

use futures::{sink::Sink, SinkExt, StreamExt};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, WebSocketUpgrade,
    },
    response::IntoResponse,
    Extension, TypedHeader,
};

use futures::stream::Stream;

use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::{gateway::GatewayHandle, tags::TagsMessage};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(gateway): Extension<GatewayHandle>,
) -> impl IntoResponse {
    info!("New WebSocket connection attempt");

    if let Some(TypedHeader(user_agent)) = user_agent {
        info!("`{}`@`{addr}` connected", user_agent.as_str());
    }

    ws.on_upgrade(move |socket| {
        let span = info_span!("Subscriber", %addr);

        handle_websocket(socket, gateway).instrument(span)
    })
}

/// Incoming messages only keep the connection alive,
/// their contents are ignored.
pub(crate) async fn read<S>(mut receiver: S)
where
    S: Unpin,
    S: Stream<Item = Result<Message, axum::Error>>,
{
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                trace!(%text, "client sent text, ignoring");
            }
            Some(Ok(Message::Binary(_))) => {
                debug!("client sent binary data, ignoring");
            }
            Some(Ok(Message::Ping(_))) => {
                debug!("socket ping");
            }
            Some(Ok(Message::Pong(_))) => {
                debug!("socket pong");
            }
            Some(Ok(Message::Close(_))) => {
                info!("WebSocket disconnected");
                break;
            }
            Some(Err(e)) => {
                error!(%e, "WebSocket error");
                break;
            }
            None => {
                info!("WebSocket disconnected");
                break;
            }
        }
    }
}

pub(crate) async fn write(
    mut sender: impl Sink<Message> + Unpin,
    mut receiver: mpsc::Receiver<TagsMessage>,
) {
    while let Some(message) = receiver.recv().await {
        let serialized = match serde_json::to_string(&message) {
            Ok(serialized) => serialized,
            Err(e) => {
                error!(%e, "Could not serialize tags");
                continue;
            }
        };

        if sender.send(Message::Text(serialized)).await.is_err() {
            debug!("client disconnected");
            return;
        }
        trace!(%message, "Sent tags to websocket connection");
    }
}

pub(crate) async fn handle_websocket(websocket: WebSocket, gateway: GatewayHandle) {
    info!("WebSocket connection accepted");

    let (stream_sender, stream_receiver) = websocket.split();
    let (id, tags_receiver) = gateway.subscribe().await;

    let mut read_handle = tokio::spawn(read(stream_receiver).in_current_span());
    let mut write_handle = tokio::spawn(write(stream_sender, tags_receiver).in_current_span());

    tokio::select! {
        joined = &mut read_handle => match joined {
            Ok(()) => debug!("Read task joined"),
            Err(e) => warn!("Read task join error: {e:?}"),
        },
        _ = &mut write_handle => debug!("Write task ended"),
    }

    gateway.unsubscribe(id).await;

    debug!("Aborting tasks");
    // This ensures the underlying TCP connection gets closed,
    // which signals the client that the session is over.
    read_handle.abort();
    write_handle.abort();
}
