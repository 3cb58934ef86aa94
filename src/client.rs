use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

use crate::{error::Error, tags::TagsMessage};

/// A client receiving the tags a gateway streams.
#[derive(Debug)]
pub struct TagStreamClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TagStreamClient {
    /// Connect to a gateway's websocket endpoint.
    pub async fn connect(address: &str, port: u16) -> Result<Self, Error> {
        let url = format!("ws://{address}:{port}/ws");
        info!("Connecting to gateway at {url}");

        let (stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| Error::Io(format!("Could not connect to {url}: {e}")))?;

        Ok(Self { stream })
    }

    /// Wait for the next batch of tags.
    /// `None` means the gateway closed the connection.
    pub async fn next_tags(&mut self) -> Option<TagsMessage> {
        while let Some(message) = self.stream.next().await {
            let text = match message {
                Ok(tungstenite::Message::Text(text)) => text,
                Ok(tungstenite::Message::Close(_)) => {
                    debug!("Gateway closed the connection");
                    return None;
                }
                Ok(other) => {
                    debug!(?other, "Ignoring non-text message");
                    continue;
                }
                Err(e) => {
                    error!(?e, "Websocket error");
                    return None;
                }
            };

            match serde_json::from_str(&text) {
                Ok(tags) => return Some(tags),
                Err(e) => error!(?e, ?text, "Could not deserialize tags"),
            }
        }

        None
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), Error> {
        self.stream
            .close(None)
            .await
            .map_err(|e| Error::Io(e.to_string()))
    }
}
