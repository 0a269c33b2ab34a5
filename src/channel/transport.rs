//! Transport abstraction for the push channel
//!
//! The channel never opens sockets itself; it is handed a [`Transport`].
//! [`WsTransport`] talks WebSocket, the `testing` module provides a
//! scripted in-memory implementation.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseKind {
    /// Peer closed with a normal close code
    Normal,
    /// Error, dropped stream or non-normal close code
    Abnormal(String),
}

/// Event read from a live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Closed(CloseKind),
}

/// Opens connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> SyncResult<Box<dyn Connection>>;
}

/// One open connection
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, text: String) -> SyncResult<()>;

    /// Next inbound event; must be cancel-safe
    async fn recv(&mut self) -> Inbound;

    async fn close(&mut self);
}

/// WebSocket transport
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    #[instrument(skip(self))]
    async fn connect(&self, url: &str) -> SyncResult<Box<dyn Connection>> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, text: String) -> SyncResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| SyncError::ConnectionFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Inbound {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Text(text),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Inbound::Text(text),
                    Err(_) => debug!("ignoring non-utf8 binary frame"),
                },
                // Pings are answered by tungstenite on the next read
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(f) if f.code != CloseCode::Normal => Inbound::Closed(
                            CloseKind::Abnormal(format!("close code {}", u16::from(f.code))),
                        ),
                        _ => Inbound::Closed(CloseKind::Normal),
                    };
                }
                Some(Err(e)) => return Inbound::Closed(CloseKind::Abnormal(e.to_string())),
                None => {
                    return Inbound::Closed(CloseKind::Abnormal(
                        "stream ended without close frame".to_string(),
                    ))
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
