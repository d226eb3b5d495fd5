//! WebSocket session transport.
//!
//! Frames are JSON text. The generator dials with `tokio-tungstenite`; the
//! ingest service accepts through axum's upgrade and wraps the socket in
//! [`WsIngestSession`].

use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{
    ClientFrame, GeneratorSession, IngestSession, ServerFrame, StreamConnector, ACK_TIMEOUT,
};
use crate::error::StreamError;
use crate::models::{WireReading, WriteAck};

// ---

/// Dials `ws://host:port/ingest/stream` style endpoints.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

pub struct WsSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    type Session = WsSession;

    async fn open(&self) -> Result<WsSession, StreamError> {
        // ---
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| StreamError::Connect(format!("{}: {}", self.url, e)))?;

        debug!("Stream opened to {}", self.url);
        Ok(WsSession { ws })
    }
}

impl WsSession {
    async fn await_ack(&mut self) -> Result<WriteAck, StreamError> {
        // ---
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let ServerFrame::Ack(ack) = serde_json::from_str::<ServerFrame>(text.as_str())?;
                    return Ok(ack);
                }
                Some(Ok(Message::Close(_))) | None => return Err(StreamError::MissingAck),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(StreamError::Receive(e.to_string())),
            }
        }
    }

    async fn send_frame(&mut self, frame: &ClientFrame) -> Result<(), StreamError> {
        let text = serde_json::to_string(frame)?;
        self.ws.send(Message::text(text)).await.map_err(send_error)
    }
}

/// A dead connection is a lost session; anything else may be transient.
fn send_error(err: WsError) -> StreamError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) => StreamError::Closed,
        other => StreamError::Send(other.to_string()),
    }
}

#[async_trait]
impl GeneratorSession for WsSession {
    async fn send(&mut self, reading: &WireReading) -> Result<(), StreamError> {
        self.send_frame(&ClientFrame::Reading(reading.clone())).await
    }

    async fn close(mut self) -> Result<WriteAck, StreamError> {
        // ---
        self.send_frame(&ClientFrame::Done).await?;

        let ack = tokio::time::timeout(ACK_TIMEOUT, self.await_ack())
            .await
            .map_err(|_| StreamError::MissingAck)??;

        // Peer closes right after the ack; a failed close handshake changes nothing
        let _ = self.ws.close(None).await;
        Ok(ack)
    }
}

// ---

/// Sink side of a WebSocket session inside the ingest service.
pub struct WsIngestSession {
    socket: WebSocket,
}

impl WsIngestSession {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

/// `None` for an undecodable frame, which the caller skips.
fn decode_frame(payload: &[u8]) -> Option<ClientFrame> {
    match serde_json::from_slice(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Dropping undecodable frame: {}", e);
            None
        }
    }
}

#[async_trait]
impl IngestSession for WsIngestSession {
    async fn recv(&mut self) -> Result<Option<WireReading>, StreamError> {
        // ---
        loop {
            let frame = match self.socket.recv().await {
                Some(Ok(AxumMessage::Text(text))) => decode_frame(text.as_str().as_bytes()),
                Some(Ok(AxumMessage::Binary(bytes))) => decode_frame(&bytes),
                Some(Ok(AxumMessage::Close(_))) | None => return Err(StreamError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(StreamError::Receive(e.to_string())),
            };

            match frame {
                Some(ClientFrame::Reading(reading)) => return Ok(Some(reading)),
                Some(ClientFrame::Done) => return Ok(None),
                None => continue,
            }
        }
    }

    async fn acknowledge(mut self, ack: WriteAck) -> Result<(), StreamError> {
        // ---
        let text = serde_json::to_string(&ServerFrame::Ack(ack))?;
        self.socket
            .send(AxumMessage::Text(text.into()))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))?;

        let _ = self.socket.send(AxumMessage::Close(None)).await;
        Ok(())
    }
}
