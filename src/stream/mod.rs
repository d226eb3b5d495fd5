//! Duplex stream sessions between a generator and the ingestion sink.
//!
//! A session is ordered and single-producer single-consumer. Readings flow
//! from generator to sink; exactly one [`WriteAck`] flows back, and only
//! after the generator signals a clean end of input. Anything else that
//! ends the session is a transport fault and carries no acknowledgment.
//!
//! Two transports implement the session traits:
//! - [`channel`]: bounded in-process channel
//! - WebSocket: [`WsConnector`] on the generator side, [`WsIngestSession`]
//!   inside the ingest service

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::models::{WireReading, WriteAck};

mod channel;
mod websocket;

pub use channel::{channel, ChannelConnector, ChannelReceiver, ChannelSender};
pub use websocket::{WsConnector, WsIngestSession, WsSession};

/// How long `close` waits for the peer's acknowledgment.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(10);

// ---

/// Frames sent by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Reading(WireReading),
    Done,
}

/// Frames sent by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Ack(WriteAck),
}

/// Opens generator-side sessions.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    type Session: GeneratorSession;

    async fn open(&self) -> Result<Self::Session, StreamError>;
}

/// Send half of a session, as seen by the generator.
#[async_trait]
pub trait GeneratorSession: Send {
    async fn send(&mut self, reading: &WireReading) -> Result<(), StreamError>;

    /// Signal end of input and wait up to [`ACK_TIMEOUT`] for the peer's
    /// acknowledgment.
    async fn close(self) -> Result<WriteAck, StreamError>
    where
        Self: Sized;
}

/// Receive half of a session, as seen by the sink.
#[async_trait]
pub trait IngestSession: Send {
    /// Next reading; `Ok(None)` is the clean end of input.
    async fn recv(&mut self) -> Result<Option<WireReading>, StreamError>;

    async fn acknowledge(self, ack: WriteAck) -> Result<(), StreamError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_use_a_type_tag() {
        let reading = WireReading {
            value: 12.5,
            sensor_type: "temperature".into(),
            id1: "A".into(),
            id2: 7,
            timestamp: "2024-01-01T00:00:00.000000001Z".into(),
        };

        let json = serde_json::to_value(ClientFrame::Reading(reading.clone())).unwrap();
        assert_eq!(json["type"], "reading");
        assert_eq!(json["sensor_type"], "temperature");
        assert_eq!(json["id2"], 7);

        let done: ClientFrame = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(done, ClientFrame::Done);

        let ack: ServerFrame =
            serde_json::from_str(r#"{"type":"ack","accepted_count":3}"#).unwrap();
        assert_eq!(ack, ServerFrame::Ack(WriteAck { accepted_count: 3 }));
    }

    #[test]
    fn unknown_frame_type_is_a_codec_error() {
        let err = serde_json::from_str::<ClientFrame>(r#"{"type":"reset"}"#)
            .map_err(StreamError::from)
            .unwrap_err();
        assert!(matches!(err, StreamError::Codec(_)));
    }
}
