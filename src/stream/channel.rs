//! Bounded in-process session transport.
//!
//! Backpressure comes from the bounded frame queue: a generator blocks in
//! `send` once `capacity` frames are waiting on the sink.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{ClientFrame, GeneratorSession, IngestSession, StreamConnector, ACK_TIMEOUT};
use crate::error::StreamError;
use crate::models::{WireReading, WriteAck};

// ---

pub struct ChannelSender {
    frames: mpsc::Sender<ClientFrame>,
    ack: oneshot::Receiver<WriteAck>,
}

pub struct ChannelReceiver {
    frames: mpsc::Receiver<ClientFrame>,
    ack: oneshot::Sender<WriteAck>,
}

/// Create one session: the generator half and the sink half.
pub fn channel(capacity: usize) -> (ChannelSender, ChannelReceiver) {
    // ---
    let (frame_tx, frame_rx) = mpsc::channel(capacity);
    let (ack_tx, ack_rx) = oneshot::channel();
    (
        ChannelSender {
            frames: frame_tx,
            ack: ack_rx,
        },
        ChannelReceiver {
            frames: frame_rx,
            ack: ack_tx,
        },
    )
}

#[async_trait]
impl GeneratorSession for ChannelSender {
    async fn send(&mut self, reading: &WireReading) -> Result<(), StreamError> {
        self.frames
            .send(ClientFrame::Reading(reading.clone()))
            .await
            .map_err(|_| StreamError::Closed)
    }

    async fn close(self) -> Result<WriteAck, StreamError> {
        // ---
        self.frames
            .send(ClientFrame::Done)
            .await
            .map_err(|_| StreamError::Closed)?;
        match tokio::time::timeout(ACK_TIMEOUT, self.ack).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) | Err(_) => Err(StreamError::MissingAck),
        }
    }
}

#[async_trait]
impl IngestSession for ChannelReceiver {
    async fn recv(&mut self) -> Result<Option<WireReading>, StreamError> {
        match self.frames.recv().await {
            Some(ClientFrame::Reading(reading)) => Ok(Some(reading)),
            Some(ClientFrame::Done) => Ok(None),
            // Sender dropped without signalling done
            None => Err(StreamError::Closed),
        }
    }

    async fn acknowledge(self, ack: WriteAck) -> Result<(), StreamError> {
        self.ack.send(ack).map_err(|_| StreamError::Closed)
    }
}

/// Connector that hands the sink half of every new session to an accept queue.
#[derive(Clone)]
pub struct ChannelConnector {
    accept: mpsc::UnboundedSender<ChannelReceiver>,
    capacity: usize,
}

impl ChannelConnector {
    /// Returns the connector and the queue of sessions it opens.
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<ChannelReceiver>) {
        let (accept, incoming) = mpsc::unbounded_channel();
        (Self { accept, capacity }, incoming)
    }
}

#[async_trait]
impl StreamConnector for ChannelConnector {
    type Session = ChannelSender;

    async fn open(&self) -> Result<ChannelSender, StreamError> {
        // ---
        let (sender, receiver) = channel(self.capacity);
        self.accept
            .send(receiver)
            .map_err(|_| StreamError::Connect("no listener".to_string()))?;
        Ok(sender)
    }
}
