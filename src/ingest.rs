//! Stream-side persistence.
//!
//! [`IngestionSink::serve`] drains one session: every reading is decoded,
//! validated and persisted on its own. A bad reading or a failed insert is
//! logged and skipped; only a transport fault ends the session early, and
//! then without an acknowledgment. Delivery is at-most-once, best effort.

use std::sync::Arc;

use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::StreamError;
use crate::models::WriteAck;
use crate::storage::Storage;
use crate::stream::IngestSession;

// ---

#[derive(Clone)]
pub struct IngestionSink {
    storage: Arc<dyn Storage>,
}

impl IngestionSink {
    // ---
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Consume `session` until clean end of input, then acknowledge.
    ///
    /// The acknowledged count covers only readings that were persisted.
    /// Returns `Err` on a transport fault; nothing is acknowledged then.
    pub async fn serve<S: IngestSession>(&self, session: S) -> Result<WriteAck, StreamError> {
        // ---
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest_session", %session_id);
        self.drain(session).instrument(span).await
    }

    async fn drain<S: IngestSession>(&self, mut session: S) -> Result<WriteAck, StreamError> {
        // ---
        info!("Stream session opened");
        let mut accepted: u64 = 0;
        let mut dropped: u64 = 0;

        loop {
            let wire = match session.recv().await {
                Ok(Some(wire)) => wire,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Stream aborted after {} accepted readings: {}",
                        accepted, e
                    );
                    return Err(e);
                }
            };

            let reading = wire.decode();
            if let Err(e) = reading.validate() {
                warn!("Dropping invalid reading {:?}: {}", wire, e);
                dropped += 1;
                continue;
            }

            match self.storage.create(&reading).await {
                Ok(persisted) => {
                    accepted += 1;
                    debug!("Persisted reading {}", persisted.id);
                }
                Err(e) => {
                    warn!("Failed to save reading: {}", e);
                    dropped += 1;
                }
            }
        }

        let ack = WriteAck {
            accepted_count: accepted,
        };
        session.acknowledge(ack).await?;
        info!(
            "Stream session closed: {} accepted, {} dropped",
            accepted, dropped
        );
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::StorageError;
    use crate::models::{NewSensorReading, SensorReading, WireReading};
    use crate::predicate::Predicate;
    use crate::storage::MemoryStorage;
    use crate::stream::{channel, GeneratorSession};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn wire(id1: &str, id2: i32, timestamp: &str) -> WireReading {
        WireReading {
            value: 42.0,
            sensor_type: "temperature".into(),
            id1: id1.into(),
            id2,
            timestamp: timestamp.into(),
        }
    }

    /// Fails every second insert.
    struct FlakyStorage {
        inner: MemoryStorage,
        calls: AtomicU64,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn create(&self, reading: &NewSensorReading) -> Result<SensorReading, StorageError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(StorageError::Backend("insert failed".into()));
            }
            self.inner.create(reading).await
        }
        async fn count(&self, p: &Predicate) -> Result<u64, StorageError> {
            self.inner.count(p).await
        }
        async fn scan(
            &self,
            p: &Predicate,
            limit: u32,
            offset: u64,
        ) -> Result<Vec<SensorReading>, StorageError> {
            self.inner.scan(p, limit, offset).await
        }
        async fn get_by_id(&self, id: i64) -> Result<Option<SensorReading>, StorageError> {
            self.inner.get_by_id(id).await
        }
        async fn update(&self, id: i64, r: &NewSensorReading) -> Result<bool, StorageError> {
            self.inner.update(id, r).await
        }
        async fn delete_where(&self, p: &Predicate) -> Result<u64, StorageError> {
            self.inner.delete_where(p).await
        }
    }

    #[tokio::test]
    async fn acknowledges_every_reading_sent() {
        // ---
        let storage = MemoryStorage::new();
        let sink = IngestionSink::new(Arc::new(storage.clone()));
        let (mut tx, rx) = channel(8);

        let serving = tokio::spawn(async move { sink.serve(rx).await });

        for i in 0..25 {
            let ts = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
            tx.send(&wire("A", i, &ts)).await.unwrap();
        }
        let ack = tx.close().await.unwrap();

        assert_eq!(ack.accepted_count, 25);
        assert_eq!(serving.await.unwrap().unwrap(), ack);
        assert_eq!(storage.len().await, 25);
    }

    #[tokio::test]
    async fn unparsable_timestamp_is_persisted_with_ingestion_time() {
        // ---
        let storage = MemoryStorage::new();
        let sink = IngestionSink::new(Arc::new(storage.clone()));
        let (mut tx, rx) = channel(2);
        let serving = tokio::spawn(async move { sink.serve(rx).await });

        let before = Utc::now();
        tx.send(&wire("B", 3, "not-a-time")).await.unwrap();
        tx.send(&wire("B", 4, "")).await.unwrap();
        let ack = tx.close().await.unwrap();
        let after = Utc::now();

        assert_eq!(ack.accepted_count, 2);
        serving.await.unwrap().unwrap();
        for row in storage.scan(&Predicate::all(), 10, 0).await.unwrap() {
            assert!(row.timestamp >= before && row.timestamp <= after);
        }
    }

    #[tokio::test]
    async fn invalid_readings_are_dropped_not_counted() {
        let storage = MemoryStorage::new();
        let sink = IngestionSink::new(Arc::new(storage.clone()));
        let (mut tx, rx) = channel(4);
        let serving = tokio::spawn(async move { sink.serve(rx).await });

        tx.send(&wire("A", 1, "2024-01-01T00:00:00Z")).await.unwrap();
        tx.send(&wire("ab", 1, "2024-01-01T00:00:00Z")).await.unwrap();
        tx.send(&wire("C", 5000, "2024-01-01T00:00:00Z")).await.unwrap();
        let ack = tx.close().await.unwrap();

        assert_eq!(ack.accepted_count, 1);
        serving.await.unwrap().unwrap();
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn storage_faults_skip_the_reading_and_keep_going() {
        // ---
        let inner = MemoryStorage::new();
        let storage = FlakyStorage {
            inner: inner.clone(),
            calls: AtomicU64::new(0),
        };
        let sink = IngestionSink::new(Arc::new(storage));
        let (mut tx, rx) = channel(4);
        let serving = tokio::spawn(async move { sink.serve(rx).await });

        for i in 0..10 {
            tx.send(&wire("D", i, "2024-01-01T00:00:00Z")).await.unwrap();
        }
        let ack = tx.close().await.unwrap();

        assert_eq!(ack.accepted_count, 5);
        assert_eq!(inner.len().await, 5);
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn transport_fault_aborts_without_acknowledgment() {
        let storage = MemoryStorage::new();
        let sink = IngestionSink::new(Arc::new(storage.clone()));
        let (mut tx, rx) = channel(4);
        let serving = tokio::spawn(async move { sink.serve(rx).await });

        tx.send(&wire("E", 1, "2024-01-01T00:00:00Z")).await.unwrap();
        drop(tx);

        let result = serving.await.unwrap();
        assert!(matches!(result, Err(StreamError::Closed)));
        // Readings persisted before the fault stay persisted
        assert_eq!(storage.len().await, 1);
    }
}
