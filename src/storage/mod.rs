//! Persistence collaborator.
//!
//! [`Storage`] is the only thing the ingestion sink and the query engine know
//! about the database. `PgStorage` is the production backend;
//! `MemoryStorage` has the same semantics and backs tests and
//! `STORAGE_BACKEND=memory`.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{NewSensorReading, SensorReading};
use crate::predicate::Predicate;

mod memory;
mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

// ---

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a reading and return it with its assigned id.
    async fn create(&self, reading: &NewSensorReading) -> Result<SensorReading, StorageError>;

    async fn count(&self, predicate: &Predicate) -> Result<u64, StorageError>;

    /// Rows matching `predicate`, newest first (ties by id, descending).
    async fn scan(
        &self,
        predicate: &Predicate,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<SensorReading>, StorageError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<SensorReading>, StorageError>;

    /// Overwrite every mutable field. `Ok(false)` when no row has `id`.
    async fn update(&self, id: i64, reading: &NewSensorReading) -> Result<bool, StorageError>;

    /// Remove matching rows and return how many went.
    async fn delete_where(&self, predicate: &Predicate) -> Result<u64, StorageError>;
}
