use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Storage;
use crate::error::StorageError;
use crate::models::{NewSensorReading, SensorReading};
use crate::predicate::Predicate;

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, SensorReading>,
}

/// In-process backend over an id-ordered map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    table: Arc<RwLock<Table>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create(&self, reading: &NewSensorReading) -> Result<SensorReading, StorageError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let persisted = reading.clone().with_id(table.next_id);
        table.rows.insert(persisted.id, persisted.clone());
        Ok(persisted)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, StorageError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|r| predicate.matches(r)).count() as u64)
    }

    async fn scan(
        &self,
        predicate: &Predicate,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<SensorReading>, StorageError> {
        let table = self.table.read().await;

        let mut matched: Vec<&SensorReading> =
            table.rows.values().filter(|r| predicate.matches(r)).collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(matched
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SensorReading>, StorageError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, id: i64, reading: &NewSensorReading) -> Result<bool, StorageError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&id) {
            Some(row) => {
                *row = reading.clone().with_id(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_where(&self, predicate: &Predicate) -> Result<u64, StorageError> {
        let mut table = self.table.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, r| !predicate.matches(r));
        Ok((before - table.rows.len()) as u64)
    }
}
