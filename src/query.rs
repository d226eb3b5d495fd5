//! Query engine over persisted readings.
//!
//! Turns a [`ReadingFilter`] plus a [`PageRequest`] into a count-then-fetch
//! against [`Storage`], both halves built from the same predicate. Also owns
//! point lookup, guarded update and guarded bulk delete.

use std::sync::Arc;

use tracing::{debug, info};
use validator::Validate;

use crate::error::QueryError;
use crate::filter::ReadingFilter;
use crate::models::{NewSensorReading, PageRequest, PaginatedReadings, SensorReading};
use crate::storage::Storage;

// ---

#[derive(Clone)]
pub struct QueryEngine {
    storage: Arc<dyn Storage>,
}

impl QueryEngine {
    // ---
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// One page of matching readings, newest first, with totals.
    pub async fn get_by_filter(
        &self,
        filter: &ReadingFilter,
        page: PageRequest,
    ) -> Result<PaginatedReadings, QueryError> {
        // ---
        let predicate = filter.predicate();

        let total_items = self.storage.count(&predicate).await?;
        let data = self
            .storage
            .scan(&predicate, page.page_size, page.offset())
            .await?;

        debug!(
            "Filter {:?} page {}/{}: {} of {} rows",
            filter,
            page.page,
            page.page_size,
            data.len(),
            total_items
        );

        Ok(PaginatedReadings {
            data,
            page: page.page,
            page_size: page.page_size,
            total_items,
            total_pages: page.total_pages(total_items),
        })
    }

    /// `Ok(None)` when no row has `id`; `Err` only when the lookup failed.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<SensorReading>, QueryError> {
        Ok(self.storage.get_by_id(id).await?)
    }

    /// Validate and persist a single reading.
    pub async fn create(&self, reading: &NewSensorReading) -> Result<SensorReading, QueryError> {
        // ---
        reading.validate()?;
        let persisted = self.storage.create(reading).await?;
        info!("Created reading {}", persisted.id);
        Ok(persisted)
    }

    /// Overwrite an existing reading.
    ///
    /// The existence check runs first, so an absent id is reported as
    /// not-found even when the body is also invalid.
    pub async fn update(
        &self,
        id: i64,
        reading: &NewSensorReading,
    ) -> Result<SensorReading, QueryError> {
        // ---
        if self.storage.get_by_id(id).await?.is_none() {
            return Err(QueryError::NotFound(id));
        }
        reading.validate()?;

        // The row can vanish between lookup and write
        if !self.storage.update(id, reading).await? {
            return Err(QueryError::NotFound(id));
        }

        info!("Updated reading {}", id);
        Ok(reading.clone().with_id(id))
    }

    /// Delete every matching row. Refuses an empty filter.
    pub async fn delete_by_filter(&self, filter: &ReadingFilter) -> Result<u64, QueryError> {
        // ---
        if filter.is_empty() {
            return Err(QueryError::EmptyDeleteFilter);
        }

        let removed = self.storage.delete_where(&filter.predicate()).await?;
        info!("Deleted {} readings matching {:?}", removed, filter);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::predicate::Predicate;
    use crate::storage::MemoryStorage;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn reading(id1: &str, id2: i32, ts: DateTime<Utc>) -> NewSensorReading {
        NewSensorReading {
            value: 20.0,
            id1: id1.to_string(),
            id2,
            sensor_type: "temperature".to_string(),
            timestamp: ts,
        }
    }

    async fn seeded() -> (QueryEngine, MemoryStorage) {
        // ---
        let storage = MemoryStorage::new();
        for (i, id1) in ["A", "B", "C"].iter().cycle().take(30).enumerate() {
            let day = 1 + (i as u32 % 3);
            let hour = i as u32 % 24;
            storage
                .create(&reading(id1, i as i32, at(day, hour)))
                .await
                .unwrap();
        }
        (QueryEngine::new(Arc::new(storage.clone())), storage)
    }

    #[tokio::test]
    async fn pages_cover_every_row_exactly_once() {
        // ---
        let (engine, _) = seeded().await;
        let filter = ReadingFilter::default();

        let first = engine
            .get_by_filter(&filter, PageRequest::new(Some(1), Some(7)))
            .await
            .unwrap();
        assert_eq!(first.total_items, 30);
        assert_eq!(first.total_pages, 5);

        let mut seen = HashSet::new();
        let mut total = 0;
        for page in 1..=first.total_pages {
            let result = engine
                .get_by_filter(&filter, PageRequest::new(Some(page as i64), Some(7)))
                .await
                .unwrap();
            assert!(result.data.len() <= 7);
            total += result.data.len();
            for row in result.data {
                assert!(seen.insert(row.id), "row {} appeared twice", row.id);
            }
        }
        assert_eq!(total, 30);
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty_but_keeps_totals() {
        let (engine, _) = seeded().await;
        let result = engine
            .get_by_filter(&ReadingFilter::default(), PageRequest::new(Some(99), Some(10)))
            .await
            .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.total_items, 30);
        assert_eq!(result.total_pages, 3);
    }

    #[tokio::test]
    async fn oversized_and_zero_paging_is_clamped() {
        let (engine, _) = seeded().await;
        let result = engine
            .get_by_filter(&ReadingFilter::default(), PageRequest::new(Some(0), Some(1000)))
            .await
            .unwrap();
        assert_eq!(result.page, 1);
        assert_eq!(result.page_size, 100);
        assert_eq!(result.data.len(), 30);
    }

    #[tokio::test]
    async fn combined_filter_returns_only_matching_rows_newest_first() {
        // ---
        let (engine, _) = seeded().await;
        let filter = ReadingFilter {
            id1: Some("A".to_string()),
            from: Some(at(1, 0)),
            to: Some(at(2, 0)),
            ..Default::default()
        };

        let result = engine
            .get_by_filter(&filter, PageRequest::default())
            .await
            .unwrap();

        assert!(!result.data.is_empty());
        assert_eq!(result.total_items as usize, result.data.len());
        for row in &result.data {
            assert_eq!(row.id1, "A");
            assert!(row.timestamp >= at(1, 0) && row.timestamp <= at(2, 0));
        }
        for pair in result.data.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn get_by_id_distinguishes_missing() {
        let (engine, _) = seeded().await;
        assert!(engine.get_by_id(1).await.unwrap().is_some());
        assert!(engine.get_by_id(10_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found_and_changes_nothing() {
        // ---
        let (engine, storage) = seeded().await;
        let before = storage.scan(&Predicate::all(), 100, 0).await.unwrap();

        let err = engine
            .update(10_000, &reading("Z", 1, at(5, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound(10_000)));

        let after = storage.scan(&Predicate::all(), 100, 0).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn update_checks_existence_before_validation() {
        let (engine, _) = seeded().await;
        let invalid = reading("lowercase", 5000, at(1, 0));

        let missing = engine.update(10_000, &invalid).await.unwrap_err();
        assert!(matches!(missing, QueryError::NotFound(_)));

        let present = engine.update(1, &invalid).await.unwrap_err();
        assert!(matches!(present, QueryError::Invalid(_)));
    }

    #[tokio::test]
    async fn update_overwrites_all_fields() {
        let (engine, storage) = seeded().await;
        let replacement = reading("J", 999, at(9, 9));

        let updated = engine.update(3, &replacement).await.unwrap();
        assert_eq!(updated.id, 3);
        assert_eq!(storage.get_by_id(3).await.unwrap(), Some(replacement.with_id(3)));
    }

    #[tokio::test]
    async fn create_rejects_invalid_readings() {
        let (engine, storage) = seeded().await;
        let err = engine.create(&reading("AA", 1, at(1, 0))).await.unwrap_err();
        assert!(matches!(err, QueryError::Invalid(_)));
        assert_eq!(storage.len().await, 30);
    }

    #[tokio::test]
    async fn delete_requires_a_filter() {
        let (engine, storage) = seeded().await;
        let err = engine
            .delete_by_filter(&ReadingFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::EmptyDeleteFilter));
        assert_eq!(storage.len().await, 30);
    }

    #[tokio::test]
    async fn delete_removes_exactly_the_matching_rows() {
        // ---
        let (engine, storage) = seeded().await;
        let filter = ReadingFilter {
            id1: Some("A".to_string()),
            ..Default::default()
        };
        let expected = storage.count(&filter.predicate()).await.unwrap();

        assert_eq!(engine.delete_by_filter(&filter).await.unwrap(), expected);
        assert_eq!(storage.count(&filter.predicate()).await.unwrap(), 0);
        assert_eq!(storage.len().await as u64, 30 - expected);
    }
}
