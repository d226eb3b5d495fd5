use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use super::Storage;
use crate::error::StorageError;
use crate::models::{NewSensorReading, SensorReading};
use crate::predicate::Predicate;

const SELECT_READINGS: &str = "SELECT id, id1, id2, sensor_type, value, ts FROM sensor_readings";

// ---

/// PostgreSQL backend for `sensor_readings`.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    // ---
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, retrying once per second while the database comes up.
    pub async fn connect(url: &str, max_connections: u32, attempts: u32) -> Result<Self, StorageError> {
        // ---
        let mut attempt = 1;
        loop {
            match PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => return Ok(Self::new(pool)),
                Err(e) if attempt < attempts => {
                    tracing::info!("Waiting for database... ({}/{}): {}", attempt, attempts, e);
                    attempt += 1;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn create(&self, reading: &NewSensorReading) -> Result<SensorReading, StorageError> {
        // ---
        let row = sqlx::query_as::<_, SensorReading>(
            r#"
            INSERT INTO sensor_readings (id1, id2, sensor_type, value, ts)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, id1, id2, sensor_type, value, ts
            "#,
        )
        .bind(&reading.id1)
        .bind(reading.id2)
        .bind(&reading.sensor_type)
        .bind(reading.value)
        .bind(reading.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, StorageError> {
        // ---
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM sensor_readings");
        predicate.push_where(&mut qb);

        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn scan(
        &self,
        predicate: &Predicate,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<SensorReading>, StorageError> {
        // ---
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_READINGS);
        predicate.push_where(&mut qb);
        qb.push(" ORDER BY ts DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<SensorReading>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SensorReading>, StorageError> {
        // ---
        let row = sqlx::query_as::<_, SensorReading>(&format!("{SELECT_READINGS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, reading: &NewSensorReading) -> Result<bool, StorageError> {
        // ---
        let result = sqlx::query(
            r#"
            UPDATE sensor_readings
               SET id1 = $1, id2 = $2, sensor_type = $3, value = $4, ts = $5
             WHERE id = $6
            "#,
        )
        .bind(&reading.id1)
        .bind(reading.id2)
        .bind(&reading.sensor_type)
        .bind(reading.value)
        .bind(reading.timestamp)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_where(&self, predicate: &Predicate) -> Result<u64, StorageError> {
        // ---
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM sensor_readings");
        predicate.push_where(&mut qb);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
