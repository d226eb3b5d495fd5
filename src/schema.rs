//! Database schema management for the ingestion service.
//!
//! Ensures `sensor_readings` and its indexes exist before serving requests.
//! Applied once on startup from the ingest binary (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the schema if it does not exist (idempotent).
///
/// Safe to call on every startup; no-op if the objects already exist.
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id          BIGSERIAL        PRIMARY KEY,
            id1         TEXT             NOT NULL,
            id2         INTEGER          NOT NULL CHECK (id2 BETWEEN 0 AND 999),
            sensor_type TEXT             NOT NULL,
            value       DOUBLE PRECISION NOT NULL,
            ts          TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One index per filterable dimension; ts DESC also serves the page order
    for ddl in [
        "CREATE INDEX IF NOT EXISTS idx_sensor_readings_id1 ON sensor_readings (id1);",
        "CREATE INDEX IF NOT EXISTS idx_sensor_readings_id2 ON sensor_readings (id2);",
        "CREATE INDEX IF NOT EXISTS idx_sensor_readings_ts ON sensor_readings (ts DESC, id DESC);",
    ] {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
