//! Sensor reading pipeline: a rate-adaptive generator streams synthetic
//! readings to an ingestion service that persists them and serves them
//! back through a filtered, paginated query API.
//!
//! This file is the crate's module gateway (Explicit Module Boundary
//! Pattern): every module is private and the public surface is re-exported
//! here. The two binaries and the integration tests consume only this
//! surface; siblings reach each other through `crate::` paths.

mod auth;
mod config;
mod error;
mod filter;
mod frequency;
mod generator;
mod ingest;
mod models;
mod predicate;
mod query;
mod routes;
mod schema;
mod shutdown;
mod storage;
mod stream;
mod telemetry;

pub use auth::{parse_accounts, Account, AuthUser, Authenticator, Claims, Role};
pub use config::{
    load_generator_from_env, load_ingest_from_env, GeneratorConfig, IngestConfig, StorageBackend,
};
pub use error::{ApiError, FilterError, QueryError, StorageError, StreamError};
pub use filter::{ReadingFilter, ReadingsQuery};
pub use frequency::{FrequencyControl, DEFAULT_FREQUENCY_MS, MIN_FREQUENCY_MS};
pub use generator::{
    supervise, Generator, SyntheticReadings, CLASS_IDS, DEFAULT_RECONNECT_BACKOFF, MAX_ID2,
};
pub use ingest::IngestionSink;
pub use models::{
    NewSensorReading, PageRequest, PaginatedReadings, SensorReading, WireReading, WriteAck,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use predicate::{Condition, Field, Predicate, Value};
pub use query::QueryEngine;
pub use routes::{generator_router, ingest_router, AppState};
pub use schema::create_schema;
pub use shutdown::shutdown_signal;
pub use storage::{MemoryStorage, PgStorage, Storage};
pub use stream::{
    channel, ChannelConnector, ChannelReceiver, ChannelSender, ClientFrame, GeneratorSession,
    IngestSession, ServerFrame, StreamConnector, WsConnector, WsIngestSession, WsSession,
    ACK_TIMEOUT,
};
pub use telemetry::init_tracing;
