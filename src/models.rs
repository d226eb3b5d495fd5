//! Data models for the sensor pipeline.
//!
//! - [`NewSensorReading`]: a reading before persistence (no identity yet)
//! - [`SensorReading`]: a persisted reading with its storage-assigned id
//! - [`WireReading`]: the on-the-wire form pushed through a stream session
//! - [`WriteAck`]: the terminal acknowledgment of a stream session
//! - [`PageRequest`] / [`PaginatedReadings`]: pagination in and out

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default page size when the caller omits one or sends a non-positive value.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound for `page_size`; larger requests are clamped, never rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

// ---

/// A reading that has not been persisted yet.
///
/// Constructed once and never mutated; persisting it yields a
/// [`SensorReading`] that carries the same fields plus an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewSensorReading {
    // ---
    pub value: f64,

    #[validate(custom(function = "validate_class_id"))]
    pub id1: String,

    #[validate(range(min = 0, max = 999))]
    pub id2: i32,

    #[validate(length(min = 1, message = "sensor_type is required"))]
    pub sensor_type: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// A persisted reading as served by the query boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    // ---
    pub id: i64,
    pub value: f64,
    pub id1: String,
    pub id2: i32,
    pub sensor_type: String,
    #[sqlx(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}

/// One reading as it travels over a stream session.
///
/// The timestamp stays a string on the wire (RFC 3339, nanosecond
/// fraction, UTC) so that a malformed value reaches the sink and can be
/// substituted there instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReading {
    // ---
    pub value: f64,
    pub sensor_type: String,
    pub id1: String,
    pub id2: i32,
    /// Absent on the wire decodes to `""` and is substituted at the sink.
    #[serde(default)]
    pub timestamp: String,
}

/// Terminal response of a stream session: how many readings were persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub accepted_count: u64,
}

/// A page request after coercion into valid ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

/// One page of readings, newest first, plus the totals it was cut from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedReadings {
    // ---
    pub data: Vec<SensorReading>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u64,
}

// ---

/// `id1` must be exactly one uppercase ASCII letter.
fn validate_class_id(id1: &str) -> Result<(), ValidationError> {
    // ---
    let mut chars = id1.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Ok(()),
        _ => {
            let mut err = ValidationError::new("class_id");
            err.message = Some("id1 must be a single uppercase letter".into());
            Err(err)
        }
    }
}

impl NewSensorReading {
    // ---
    /// Attach the storage-assigned identity.
    pub fn with_id(self, id: i64) -> SensorReading {
        // ---
        SensorReading {
            id,
            value: self.value,
            id1: self.id1,
            id2: self.id2,
            sensor_type: self.sensor_type,
            timestamp: self.timestamp,
        }
    }
}

impl WireReading {
    // ---
    /// Encode a reading for the wire, timestamp in RFC 3339 with nanoseconds.
    pub fn encode(
        value: f64,
        sensor_type: &str,
        id1: &str,
        id2: i32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        // ---
        Self {
            value,
            sensor_type: sensor_type.to_string(),
            id1: id1.to_string(),
            id2,
            timestamp: timestamp.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        }
    }

    /// Decode into a reading ready for persistence.
    ///
    /// An absent or unparsable timestamp is replaced with the current UTC
    /// time; the original value is lost and the substitution is logged.
    pub fn decode(&self) -> NewSensorReading {
        // ---
        let timestamp = match DateTime::parse_from_rfc3339(&self.timestamp) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!(
                    "Unparsable timestamp {:?} ({}), substituting current time",
                    self.timestamp,
                    e
                );
                Utc::now()
            }
        };

        NewSensorReading {
            value: self.value,
            id1: self.id1.clone(),
            id2: self.id2,
            sensor_type: self.sensor_type.clone(),
            timestamp,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    // ---
    /// Coerce raw values into valid ranges.
    ///
    /// `page < 1` becomes 1. `page_size < 1` becomes the default (10) and
    /// anything above 100 is clamped to 100.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        // ---
        let page = match page {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if s >= 1 => s.min(MAX_PAGE_SIZE as i64) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    /// Number of rows to skip before this page starts.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// `ceil(total_items / page_size)`.
    pub fn total_pages(&self, total_items: u64) -> u64 {
        total_items.div_ceil(self.page_size as u64)
    }
}
