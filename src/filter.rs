//! Parsing of optional filter fields from the query boundary.
//!
//! Every field is optional. A field that is present but malformed is a
//! client error; it is never silently dropped. Paging values are the
//! exception: they are coerced into range and never rejected.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::FilterError;
use crate::models::PageRequest;
use crate::predicate::{Condition, Field, Predicate, Value};

// ---

/// Raw query string as it arrives (`?id1=A&id2=5&from=...&page_size=20`).
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    pub id1: Option<String>,
    pub id2: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Validated filter; `None` means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub id1: Option<String>,
    pub id2: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ---

/// Empty strings count as absent.
fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_instant(raw: &str, err: FilterError) -> Result<DateTime<Utc>, FilterError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| err)
}

impl ReadingsQuery {
    // ---
    /// Parse the filter fields. Paging fields are ignored here.
    pub fn filter(&self) -> Result<ReadingFilter, FilterError> {
        // ---
        let id1 = present(&self.id1).map(str::to_string);

        let id2 = match present(&self.id2) {
            Some(raw) => {
                let id2: i32 = raw.parse().map_err(|_| FilterError::Id2Format)?;
                if !(0..=999).contains(&id2) {
                    return Err(FilterError::Id2Range);
                }
                Some(id2)
            }
            None => None,
        };

        let from = present(&self.from)
            .map(|raw| parse_instant(raw, FilterError::FromFormat))
            .transpose()?;
        let to = present(&self.to)
            .map(|raw| parse_instant(raw, FilterError::ToFormat))
            .transpose()?;

        Ok(ReadingFilter { id1, id2, from, to })
    }

    /// Coerce paging fields; unparsable values fall back to defaults.
    pub fn page_request(&self) -> PageRequest {
        // ---
        let parse = |raw: &Option<String>| present(raw).and_then(|s| s.parse::<i64>().ok());
        PageRequest::new(parse(&self.page), parse(&self.page_size))
    }
}

impl ReadingFilter {
    // ---
    pub fn is_empty(&self) -> bool {
        self.id1.is_none() && self.id2.is_none() && self.from.is_none() && self.to.is_none()
    }

    /// One condition per present field, joined by AND.
    pub fn predicate(&self) -> Predicate {
        // ---
        let mut predicate = Predicate::all();
        if let Some(id1) = &self.id1 {
            predicate = predicate.and(Condition::Equals(Field::Id1, Value::Text(id1.clone())));
        }
        if let Some(id2) = self.id2 {
            predicate = predicate.and(Condition::Equals(Field::Id2, Value::Int(id2)));
        }
        if let Some(from) = self.from {
            predicate = predicate.and(Condition::GreaterOrEqual(
                Field::Timestamp,
                Value::Instant(from),
            ));
        }
        if let Some(to) = self.to {
            predicate = predicate.and(Condition::LessOrEqual(Field::Timestamp, Value::Instant(to)));
        }
        predicate
    }
}
