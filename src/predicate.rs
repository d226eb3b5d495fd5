//! Conjunctive predicates over reading fields.
//!
//! A [`Predicate`] is a list of [`Condition`]s joined by AND; an empty list
//! matches every row. Backends either evaluate it in process
//! ([`Predicate::matches`]) or render it as a parameterised `WHERE` clause
//! ([`Predicate::push_where`]). Values are always bound, never spliced.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

use crate::models::SensorReading;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id1,
    Id2,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i32),
    Instant(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Field, Value),
    GreaterOrEqual(Field, Value),
    LessOrEqual(Field, Value),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

// ---

impl Field {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Id1 => "id1",
            Self::Id2 => "id2",
            Self::Timestamp => "ts",
        }
    }

    fn value_of(self, reading: &SensorReading) -> Value {
        match self {
            Self::Id1 => Value::Text(reading.id1.clone()),
            Self::Id2 => Value::Int(reading.id2),
            Self::Timestamp => Value::Instant(reading.timestamp),
        }
    }
}

impl Value {
    /// Ordering between values of the same kind; `None` across kinds.
    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Instant(a), Self::Instant(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Text(s) => qb.push_bind(s.clone()),
            Self::Int(i) => qb.push_bind(*i),
            Self::Instant(t) => qb.push_bind(*t),
        };
    }
}

impl Condition {
    pub fn field(&self) -> Field {
        match self {
            Self::Equals(f, _) | Self::GreaterOrEqual(f, _) | Self::LessOrEqual(f, _) => *f,
        }
    }

    fn value(&self) -> &Value {
        match self {
            Self::Equals(_, v) | Self::GreaterOrEqual(_, v) | Self::LessOrEqual(_, v) => v,
        }
    }

    const fn operator(&self) -> &'static str {
        match self {
            Self::Equals(..) => " = ",
            Self::GreaterOrEqual(..) => " >= ",
            Self::LessOrEqual(..) => " <= ",
        }
    }

    pub fn matches(&self, reading: &SensorReading) -> bool {
        // ---
        let ord = self.field().value_of(reading).compare(self.value());
        match self {
            Self::Equals(..) => ord == Some(Ordering::Equal),
            Self::GreaterOrEqual(..) => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            Self::LessOrEqual(..) => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl Predicate {
    // ---
    /// The match-all predicate.
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_match_all(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, reading: &SensorReading) -> bool {
        self.conditions.iter().all(|c| c.matches(reading))
    }

    /// Append ` WHERE a = $1 AND b >= $2 ...`; appends nothing when empty.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        // ---
        let mut separator = " WHERE ";
        for condition in &self.conditions {
            qb.push(separator);
            qb.push(condition.field().column());
            qb.push(condition.operator());
            condition.value().push_bind(qb);
            separator = " AND ";
        }
    }
}
