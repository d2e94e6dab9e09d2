//! Named-attribute access on response records
//!
//! [`Search`](crate::middleware::Search) and [`Paginate`](crate::middleware::Paginate)
//! operate on `Vec<R>` where `R` exposes its fields by name. Record types opt in
//! by implementing [`StringFields`] and/or [`DateTimeFields`]; returning `None`
//! for a configured attribute is a contract violation, not a request error.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Records exposing string-valued fields by name
pub trait StringFields {
    /// Value of the named string field, `None` if the record has no such field
    fn string_field(&self, name: &str) -> Option<&str>;
}

/// Records exposing date-time fields by name
pub trait DateTimeFields {
    /// Value of the named date-time field, `None` if the record has no such field
    fn datetime_field(&self, name: &str) -> Option<DateTime<Utc>>;
}

/// A configured attribute is not exposed by the record type
///
/// Raised as a panic payload message: this is a wiring mistake, never
/// something a caller can trigger with request input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record type `{record}` does not expose {expected} field `{field}`")]
pub struct FieldAccessError {
    pub record: &'static str,
    pub field: String,
    pub expected: &'static str,
}

impl FieldAccessError {
    pub(crate) fn new<R: ?Sized>(field: &str, expected: &'static str) -> Self {
        Self {
            record: std::any::type_name::<R>(),
            field: field.to_string(),
            expected,
        }
    }
}

/// Read a string field or fail loudly
pub(crate) fn require_string<'a, R: StringFields>(record: &'a R, field: &str) -> &'a str {
    match record.string_field(field) {
        Some(value) => value,
        None => panic!("{}", FieldAccessError::new::<R>(field, "string")),
    }
}

/// Read a date-time field or fail loudly
pub(crate) fn require_datetime<R: DateTimeFields>(record: &R, field: &str) -> DateTime<Utc> {
    match record.datetime_field(field) {
        Some(value) => value,
        None => panic!("{}", FieldAccessError::new::<R>(field, "date-time")),
    }
}
