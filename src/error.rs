//! Unified error handling for the voyager library.
//!
//! Route lookups that miss (a date inside a dropped gap, a nearest point
//! outside the voyage bounds) are expected during matching and are modelled
//! as [`LookupError`] so callers can log and continue. [`VoyagerError`]
//! covers the fallible entry points: reading logs, building routes and
//! writing output tables.

use chrono::NaiveDate;
use thiserror::Error;

/// Convenience result type for voyager operations.
pub type Result<T> = std::result::Result<T, VoyagerError>;

/// A non-fatal route lookup miss.
///
/// These are logged at low severity by the matching pipeline and never
/// abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LookupError {
    /// The date falls outside the voyage bounds or inside a dropped gap.
    #[error("date {0} is not covered by the route")]
    DateNotOnRoute(NaiveDate),

    /// The nearest trajectory point does not resolve to a date within
    /// the voyage bounds.
    #[error("no route date found near ({lat}, {lon})")]
    LocationNotOnRoute { lat: f64, lon: f64 },
}

/// Errors for the fallible voyager operations.
#[derive(Debug, Error)]
pub enum VoyagerError {
    /// No valid positions were available to build a route from.
    #[error("no valid positions to build a route from")]
    EmptyRoute,

    /// A record lacked a required value. Row-level: the record is
    /// excluded and processing continues.
    #[error("record is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A coordinate value could not be parsed as a number. Row-level:
    /// the coordinate is treated as absent and the record retained.
    #[error("could not parse coordinate value '{value}'")]
    UnparsableCoordinate { value: String },

    /// A date/location query missed the route.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
