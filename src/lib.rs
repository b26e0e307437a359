//! # Voyager
//!
//! Ship trajectory reconstruction and biodiversity occurrence attribution.
//!
//! This library provides:
//! - Trajectory reconstruction from sparse, irregular dated position fixes
//! - Gap-aware and antimeridian-aware segmentation with daily interpolation
//! - Date/location queries against the reconstructed route
//! - A five-stage evidence cascade attributing occurrence records to a voyage
//! - Export-side coordinate normalisation for map rendering
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use voyager::{Position, Route, RouteConfig};
//!
//! let positions = vec![
//!     Position::new(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 10.0, 10.0),
//!     Position::new(NaiveDate::from_ymd_opt(2021, 1, 3).unwrap(), 10.0, 12.0),
//! ];
//!
//! let route = Route::from_positions(positions, &RouteConfig::default()).unwrap();
//! let location = route
//!     .location_by_date(NaiveDate::from_ymd_opt(2021, 1, 2).unwrap())
//!     .unwrap();
//! assert!((location.lon - 11.0).abs() < 1e-9);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LookupError, Result, VoyagerError};

// Geographic utilities (geodesic distance)
pub mod geo_utils;

// Gap/antimeridian segmentation and daily resampling
pub mod segment;
pub use segment::{resample_daily, split_at_antimeridian, split_at_gaps};

// Reconstructed route with date/location queries
pub mod route;
pub use route::{ExportPoint, Route, Segment};

// Export-only coordinate smoothing
pub mod normalize;

// Case-insensitive substring matching and surname extraction
pub mod text;
pub use text::{contains_any, extract_surname};

// Occurrence matching pipeline
pub mod occurrences;
pub use occurrences::{
    ErrorFlag, InferredOn, MatchState, MatchStats, MatchedOccurrence, OccurrenceMatcher,
    OccurrenceRecord,
};

// Deterministic per-voyage result caching
pub mod cache;
pub use cache::{cache_key, MemoryCache, NoCache, OccurrenceCache};

// Readers and writers for position logs and occurrence tables
pub mod io;
pub use io::OccurrenceTable;

// Voyage metadata wrapper
pub mod voyage;
pub use voyage::Voyage;

// ============================================================================
// Core Types
// ============================================================================

/// A dated position fix from a ship's log.
///
/// Raw fixes may arrive unsorted and duplicated per day; the route builder
/// sorts and collapses them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub date: NaiveDate,
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    /// Create a new position fix.
    pub fn new(date: NaiveDate, lat: f64, lon: f64) -> Self {
        Self { date, lat, lon }
    }

    /// Location of this fix without the date.
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Configuration for trajectory reconstruction.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Number of days it is acceptable to bridge by interpolation.
    /// Gaps longer than this are only split when they are also
    /// geographically large. Default: 50
    pub max_gap_days: i64,

    /// Distance threshold paired with `max_gap_days`: a long time gap is
    /// split only when the two fixes are also further apart than this.
    /// Default: 250.0 km
    pub max_gap_distance_km: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_gap_days: 50,
            max_gap_distance_km: 250.0,
        }
    }
}

/// Configuration for occurrence matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Maximum plausible distance from the route on the record's day.
    /// Records further than this are excluded by the proximity stage and
    /// flagged when matched by textual evidence. Default: 100.0 km
    pub max_km_to_route: f64,

    /// Number of times a collector name must appear on strong matches
    /// before it is used for inferred-collector matching. Default: 50
    pub collector_threshold: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_km_to_route: 100.0,
            collector_threshold: 50,
        }
    }
}
