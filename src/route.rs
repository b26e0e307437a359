//! Reconstructed voyage route with date/location queries.
//!
//! A [`Route`] is an ordered list of disjoint [`Segment`]s, each a
//! contiguous daily-interpolated series. No interpolation or query
//! bridges a segment boundary: dates inside a dropped gap are simply
//! not on the route.

use chrono::{NaiveDate, NaiveTime};
use log::{debug, info};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::Serialize;

use crate::error::{LookupError, VoyagerError};
use crate::geo_utils::geodesic_distance_km;
use crate::{normalize, segment, GeoPoint, Position, RouteConfig};

/// A contiguous, gap-free, antimeridian-consistent stretch of a route.
///
/// Invariant: dates increase by exactly one calendar day from the first
/// point to the last.
#[derive(Debug, Clone)]
pub struct Segment {
    points: Vec<Position>,
}

impl Segment {
    fn new(points: Vec<Position>) -> Self {
        Self { points }
    }

    /// First covered date.
    pub fn start_date(&self) -> NaiveDate {
        self.points[0].date
    }

    /// Last covered date.
    pub fn end_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Whether this segment covers the given date.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    /// Interpolated location on the given date, if covered.
    pub fn location_on(&self, date: NaiveDate) -> Option<GeoPoint> {
        if !self.contains(date) {
            return None;
        }
        let offset = (date - self.start_date()).num_days() as usize;
        self.points.get(offset).map(Position::location)
    }

    /// The daily interpolated points.
    pub fn points(&self) -> &[Position] {
        &self.points
    }
}

/// A route point with its segment/point indices for R-tree queries.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    seg: usize,
    idx: usize,
    lon: f64,
    lat: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlon = self.lon - point[0];
        let dlat = self.lat - point[1];
        dlon * dlon + dlat * dlat
    }
}

/// A normalised coordinate for map export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportPoint {
    pub lon: f64,
    pub lat: f64,
    /// Unix seconds at midnight UTC of the point's day.
    pub timestamp: i64,
}

/// A ship's reconstructed trajectory over its documented time span.
///
/// Built once per voyage from the raw fixes and never mutated. The
/// voyage bounds (`date_from`/`date_to`) are the min/max of the raw
/// source dates, which can differ from segment coverage when gaps were
/// dropped.
#[derive(Debug)]
pub struct Route {
    segments: Vec<Segment>,
    date_from: NaiveDate,
    date_to: NaiveDate,
    index: RTree<IndexedPoint>,
}

impl Route {
    /// Build a route from raw position fixes.
    ///
    /// The fixes may be unsorted and duplicated per day. Returns
    /// [`VoyagerError::EmptyRoute`] when no fixes are supplied.
    pub fn from_positions(
        mut positions: Vec<Position>,
        config: &RouteConfig,
    ) -> Result<Self, VoyagerError> {
        if positions.is_empty() {
            return Err(VoyagerError::EmptyRoute);
        }

        positions.sort_by_key(|p| p.date);
        let date_from = positions[0].date;
        let date_to = positions[positions.len() - 1].date;

        let mut segments = Vec::new();
        for run in segment::split_at_gaps(&positions, config) {
            for frame in segment::split_at_antimeridian(&run) {
                let daily = segment::resample_daily(&frame);
                if !daily.is_empty() {
                    segments.push(Segment::new(daily));
                }
            }
        }

        let indexed: Vec<IndexedPoint> = segments
            .iter()
            .enumerate()
            .flat_map(|(seg, s)| {
                s.points.iter().enumerate().map(move |(idx, p)| IndexedPoint {
                    seg,
                    idx,
                    lon: p.lon,
                    lat: p.lat,
                })
            })
            .collect();

        Ok(Self {
            segments,
            date_from,
            date_to,
            index: RTree::bulk_load(indexed),
        })
    }

    /// Earliest raw fix date.
    pub fn date_from(&self) -> NaiveDate {
        self.date_from
    }

    /// Latest raw fix date.
    pub fn date_to(&self) -> NaiveDate {
        self.date_to
    }

    /// Year of the earliest raw fix.
    pub fn year_from(&self) -> i32 {
        use chrono::Datelike;
        self.date_from.year()
    }

    /// Year of the latest raw fix.
    pub fn year_to(&self) -> i32 {
        use chrono::Datelike;
        self.date_to.year()
    }

    /// The route's segments in date order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Interpolated location on the given date.
    ///
    /// Misses are expected during matching: dates outside the voyage
    /// bounds or inside a dropped gap are logged at low severity and
    /// reported as [`LookupError::DateNotOnRoute`].
    pub fn location_by_date(&self, date: NaiveDate) -> Result<GeoPoint, LookupError> {
        if let Some(location) = self
            .segments
            .iter()
            .find_map(|segment| segment.location_on(date))
        {
            return Ok(location);
        }

        if date > self.date_to {
            debug!(
                "Occurrence dated {} is after voyage end date {}",
                date, self.date_to
            );
        } else if date < self.date_from {
            debug!(
                "Occurrence dated {} is before voyage start date {}",
                date, self.date_from
            );
        } else {
            info!("Could not find location for date {}", date);
        }

        Err(LookupError::DateNotOnRoute(date))
    }

    /// Date of the trajectory point nearest to the given location.
    ///
    /// The nearest-neighbor search is planar over raw degrees: it does
    /// not correct for latitude distortion or dateline wrap. This is a
    /// known approximation, acceptable for inferring a date from a
    /// specimen's recorded location.
    pub fn date_by_location(&self, lat: f64, lon: f64) -> Result<NaiveDate, LookupError> {
        let nearest = self
            .index
            .nearest_neighbor(&[lon, lat])
            .ok_or(LookupError::LocationNotOnRoute { lat, lon })?;

        let date = self.segments[nearest.seg].points[nearest.idx].date;
        if date >= self.date_from && date <= self.date_to {
            Ok(date)
        } else {
            Err(LookupError::LocationNotOnRoute { lat, lon })
        }
    }

    /// Geodesic distance in kilometers from the route's position on
    /// `date` to the given location.
    ///
    /// Returns `None` ("unknown") when the date is not on the route.
    pub fn distance_km(&self, date: NaiveDate, lat: f64, lon: f64) -> Option<f64> {
        match self.location_by_date(date) {
            Ok(on_route) => Some(geodesic_distance_km(on_route, GeoPoint::new(lat, lon))),
            Err(err) => {
                debug!("No route distance for {}: {}", date, err);
                None
            }
        }
    }

    /// Interpolated points within an inclusive date range.
    pub fn section(&self, date_from: NaiveDate, date_to: NaiveDate) -> Vec<Position> {
        self.segments
            .iter()
            .flat_map(|segment| segment.points.iter())
            .filter(|p| p.date >= date_from && p.date <= date_to)
            .copied()
            .collect()
    }

    /// Flattened coordinates for map export, smoothed by the
    /// [`normalize`] passes.
    ///
    /// The smoothing is applied only to this exported copy; the
    /// trajectory used for matching is left untouched.
    pub fn export_coordinates(&self) -> Vec<ExportPoint> {
        let mut points: Vec<ExportPoint> = self
            .segments
            .iter()
            .flat_map(|segment| segment.points.iter())
            .map(|p| ExportPoint {
                lon: p.lon,
                lat: p.lat,
                timestamp: p.date.and_time(NaiveTime::MIN).and_utc().timestamp(),
            })
            .collect();

        normalize::fix_antimeridian_jumps(&mut points);
        normalize::smooth_outliers(&mut points);

        points
    }
}
