//! Segmentation and daily resampling of raw position logs.
//!
//! Three pure passes turn a sorted fix sequence into gap-free daily series:
//! - [`split_at_gaps`] breaks the sequence where a pair of fixes is far
//!   apart in both time and distance (a genuinely separate leg)
//! - [`split_at_antimeridian`] breaks wherever the raw longitude sign
//!   flips, so interpolation never runs straight across the ±180° line
//! - [`resample_daily`] collapses same-day duplicates and interpolates
//!   each run onto a contiguous daily date axis

use chrono::Duration;
use log::info;

use crate::geo_utils::geodesic_distance_km;
use crate::{Position, RouteConfig};

/// Split a date-sorted position sequence at large gaps.
///
/// A break is inserted between adjacent fixes only when the day gap
/// exceeds `config.max_gap_days` **and** the geodesic distance exceeds
/// `config.max_gap_distance_km`. Short time gaps are always bridged;
/// long time gaps are bridged unless also geographically large.
pub fn split_at_gaps(positions: &[Position], config: &RouteConfig) -> Vec<Vec<Position>> {
    let mut breaks = Vec::new();

    for (index, pair) in positions.windows(2).enumerate() {
        let day_gap = (pair[1].date - pair[0].date).num_days();
        if day_gap > config.max_gap_days {
            let distance = geodesic_distance_km(pair[0].location(), pair[1].location());
            if distance > config.max_gap_distance_km {
                breaks.push(index + 1);
            }
        }
    }

    if !breaks.is_empty() {
        info!("Splitting voyage into {} stages", breaks.len() + 1);
    }

    split_at_indices(positions, &breaks)
}

/// Split a position sequence wherever the raw longitude sign flips.
///
/// The sign flip is a proxy for an antimeridian crossing in this
/// coordinate convention; interpolating across it would draw an invalid
/// path through the 0° meridian instead.
pub fn split_at_antimeridian(positions: &[Position]) -> Vec<Vec<Position>> {
    let breaks: Vec<usize> = positions
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| (pair[0].lon >= 0.0) != (pair[1].lon >= 0.0))
        .map(|(index, _)| index + 1)
        .collect();

    split_at_indices(positions, &breaks)
}

/// Reindex a date-sorted run onto a contiguous daily axis.
///
/// Multiple fixes on the same day are averaged. Days with no fix are
/// filled by linear interpolation of lat and lon independently against
/// the daily date axis. The output covers every day from the run's first
/// to last date with no gaps.
pub fn resample_daily(positions: &[Position]) -> Vec<Position> {
    let anchors = collapse_daily(positions);
    if anchors.len() < 2 {
        return anchors;
    }

    let mut daily = Vec::new();

    for pair in anchors.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let span = (to.date - from.date).num_days();

        daily.push(from);
        for offset in 1..span {
            let t = offset as f64 / span as f64;
            daily.push(Position::new(
                from.date + Duration::days(offset),
                from.lat + t * (to.lat - from.lat),
                from.lon + t * (to.lon - from.lon),
            ));
        }
    }

    // windows(2) pushes each left anchor; the final one is still pending
    if let Some(last) = anchors.last() {
        daily.push(*last);
    }

    daily
}

/// Average same-day fixes into a single anchor per calendar day.
fn collapse_daily(positions: &[Position]) -> Vec<Position> {
    let mut anchors: Vec<Position> = Vec::new();
    let mut count = 0usize;

    for position in positions {
        match anchors.last_mut() {
            Some(anchor) if anchor.date == position.date => {
                // Running mean over the day's fixes
                count += 1;
                let n = count as f64;
                anchor.lat += (position.lat - anchor.lat) / n;
                anchor.lon += (position.lon - anchor.lon) / n;
            }
            _ => {
                anchors.push(*position);
                count = 1;
            }
        }
    }

    anchors
}

fn split_at_indices(positions: &[Position], breaks: &[usize]) -> Vec<Vec<Position>> {
    if breaks.is_empty() {
        return vec![positions.to_vec()];
    }

    let mut frames = Vec::with_capacity(breaks.len() + 1);
    let mut start = 0;

    for &index in breaks {
        frames.push(positions[start..index].to_vec());
        start = index;
    }
    frames.push(positions[start..].to_vec());

    frames
}
