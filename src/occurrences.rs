//! Occurrence matching: the five-stage evidence cascade.
//!
//! A [`MatchState`] is threaded through the stages in a fixed order,
//! because later stages depend on evidence accumulated by earlier ones:
//!
//! 1. vessel/expedition textual match (also tallies collector names)
//! 2. expedition-hint match (also tallies collector names)
//! 3. explicit collector match
//! 4. inferred-collector match, fed by the stage 1-2 tally
//! 5. geotemporal proximity to the route
//!
//! Stage outputs are concatenated and deduplicated by record id keeping
//! the **last** occurrence in pipeline order. The tag a record ends up
//! with is therefore positional, not confidence-based: a record matched
//! by vessel name and again by proximity is reported as a proximity
//! match. This mirrors the established output and is kept deliberately.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

use crate::route::Route;
use crate::text::{contains_any, extract_surname};
use crate::voyage::Voyage;
use crate::MatchConfig;

/// Generic placeholder names never used for inferred-collector matching.
const NAME_DENYLIST: [&str; 5] = ["Anonymous", "Unknown", "Unnamed", "Unidentified", "Anon"];

/// Which evidence stage attributed a record to the voyage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredOn {
    Vessel,
    Expedition,
    Collector,
    InferredCollector,
    RouteProximity,
}

impl InferredOn {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferredOn::Vessel => "vessel",
            InferredOn::Expedition => "expedition",
            InferredOn::Collector => "collector",
            InferredOn::InferredCollector => "inferred_collector",
            InferredOn::RouteProximity => "route_proximity",
        }
    }
}

impl std::fmt::Display for InferredOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-quality flag attached to a matched record.
///
/// Flags are annotations, never exclusions: a record matched by strong
/// vessel-name evidence stays in the table even when its distance to
/// the route is implausible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorFlag {
    CoordinatesInferred,
    RecordedDateInferred,
    InvalidDistanceToRoute,
}

impl ErrorFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorFlag::CoordinatesInferred => "COORDINATES_INFERRED",
            ErrorFlag::RecordedDateInferred => "RECORDED_DATE_INFERRED",
            ErrorFlag::InvalidDistanceToRoute => "INVALID_DISTANCE_TO_ROUTE",
        }
    }
}

impl std::fmt::Display for ErrorFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external biodiversity occurrence record.
///
/// Only the fields named here are interpreted; everything else the
/// source table carries rides along untouched in `extras`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OccurrenceRecord {
    /// Source record identifier (e.g. gbifID).
    pub id: String,
    /// Recorded event date, when complete.
    pub date: Option<NaiveDate>,
    /// Recorded event year, used for slicing the table per voyage.
    pub year: Option<i32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Free-text collector field.
    pub recorded_by: Option<String>,
    /// Free-text vessel field, usually mined from dynamicProperties.
    pub vessel: Option<String>,
    /// Free-text expedition field, usually mined from dynamicProperties.
    pub expedition: Option<String>,
    /// Existing free-text issue/notes field; error flags are appended
    /// here on export.
    pub issue: Option<String>,
    /// Opaque pass-through attribute bag (taxonomy, metadata).
    pub extras: BTreeMap<String, String>,
}

impl OccurrenceRecord {
    /// Create an empty record with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// An occurrence record attributed to a voyage.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedOccurrence {
    pub record: OccurrenceRecord,
    pub inferred_on: InferredOn,
    /// Geodesic distance to the route on the record's day, when known.
    pub distance_km: Option<f64>,
    pub error: Option<ErrorFlag>,
}

/// Pipeline state threaded through the evidence stages in order.
#[derive(Debug, Default)]
pub struct MatchState {
    /// Accumulated matches in stage order, before deduplication.
    pub matched: Vec<MatchedOccurrence>,
    /// Collector names seen on strong (vessel/expedition) matches.
    pub collector_tally: BTreeMap<String, usize>,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally_collectors(&mut self, batch: &[&OccurrenceRecord]) {
        for record in batch {
            if let Some(name) = record.recorded_by.as_deref() {
                if !name.is_empty() {
                    *self.collector_tally.entry(name.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
}

/// Summary statistics for a matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    /// Record count per error flag.
    pub errors: BTreeMap<String, usize>,
    /// Record count per evidence stage tag.
    pub inferred_on: BTreeMap<String, usize>,
    pub total: usize,
}

impl MatchStats {
    /// Tally a deduplicated matched table.
    pub fn from_matches(matches: &[MatchedOccurrence]) -> Self {
        let mut stats = Self {
            total: matches.len(),
            ..Default::default()
        };

        for m in matches {
            if let Some(error) = m.error {
                *stats.errors.entry(error.as_str().to_string()).or_insert(0) += 1;
            }
            *stats
                .inferred_on
                .entry(m.inferred_on.as_str().to_string())
                .or_insert(0) += 1;
        }

        stats
    }
}

/// The occurrence matching engine for one voyage.
///
/// Matching is sequential within a voyage by design: the stage ordering
/// is a correctness requirement, not an optimisation choice.
pub struct OccurrenceMatcher<'a> {
    route: &'a Route,
    vessel: &'a str,
    collectors: &'a [String],
    expedition: Option<&'a str>,
    config: MatchConfig,
}

impl<'a> OccurrenceMatcher<'a> {
    /// Create a matcher for a route and vessel name.
    ///
    /// Compound vessel names joined by `+` are treated as alternatives.
    pub fn new(route: &'a Route, vessel: &'a str, config: MatchConfig) -> Self {
        Self {
            route,
            vessel,
            collectors: &[],
            expedition: None,
            config,
        }
    }

    /// Create a matcher from a voyage's metadata and hints.
    pub fn for_voyage(voyage: &'a Voyage, config: MatchConfig) -> Self {
        Self {
            route: &voyage.route,
            vessel: &voyage.vessel,
            collectors: &voyage.collectors,
            expedition: voyage.expedition.as_deref(),
            config,
        }
    }

    /// Supply known collector surnames for the explicit collector stage.
    pub fn with_collectors(mut self, collectors: &'a [String]) -> Self {
        self.collectors = collectors;
        self
    }

    /// Supply an expedition label for the expedition stage.
    pub fn with_expedition(mut self, expedition: &'a str) -> Self {
        self.expedition = Some(expedition);
        self
    }

    /// Run the full cascade over the candidate records and return the
    /// deduplicated, distance-validated matched table.
    ///
    /// Candidates are expected to be pre-sliced to the voyage's year
    /// range (see [`crate::occurrences::filter_years`]).
    pub fn run(&self, records: &[OccurrenceRecord]) -> Vec<MatchedOccurrence> {
        let state = MatchState::new();
        let state = self.match_by_vessel(records, state);

        let state = match self.expedition {
            Some(expedition) => self.match_by_expedition(records, expedition, state),
            None => state,
        };

        let state = if self.collectors.is_empty() {
            state
        } else {
            self.match_by_collector(records, state)
        };

        let state = self.match_by_inferred_collector(records, state);
        let state = self.match_by_proximity(records, state);

        let mut table = dedup_keep_last(state.matched);
        self.validate_distance_to_route(&mut table);

        if table.is_empty() {
            warn!(
                "No occurrences found for {} - {}",
                self.vessel,
                self.route.year_from()
            );
        } else {
            info!("{} occurrences with complete data", table.len());
        }

        table
    }

    /// Stage 1: vessel-name match against the vessel and expedition
    /// fields. Collector names on every matched record feed the tally.
    fn match_by_vessel(&self, records: &[OccurrenceRecord], mut state: MatchState) -> MatchState {
        let patterns: Vec<&str> = self.vessel.split('+').collect();

        let fields: [(fn(&OccurrenceRecord) -> Option<&str>, InferredOn); 2] = [
            (|r| r.vessel.as_deref(), InferredOn::Vessel),
            (|r| r.expedition.as_deref(), InferredOn::Expedition),
        ];

        for (field, tag) in fields {
            let batch: Vec<&OccurrenceRecord> = records
                .iter()
                .filter(|record| field(record).is_some_and(|text| contains_any(text, &patterns)))
                .collect();

            if batch.is_empty() {
                continue;
            }

            info!("Found {} occurrences for {}", batch.len(), tag);
            state.tally_collectors(&batch);
            self.split_with_inferences(&batch, tag, &mut state);
        }

        state
    }

    /// Stage 2: expedition-hint match against the expedition field.
    fn match_by_expedition(
        &self,
        records: &[OccurrenceRecord],
        expedition: &str,
        mut state: MatchState,
    ) -> MatchState {
        let batch: Vec<&OccurrenceRecord> = records
            .iter()
            .filter(|record| {
                record
                    .expedition
                    .as_deref()
                    .is_some_and(|text| contains_any(text, &[expedition]))
            })
            .collect();

        if !batch.is_empty() {
            info!("Found {} occurrences for expedition", batch.len());
            state.tally_collectors(&batch);
            self.split_with_inferences(&batch, InferredOn::Expedition, &mut state);
        }

        state
    }

    /// Stage 3: explicit collector-surname match.
    fn match_by_collector(
        &self,
        records: &[OccurrenceRecord],
        mut state: MatchState,
    ) -> MatchState {
        let batch: Vec<&OccurrenceRecord> = records
            .iter()
            .filter(|record| {
                record
                    .recorded_by
                    .as_deref()
                    .is_some_and(|text| contains_any(text, self.collectors))
            })
            .collect();

        info!("Found {} occurrences by collector name", batch.len());
        self.split_with_inferences(&batch, InferredOn::Collector, &mut state);

        state
    }

    /// Stage 4: collectors inferred from the stage 1-2 tally.
    ///
    /// Names that appeared on strong matches more than
    /// `collector_threshold` times are reduced to surnames, cleaned of
    /// generic placeholders and of names already supplied explicitly,
    /// then matched like stage 3.
    fn match_by_inferred_collector(
        &self,
        records: &[OccurrenceRecord],
        mut state: MatchState,
    ) -> MatchState {
        let supplied: BTreeSet<&str> = self.collectors.iter().map(String::as_str).collect();

        // BTreeSet keeps the pattern order deterministic across runs
        let surnames: BTreeSet<String> = state
            .collector_tally
            .iter()
            .filter(|(_, &count)| count > self.config.collector_threshold)
            .filter_map(|(name, _)| extract_surname(name))
            .filter(|surname| !NAME_DENYLIST.contains(&surname.as_str()))
            .filter(|surname| !supplied.contains(surname.as_str()))
            .collect();

        if surnames.is_empty() {
            return state;
        }

        let patterns: Vec<&str> = surnames.iter().map(String::as_str).collect();
        let batch: Vec<&OccurrenceRecord> = records
            .iter()
            .filter(|record| {
                record
                    .recorded_by
                    .as_deref()
                    .is_some_and(|text| contains_any(text, &patterns))
            })
            .collect();

        info!(
            "Found {} occurrences by inferred collector names: {}",
            batch.len(),
            patterns.join(",")
        );
        self.split_with_inferences(&batch, InferredOn::InferredCollector, &mut state);

        state
    }

    /// Stage 5: geotemporal proximity.
    ///
    /// Records dated within the voyage bounds, carrying both
    /// coordinates, and within `max_km_to_route` of the route on that
    /// day.
    fn match_by_proximity(&self, records: &[OccurrenceRecord], mut state: MatchState) -> MatchState {
        let mut kept = 0usize;

        for record in records {
            let Some(date) = record.date else { continue };
            if date < self.route.date_from() || date > self.route.date_to() {
                continue;
            }
            let (Some(lat), Some(lon)) = (record.lat, record.lon) else {
                continue;
            };
            let Some(distance) = self.route.distance_km(date, lat, lon) else {
                continue;
            };

            if distance <= self.config.max_km_to_route {
                state.matched.push(MatchedOccurrence {
                    record: record.clone(),
                    inferred_on: InferredOn::RouteProximity,
                    distance_km: Some(distance),
                    error: None,
                });
                kept += 1;
            }
        }

        info!(
            "{} occurrences found within {}km of route",
            kept, self.config.max_km_to_route
        );

        state
    }

    /// Three-way split of a matched batch by date/location completeness.
    ///
    /// - date and location: accepted unchanged
    /// - date only: location imputed from the route, flagged
    ///   COORDINATES_INFERRED, distance 0 by construction
    /// - location only: date imputed from the nearest route point,
    ///   flagged RECORDED_DATE_INFERRED
    /// - neither: dropped
    fn split_with_inferences(
        &self,
        batch: &[&OccurrenceRecord],
        tag: InferredOn,
        state: &mut MatchState,
    ) {
        for record in batch {
            let has_date = record.date.is_some();
            let has_location = record.lat.is_some() && record.lon.is_some();

            match (has_date, has_location) {
                (true, true) => state.matched.push(MatchedOccurrence {
                    record: (*record).clone(),
                    inferred_on: tag,
                    distance_km: None,
                    error: None,
                }),
                (true, false) => {
                    let mut imputed = (*record).clone();
                    if let Some(date) = imputed.date {
                        if let Ok(location) = self.route.location_by_date(date) {
                            imputed.lat = Some(location.lat);
                            imputed.lon = Some(location.lon);
                        }
                    }
                    state.matched.push(MatchedOccurrence {
                        record: imputed,
                        inferred_on: tag,
                        // Location comes from the route itself
                        distance_km: Some(0.0),
                        error: Some(ErrorFlag::CoordinatesInferred),
                    });
                }
                (false, true) => {
                    let mut imputed = (*record).clone();
                    if let (Some(lat), Some(lon)) = (imputed.lat, imputed.lon) {
                        imputed.date = self.route.date_by_location(lat, lon).ok();
                    }
                    state.matched.push(MatchedOccurrence {
                        record: imputed,
                        inferred_on: tag,
                        distance_km: None,
                        error: Some(ErrorFlag::RecordedDateInferred),
                    });
                }
                (false, false) => {}
            }
        }
    }

    /// Post-assembly plausibility pass.
    ///
    /// Every deduplicated record with both a date and coordinates gets a
    /// route distance (reusing one computed earlier where present);
    /// distances beyond `max_km_to_route` set INVALID_DISTANCE_TO_ROUTE.
    /// The flag annotates, it never removes.
    fn validate_distance_to_route(&self, table: &mut [MatchedOccurrence]) {
        for m in table {
            let (Some(date), Some(lat), Some(lon)) = (m.record.date, m.record.lat, m.record.lon)
            else {
                continue;
            };

            let distance = match m.distance_km {
                Some(distance) => distance,
                None => {
                    let Some(distance) = self.route.distance_km(date, lat, lon) else {
                        continue;
                    };
                    m.distance_km = Some(distance);
                    distance
                }
            };

            if distance > self.config.max_km_to_route {
                m.error = Some(ErrorFlag::InvalidDistanceToRoute);
            }
        }
    }
}

/// Slice candidate records to a voyage's year range (inclusive).
///
/// Records without a usable year are excluded.
pub fn filter_years(
    records: &[OccurrenceRecord],
    year_from: i32,
    year_to: i32,
) -> Vec<OccurrenceRecord> {
    records
        .iter()
        .filter(|record| {
            record
                .year
                .map(|year| year >= year_from && year <= year_to)
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// Deduplicate by record id, keeping the last occurrence in pipeline
/// order. Positional, not confidence-based: preserved deliberately.
fn dedup_keep_last(matched: Vec<MatchedOccurrence>) -> Vec<MatchedOccurrence> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (index, m) in matched.iter().enumerate() {
        last_index.insert(m.record.id.clone(), index);
    }

    matched
        .into_iter()
        .enumerate()
        .filter(|(index, m)| last_index.get(&m.record.id) == Some(index))
        .map(|(_, m)| m)
        .collect()
}
