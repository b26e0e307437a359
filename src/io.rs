//! Readers and writers for position logs and occurrence tables.
//!
//! Reading is best-effort: rows missing required fields are logged and
//! skipped, unparsable coordinates are treated as absent with the record
//! retained. Nothing here aborts a run over a bad row.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;

use crate::error::{Result, VoyagerError};
use crate::occurrences::{MatchedOccurrence, OccurrenceRecord};
use crate::Position;

const ID_COLUMN: &str = "gbifID";
const DYNAMIC_PROPERTIES_COLUMN: &str = "dynamicProperties";
const ISSUE_COLUMN: &str = "issue";
const LAT_COLUMN: &str = "decimalLatitude";
const LON_COLUMN: &str = "decimalLongitude";

/// An occurrence table read from disk: the source column order plus the
/// parsed records.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceTable {
    pub columns: Vec<String>,
    pub records: Vec<OccurrenceRecord>,
}

#[derive(Debug, Deserialize)]
struct RawPositionRow {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Read a ship-log position CSV with `year,month,day,lat,lon` columns.
///
/// Rows with missing fields or impossible dates are dropped.
pub fn read_positions(path: &Path) -> Result<Vec<Position>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut positions = Vec::new();
    let mut dropped = 0usize;

    for row in reader.deserialize::<RawPositionRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!("Skipping malformed position row: {}", err);
                dropped += 1;
                continue;
            }
        };

        match position_from_row(&row) {
            Ok(position) => positions.push(position),
            Err(err) => {
                debug!("Dropping position row: {}", err);
                dropped += 1;
            }
        }
    }

    info!(
        "Read {} positions from {} ({} dropped)",
        positions.len(),
        path.display(),
        dropped
    );

    Ok(positions)
}

fn position_from_row(row: &RawPositionRow) -> Result<Position> {
    let year = row.year.ok_or(VoyagerError::MissingField { field: "year" })?;
    let month = row.month.ok_or(VoyagerError::MissingField { field: "month" })?;
    let day = row.day.ok_or(VoyagerError::MissingField { field: "day" })?;
    let lat = row.lat.ok_or(VoyagerError::MissingField { field: "lat" })?;
    let lon = row.lon.ok_or(VoyagerError::MissingField { field: "lon" })?;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(VoyagerError::MissingField { field: "date" })?;

    Ok(Position::new(date, lat, lon))
}

/// Read a tab-delimited occurrence table (DwC-A occurrence.txt layout).
///
/// The event date is built from the `year`/`month`/`day` columns; the
/// vessel and expedition fields are mined from `dynamicProperties`. The
/// full row is preserved in each record's `extras` for pass-through.
pub fn read_occurrences(path: &Path) -> Result<OccurrenceTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!("Skipping malformed occurrence row: {}", err);
                skipped += 1;
                continue;
            }
        };

        let field = |name: &str| -> Option<&str> {
            index
                .get(name)
                .and_then(|&i| row.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let Some(id) = field(ID_COLUMN) else {
            debug!(
                "Dropping occurrence row: {}",
                VoyagerError::MissingField { field: "gbifID" }
            );
            skipped += 1;
            continue;
        };

        let mut extras = BTreeMap::new();
        for (i, column) in columns.iter().enumerate() {
            if let Some(value) = row.get(i) {
                extras.insert(column.clone(), value.to_string());
            }
        }

        let year = field("year").and_then(parse_int_field);
        let month = field("month").and_then(parse_int_field).map(|m| m as u32);
        let day = field("day").and_then(parse_int_field).map(|d| d as u32);
        let date = match (year, month, day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        };

        let properties = field(DYNAMIC_PROPERTIES_COLUMN)
            .map(parse_dynamic_properties)
            .unwrap_or_default();

        records.push(OccurrenceRecord {
            id: id.to_string(),
            date,
            year,
            lat: parse_coordinate(field(LAT_COLUMN)),
            lon: parse_coordinate(field(LON_COLUMN)),
            recorded_by: field("recordedBy").map(str::to_string),
            vessel: properties
                .get("vessel")
                .or_else(|| properties.get("ship"))
                .cloned(),
            expedition: properties
                .get("expedition")
                .or_else(|| properties.get("cruise"))
                .cloned(),
            issue: field(ISSUE_COLUMN).map(str::to_string),
            extras,
        });
    }

    info!(
        "Read {} occurrence records from {} ({} skipped)",
        records.len(),
        path.display(),
        skipped
    );

    Ok(OccurrenceTable { columns, records })
}

/// Write the annotated occurrence table as a comma-delimited file.
///
/// The output keeps the source schema: stage provenance and distance
/// are folded into `dynamicProperties` as JSON, error flags appended to
/// the existing `issue` value, and imputed coordinates written back to
/// their columns.
pub fn write_annotated(
    path: &Path,
    columns: &[String],
    matches: &[MatchedOccurrence],
    vessel: &str,
) -> Result<()> {
    let mut columns: Vec<String> = columns.to_vec();
    for required in [DYNAMIC_PROPERTIES_COLUMN, ISSUE_COLUMN] {
        if !columns.iter().any(|c| c == required) {
            columns.push(required.to_string());
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;

    for m in matches {
        let properties = serde_json::json!({
            "vessel": vessel,
            "distance": m.distance_km,
            "voyagerInferrences": m.inferred_on.as_str(),
        })
        .to_string();
        let issue = fold_issue(m.record.issue.as_deref(), m.error.map(|e| e.as_str()));

        let row: Vec<String> = columns
            .iter()
            .map(|column| match column.as_str() {
                DYNAMIC_PROPERTIES_COLUMN => properties.clone(),
                ISSUE_COLUMN => issue.clone(),
                LAT_COLUMN => m
                    .record
                    .lat
                    .map(|v| v.to_string())
                    .or_else(|| m.record.extras.get(column).cloned())
                    .unwrap_or_default(),
                LON_COLUMN => m
                    .record
                    .lon
                    .map(|v| v.to_string())
                    .or_else(|| m.record.extras.get(column).cloned())
                    .unwrap_or_default(),
                _ => m.record.extras.get(column).cloned().unwrap_or_default(),
            })
            .collect();

        writer.write_record(&row)?;
    }

    writer.flush()?;
    info!("Saved annotated table {}", path.display());

    Ok(())
}

/// Append an error flag to an existing free-text issue value.
///
/// Absent or placeholder issue values count as empty; the delimiter is
/// `;` to match the source convention.
fn fold_issue(existing: Option<&str>, error: Option<&str>) -> String {
    let existing = existing.unwrap_or("").trim();
    let is_placeholder = existing.is_empty()
        || existing.eq_ignore_ascii_case("nan")
        || existing.eq_ignore_ascii_case("na");

    match error {
        None => existing.to_string(),
        Some(flag) if is_placeholder => flag.to_string(),
        Some(flag) => format!("{existing};{flag}"),
    }
}

/// Parse `dynamicProperties`, first as JSON, then as `k:v;k:v` pairs.
///
/// The source data mixes both encodings; anything unparsable yields an
/// empty map rather than an error.
pub fn parse_dynamic_properties(value: &str) -> BTreeMap<String, String> {
    if let Ok(serde_json::Value::Object(object)) = serde_json::from_str(value) {
        return object
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key.trim().to_lowercase(), value.trim().to_string())
            })
            .collect();
    }

    value
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.split_once(':')?;
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                None
            } else {
                Some((key, value.trim().to_string()))
            }
        })
        .collect()
}

fn parse_int_field(value: &str) -> Option<i32> {
    // Year columns show up as both "1800" and "1800.0"
    value.parse::<f64>().ok().map(|v| v as i32)
}

fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    let value = value?;
    match value.parse::<f64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            let err = VoyagerError::UnparsableCoordinate {
                value: value.to_string(),
            };
            debug!("Treating coordinate as absent: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dynamic_properties_json() {
        let props = parse_dynamic_properties(r#"{"vessel": "HMS Endeavour", "depth": 12}"#);
        assert_eq!(props.get("vessel").map(String::as_str), Some("HMS Endeavour"));
        assert_eq!(props.get("depth").map(String::as_str), Some("12"));
    }

    #[test]
    fn test_parse_dynamic_properties_pairs() {
        let props = parse_dynamic_properties("ship: Beagle; expedition: Second Survey");
        assert_eq!(props.get("ship").map(String::as_str), Some("Beagle"));
        assert_eq!(
            props.get("expedition").map(String::as_str),
            Some("Second Survey")
        );
    }

    #[test]
    fn test_parse_dynamic_properties_garbage() {
        assert!(parse_dynamic_properties("no structure here").is_empty());
        assert!(parse_dynamic_properties("").is_empty());
    }

    #[test]
    fn test_fold_issue() {
        assert_eq!(fold_issue(None, None), "");
        assert_eq!(
            fold_issue(None, Some("COORDINATES_INFERRED")),
            "COORDINATES_INFERRED"
        );
        assert_eq!(
            fold_issue(Some("ZERO_COORDINATE"), Some("COORDINATES_INFERRED")),
            "ZERO_COORDINATE;COORDINATES_INFERRED"
        );
        assert_eq!(
            fold_issue(Some("nan"), Some("RECORDED_DATE_INFERRED")),
            "RECORDED_DATE_INFERRED"
        );
        assert_eq!(fold_issue(Some("KEEP_ME"), None), "KEEP_ME");
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(Some("12.5")), Some(12.5));
        assert_eq!(parse_coordinate(Some("not-a-number")), None);
        assert_eq!(parse_coordinate(None), None);
    }

    #[test]
    fn test_parse_int_field() {
        assert_eq!(parse_int_field("1800"), Some(1800));
        assert_eq!(parse_int_field("1800.0"), Some(1800));
        assert_eq!(parse_int_field("unknown"), None);
    }
}
