//! File round-trip tests: position logs in, annotated tables out

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use voyager::{io, MatchConfig, OccurrenceMatcher, Route, RouteConfig};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("voyager-io-{}-{}", std::process::id(), name))
}

#[test]
fn test_read_positions_drops_bad_rows() {
    let path = temp_file("positions.csv");
    fs::write(
        &path,
        "year,month,day,lat,lon\n\
         1800,1,1,0.0,10.0\n\
         1800,1,31,0.0,13.0\n\
         1800,2,30,0.0,14.0\n\
         1800,,5,0.0,11.0\n",
    )
    .unwrap();

    let positions = io::read_positions(&path).unwrap();
    let _ = fs::remove_file(&path);

    // The impossible date and the missing month are dropped
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].date, date(1800, 1, 1));
    assert_eq!(positions[1].date, date(1800, 1, 31));
}

#[test]
fn test_read_occurrences_both_property_encodings() {
    let path = temp_file("occurrences.txt");
    fs::write(
        &path,
        "gbifID\tyear\tmonth\tday\tdecimalLatitude\tdecimalLongitude\trecordedBy\tdynamicProperties\tissue\tscientificName\n\
         1\t1800\t1\t1\t0.0\t10.0\tJ. Banks\t{\"vessel\": \"HMS Endeavour\"}\t\tBanksia serrata\n\
         2\t1800.0\t1\t5\t\t\t\tship: Endeavour; cruise: First Voyage\tnan\tBanksia integrifolia\n\
         \t1800\t1\t6\t0.0\t10.5\t\t\t\tNo identifier\n",
    )
    .unwrap();

    let table = io::read_occurrences(&path).unwrap();
    let _ = fs::remove_file(&path);

    // The row without a gbifID is skipped
    assert_eq!(table.records.len(), 2);

    let first = &table.records[0];
    assert_eq!(first.id, "1");
    assert_eq!(first.date, Some(date(1800, 1, 1)));
    assert_eq!(first.vessel.as_deref(), Some("HMS Endeavour"));
    assert_eq!(
        first.extras.get("scientificName").map(String::as_str),
        Some("Banksia serrata")
    );

    // "1800.0" parses as a year; ship/cruise alias vessel/expedition
    let second = &table.records[1];
    assert_eq!(second.year, Some(1800));
    assert_eq!(second.vessel.as_deref(), Some("Endeavour"));
    assert_eq!(second.expedition.as_deref(), Some("First Voyage"));
    assert_eq!(second.lat, None);
}

#[test]
fn test_analyse_round_trip() {
    let log_path = temp_file("endeavour.csv");
    let table_path = temp_file("table.txt");
    let out_path = temp_file("annotated.csv");

    fs::write(
        &log_path,
        "year,month,day,lat,lon\n1800,1,1,0.0,10.0\n1800,1,31,0.0,13.0\n",
    )
    .unwrap();
    fs::write(
        &table_path,
        "gbifID\tyear\tmonth\tday\tdecimalLatitude\tdecimalLongitude\trecordedBy\tdynamicProperties\tissue\n\
         1\t1800\t1\t1\t0.0\t10.0\t\t{\"vessel\": \"HMS Endeavour\"}\tZERO_COORDINATE\n\
         2\t1800\t1\t5\t\t\t\t{\"vessel\": \"HMS Endeavour\"}\t\n\
         3\t1800\t1\t5\t0.0\t10.4\t\t{\"vessel\": \"the Bounty\"}\t\n",
    )
    .unwrap();

    let positions = io::read_positions(&log_path).unwrap();
    let route = Route::from_positions(positions, &RouteConfig::default()).unwrap();
    let table = io::read_occurrences(&table_path).unwrap();

    let matcher = OccurrenceMatcher::new(&route, "endeavour", MatchConfig::default());
    let matches = matcher.run(&table.records);
    io::write_annotated(&out_path, &table.columns, &matches, "endeavour").unwrap();

    let mut reader = csv::Reader::from_path(&out_path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect();

    let _ = fs::remove_file(&log_path);
    let _ = fs::remove_file(&table_path);
    let _ = fs::remove_file(&out_path);

    assert_eq!(headers, table.columns);
    let col = |name: &str| headers.iter().position(|h| h == name).unwrap();

    // Records 1 and 2 matched; record 3 is near the route without
    // textual evidence and is picked up by the proximity stage
    assert_eq!(rows.len(), 3);

    let row1 = rows.iter().find(|r| r[col("gbifID")] == "1").unwrap();
    // Pre-existing issue survives with no flag appended
    assert_eq!(row1[col("issue")], "ZERO_COORDINATE");
    let properties: serde_json::Value =
        serde_json::from_str(&row1[col("dynamicProperties")]).unwrap();
    assert_eq!(properties["vessel"], "endeavour");
    assert_eq!(properties["voyagerInferrences"], "route_proximity");

    let row2 = rows.iter().find(|r| r[col("gbifID")] == "2").unwrap();
    assert_eq!(row2[col("issue")], "COORDINATES_INFERRED");
    // Imputed from the route's Jan 5 position
    let lat: f64 = row2[col("decimalLatitude")].parse().unwrap();
    let lon: f64 = row2[col("decimalLongitude")].parse().unwrap();
    assert!((lat - 0.0).abs() < 1e-6);
    assert!((lon - 10.4).abs() < 1e-6);

    let row3 = rows.iter().find(|r| r[col("gbifID")] == "3").unwrap();
    let properties: serde_json::Value =
        serde_json::from_str(&row3[col("dynamicProperties")]).unwrap();
    assert_eq!(properties["voyagerInferrences"], "route_proximity");
}
