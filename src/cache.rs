//! Deterministic per-voyage caching of candidate record slices.
//!
//! Slicing the full occurrence table per voyage is the one repeated,
//! expensive step when processing many voyages, so callers can inject a
//! cache. Keys are derived only from the vessel name and year range,
//! which makes cached results deterministic and safe to share across
//! voyages. The core never assumes a particular implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::occurrences::{filter_years, OccurrenceRecord};

/// Deterministic cache key for a voyage's candidate slice.
pub fn cache_key(vessel: &str, year_from: i32, year_to: i32) -> String {
    format!("{vessel}-{year_from}-{year_to}")
}

/// A keyed cache of candidate record slices.
pub trait OccurrenceCache {
    fn get(&self, key: &str) -> Option<Vec<OccurrenceRecord>>;
    fn put(&self, key: &str, records: &[OccurrenceRecord]);
}

/// In-memory cache, shareable across voyages within one process.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<OccurrenceRecord>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OccurrenceCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<OccurrenceRecord>> {
        match self.entries.lock() {
            Ok(entries) => entries.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn put(&self, key: &str, records: &[OccurrenceRecord]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), records.to_vec());
        }
    }
}

/// Cache that never hits, for callers that want none.
#[derive(Debug, Default)]
pub struct NoCache;

impl OccurrenceCache for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<OccurrenceRecord>> {
        None
    }

    fn put(&self, _key: &str, _records: &[OccurrenceRecord]) {}
}

/// Slice the candidate records for a voyage, consulting the cache first.
pub fn records_for_voyage(
    cache: &dyn OccurrenceCache,
    records: &[OccurrenceRecord],
    vessel: &str,
    year_from: i32,
    year_to: i32,
) -> Vec<OccurrenceRecord> {
    let key = cache_key(vessel, year_from, year_to);

    if let Some(hit) = cache.get(&key) {
        debug!("Loading {} from cache", key);
        return hit;
    }

    let sliced = filter_years(records, year_from, year_to);
    cache.put(&key, &sliced);
    sliced
}
