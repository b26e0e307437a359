//! Voyage metadata: a vessel name, optional hints, and its route.

use std::sync::OnceLock;

use regex::Regex;

use crate::route::Route;

fn vessel_stem_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<vessel>[a-zA-Z_+]+)_[0-9]").unwrap())
}

/// A single ship's documented voyage: its reconstructed route plus the
/// metadata used as matching evidence.
#[derive(Debug)]
pub struct Voyage {
    /// Vessel name; alternatives may be joined with `+`
    /// (e.g. "supply+sirius" for the first fleet).
    pub vessel: String,
    /// Expedition label hint, when known.
    pub expedition: Option<String>,
    /// Known collector surnames, when scraped metadata is available.
    pub collectors: Vec<String>,
    pub route: Route,
}

impl Voyage {
    pub fn new(vessel: impl Into<String>, route: Route) -> Self {
        Self {
            vessel: vessel.into(),
            expedition: None,
            collectors: Vec::new(),
            route,
        }
    }

    pub fn with_expedition(mut self, expedition: impl Into<String>) -> Self {
        self.expedition = Some(expedition.into());
        self
    }

    pub fn with_collectors(mut self, collectors: Vec<String>) -> Self {
        self.collectors = collectors;
        self
    }

    /// File name for this voyage's annotated occurrence table.
    pub fn output_file_name(&self) -> String {
        format!(
            "{}-{}-{}.csv",
            self.vessel,
            self.route.year_from(),
            self.route.year_to()
        )
    }
}

/// Extract the vessel name from a log file stem such as
/// `endeavour_1768-1771_W1`.
///
/// Log digitisation suffixes (`_W1`, `_W2`, `_C`) are stripped and the
/// name is lowercased. Returns `None` when the stem does not follow the
/// `<vessel>_<year>` convention.
pub fn vessel_from_stem(stem: &str) -> Option<String> {
    let stem = stem.replace("_W1", "").replace("_W2", "").replace("_C", "");
    vessel_stem_re()
        .captures(&stem)
        .and_then(|captures| captures.name("vessel"))
        .map(|name| name.as_str().to_lowercase())
}
