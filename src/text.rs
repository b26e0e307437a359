//! Text matching utilities shared by the evidence stages.
//!
//! Every stage of the occurrence cascade matches free-text fields the
//! same way: a case-insensitive substring match against one or more
//! alternative patterns.

use std::sync::OnceLock;

use regex::Regex;

fn surname_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z]{3,}").unwrap())
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*?\)").unwrap())
}

fn esquire_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)esq").unwrap())
}

/// Case-insensitive substring/alternation match.
///
/// Returns true when `text` contains any of the patterns, ignoring
/// case. Empty patterns never match.
pub fn contains_any<P: AsRef<str>>(text: &str, patterns: &[P]) -> bool {
    let haystack = text.to_lowercase();
    patterns.iter().any(|pattern| {
        let needle = pattern.as_ref().to_lowercase();
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Extract the surname from a free-text collector name.
///
/// Strips "esq" honorifics and parenthetical qualifiers, then takes the
/// last alphabetic token of three or more letters. Returns `None` when
/// nothing name-like remains.
pub fn extract_surname(name: &str) -> Option<String> {
    let name = esquire_re().replace_all(name, "");
    let name = parenthetical_re().replace_all(&name, "");

    surname_token_re()
        .find_iter(&name)
        .last()
        .map(|token| token.as_str().to_string())
}
