//! Keys used in timex field dictionaries.
//!
//! A timex dictionary is the string-to-string map emitted by the grammar for a
//! single match, e.g. `{"HOUR": "5", "AMPM": "pm"}`. The keys below are the
//! complete vocabulary understood by [`ExtendedDateTime::create`](crate::ExtendedDateTime::create).

use std::collections::BTreeMap;

/// Field dictionary as emitted by the grammar.
pub type TimexDictionary = BTreeMap<String, String>;

pub const YEAR: &str = "YEAR";
pub const MONTH: &str = "MONTH";
pub const DAY: &str = "DAY";
pub const HOUR: &str = "HOUR";
pub const MINUTE: &str = "MINUTE";
pub const SECOND: &str = "SECOND";
pub const WEEK: &str = "WEEK";
pub const WEEKDAY: &str = "WEEKDAY";
pub const PART_OF_DAY: &str = "PART_OF_DAY";
pub const SEASON: &str = "SEASON";
pub const PART_OF_YEAR: &str = "PART_OF_YEAR";
pub const TIME_ZONE: &str = "TIMEZONE";
pub const REFERENCE: &str = "REFERENCE";

/// Present (usually as `not_specified`) when the grammar could not tell am from pm.
/// An hour without this key is taken as written.
pub const AM_PM: &str = "AMPM";
pub const OFFSET: &str = "OFFSET";
pub const OFFSET_UNIT: &str = "OFFSET_UNIT";
pub const OFFSET_ANCHOR: &str = "OFFSET_ANCHOR";
/// Extra days applied on top of an offset ("the day after next Tuesday").
pub const COMPOUND_OFFSET: &str = "COMPOUND_OFFSET";
pub const MIN_OFFSET: &str = "MIN_OFFSET";
pub const DURATION: &str = "DURATION";
pub const DURATION_UNIT: &str = "DURATION_UNIT";
/// Exact duration in seconds.
pub const RAW_DURATION: &str = "RAW_DURATION";
pub const MOD: &str = "MOD";
pub const QUANTITY: &str = "QUANTITY";
pub const FREQUENCY: &str = "FREQUENCY";
pub const FREQUENCY_UNIT: &str = "FREQ_UNIT";
pub const WEEK_OF: &str = "WEEKOF";
/// Marks a match as unsuitable for anchoring a range ("at least 3 hours ago").
pub const RANGE_HINT: &str = "RANGE_HINT";

/// Offset-anchor sentinel meaning "the reference date".
pub const TODAY_ANCHOR: &str = "TODAY";

/// Returns the non-empty value stored under `key`.
pub(crate) fn value<'a>(dict: &'a TimexDictionary, key: &str) -> Option<&'a str> {
    dict.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Builds a dictionary from string pairs; convenient for tests and callers
/// that assemble fields by hand.
pub fn dictionary<'a, I>(pairs: I) -> TimexDictionary
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
