//! # timex-engine
//!
//! Deterministic resolution of partial temporal expressions.
//!
//! A grammar that recognises "at 5", "next Monday" or "the 14th" emits a
//! dictionary of timex fields. This crate turns those fragments into concrete
//! values against a reference instant: it infers AM/PM, picks the month of a
//! bare day or the week of a bare weekday, resolves offsets, formats
//! ISO8601-like timex strings, merges fragments that describe one instant and
//! infers start/end ranges.
//!
//! ## Modules
//!
//! - [`parts`] — Field bitflags and the closed vocabularies (types, units, parts of day)
//! - [`attributes`] — Dictionary keys shared by grammar and resolver
//! - [`context`] — Reference instant and resolution policy
//! - [`duration`] — Composite ISO8601 durations
//! - [`calendar`] — ISO week arithmetic and saturating date shifts
//! - [`datetime`] — [`ExtendedDateTime`]: resolution, comparison and formatting
//! - [`parsers`] — ISO/timex strings back into dictionaries and values
//! - [`matching`] — Grammar matches, ranges and TIMEX3 tags
//! - [`processors`] — Merging partial matches and range inference
//! - [`serialize`] — Versioned binary form of a resolved value
//! - [`error`] — Error types

pub mod attributes;
pub mod calendar;
pub mod context;
pub mod datetime;
pub mod duration;
pub mod error;
pub mod matching;
pub mod parsers;
pub mod parts;
pub mod processors;
pub mod serialize;

pub use attributes::TimexDictionary;
pub use context::{HolidayResolver, PartOfDayRange, TimexContext, WeekDefinition};
pub use datetime::{DateFields, ExtendedDateTime, FormatStrategy};
pub use duration::{DecomposedDuration, DurationValue};
pub use error::{Result, TimexError};
pub use matching::{DateTimeRange, TimexMatch, TimexTag, INTERNAL_RULE_ID};
pub use parsers::{
    iso_to_dictionary, try_parse_extended_date_time, try_parse_iso_duration,
    try_parse_iso_into_extended_date_time, try_parse_iso_into_local_date_time,
};
pub use parts::{
    DateTimeParts, DateTimeReference, Modifier, Normalization, PartOfDay, PartOfYear, Season,
    TemporalType, TemporalTypes, TemporalUnit, WeekdayLogic,
};
pub use processors::{
    apply_range_inference_rules, merge_partial_date_times, merge_partial_timex_matches,
    resolve_date_times, run_time_range_resolution,
};
