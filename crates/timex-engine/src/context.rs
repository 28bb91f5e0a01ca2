//! Resolution context: the reference instant plus every locale knob that
//! affects inference.
//!
//! A [`TimexContext`] is cheap to clone and is snapshotted into every
//! [`ExtendedDateTime`](crate::ExtendedDateTime) it resolves. The defaults
//! describe US English conventions; a partial JSON document can override any
//! subset of them via [`TimexContext::from_json`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimexError};
use crate::parts::{Normalization, PartOfDay, TemporalTypes, TemporalUnit, WeekdayLogic};

/// Resolves named holiday anchors ("EASTER", "THANKSGIVING") to a date.
///
/// Implementations receive the working date (whose year is the candidate
/// year), the resolving context, whether the year was given explicitly, and
/// the day offset being applied. Returning `None` marks the value invalid.
pub trait HolidayResolver: Send + Sync {
    fn resolve(
        &self,
        holiday: &str,
        scratch: NaiveDateTime,
        context: &TimexContext,
        year_known: bool,
        day_offset: i32,
    ) -> Option<NaiveDate>;
}

/// Which days make up the weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekDefinition {
    /// ISO day number (Monday = 1) of the first weekend day.
    pub first_day_of_weekend: u32,
    pub weekend_length: u32,
}

impl Default for WeekDefinition {
    fn default() -> Self {
        WeekDefinition {
            first_day_of_weekend: 6,
            weekend_length: 2,
        }
    }
}

impl WeekDefinition {
    /// ISO day numbers of the weekend, in order.
    pub fn weekend_days(&self) -> Vec<u32> {
        (0..self.weekend_length)
            .map(|i| ((self.first_day_of_weekend + i - 1) % 7) + 1)
            .collect()
    }
}

/// Clock range covered by a part of day ("morning" = 08:00 to 12:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartOfDayRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PartOfDayRange {
    fn hours(start: u32, end: (u32, u32, u32)) -> Option<Self> {
        Some(PartOfDayRange {
            start: NaiveTime::from_hms_opt(start, 0, 0)?,
            end: NaiveTime::from_hms_opt(end.0, end.1, end.2)?,
        })
    }
}

fn default_part_of_day_times() -> BTreeMap<PartOfDay, PartOfDayRange> {
    [
        (PartOfDay::Morning, PartOfDayRange::hours(8, (12, 0, 0))),
        (PartOfDay::MidDay, PartOfDayRange::hours(11, (13, 0, 0))),
        (PartOfDay::Afternoon, PartOfDayRange::hours(12, (17, 0, 0))),
        (PartOfDay::Evening, PartOfDayRange::hours(17, (20, 0, 0))),
        (PartOfDay::Night, PartOfDayRange::hours(20, (23, 59, 59))),
    ]
    .into_iter()
    .filter_map(|(pod, range)| Some((pod, range?)))
    .collect()
}

fn default_vague_offsets() -> BTreeMap<TemporalUnit, i32> {
    BTreeMap::from([
        (TemporalUnit::Second, 10),
        (TemporalUnit::Minute, 5),
        (TemporalUnit::Hour, 2),
        (TemporalUnit::Day, 3),
        (TemporalUnit::Week, 2),
        (TemporalUnit::Weekend, 1),
        (TemporalUnit::Month, 2),
        (TemporalUnit::Year, 2),
    ])
}

fn default_reference() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Everything that influences how a timex dictionary is resolved.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimexContext {
    /// The instant that "now" refers to.
    pub reference_date_time: NaiveDateTime,
    pub normalization: Normalization,
    /// When false, unset fields are printed as `X` placeholders instead of
    /// being filled from the reference instant.
    pub use_inference: bool,
    /// Ambiguous hours below this value are assumed to be PM.
    pub am_pm_inference_cutoff: u32,
    /// Whether "the future" includes the current hour/day/month.
    pub include_current_time_in_past_or_future: bool,
    pub weekday_logic: WeekdayLogic,
    pub week_definition: WeekDefinition,
    /// Temporal types the caller is interested in during range resolution.
    pub temporal_types: TemporalTypes,
    pub part_of_day_default_times: BTreeMap<PartOfDay, PartOfDayRange>,
    /// Magnitude used for offsets with no count ("in a few days").
    pub default_value_of_vague_offset: BTreeMap<TemporalUnit, i32>,
    #[serde(skip)]
    pub holiday_resolver: Option<Arc<dyn HolidayResolver>>,
}

impl Default for TimexContext {
    fn default() -> Self {
        TimexContext {
            reference_date_time: default_reference(),
            normalization: Normalization::Future,
            use_inference: true,
            am_pm_inference_cutoff: 7,
            include_current_time_in_past_or_future: false,
            weekday_logic: WeekdayLogic::SimpleOffset,
            week_definition: WeekDefinition::default(),
            temporal_types: TemporalTypes::ALL,
            part_of_day_default_times: default_part_of_day_times(),
            default_value_of_vague_offset: default_vague_offsets(),
            holiday_resolver: None,
        }
    }
}

impl fmt::Debug for TimexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimexContext")
            .field("reference_date_time", &self.reference_date_time)
            .field("normalization", &self.normalization)
            .field("use_inference", &self.use_inference)
            .field("am_pm_inference_cutoff", &self.am_pm_inference_cutoff)
            .field(
                "include_current_time_in_past_or_future",
                &self.include_current_time_in_past_or_future,
            )
            .field("weekday_logic", &self.weekday_logic)
            .field("week_definition", &self.week_definition)
            .field("temporal_types", &self.temporal_types)
            .field("holiday_resolver", &self.holiday_resolver.is_some())
            .finish_non_exhaustive()
    }
}

impl PartialEq for TimexContext {
    fn eq(&self, other: &Self) -> bool {
        self.reference_date_time == other.reference_date_time
            && self.normalization == other.normalization
            && self.use_inference == other.use_inference
            && self.am_pm_inference_cutoff == other.am_pm_inference_cutoff
            && self.include_current_time_in_past_or_future
                == other.include_current_time_in_past_or_future
            && self.weekday_logic == other.weekday_logic
            && self.week_definition == other.week_definition
            && self.temporal_types == other.temporal_types
            && self.part_of_day_default_times == other.part_of_day_default_times
            && self.default_value_of_vague_offset == other.default_value_of_vague_offset
    }
}

impl TimexContext {
    /// A default context anchored at `reference`.
    pub fn new(reference: NaiveDateTime) -> Self {
        TimexContext {
            reference_date_time: reference,
            ..Default::default()
        }
    }

    /// Load a context from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TimexError::Config(e.to_string()))
    }

    pub fn with_reference(mut self, reference: NaiveDateTime) -> Self {
        self.reference_date_time = reference;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_inference(mut self, use_inference: bool) -> Self {
        self.use_inference = use_inference;
        self
    }

    pub fn with_weekday_logic(mut self, logic: WeekdayLogic) -> Self {
        self.weekday_logic = logic;
        self
    }

    pub fn with_temporal_types(mut self, types: TemporalTypes) -> Self {
        self.temporal_types = types;
        self
    }

    pub fn with_holiday_resolver(mut self, resolver: Arc<dyn HolidayResolver>) -> Self {
        self.holiday_resolver = Some(resolver);
        self
    }

    /// Default magnitude for a vague offset in `unit`.
    pub fn vague_offset(&self, unit: TemporalUnit) -> i32 {
        self.default_value_of_vague_offset
            .get(&unit)
            .copied()
            .unwrap_or(1)
    }
}
