//! Grammar matches, resolved ranges and the tag they render to.

use serde::{Deserialize, Serialize};

use crate::datetime::ExtendedDateTime;
use crate::error::{Result, TimexError};
use crate::parts::DateTimeReference;

/// Rule id given to values the range engine invents, such as the implicit
/// "now" at one end of "the next ten minutes".
pub const INTERNAL_RULE_ID: &str = "Internal inference";

/// One temporal expression found in the input, with its resolved value.
#[derive(Debug, Clone)]
pub struct TimexMatch {
    /// The matched surface text.
    pub value: String,
    /// Character offset of the match in the input.
    pub index: usize,
    /// Grammar rule that produced the match. Merged matches join their rule ids with `" and "`.
    pub rule_id: String,
    pub id: i32,
    /// Ids of every match folded into this one.
    pub merged_ids: Vec<i32>,
    pub extended_date_time: ExtendedDateTime,
}

impl TimexMatch {
    pub fn new(
        value: impl Into<String>,
        index: usize,
        rule_id: impl Into<String>,
        extended_date_time: ExtendedDateTime,
    ) -> Self {
        TimexMatch {
            value: value.into(),
            index,
            rule_id: rule_id.into(),
            id: 0,
            merged_ids: Vec::new(),
            extended_date_time,
        }
    }

    pub fn to_timex_tag(&self) -> TimexTag {
        self.extended_date_time.to_tag()
    }

    pub(crate) fn refers_to_now(&self) -> bool {
        self.extended_date_time.reference() == Some(DateTimeReference::Present)
    }
}

impl From<ExtendedDateTime> for TimexMatch {
    fn from(extended_date_time: ExtendedDateTime) -> Self {
        TimexMatch::new("", 0, "", extended_date_time)
    }
}

/// The outcome of range resolution: nothing, a single value in
/// `start_time`, or a start/end pair.
#[derive(Debug, Clone, Default)]
pub struct DateTimeRange {
    pub start_time: Option<TimexMatch>,
    pub end_time: Option<TimexMatch>,
}

impl DateTimeRange {
    pub fn single(start: TimexMatch) -> Self {
        DateTimeRange {
            start_time: Some(start),
            end_time: None,
        }
    }

    pub fn pair(start: TimexMatch, end: TimexMatch) -> Self {
        DateTimeRange {
            start_time: Some(start),
            end_time: Some(end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Both ends are present.
    pub fn is_range(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }

    /// The range begins at the reference instant ("from now until Friday").
    pub fn starts_now(&self) -> bool {
        self.start_time.as_ref().is_some_and(TimexMatch::refers_to_now)
    }

    /// The range ends at the reference instant ("since Monday").
    pub fn ends_now(&self) -> bool {
        self.end_time.as_ref().is_some_and(TimexMatch::refers_to_now)
    }
}

/// A TIMEX3-style annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimexTag {
    #[serde(rename = "type")]
    pub temporal_type: String,
    pub value: String,
    #[serde(rename = "mod", default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(rename = "quant", default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(rename = "freq", default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TimexTag {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TimexError::Serialization(e.to_string()))
    }
}
