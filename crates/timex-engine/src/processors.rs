//! Merging of partial matches and date/time range inference.
//!
//! A grammar usually finds several fragments in one utterance ("Tuesday",
//! "from 5", "to 7 pm"). This module folds adjacent fragments that describe
//! the same instant into one value, then picks the pair of values most likely
//! to bound a range and resolves each end in terms of the other.
//!
//! - [`merge_partial_timex_matches`] — one pass of adjacent-pair merging
//! - [`run_time_range_resolution`] — the full pipeline, producing a [`DateTimeRange`]
//! - [`can_be_merged`] / [`can_be_a_range`] — the compatibility tests behind both
//!
//! Inputs are never mutated. Every step works on clones, so callers can hand
//! the same matches to several contexts.

use chrono::{NaiveDateTime, Timelike};

use crate::attributes::{self, TimexDictionary};
use crate::calendar;
use crate::context::TimexContext;
use crate::datetime::ExtendedDateTime;
use crate::error::Result;
use crate::matching::{DateTimeRange, TimexMatch, INTERNAL_RULE_ID};
use crate::parsers;
use crate::parts::{
    DateTimeParts, DateTimeReference, Normalization, TemporalType, TemporalTypes, TemporalUnit,
};

/// How much each explicit field contributes to a value's specificity.
/// Month appears twice; both entries count.
const WEIGHTS: [(DateTimeParts, f32); 20] = [
    (DateTimeParts::SECOND, 5.0),
    (DateTimeParts::MINUTE, 3.0),
    (DateTimeParts::HOUR, 2.0),
    (DateTimeParts::DAY, 1.0),
    (DateTimeParts::WEEKDAY, 1.5),
    (DateTimeParts::WEEK, 1.0),
    (DateTimeParts::MONTH, 3.0),
    (DateTimeParts::YEAR, 2.0),
    (DateTimeParts::DECADE, 0.8),
    (DateTimeParts::CENTURY, 0.5),
    (DateTimeParts::MILLENNIUM, 0.3),
    (DateTimeParts::DECADE_YEAR, 0.3),
    (DateTimeParts::MONTH, 0.5),
    (DateTimeParts::TIME_ZONE, 4.0),
    (DateTimeParts::REFERENCE, 1.1),
    (DateTimeParts::OFFSET_ANCHOR, 1.0),
    (DateTimeParts::PART_OF_YEAR, 0.7),
    (DateTimeParts::SEASON, 0.6),
    (DateTimeParts::AM_PM_UNAMBIGUOUS, 0.5),
    (DateTimeParts::WEEK_OF_EXPRESSION, 0.3),
];

/// Bonus for a part of day that still leaves the hour's am/pm open.
const AMBIGUOUS_PART_OF_DAY_WEIGHT: f32 = 1.5;

/// Weight that outranks everything short of a fully specified clock time.
const FLAG_WEIGHT_OVERRIDE: f32 = 10.0;

/// Above this many matches, range pairing is skipped.
const MAX_MATCHES_FOR_RANGE: usize = 999;

/// Specificity of a set of explicit fields. Higher is more specific.
pub fn specificity(parts: DateTimeParts) -> f32 {
    let mut weight: f32 = WEIGHTS
        .iter()
        .filter(|(part, _)| parts.contains(*part))
        .map(|(_, w)| w)
        .sum();
    if parts.contains(DateTimeParts::PART_OF_DAY) && !parts.contains(DateTimeParts::AM_PM_UNAMBIGUOUS) {
        weight += AMBIGUOUS_PART_OF_DAY_WEIGHT;
    }
    weight
}

fn is_date_or_time(value: &ExtendedDateTime) -> bool {
    matches!(value.temporal_type(), TemporalType::Date | TemporalType::Time)
}

fn hour_or_zero(value: &ExtendedDateTime) -> i32 {
    value.hour().unwrap_or(0) as i32
}

fn is_ambiguous(value: &ExtendedDateTime) -> bool {
    !value.set_parts().contains(DateTimeParts::AM_PM_UNAMBIGUOUS)
}

// ── compatibility ───────────────────────────────────────────────────────

/// Whether two values plausibly describe different pieces of one instant,
/// such as "5 pm" and "tomorrow". "The 7th" and "tomorrow", or "next week"
/// and "5 pm", cannot be merged.
pub fn can_be_merged(first: &ExtendedDateTime, second: &ExtendedDateTime) -> bool {
    if !is_date_or_time(first) || !is_date_or_time(second) {
        return false;
    }
    if first.explicit_set_parts().intersects(second.explicit_set_parts()) {
        return false;
    }
    let merged = first.explicit_set_parts() | second.explicit_set_parts();
    let has = |part: DateTimeParts| merged.contains(part);

    if has(DateTimeParts::DECADE_YEAR) || has(DateTimeParts::REFERENCE) {
        return false;
    }
    if has(DateTimeParts::WEEK_OF_EXPRESSION) && (!has(DateTimeParts::DAY) || has(DateTimeParts::HOUR)) {
        return false;
    }
    if first.is_offset() && second.is_offset() {
        return false;
    }

    // A coarser field without the next finer one cannot carry an even finer one.
    const GAPS: [(DateTimeParts, DateTimeParts, DateTimeParts); 8] = [
        (DateTimeParts::YEAR, DateTimeParts::MONTH, DateTimeParts::DAY),
        (DateTimeParts::YEAR, DateTimeParts::WEEK, DateTimeParts::WEEKDAY),
        (DateTimeParts::MONTH, DateTimeParts::DAY, DateTimeParts::HOUR),
        (DateTimeParts::MONTH, DateTimeParts::WEEK, DateTimeParts::WEEKDAY),
        (DateTimeParts::WEEK, DateTimeParts::WEEKDAY, DateTimeParts::HOUR),
        (DateTimeParts::DAY, DateTimeParts::HOUR, DateTimeParts::MINUTE),
        (DateTimeParts::WEEKDAY, DateTimeParts::HOUR, DateTimeParts::MINUTE),
        (DateTimeParts::HOUR, DateTimeParts::MINUTE, DateTimeParts::SECOND),
    ];
    if GAPS
        .iter()
        .any(|&(coarse, next, fine)| has(coarse) && !has(next) && has(fine))
    {
        return false;
    }
    if has(DateTimeParts::PART_OF_DAY)
        && !merged.intersects(DateTimeParts::DAY | DateTimeParts::WEEKDAY | DateTimeParts::HOUR)
    {
        return false;
    }
    if has(DateTimeParts::WEEKDAY) && has(DateTimeParts::DAY) {
        return false;
    }

    let offset_value = if first.is_offset() { first } else { second };
    match offset_value.offset_unit() {
        Some(unit) => offset_fits(unit, merged),
        None => true,
    }
}

/// An offset can only absorb fields one step finer than its unit, and none
/// coarser: "tomorrow" takes an hour but not "November".
fn offset_fits(unit: TemporalUnit, merged: DateTimeParts) -> bool {
    use DateTimeParts as P;

    let (required, forbidden) = match unit {
        TemporalUnit::Year => (P::MONTH | P::WEEK, P::empty()),
        TemporalUnit::Month => (P::DAY, P::YEAR),
        TemporalUnit::Day => (P::HOUR, P::YEAR | P::MONTH),
        TemporalUnit::Week => (P::WEEKDAY, P::YEAR | P::MONTH),
        unit if unit.is_weekday() => (P::HOUR, P::YEAR | P::MONTH | P::WEEK),
        TemporalUnit::Hour => (P::MINUTE, P::YEAR | P::MONTH | P::WEEK | P::DAY | P::WEEKDAY),
        TemporalUnit::Minute => (
            P::SECOND,
            P::YEAR | P::MONTH | P::WEEK | P::DAY | P::WEEKDAY | P::HOUR,
        ),
        TemporalUnit::Second => return false,
        _ => (P::empty(), P::empty()),
    };
    merged.contains(required) && !merged.intersects(forbidden)
}

/// Whether two values describe the same kind of thing and so could bound a
/// range: "4:00 Tuesday" and "6:00" can, "tomorrow" and "7:00" cannot.
pub fn can_be_a_range(first: &ExtendedDateTime, second: &ExtendedDateTime) -> bool {
    parts_overlap(first.explicit_set_parts(), second.explicit_set_parts())
}

fn parts_overlap(a: DateTimeParts, b: DateTimeParts) -> bool {
    use DateTimeParts as P;

    let both = |part: P| a.contains(part) && b.contains(part);
    let clock_vs_part_of_day = (a.contains(P::PART_OF_DAY) && b.contains(P::HOUR))
        || (a.contains(P::HOUR) && b.contains(P::PART_OF_DAY));
    if !both(P::HOUR) && !both(P::PART_OF_DAY) && clock_vs_part_of_day {
        // "Tuesday morning" and "5:00" are not a range.
        let dated = |parts: P| parts.intersects(P::DAY | P::WEEKDAY);
        return !dated(a) && !dated(b);
    }
    if (a.contains(P::WEEKDAY) && b.contains(P::DAY)) || (a.contains(P::DAY) && b.contains(P::WEEKDAY)) {
        return true;
    }
    a.intersects(b)
}

// ── reinterpretation ────────────────────────────────────────────────────

/// Re-read an offset value ("tomorrow") as the absolute value it formats to,
/// so it can be compared field by field. Non-offset values and values that
/// do not parse back are returned unchanged.
pub fn convert_offset_time_to_absolute(value: &ExtendedDateTime, context: &TimexContext) -> ExtendedDateTime {
    if !value.is_offset() {
        return value.clone();
    }
    let parsed = parsers::try_parse_extended_date_time(
        value.format_type(),
        value.format_value(),
        "",
        "",
        "",
        "",
        Some(context),
    );
    match parsed {
        Ok(Some(absolute)) => absolute,
        Ok(None) | Err(_) => {
            tracing::trace!(value = value.format_value(), "offset did not convert to an absolute value");
            value.clone()
        }
    }
}

fn relative_context(base: &TimexContext, reference: NaiveDateTime, direction: Normalization) -> TimexContext {
    base.clone()
        .with_inference(true)
        .with_reference(reference)
        .with_normalization(direction)
        .with_temporal_types(TemporalTypes::ALL)
}

/// Resolve `value` again as seen from `reference`, looking in `direction`.
/// Used to settle "6:00" onto a particular day or half of the day.
pub fn match_relative_to(
    value: &ExtendedDateTime,
    reference: NaiveDateTime,
    direction: Normalization,
) -> Result<ExtendedDateTime> {
    let resolved = value.reinterpret(&relative_context(value.context(), reference, direction))?;
    if resolved.input_date_was_invalid() {
        tracing::debug!(value = resolved.format_value(), "relative match produced an invalid date");
    }
    Ok(resolved)
}

/// Like [`match_relative_to`], for a bare dictionary whose type is inferred.
pub fn match_dictionary_relative_to(
    dictionary: &TimexDictionary,
    base: &TimexContext,
    reference: NaiveDateTime,
    direction: Normalization,
) -> Result<ExtendedDateTime> {
    ExtendedDateTime::create(
        TemporalType::None,
        dictionary,
        &relative_context(base, reference, direction),
    )
}

/// The instant a formatted value denotes, or the context's reference instant
/// when the value is not fully specified.
fn instant_of(value: &ExtendedDateTime, context: &TimexContext) -> NaiveDateTime {
    parsers::try_parse_iso_into_local_date_time(value.format_value())
        .unwrap_or(context.reference_date_time)
}

// ── merging ─────────────────────────────────────────────────────────────

/// One pass of adjacent-pair merging over matches in lexical order.
///
/// "5:00 PM" followed by "Monday" becomes one match "5:00 PM Monday". Two
/// adjacent dates that format identically keep only the more specific one,
/// and a bare part-of-day hint is dropped when another match already pins
/// the time of day. Relative order is preserved and ids are renumbered.
///
/// If a merged dictionary fails to resolve, the input is returned unchanged.
pub fn merge_partial_timex_matches(matches: &[TimexMatch]) -> Vec<TimexMatch> {
    match try_merge(matches) {
        Ok(merged) => merged,
        Err(e) => {
            tracing::debug!(error = %e, "merge failed, keeping matches as given");
            matches.to_vec()
        }
    }
}

/// [`merge_partial_timex_matches`] for bare values.
pub fn merge_partial_date_times(times: &[ExtendedDateTime]) -> Vec<ExtendedDateTime> {
    let matches: Vec<TimexMatch> = times.iter().cloned().map(TimexMatch::from).collect();
    merge_partial_timex_matches(&matches)
        .into_iter()
        .map(|m| m.extended_date_time)
        .collect()
}

fn try_merge(matches: &[TimexMatch]) -> Result<Vec<TimexMatch>> {
    let time_of_day_pinned = matches.iter().any(|m| {
        let parts = m.extended_date_time.set_parts();
        (parts.contains(DateTimeParts::PART_OF_DAY) && parts != DateTimeParts::PART_OF_DAY)
            || parts.contains(DateTimeParts::HOUR | DateTimeParts::AM_PM_UNAMBIGUOUS)
    });
    let redundant_hint = |m: &TimexMatch| time_of_day_pinned && m.extended_date_time.is_part_of_day_only();

    let mut merged = Vec::with_capacity(matches.len());
    let mut next_id = 0;
    let mut push = |mut m: TimexMatch, out: &mut Vec<TimexMatch>| -> i32 {
        m.id = next_id;
        next_id += 1;
        let id = m.id;
        out.push(m);
        id
    };

    let mut i = 0;
    while i + 1 < matches.len() {
        let one = &matches[i];
        let two = &matches[i + 1];
        let first = &one.extended_date_time;
        let second = &two.extended_date_time;

        if redundant_hint(two) {
            push(one.clone(), &mut merged);
            i += 2;
            continue;
        }
        if redundant_hint(one) {
            tracing::trace!(value = first.format_value(), "dropping redundant part-of-day hint");
            i += 1;
            continue;
        }

        if can_be_merged(first, second) {
            let context = first.context();
            let first_abs = convert_offset_time_to_absolute(first, context);
            let second_abs = convert_offset_time_to_absolute(second, second.context());
            let value = ExtendedDateTime::merge(&first_abs, &second_abs, TemporalType::None, context)?;
            tracing::debug!(
                first = first.format_value(),
                second = second.format_value(),
                merged = value.format_value(),
                "merged adjacent matches"
            );

            let mut combined = one.clone();
            combined.value = format!("{} {}", one.value, two.value);
            combined.rule_id = format!("{} and {}", one.rule_id, two.rule_id);
            combined.extended_date_time = value;
            let id = push(combined, &mut merged);
            if let Some(combined) = merged.last_mut() {
                for folded in two.merged_ids.iter().copied().chain([id, two.id]) {
                    if !combined.merged_ids.contains(&folded) {
                        combined.merged_ids.push(folded);
                    }
                }
            }
            i += 2;
            continue;
        }

        // "next Saturday the 5th": the same date said twice.
        if first.format_value() == second.format_value()
            && first.set_parts() != second.set_parts()
            && !first.set_parts().contains(DateTimeParts::HOUR)
            && !second.set_parts().contains(DateTimeParts::HOUR)
        {
            let keep = if specificity(first.explicit_set_parts()) > specificity(second.explicit_set_parts()) {
                one
            } else {
                two
            };
            push(keep.clone(), &mut merged);
            i += 2;
            continue;
        }

        push(one.clone(), &mut merged);
        i += 1;
    }

    if let Some(tail) = matches.get(i) {
        if !redundant_hint(tail) {
            push(tail.clone(), &mut merged);
        }
    }
    Ok(merged)
}

// ── pipeline ────────────────────────────────────────────────────────────

/// Extract a single value or a start/end range from matches in lexical order.
///
/// `extra_context` holds matches from surrounding text; only its first bare
/// part-of-day hint is used. The context's normalization decides whether an
/// open range reaches into the past or the future; present normalization is
/// not supported and yields an empty range. Failures inside the pipeline
/// degrade to an empty range rather than an error.
pub fn run_time_range_resolution(
    primary: &[TimexMatch],
    extra_context: &[TimexMatch],
    context: &TimexContext,
) -> DateTimeRange {
    if primary.is_empty() || context.normalization == Normalization::Present {
        return DateTimeRange::default();
    }
    match resolve_range(primary, extra_context, context) {
        Ok(range) => range,
        Err(e) => {
            tracing::debug!(error = %e, "range resolution failed");
            DateTimeRange::default()
        }
    }
}

/// [`run_time_range_resolution`] for bare values with no extra context.
pub fn resolve_date_times(times: &[ExtendedDateTime], context: &TimexContext) -> DateTimeRange {
    let matches: Vec<TimexMatch> = times.iter().cloned().map(TimexMatch::from).collect();
    run_time_range_resolution(&matches, &[], context)
}

fn resolve_range(
    primary: &[TimexMatch],
    extra_context: &[TimexMatch],
    context: &TimexContext,
) -> Result<DateTimeRange> {
    if let Some(range) = use_inference_on_durations(primary, context)? {
        return Ok(range);
    }

    let mut matches: Vec<TimexMatch> = Vec::with_capacity(primary.len() + 1);
    for m in primary {
        let value = &m.extended_date_time;
        if !context.temporal_types.contains(value.temporal_type().as_filter()) {
            continue;
        }
        // Only "now" is a usable reference on its own.
        if value.set_parts() == DateTimeParts::REFERENCE && value.reference() != Some(DateTimeReference::Present) {
            continue;
        }
        let mut kept = m.clone();
        kept.extended_date_time = convert_offset_time_to_absolute(value, context);
        matches.push(kept);
    }
    process_context(extra_context, &mut matches);

    if matches.len() > 1 && contains_invalid_constructions(&matches) {
        tracing::debug!(count = matches.len(), "invalid combination of matches, no range");
        return Ok(DateTimeRange::default());
    }
    matches.retain(|m| m.extended_date_time.temporal_type() != TemporalType::Duration);

    if matches.len() > 1 {
        matches = merge_partial_timex_matches(&matches);
        matches = merge_partial_timex_matches(&matches);
    }

    match matches.len() {
        0 => Ok(DateTimeRange::default()),
        1 => Ok(DateTimeRange::single(matches.swap_remove(0))),
        _ => {
            let (a, b) = extract_date_range_values(&matches);
            match b {
                None => Ok(DateTimeRange::single(matches[a].clone())),
                Some(b) => apply_range_inference_rules(matches[a].clone(), matches[b].clone(), context),
            }
        }
    }
}

/// Append the first bare part-of-day hint from `extra_context`, unless the
/// same text was already matched.
pub fn process_context(extra_context: &[TimexMatch], matches: &mut Vec<TimexMatch>) {
    let Some(hint) = extra_context
        .iter()
        .find(|m| m.extended_date_time.is_part_of_day_only())
    else {
        return;
    };
    if !matches.iter().any(|m| m.value == hint.value) {
        matches.push(hint.clone());
    }
}

/// Combinations that never form a sensible range.
pub fn contains_invalid_constructions(matches: &[TimexMatch]) -> bool {
    let mut present = false;
    let mut duration = false;
    let mut fixed_date = false;
    let mut part_of_day = false;
    let mut week = false;
    let mut part_of_year = false;
    let mut multi_year = false;

    for m in matches {
        let value = &m.extended_date_time;
        let parts = value.set_parts();
        part_of_day |= value.is_part_of_day_only();
        duration |= value.temporal_type() == TemporalType::Duration;
        present |= value.reference() == Some(DateTimeReference::Present);
        week |= parts.intersects(DateTimeParts::WEEK | DateTimeParts::WEEK_OF_EXPRESSION);
        fixed_date |= parts.intersects(DateTimeParts::DAY | DateTimeParts::WEEKDAY | DateTimeParts::MONTH);
        part_of_year |= value.part_of_year().is_some();
        multi_year |= parts.intersects(DateTimeParts::MULTI_YEAR);
    }

    // "6 months old now"
    (present && duration && fixed_date)
        // "between now and lunch"
        || (present && part_of_day && !fixed_date)
        // "between tomorrow and next week"
        || (fixed_date && week)
        // "since the mid nineties"
        || multi_year
        // "4th quarter 2011"
        || part_of_year
}

// ── durations ───────────────────────────────────────────────────────────

/// The single duration in `matches`, provided everything else is a bare
/// part-of-day hint.
pub fn extract_only_duration_match(matches: &[TimexMatch]) -> Option<&TimexMatch> {
    let mut found = None;
    for m in matches {
        let value = &m.extended_date_time;
        if value.temporal_type() == TemporalType::Duration {
            if found.is_some() {
                return None;
            }
            found = Some(m);
        } else if !value.is_part_of_day_only() {
            return None;
        }
    }
    found
}

/// "The next 10 minutes": when a duration is the only substantive match,
/// span from now to the end of the duration (or from its start to now under
/// past normalization).
pub fn use_inference_on_durations(matches: &[TimexMatch], context: &TimexContext) -> Result<Option<DateTimeRange>> {
    let Some(duration) = extract_only_duration_match(matches) else {
        return Ok(None);
    };
    if !duration.extended_date_time.valid_for_ranges() {
        return Ok(None);
    }
    let Some(offset) = duration.extended_date_time.convert_duration_into_offset(context)? else {
        return Ok(None);
    };
    tracing::debug!(offset = offset.format_value(), "interpreting lone duration as a range");

    let now_fields = attributes::dictionary([(attributes::REFERENCE, DateTimeReference::Present.as_str())]);
    let now = ExtendedDateTime::create(offset.temporal_type(), &now_fields, context)?;
    let mut other_end = duration.clone();
    other_end.merged_ids.clear();
    other_end.extended_date_time = offset;

    let implied_now = |id| {
        let mut m = TimexMatch::new("", 0, INTERNAL_RULE_ID, now.clone());
        m.id = id;
        m
    };
    Ok(Some(if context.normalization == Normalization::Past {
        DateTimeRange::pair(other_end, implied_now(1))
    } else {
        DateTimeRange::pair(implied_now(0), other_end)
    }))
}

// ── range pairing ───────────────────────────────────────────────────────

/// Indices of the two matches most likely to bound a range. The second index
/// is `None` when no compatible pair exists; the first is then the most
/// specific match overall.
fn extract_date_range_values(matches: &[TimexMatch]) -> (usize, Option<usize>) {
    let last = matches.len() - 1;
    let mut most_specific = 0;
    let mut most_specific_valid = 0;
    let mut highest = 0.0f32;
    let mut highest_valid = 0.0f32;

    for (index, m) in matches.iter().enumerate() {
        let value = &m.extended_date_time;
        let weight = specificity(value.explicit_set_parts());
        // An edge match that cannot pair with its only neighbor cannot anchor a range.
        let exempt = (index == 0 && !can_be_a_range(value, &matches[1].extended_date_time))
            || (index == last && !can_be_a_range(&matches[index - 1].extended_date_time, value));

        if weight > highest {
            highest = weight;
            most_specific = index;
        }
        if weight > highest_valid && !exempt {
            highest_valid = weight;
            most_specific_valid = index;
        }
    }

    if matches.len() > MAX_MATCHES_FOR_RANGE {
        return (most_specific, None);
    }

    let (a, b) = determine_most_specific_match_pair(matches, most_specific_valid);
    let (first, second) = (&matches[a].extended_date_time, &matches[b].extended_date_time);
    tracing::debug!(start = a, end = b, "chose range pair");

    // "Next Wednesday to the following Friday"
    if first.is_offset() || second.is_offset() {
        return (a, Some(b));
    }
    let now = Some(DateTimeReference::Present);
    if first.reference() == now || second.reference() == now {
        return (a, Some(b));
    }
    // "from November 12th to midnight"
    if !can_be_a_range(first, second) {
        tracing::debug!("range pair has no overlapping fields");
        return (most_specific, None);
    }
    (a, Some(b))
}

/// Pick the neighbor of `anchor` that pairs with it: the one that can form a
/// range, or else the less specific one.
fn determine_most_specific_match_pair(matches: &[TimexMatch], anchor: usize) -> (usize, usize) {
    let center = &matches[anchor].extended_date_time;
    let left = anchor.checked_sub(1).map(|i| &matches[i].extended_date_time);
    let right = matches.get(anchor + 1).map(|m| &m.extended_date_time);

    let choose_right = match (left, right) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(left), Some(right)) => {
            if !can_be_a_range(left, center) {
                true
            } else if !can_be_a_range(center, right) {
                false
            } else {
                specificity(left.explicit_set_parts()) < specificity(right.explicit_set_parts())
            }
        }
    };
    if choose_right {
        (anchor, anchor + 1)
    } else {
        (anchor - 1, anchor)
    }
}

// ── range inference ─────────────────────────────────────────────────────

/// If either end is "now", resolve the other end around the reference
/// instant and order the pair. Returns `None` when neither end is "now".
pub fn use_inference_on_present_references(
    begin: &TimexMatch,
    end: &TimexMatch,
    context: &TimexContext,
) -> Result<Option<DateTimeRange>> {
    let begins_now = begin.refers_to_now();
    let ends_now = end.refers_to_now();
    if begins_now && ends_now {
        return Ok(Some(DateTimeRange::single(begin.clone())));
    }
    if !begins_now && !ends_now {
        return Ok(None);
    }

    let reference = context.reference_date_time;
    let mut start = begin.clone();
    if ends_now {
        start.extended_date_time = match_relative_to(&begin.extended_date_time, reference, Normalization::Past)?;
    }

    let inverted = end.extended_date_time.incomplete_compare_to(&reference).is_lt()
        || start.extended_date_time.incomplete_compare_to(&reference).is_gt();
    Ok(Some(if inverted {
        DateTimeRange::pair(end.clone(), start)
    } else {
        DateTimeRange::pair(start, end.clone())
    }))
}

/// After resolving one end, fix hour pairs that straddle noon.
fn correct_am_pm(begin: &mut ExtendedDateTime, end: &mut ExtendedDateTime) {
    let span = hour_or_zero(begin) - hour_or_zero(end);
    let begin_has_hour = begin.set_parts().contains(DateTimeParts::HOUR);
    if begin_has_hour && is_ambiguous(end) && span > 0 && span < 12 {
        // "tonight from 10 to 1": 1 is in the morning.
        end.flip_am_pm();
    } else if begin_has_hour && is_ambiguous(begin) && !is_ambiguous(end) && (span < -12 || span > 0) {
        // "from 9 to 1 am", "from 8 to 10 pm"
        begin.flip_am_pm();
    }
}

/// Resolve the end of the range in terms of its more specific start.
fn apply_inference_left_to_right(begin: &mut TimexMatch, end: &mut TimexMatch, context: &TimexContext) -> Result<()> {
    let start = &mut begin.extended_date_time;
    let span = hour_or_zero(start) - hour_or_zero(&end.extended_date_time);
    // "tomorrow 6:00-8:00 in the morning": 6:00 was inferred as pm.
    if start.set_parts().contains(DateTimeParts::DAY)
        && !end.extended_date_time.set_parts().contains(DateTimeParts::DAY)
        && is_ambiguous(start)
        && !is_ambiguous(&end.extended_date_time)
        && hour_or_zero(start) > 12
        && span > 0
        && span < 12
    {
        start.flip_am_pm();
    }

    let reference = instant_of(start, context);
    end.extended_date_time = match_relative_to(&end.extended_date_time, reference, Normalization::Future)?;
    correct_am_pm(start, &mut end.extended_date_time);
    Ok(())
}

/// Resolve the start of the range in terms of its more specific end.
fn apply_inference_right_to_left(begin: &mut TimexMatch, end: &mut TimexMatch, context: &TimexContext) -> Result<()> {
    let mut reference = instant_of(&end.extended_date_time, context);
    let begin_hour = hour_or_zero(&begin.extended_date_time);
    let end_hour = hour_or_zero(&end.extended_date_time);
    let reference_hour = reference.hour() as i32;

    if !is_ambiguous(&begin.extended_date_time) && is_ambiguous(&end.extended_date_time) {
        // "8:00 PM to 9:00 Tuesday": carry the pm over to the end.
        let carry = if begin_hour > 12 && reference_hour <= 12 {
            Some(12)
        } else if begin_hour <= 12 && reference_hour > 12 && begin_hour < reference_hour - 12 {
            Some(-12)
        } else {
            None
        };

        match carry.and_then(|hours| calendar::add_hours(reference, hours)) {
            Some(shifted) => {
                tracing::debug!(carry, "carrying am/pm across the range");
                begin.extended_date_time =
                    match_relative_to(&begin.extended_date_time, shifted, Normalization::Past)?;
                let reference = instant_of(&begin.extended_date_time, context);

                let clock_only: TimexDictionary = [attributes::HOUR, attributes::MINUTE, attributes::SECOND, attributes::AM_PM]
                    .into_iter()
                    .filter_map(|key| {
                        let value = end.extended_date_time.original_dictionary().get(key)?;
                        Some((key.to_string(), value.clone()))
                    })
                    .collect();
                end.extended_date_time = match_dictionary_relative_to(
                    &clock_only,
                    end.extended_date_time.context(),
                    reference,
                    Normalization::Future,
                )?;
            }
            None => {
                begin.extended_date_time =
                    match_relative_to(&begin.extended_date_time, reference, Normalization::Past)?;
                correct_am_pm(&mut begin.extended_date_time, &mut end.extended_date_time);
            }
        }
    } else if is_ambiguous(&begin.extended_date_time) && is_ambiguous(&end.extended_date_time) && begin_hour > end_hour {
        // "1:00 to 8:00 on Tuesday": both ends are pm.
        let median = ((begin_hour - 12) + end_hour) / 2;
        if median <= context.am_pm_inference_cutoff as i32 {
            end.extended_date_time.flip_am_pm();
            reference = calendar::add_hours(reference, 12).unwrap_or(reference);
        }
        begin.extended_date_time = match_relative_to(&begin.extended_date_time, reference, Normalization::Past)?;
    } else {
        begin.extended_date_time = match_relative_to(&begin.extended_date_time, reference, Normalization::Past)?;
    }
    Ok(())
}

/// Settle the ambiguity between the two ends of a candidate range.
///
/// A side marked unfit for ranges drops out. A "now" on either side anchors
/// the other. Otherwise the less specific end is resolved relative to the
/// more specific one; if the result is out of order, only the more specific
/// value is kept.
pub fn apply_range_inference_rules(
    mut begin: TimexMatch,
    mut end: TimexMatch,
    context: &TimexContext,
) -> Result<DateTimeRange> {
    match (
        begin.extended_date_time.valid_for_ranges(),
        end.extended_date_time.valid_for_ranges(),
    ) {
        (false, false) => return Ok(DateTimeRange::default()),
        (false, true) => return Ok(DateTimeRange::single(end)),
        (true, false) => return Ok(DateTimeRange::single(begin)),
        (true, true) => {}
    }

    if let Some(range) = use_inference_on_present_references(&begin, &end, context)? {
        return Ok(range);
    }

    let first = &begin.extended_date_time;
    let second = &end.extended_date_time;
    let mut first_weight = specificity(first.explicit_set_parts());
    let mut second_weight = specificity(second.explicit_set_parts());
    // "Wednesday to next Friday": the offset weekday anchors the range.
    if first.is_weekday_offset_exception() && second.set_parts().contains(DateTimeParts::WEEKDAY) {
        first_weight = FLAG_WEIGHT_OVERRIDE;
    }
    if second.is_weekday_offset_exception() && first.set_parts().contains(DateTimeParts::WEEKDAY) {
        second_weight = FLAG_WEIGHT_OVERRIDE;
    }

    let left_to_right = first_weight >= second_weight;
    if left_to_right {
        apply_inference_left_to_right(&mut begin, &mut end, context)?;
    } else {
        apply_inference_right_to_left(&mut begin, &mut end, context)?;
    }

    let start = parsers::try_parse_iso_into_extended_date_time(begin.extended_date_time.format_value(), context)?;
    let finish = parsers::try_parse_iso_into_extended_date_time(end.extended_date_time.format_value(), context)?;
    if let (Some(start), Some(finish)) = (start, finish) {
        if start.compare_to(&finish).is_gt() {
            tracing::debug!(
                start = begin.extended_date_time.format_value(),
                end = end.extended_date_time.format_value(),
                "range ends are out of order, keeping one value"
            );
            return Ok(DateTimeRange::single(if left_to_right { begin } else { end }));
        }
    }
    Ok(DateTimeRange::pair(begin, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// Tuesday 2023-01-10 15:00.
    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn context() -> TimexContext {
        TimexContext::new(anchor())
    }

    fn value(pairs: &[(&str, &str)]) -> ExtendedDateTime {
        let dict = attributes::dictionary(pairs.iter().copied());
        ExtendedDateTime::create(TemporalType::None, &dict, &context()).unwrap()
    }

    fn matched(text: &str, index: usize, pairs: &[(&str, &str)]) -> TimexMatch {
        TimexMatch::new(text, index, format!("rule_{index}"), value(pairs))
    }

    fn formatted(m: &Option<TimexMatch>) -> Option<String> {
        m.as_ref().map(|m| m.extended_date_time.format_value().to_string())
    }

    // ── specificity tests ───────────────────────────────────────────────

    #[test]
    fn test_specificity_counts_month_twice() {
        assert_eq!(specificity(DateTimeParts::MONTH), 3.5);
        assert_eq!(specificity(DateTimeParts::HOUR | DateTimeParts::MINUTE), 5.0);
        assert_eq!(specificity(DateTimeParts::PART_OF_DAY), 1.5);
        assert_eq!(specificity(DateTimeParts::PART_OF_DAY | DateTimeParts::AM_PM_UNAMBIGUOUS), 0.5);
        assert_eq!(specificity(DateTimeParts::empty()), 0.0);
    }

    // ── compatibility tests ─────────────────────────────────────────────

    #[test]
    fn test_clock_time_merges_with_tomorrow() {
        let tomorrow = value(&[("OFFSET", "1"), ("OFFSET_UNIT", "day")]);
        let five_pm = value(&[("HOUR", "17")]);
        assert!(can_be_merged(&five_pm, &tomorrow));
        assert!(can_be_merged(&tomorrow, &five_pm));
    }

    #[test]
    fn test_incompatible_merges() {
        let tomorrow = value(&[("OFFSET", "1"), ("OFFSET_UNIT", "day")]);
        let next_month = value(&[("OFFSET", "1"), ("OFFSET_UNIT", "month")]);
        let seventh = value(&[("DAY", "7")]);
        let saturday = value(&[("WEEKDAY", "6")]);
        let five_pm = value(&[("HOUR", "17")]);
        let other_five = value(&[("HOUR", "5"), ("AMPM", "not_specified")]);

        assert!(!can_be_merged(&seventh, &tomorrow));
        assert!(!can_be_merged(&five_pm, &next_month));
        assert!(!can_be_merged(&saturday, &seventh));
        assert!(!can_be_merged(&tomorrow, &next_month));
        assert!(!can_be_merged(&five_pm, &other_five));
    }

    #[test]
    fn test_range_compatibility() {
        let morning = value(&[("PART_OF_DAY", "MO")]);
        let five = value(&[("HOUR", "5"), ("AMPM", "not_specified")]);
        let tuesday = value(&[("WEEKDAY", "2")]);
        let twelfth = value(&[("DAY", "12")]);
        let tuesday_morning = value(&[("WEEKDAY", "2"), ("PART_OF_DAY", "MO")]);

        assert!(can_be_a_range(&morning, &five));
        assert!(can_be_a_range(&tuesday, &twelfth));
        assert!(!can_be_a_range(&tuesday_morning, &five));
        assert!(!can_be_a_range(&twelfth, &five));
    }

    // ── merge tests ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_clock_time_and_weekday() {
        let matches = vec![
            matched("17:00", 0, &[("HOUR", "17"), ("MINUTE", "00")]),
            matched("Monday", 6, &[("WEEKDAY", "1")]),
        ];
        let once = merge_partial_timex_matches(&matches);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].value, "17:00 Monday");
        assert_eq!(once[0].rule_id, "rule_0 and rule_6");
        let parts = once[0].extended_date_time.explicit_set_parts();
        assert!(parts.contains(DateTimeParts::HOUR | DateTimeParts::WEEKDAY));

        let twice = merge_partial_timex_matches(&once);
        assert_eq!(twice.len(), 1);
        assert_eq!(
            twice[0].extended_date_time.format_value(),
            once[0].extended_date_time.format_value()
        );
        // The caller's matches are untouched.
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].value, "17:00");
    }

    #[test]
    fn test_merge_keeps_more_specific_duplicate() {
        // "next Saturday the 14th", said on Tuesday the 10th.
        let matches = vec![
            matched("Saturday", 0, &[("WEEKDAY", "6")]),
            matched("the 14th", 9, &[("DAY", "14")]),
        ];
        assert_eq!(
            matches[0].extended_date_time.format_value(),
            matches[1].extended_date_time.format_value()
        );
        let merged = merge_partial_timex_matches(&matches);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "Saturday");
    }

    #[test]
    fn test_merge_drops_redundant_part_of_day_hint() {
        let matches = vec![
            matched("evening", 0, &[("PART_OF_DAY", "EV")]),
            matched("at 7pm", 8, &[("HOUR", "19")]),
        ];
        let merged = merge_partial_timex_matches(&matches);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "at 7pm");
        assert_eq!(merged[0].id, 0);
    }

    #[test]
    fn test_merge_date_times() {
        let times = vec![value(&[("HOUR", "17")]), value(&[("OFFSET", "1"), ("OFFSET_UNIT", "day")])];
        let merged = merge_partial_date_times(&times);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].format_value(), "2023-01-11T17");
    }

    // ── pipeline tests ──────────────────────────────────────────────────

    #[test]
    fn test_single_match_is_start_only() {
        let range = run_time_range_resolution(&[matched("Friday", 0, &[("WEEKDAY", "5")])], &[], &context());
        assert!(range.start_time.is_some());
        assert!(range.end_time.is_none());
    }

    #[test]
    fn test_empty_and_present_normalization() {
        assert!(run_time_range_resolution(&[], &[], &context()).is_empty());
        let present = context().with_normalization(Normalization::Present);
        let m = matched("Friday", 0, &[("WEEKDAY", "5")]);
        assert!(run_time_range_resolution(&[m], &[], &present).is_empty());
    }

    #[test]
    fn test_present_duration_and_fixed_date_is_empty() {
        let matches = vec![
            matched("6 months", 0, &[("DURATION", "6"), ("DURATION_UNIT", "month")]),
            matched("March", 9, &[("MONTH", "3")]),
            matched("now", 15, &[("REFERENCE", "PRESENT_REF")]),
        ];
        assert!(run_time_range_resolution(&matches, &[], &context()).is_empty());
    }

    #[test]
    fn test_invalid_constructions() {
        let tomorrow = matched("tomorrow", 0, &[("DAY", "11")]);
        let next_week = matched("next week", 12, &[("YEAR", "2023"), ("WEEK", "3")]);
        assert!(contains_invalid_constructions(&[tomorrow.clone(), next_week]));
        let now = matched("now", 0, &[("REFERENCE", "PRESENT_REF")]);
        let lunch = matched("lunch", 8, &[("PART_OF_DAY", "MI")]);
        assert!(contains_invalid_constructions(&[now, lunch]));
        let quarter = matched("Q4", 0, &[("YEAR", "2011"), ("PART_OF_YEAR", "Q4")]);
        assert!(contains_invalid_constructions(&[quarter]));
        assert!(!contains_invalid_constructions(&[tomorrow]));
    }

    #[test]
    fn test_explicit_date_range() {
        let matches = vec![
            matched("January 12th", 0, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "12")]),
            matched("January 15th", 20, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "15")]),
        ];
        let range = run_time_range_resolution(&matches, &[], &context());
        assert_eq!(formatted(&range.start_time).as_deref(), Some("2023-01-12"));
        assert_eq!(formatted(&range.end_time).as_deref(), Some("2023-01-15"));
    }

    #[test]
    fn test_inverted_range_keeps_one_value() {
        let matches = vec![
            matched("January 15th", 0, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "15")]),
            matched("January 12th", 20, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "12")]),
        ];
        let range = run_time_range_resolution(&matches, &[], &context());
        assert_eq!(formatted(&range.start_time).as_deref(), Some("2023-01-15"));
        assert!(range.end_time.is_none());
    }

    #[test]
    fn test_overnight_range_flips_end_to_morning() {
        let matches = vec![
            matched("10 pm", 0, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "10"), ("HOUR", "22")]),
            matched("1 on the 11th", 9, &[
                ("YEAR", "2023"),
                ("MONTH", "1"),
                ("DAY", "11"),
                ("HOUR", "1"),
                ("AMPM", "not_specified"),
            ]),
        ];
        let range = run_time_range_resolution(&matches, &[], &context());
        assert_eq!(formatted(&range.start_time).as_deref(), Some("2023-01-10T22"));
        assert_eq!(formatted(&range.end_time).as_deref(), Some("2023-01-11T01"));
    }

    #[test]
    fn test_lone_duration_spans_from_now() {
        let ten_minutes = matched("the next 10 minutes", 0, &[("DURATION", "10"), ("DURATION_UNIT", "minute")]);
        let range = run_time_range_resolution(std::slice::from_ref(&ten_minutes), &[], &context());
        assert!(range.starts_now());
        let end = range.end_time.as_ref().unwrap();
        assert!(end.extended_date_time.is_offset());
        assert_eq!(end.value, "the next 10 minutes");

        let past = context().with_normalization(Normalization::Past);
        let range = run_time_range_resolution(&[ten_minutes], &[], &past);
        assert!(range.ends_now());
        assert_eq!(range.end_time.unwrap().rule_id, INTERNAL_RULE_ID);
    }

    #[test]
    fn test_range_hint_blocks_duration_shortcut() {
        let hinted = matched("at least 3 hours", 0, &[
            ("DURATION", "3"),
            ("DURATION_UNIT", "hour"),
            ("RANGE_HINT", "no_range"),
        ]);
        assert!(use_inference_on_durations(&[hinted], &context()).unwrap().is_none());
    }

    #[test]
    fn test_extract_only_duration_ignores_part_of_day() {
        let matches = vec![
            matched("this morning", 0, &[("PART_OF_DAY", "MO")]),
            matched("2 hours", 13, &[("DURATION", "2"), ("DURATION_UNIT", "hour")]),
        ];
        assert_eq!(extract_only_duration_match(&matches).map(|m| m.index), Some(13));
        let two = vec![matches[1].clone(), matches[1].clone()];
        assert!(extract_only_duration_match(&two).is_none());
    }

    #[test]
    fn test_process_context_appends_hint_once() {
        let mut matches = vec![matched("at 5", 0, &[("HOUR", "5"), ("AMPM", "not_specified")])];
        let extra = vec![
            matched("Tuesday", 0, &[("WEEKDAY", "2")]),
            matched("evening", 8, &[("PART_OF_DAY", "EV")]),
        ];
        process_context(&extra, &mut matches);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].value, "evening");
        process_context(&extra, &mut matches);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_present_reference_anchors_range() {
        let now = matched("now", 0, &[("REFERENCE", "PRESENT_REF")]);
        let friday = matched("Friday", 12, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "13")]);
        let range = use_inference_on_present_references(&now, &friday, &context())
            .unwrap()
            .unwrap();
        assert!(range.starts_now());
        assert_eq!(formatted(&range.end_time).as_deref(), Some("2023-01-13"));

        // A past end is swapped to the front.
        let monday = matched("Monday", 12, &[("YEAR", "2023"), ("MONTH", "1"), ("DAY", "9")]);
        let range = use_inference_on_present_references(&now, &monday, &context())
            .unwrap()
            .unwrap();
        assert!(range.ends_now());

        let both = use_inference_on_present_references(&now, &now, &context()).unwrap().unwrap();
        assert!(both.end_time.is_none());
        assert!(use_inference_on_present_references(&friday, &monday, &context())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_match_relative_to_moves_reference() {
        let six = value(&[("HOUR", "6"), ("AMPM", "not_specified")]);
        let reference = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let moved = match_relative_to(&six, reference, Normalization::Past).unwrap();
        assert_eq!(moved.context().reference_date_time, reference);
        assert_eq!(moved.context().normalization, Normalization::Past);
        assert!(moved.context().use_inference);
    }

    // ── property tests ──────────────────────────────────────────────────

    type Fields = &'static [(&'static str, &'static str)];

    const FRAGMENTS: &[Fields] = &[
        &[("HOUR", "17")],
        &[("HOUR", "9"), ("AMPM", "not_specified")],
        &[("WEEKDAY", "1")],
        &[("DAY", "12")],
        &[("MONTH", "3")],
        &[("PART_OF_DAY", "EV")],
        &[("OFFSET", "1"), ("OFFSET_UNIT", "day")],
        &[("MINUTE", "30")],
    ];

    fn fragment() -> impl Strategy<Value = Fields> {
        prop::sample::select(FRAGMENTS)
    }

    proptest! {
        #[test]
        fn prop_merge_reaches_fixed_point(fragments in prop::collection::vec(fragment(), 1..6)) {
            let mut current: Vec<TimexMatch> = fragments
                .iter()
                .enumerate()
                .map(|(i, pairs)| matched("x", i, pairs))
                .collect();
            for _ in 0..fragments.len() {
                let next = merge_partial_timex_matches(&current);
                prop_assert!(next.len() <= current.len());
                let settled = next.len() == current.len();
                current = next;
                if settled {
                    break;
                }
            }
            let again = merge_partial_timex_matches(&current);
            let before: Vec<String> = current.iter().map(|m| m.extended_date_time.format_value().to_string()).collect();
            let after: Vec<String> = again.iter().map(|m| m.extended_date_time.format_value().to_string()).collect();
            prop_assert_eq!(before, after);
        }
    }
}
