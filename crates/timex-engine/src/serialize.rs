//! Versioned binary form of an [`ExtendedDateTime`].
//!
//! A blob stores the resolution context and the original field dictionary,
//! not the resolved value; deserializing resolves the dictionary again under
//! the stored context and so reproduces the same value.
//!
//! Layout (all integers little-endian, strings u32-length-prefixed UTF-8):
//!
//! ```text
//! u32   MAGIC | version
//! i64   reference instant, seconds since the Unix epoch
//! u32   reference instant, nanoseconds
//! u8    normalization          u8  use_inference
//! u32   am/pm cutoff           u8  include_current_time_in_past_or_future
//! u8    temporal type filter
//! u32   n, then n x (u8 part of day, u32 start second, u32 end second)
//! u32   n, then n x (u8 unit, i32 vague offset)
//! u8    weekday logic                                   (version 2+)
//! u32   first weekend day, u32 weekend length           (version 2+)
//! u32   n, then n x (string key, string value)
//! ```
//!
//! A holiday resolver is not stored. Reattach one with
//! [`ExtendedDateTime::reinterpret`] if the value uses holiday anchors.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveTime, Timelike};

use crate::attributes::TimexDictionary;
use crate::context::{PartOfDayRange, TimexContext, WeekDefinition};
use crate::datetime::ExtendedDateTime;
use crate::error::{Result, TimexError};
use crate::parts::{Normalization, PartOfDay, TemporalType, TemporalTypes, TemporalUnit, WeekdayLogic};

/// High 28 bits of the header word.
pub const MAGIC: u32 = 0x3E8A_9B20;
/// Version written by [`serialize`]. Older versions remain readable.
pub const CURRENT_VERSION: u32 = 2;

const MAGIC_MASK: u32 = 0xFFFF_FFF0;
const VERSION_MASK: u32 = 0x0000_000F;

/// Encode `value` as a blob at [`CURRENT_VERSION`].
pub fn serialize(value: &ExtendedDateTime) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_u32_le(MAGIC | CURRENT_VERSION);
    write_context(&mut buf, value.context(), CURRENT_VERSION);

    let dictionary = value.original_dictionary();
    buf.put_u32_le(dictionary.len() as u32);
    for (key, field) in dictionary {
        put_string(&mut buf, key);
        put_string(&mut buf, field);
    }
    buf.freeze()
}

/// Decode a blob and resolve its dictionary under the stored context.
pub fn deserialize(blob: &[u8]) -> Result<ExtendedDateTime> {
    let mut reader = Reader { buf: blob };
    let header = reader.u32("header")?;
    if header & MAGIC_MASK != MAGIC {
        return Err(TimexError::Serialization(format!(
            "not an ExtendedDateTime blob (header {header:#010x})"
        )));
    }
    let version = header & VERSION_MASK;
    if version > CURRENT_VERSION {
        return Err(TimexError::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    let context = read_context(&mut reader, version)?;
    let count = reader.u32("dictionary size")?;
    let mut dictionary = TimexDictionary::new();
    for _ in 0..count {
        let key = reader.string("dictionary key")?;
        let field = reader.string("dictionary value")?;
        dictionary.insert(key, field);
    }
    tracing::trace!(version, fields = dictionary.len(), "decoded timex blob");
    ExtendedDateTime::create(TemporalType::None, &dictionary, &context)
}

// ── context ─────────────────────────────────────────────────────────────

fn write_context(buf: &mut BytesMut, context: &TimexContext, version: u32) {
    let reference = context.reference_date_time.and_utc();
    buf.put_i64_le(reference.timestamp());
    buf.put_u32_le(reference.timestamp_subsec_nanos());
    buf.put_u8(context.normalization.code());
    buf.put_u8(context.use_inference as u8);
    buf.put_u32_le(context.am_pm_inference_cutoff);
    buf.put_u8(context.include_current_time_in_past_or_future as u8);
    buf.put_u8(context.temporal_types.bits());

    buf.put_u32_le(context.part_of_day_default_times.len() as u32);
    for (part_of_day, range) in &context.part_of_day_default_times {
        buf.put_u8(part_of_day.code());
        buf.put_u32_le(range.start.num_seconds_from_midnight());
        buf.put_u32_le(range.end.num_seconds_from_midnight());
    }

    buf.put_u32_le(context.default_value_of_vague_offset.len() as u32);
    for (unit, offset) in &context.default_value_of_vague_offset {
        buf.put_u8(unit.code());
        buf.put_i32_le(*offset);
    }

    if version >= 2 {
        buf.put_u8(context.weekday_logic.code());
        buf.put_u32_le(context.week_definition.first_day_of_weekend);
        buf.put_u32_le(context.week_definition.weekend_length);
    }
}

fn read_context(reader: &mut Reader<'_>, version: u32) -> Result<TimexContext> {
    let seconds = reader.i64("reference instant")?;
    let nanos = reader.u32("reference instant")?;
    let reference = DateTime::from_timestamp(seconds, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| TimexError::Serialization(format!("reference instant {seconds} out of range")))?;

    let normalization = reader.code("normalization", Normalization::from_code)?;
    let use_inference = reader.u8("use_inference")? != 0;
    let am_pm_inference_cutoff = reader.u32("am/pm cutoff")?;
    let include_current_time_in_past_or_future = reader.u8("include current time")? != 0;
    let temporal_types = TemporalTypes::from_bits_truncate(reader.u8("temporal types")?);

    let mut part_of_day_default_times = BTreeMap::new();
    for _ in 0..reader.u32("part of day count")? {
        let part_of_day = reader.code("part of day", PartOfDay::from_code)?;
        let start = reader.time_of_day("part of day start")?;
        let end = reader.time_of_day("part of day end")?;
        part_of_day_default_times.insert(part_of_day, PartOfDayRange { start, end });
    }

    let mut default_value_of_vague_offset = BTreeMap::new();
    for _ in 0..reader.u32("vague offset count")? {
        let unit = reader.code("vague offset unit", TemporalUnit::from_code)?;
        default_value_of_vague_offset.insert(unit, reader.i32("vague offset")?);
    }

    let mut context = TimexContext {
        reference_date_time: reference,
        normalization,
        use_inference,
        am_pm_inference_cutoff,
        include_current_time_in_past_or_future,
        temporal_types,
        part_of_day_default_times,
        default_value_of_vague_offset,
        ..TimexContext::default()
    };
    if version >= 2 {
        context.weekday_logic = reader.code("weekday logic", WeekdayLogic::from_code)?;
        context.week_definition = WeekDefinition {
            first_day_of_weekend: reader.u32("first weekend day")?,
            weekend_length: reader.u32("weekend length")?,
        };
    }
    Ok(context)
}

// ── primitives ──────────────────────────────────────────────────────────

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Bounds-checked cursor over a blob.
struct Reader<'a> {
    buf: &'a [u8],
}

impl Reader<'_> {
    fn need(&self, len: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(TimexError::Serialization(format!(
                "truncated blob reading {what}: need {len} bytes, have {}",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        self.need(4, what)?;
        Ok(self.buf.get_i32_le())
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        self.need(8, what)?;
        Ok(self.buf.get_i64_le())
    }

    fn code<T>(&mut self, what: &str, decode: fn(u8) -> Option<T>) -> Result<T> {
        let code = self.u8(what)?;
        decode(code).ok_or_else(|| TimexError::Serialization(format!("unknown {what} code {code}")))
    }

    fn time_of_day(&mut self, what: &str) -> Result<NaiveTime> {
        let seconds = self.u32(what)?;
        NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
            .ok_or_else(|| TimexError::Serialization(format!("{what} {seconds} is not a time of day")))
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let len = self.u32(what)? as usize;
        self.need(len, what)?;
        let (text, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(text.to_vec()).map_err(|e| TimexError::Serialization(format!("{what}: {e}")))
    }
}
