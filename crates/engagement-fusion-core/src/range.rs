//! Activation-range decoding.
//!
//! Programs record when they were live as a set of disjoint time intervals,
//! encoded in Postgres multirange text form:
//!
//! ```text
//! {["2023-01-01 00:00:00","2023-06-01 00:00:00"),["2023-07-01 00:00:00",)}
//! ```
//!
//! [`decode_activation_ranges`] collapses such a value into a single
//! `(start_date, end_date, status)` triple:
//!
//! - `start_date` is the earliest bounded lower bound.
//! - `status` is `active` if any interval lacks an upper bound, else
//!   `complete`.
//! - `end_date` is the latest upper bound for a complete program and null
//!   for an active one.
//!
//! Absent, empty, or unparseable values decode to the null triple. Decoding
//! never fails the caller; parse failures are logged and isolated to the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::columns::{
    PROGRAM_ACTIVATION_RANGES, PROGRAM_END_DATE, PROGRAM_START_DATE, PROGRAM_STATUS,
};
use crate::models::ProgramStatus;
use crate::union::EngagementTable;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Why an encoded range could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeDecodeError {
    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unterminated range literal")]
    Unterminated,
    #[error("invalid range bound '{0}'")]
    InvalidBound(String),
}

/// One interval. `None` bounds are unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lower: Option<NaiveDateTime>,
    pub upper: Option<NaiveDateTime>,
}

/// The decoded `(start, end, status)` triple. All fields null by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodedRange {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub status: Option<ProgramStatus>,
}

/// Parse a multirange (or single range) literal into its intervals.
///
/// `{}` and `empty` parse to no intervals. Inclusive and exclusive bracket
/// styles are both accepted; bound inclusivity is not retained.
pub fn parse_multirange(encoded: &str) -> Result<Vec<Interval>, RangeDecodeError> {
    let trimmed = encoded.trim();
    let body = match trimmed.strip_prefix('{') {
        Some(rest) => rest
            .strip_suffix('}')
            .ok_or(RangeDecodeError::Unterminated)?,
        None => trimmed,
    };

    if body.trim().is_empty() || body.trim().eq_ignore_ascii_case("empty") {
        return Ok(Vec::new());
    }

    let mut intervals = Vec::new();
    let mut chars = body.char_indices().peekable();
    loop {
        while let Some(&(_, c)) = chars.peek() {
            if c == ',' || c.is_whitespace() {
                chars.next();
            } else {
                break;
            }
        }

        let Some((offset, open)) = chars.next() else {
            break;
        };
        if open != '[' && open != '(' {
            return Err(RangeDecodeError::Unexpected {
                found: open,
                offset,
            });
        }

        let lower = read_bound(&mut chars, &[','])?;
        let upper = read_bound(&mut chars, &[']', ')'])?;
        intervals.push(Interval {
            lower: parse_bound(&lower)?,
            upper: parse_bound(&upper)?,
        });
    }

    Ok(intervals)
}

/// Read one bound up to (and consuming) a terminator outside quotes.
fn read_bound(
    chars: &mut Peekable<CharIndices<'_>>,
    terminators: &[char],
) -> Result<String, RangeDecodeError> {
    let mut out = String::new();
    let mut quoted = false;
    loop {
        let Some((_, c)) = chars.next() else {
            return Err(RangeDecodeError::Unterminated);
        };
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => return Err(RangeDecodeError::Unterminated),
            },
            c if !quoted && terminators.contains(&c) => return Ok(out),
            c => out.push(c),
        }
    }
}

fn parse_bound(raw: &str) -> Result<Option<NaiveDateTime>, RangeDecodeError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("infinity") || raw.eq_ignore_ascii_case("-infinity")
    {
        return Ok(None);
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(ts));
        }
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Ok(Some(ts.naive_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }

    Err(RangeDecodeError::InvalidBound(raw.to_string()))
}

/// Collapse parsed intervals into the reporting triple.
pub fn summarize(intervals: &[Interval]) -> DecodedRange {
    let Some(start_date) = intervals.iter().filter_map(|i| i.lower).min() else {
        return DecodedRange::default();
    };

    if intervals.iter().any(|i| i.upper.is_none()) {
        DecodedRange {
            start_date: Some(start_date),
            end_date: None,
            status: Some(ProgramStatus::Active),
        }
    } else {
        DecodedRange {
            start_date: Some(start_date),
            end_date: intervals.iter().filter_map(|i| i.upper).max(),
            status: Some(ProgramStatus::Complete),
        }
    }
}

/// Decode an optional encoded activation range into the reporting triple.
pub fn decode_activation_ranges(encoded: Option<&str>) -> DecodedRange {
    let Some(encoded) = encoded else {
        return DecodedRange::default();
    };

    match parse_multirange(encoded) {
        Ok(intervals) if intervals.is_empty() => {
            debug!(encoded, "empty activation range");
            DecodedRange::default()
        }
        Ok(intervals) => summarize(&intervals),
        Err(e) => {
            warn!(encoded, error = %e, "failed to decode activation range");
            DecodedRange::default()
        }
    }
}

/// Decode the activation-range column of every record in place.
///
/// Each record's program start, end, and status are replaced by the values
/// decoded from its own encoded ranges (null where it carries none). No-op
/// when no batch supplied the activation-range column.
pub fn apply_activation_ranges(table: &mut EngagementTable) {
    if !table.has_column(PROGRAM_ACTIVATION_RANGES) {
        return;
    }

    for record in &mut table.records {
        let decoded = decode_activation_ranges(record.activation_ranges.as_deref());
        record.program.start_date = decoded.start_date;
        record.program.end_date = decoded.end_date;
        record.program.status = decoded.status;
    }

    table.add_column(PROGRAM_START_DATE);
    table.add_column(PROGRAM_END_DATE);
    table.add_column(PROGRAM_STATUS);
}
