//! Temporal types for XSD dateTime, date, time, and the two duration types.
//!
//! Each type preserves the original lexical form for round-trip serialization
//! and normalizes to an instant for comparison:
//!
//! - `DateTime`: a timezone designator (`Z` or `+/-HH:MM`) is REQUIRED.
//!   A dateTime without one does not name an instant, and an access-control
//!   engine must not guess; the parse fails and the failure surfaces as
//!   `Indeterminate(syntax-error)` at the enclosing expression.
//! - `Date` / `Time`: the timezone is optional. Comparison helpers take a
//!   default offset that is applied to values lacking one.
//! - `DayTimeDuration` / `YearMonthDuration`: signed, totally ordered by
//!   nanoseconds / months respectively.
//!
//! Two dateTimes are equal iff they denote the same instant, regardless of
//! the offset they were written in.

use chrono::{
    DateTime as ChronoDateTime, Duration as ChronoDuration, FixedOffset, Months, NaiveDate,
    NaiveDateTime, NaiveTime, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ValueError, ValueResult};

/// Serde helper for Option<FixedOffset> - serialized as Option<i32> seconds east of UTC.
mod tz_offset_serde {
    use super::*;

    pub fn serialize<S>(offset: &Option<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match offset {
            Some(o) => serializer.serialize_some(&o.local_minus_utc()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<i32> = Option::deserialize(deserializer)?;
        Ok(opt.and_then(FixedOffset::east_opt))
    }
}

/// Serde helper for a mandatory FixedOffset.
mod tz_offset_serde_req {
    use super::*;

    pub fn serialize<S>(offset: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(offset.local_minus_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i32::deserialize(deserializer)?;
        FixedOffset::east_opt(secs)
            .ok_or_else(|| serde::de::Error::custom("timezone offset out of range"))
    }
}

/// UTC as a fixed offset. `east_opt(0)` cannot fail.
pub fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!("zero offset is always valid"))
}

/// Split a trailing timezone designator off a lexical temporal form.
///
/// Recognizes `Z` and `+HH:MM` / `-HH:MM`. Returns the remaining head and
/// the parsed offset, or None when no designator is present.
fn split_timezone(s: &str) -> Result<(&str, Option<FixedOffset>), String> {
    if let Some(head) = s.strip_suffix('Z') {
        return Ok((head, Some(utc_offset())));
    }
    if s.len() > 6 {
        let (head, tail) = s.split_at(s.len() - 6);
        let bytes = tail.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            let hours: i32 = tail[1..3]
                .parse()
                .map_err(|_| format!("bad timezone hours in '{}'", tail))?;
            let minutes: i32 = tail[4..6]
                .parse()
                .map_err(|_| format!("bad timezone minutes in '{}'", tail))?;
            if hours > 14 || minutes > 59 {
                return Err(format!("timezone offset '{}' out of range", tail));
            }
            let mut secs = hours * 3600 + minutes * 60;
            if bytes[0] == b'-' {
                secs = -secs;
            }
            let offset = FixedOffset::east_opt(secs)
                .ok_or_else(|| format!("timezone offset '{}' out of range", tail))?;
            return Ok((head, Some(offset)));
        }
    }
    Ok((s, None))
}

/// Render an offset the way XSD writes it: `Z` or `+HH:MM`.
fn format_offset(offset: FixedOffset) -> String {
    let secs = offset.local_minus_utc();
    if secs == 0 {
        "Z".to_string()
    } else {
        let sign = if secs >= 0 { '+' } else { '-' };
        let abs = secs.abs();
        format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

// ---------------------------------------------------------------------------
// DateTime — xs:dateTime with a mandatory timezone designator
// ---------------------------------------------------------------------------

/// XSD dateTime, normalized to a UTC instant with the original offset and
/// lexical form preserved. Nanosecond precision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DateTime {
    /// Normalized UTC instant for comparison.
    instant: ChronoDateTime<Utc>,
    /// The offset the value was written in.
    #[serde(with = "tz_offset_serde_req")]
    tz_offset: FixedOffset,
    /// Original string for round-trip serialization.
    original: String,
}

impl DateTime {
    /// Parse an XSD dateTime string. The timezone designator is mandatory.
    pub fn parse(s: &str) -> ValueResult<Self> {
        if let Ok(dt) = ChronoDateTime::parse_from_rfc3339(s) {
            return Ok(Self {
                instant: dt.with_timezone(&Utc),
                tz_offset: *dt.offset(),
                original: s.to_string(),
            });
        }

        // Distinguish "valid but missing a timezone" from garbage: the
        // missing-attribute/syntax-error split downstream depends on it.
        for fmt in &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
            if NaiveDateTime::parse_from_str(s, fmt).is_ok() {
                return Err(ValueError::MissingTimezone(s.to_string()));
            }
        }

        Err(ValueError::lexical(
            "dateTime",
            s,
            "not a valid xs:dateTime lexical form",
        ))
    }

    /// The current instant, rendered in UTC.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            instant: now,
            tz_offset: utc_offset(),
            original: now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        }
    }

    pub fn instant(&self) -> ChronoDateTime<Utc> {
        self.instant
    }

    pub fn tz_offset(&self) -> FixedOffset {
        self.tz_offset
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Add a signed dayTimeDuration.
    pub fn add_day_time(&self, duration: &DayTimeDuration) -> ValueResult<Self> {
        let shifted = self
            .instant
            .checked_add_signed(ChronoDuration::nanoseconds(duration.nanos()))
            .ok_or_else(|| {
                ValueError::TemporalOverflow(format!("{} + {}", self.original, duration))
            })?;
        Ok(Self::from_instant(shifted, self.tz_offset))
    }

    /// Add a signed yearMonthDuration. Month arithmetic happens in the
    /// value's original offset so that local calendar dates shift as written.
    pub fn add_year_month(&self, duration: &YearMonthDuration) -> ValueResult<Self> {
        let local = self.instant.with_timezone(&self.tz_offset);
        let months = duration.months();
        let shifted = if months >= 0 {
            local.checked_add_months(Months::new(months as u32))
        } else {
            local.checked_sub_months(Months::new(months.unsigned_abs()))
        }
        .ok_or_else(|| ValueError::TemporalOverflow(format!("{} + {}", self.original, duration)))?;
        Ok(Self::from_instant(shifted.with_timezone(&Utc), self.tz_offset))
    }

    /// Build from an instant, rendered in the given offset.
    pub fn from_instant(instant: ChronoDateTime<Utc>, tz_offset: FixedOffset) -> Self {
        let original = instant
            .with_timezone(&tz_offset)
            .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
        Self {
            instant,
            tz_offset,
            original,
        }
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for DateTime {}

impl Ord for DateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for DateTime {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.instant.timestamp().hash(state);
        self.instant.timestamp_subsec_nanos().hash(state);
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// ---------------------------------------------------------------------------
// Date — xs:date with an optional timezone
// ---------------------------------------------------------------------------

/// XSD date with an optional timezone offset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Date {
    date: NaiveDate,
    #[serde(with = "tz_offset_serde")]
    tz_offset: Option<FixedOffset>,
    original: String,
}

impl Date {
    /// Build from calendar components.
    pub fn from_naive(date: NaiveDate, tz_offset: Option<FixedOffset>) -> Self {
        let mut original = date.format("%Y-%m-%d").to_string();
        if let Some(offset) = tz_offset {
            original.push_str(&format_offset(offset));
        }
        Self {
            date,
            tz_offset,
            original,
        }
    }

    pub fn parse(s: &str) -> ValueResult<Self> {
        let (head, tz_offset) =
            split_timezone(s).map_err(|reason| ValueError::lexical("date", s, reason))?;
        let date = NaiveDate::parse_from_str(head, "%Y-%m-%d")
            .map_err(|e| ValueError::lexical("date", s, e.to_string()))?;
        Ok(Self {
            date,
            tz_offset,
            original: s.to_string(),
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn tz_offset(&self) -> Option<FixedOffset> {
        self.tz_offset
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Anchor instant: midnight at the value's offset, or `default` when the
    /// value carries none.
    pub fn anchor(&self, default: FixedOffset) -> ChronoDateTime<Utc> {
        let offset = self.tz_offset.unwrap_or(default);
        let midnight = self.date.and_time(NaiveTime::MIN);
        (midnight - ChronoDuration::seconds(offset.local_minus_utc() as i64)).and_utc()
    }

    /// Three-way comparison applying `default` to timezone-less values.
    pub fn cmp_with_default(&self, other: &Self, default: FixedOffset) -> Ordering {
        self.anchor(default).cmp(&other.anchor(default))
    }

    /// Add a signed yearMonthDuration.
    pub fn add_year_month(&self, duration: &YearMonthDuration) -> ValueResult<Self> {
        let months = duration.months();
        let shifted = if months >= 0 {
            self.date.checked_add_months(Months::new(months as u32))
        } else {
            self.date.checked_sub_months(Months::new(months.unsigned_abs()))
        }
        .ok_or_else(|| ValueError::TemporalOverflow(format!("{} + {}", self.original, duration)))?;
        let mut original = shifted.format("%Y-%m-%d").to_string();
        if let Some(offset) = self.tz_offset {
            original.push_str(&format_offset(offset));
        }
        Ok(Self {
            date: shifted,
            tz_offset: self.tz_offset,
            original,
        })
    }
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_with_default(other, utc_offset()) == Ordering::Equal
    }
}

impl Eq for Date {}

impl Ord for Date {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_with_default(other, utc_offset())
    }
}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for Date {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.anchor(utc_offset()).timestamp().hash(state);
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// ---------------------------------------------------------------------------
// Time — xs:time with an optional timezone
// ---------------------------------------------------------------------------

/// XSD time with an optional timezone offset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Time {
    time: NaiveTime,
    #[serde(with = "tz_offset_serde")]
    tz_offset: Option<FixedOffset>,
    original: String,
}

const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;

impl Time {
    /// Build from clock components.
    pub fn from_naive(time: NaiveTime, tz_offset: Option<FixedOffset>) -> Self {
        let mut original = time.format("%H:%M:%S%.f").to_string();
        if let Some(offset) = tz_offset {
            original.push_str(&format_offset(offset));
        }
        Self {
            time,
            tz_offset,
            original,
        }
    }

    pub fn parse(s: &str) -> ValueResult<Self> {
        let (head, tz_offset) =
            split_timezone(s).map_err(|reason| ValueError::lexical("time", s, reason))?;
        let time = NaiveTime::parse_from_str(head, "%H:%M:%S%.f")
            .map_err(|e| ValueError::lexical("time", s, e.to_string()))?;
        Ok(Self {
            time,
            tz_offset,
            original: s.to_string(),
        })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn tz_offset(&self) -> Option<FixedOffset> {
        self.tz_offset
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Time-of-day normalized to UTC, in nanoseconds since midnight.
    pub fn normalized_nanos(&self, default: FixedOffset) -> i64 {
        use chrono::Timelike;
        let offset = self.tz_offset.unwrap_or(default);
        let nanos = self.time.num_seconds_from_midnight() as i64 * 1_000_000_000
            + self.time.nanosecond() as i64;
        (nanos - offset.local_minus_utc() as i64 * 1_000_000_000).rem_euclid(NANOS_PER_DAY)
    }

    /// Three-way comparison applying `default` to timezone-less values.
    pub fn cmp_with_default(&self, other: &Self, default: FixedOffset) -> Ordering {
        self.normalized_nanos(default)
            .cmp(&other.normalized_nanos(default))
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_with_default(other, utc_offset()) == Ordering::Equal
    }
}

impl Eq for Time {}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_with_default(other, utc_offset())
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for Time {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized_nanos(utc_offset()).hash(state);
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// ---------------------------------------------------------------------------
// DayTimeDuration — xs:dayTimeDuration, totally ordered by nanoseconds
// ---------------------------------------------------------------------------

/// XSD dayTimeDuration: `[-]PnDTnHnMn(.fff)S`, stored as signed nanoseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DayTimeDuration {
    nanos: i64,
    original: String,
}

impl DayTimeDuration {
    pub fn parse(s: &str) -> ValueResult<Self> {
        let err = |reason: &str| ValueError::lexical("dayTimeDuration", s, reason.to_string());

        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let rest = rest.strip_prefix('P').ok_or_else(|| err("missing 'P'"))?;
        if rest.is_empty() {
            return Err(err("empty duration body"));
        }

        let (date_part, time_part) = match rest.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (rest, None),
        };

        let mut total: i128 = 0;
        let mut saw_component = false;

        if !date_part.is_empty() {
            let days = date_part
                .strip_suffix('D')
                .ok_or_else(|| err("date part must be '<n>D'"))?;
            let days: i128 = days.parse().map_err(|_| err("bad day count"))?;
            total += days * 86_400 * 1_000_000_000;
            saw_component = true;
        }

        if let Some(time_part) = time_part {
            if time_part.is_empty() {
                return Err(err("'T' with no time components"));
            }
            let mut cursor = time_part;
            for (designator, nanos_per_unit) in [
                ('H', 3_600_000_000_000i128),
                ('M', 60_000_000_000i128),
                ('S', 1_000_000_000i128),
            ] {
                if let Some(pos) = cursor.find(designator) {
                    let number = &cursor[..pos];
                    cursor = &cursor[pos + 1..];
                    if designator == 'S' && number.contains('.') {
                        let (whole, frac) = number
                            .split_once('.')
                            .ok_or_else(|| err("bad fractional seconds"))?;
                        let whole: i128 = whole.parse().map_err(|_| err("bad seconds"))?;
                        let frac_nanos = parse_fraction_nanos(frac).ok_or_else(|| {
                            err("fractional seconds limited to nanosecond precision")
                        })?;
                        total += whole * 1_000_000_000 + frac_nanos as i128;
                    } else {
                        let value: i128 = number
                            .parse()
                            .map_err(|_| err("bad time component"))?;
                        total += value * nanos_per_unit;
                    }
                    saw_component = true;
                }
            }
            if !cursor.is_empty() {
                return Err(err("trailing characters in time part"));
            }
        }

        if !saw_component {
            return Err(err("duration has no components"));
        }
        if negative {
            total = -total;
        }
        let nanos = i64::try_from(total).map_err(|_| err("duration out of range"))?;
        Ok(Self {
            nanos,
            original: s.to_string(),
        })
    }

    pub fn nanos(&self) -> i64 {
        self.nanos
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// The same magnitude with the sign flipped.
    pub fn negated(&self) -> Self {
        Self {
            nanos: -self.nanos,
            original: flip_sign(&self.original),
        }
    }
}

fn flip_sign(original: &str) -> String {
    match original.strip_prefix('-') {
        Some(rest) => rest.to_string(),
        None => format!("-{}", original),
    }
}

fn parse_fraction_nanos(frac: &str) -> Option<u32> {
    if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: u32 = frac.parse().ok()?;
    Some(digits * 10u32.pow(9 - frac.len() as u32))
}

impl PartialEq for DayTimeDuration {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for DayTimeDuration {}

impl Ord for DayTimeDuration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl PartialOrd for DayTimeDuration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for DayTimeDuration {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

// ---------------------------------------------------------------------------
// YearMonthDuration — xs:yearMonthDuration, totally ordered by months
// ---------------------------------------------------------------------------

/// XSD yearMonthDuration: `[-]PnYnM`, stored as signed months.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YearMonthDuration {
    months: i32,
    original: String,
}

impl YearMonthDuration {
    pub fn parse(s: &str) -> ValueResult<Self> {
        let err = |reason: &str| ValueError::lexical("yearMonthDuration", s, reason.to_string());

        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut cursor = rest.strip_prefix('P').ok_or_else(|| err("missing 'P'"))?;
        if cursor.is_empty() {
            return Err(err("empty duration body"));
        }

        let mut months: i64 = 0;
        let mut saw_component = false;
        if let Some(pos) = cursor.find('Y') {
            let years: i64 = cursor[..pos].parse().map_err(|_| err("bad year count"))?;
            months += years * 12;
            cursor = &cursor[pos + 1..];
            saw_component = true;
        }
        if let Some(pos) = cursor.find('M') {
            let m: i64 = cursor[..pos].parse().map_err(|_| err("bad month count"))?;
            months += m;
            cursor = &cursor[pos + 1..];
            saw_component = true;
        }
        if !cursor.is_empty() {
            return Err(err("trailing characters"));
        }
        if !saw_component {
            return Err(err("duration has no components"));
        }
        if negative {
            months = -months;
        }
        let months = i32::try_from(months).map_err(|_| err("duration out of range"))?;
        Ok(Self {
            months,
            original: s.to_string(),
        })
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// The same magnitude with the sign flipped.
    pub fn negated(&self) -> Self {
        Self {
            months: -self.months,
            original: flip_sign(&self.original),
        }
    }
}

impl PartialEq for YearMonthDuration {
    fn eq(&self, other: &Self) -> bool {
        self.months == other.months
    }
}

impl Eq for YearMonthDuration {}

impl Ord for YearMonthDuration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.months.cmp(&other.months)
    }
}

impl PartialOrd for YearMonthDuration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for YearMonthDuration {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.months.hash(state);
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}
