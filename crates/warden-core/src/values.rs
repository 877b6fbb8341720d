//! Typed attribute values.
//!
//! Every XACML attribute value is a pair of a dataType URI and a typed
//! payload. Each dataType has exactly one canonical in-memory representation
//! and one equality relation:
//!
//! - integers are arbitrary-width (`BigInt`)
//! - doubles follow IEEE 754 (`NaN != NaN`; ordering against NaN is a
//!   processing error, surfaced as `None` from [`AttributeValue::try_cmp`])
//! - dateTime/date/time compare by instant (see [`crate::temporal`])
//! - anyURI compares character-for-character after reserved-character
//!   canonicalization
//! - hexBinary/base64Binary compare by decoded byte sequence

use num_bigint::BigInt;
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use crate::error::{ValueError, ValueResult};
use crate::temporal::{Date, DateTime, DayTimeDuration, Time, YearMonthDuration};

// ---------------------------------------------------------------------------
// DataType — the supported dataType URIs
// ---------------------------------------------------------------------------

/// The dataTypes this engine understands. Exhaustive: adding a type forces
/// compile-time review of every match site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Boolean,
    Integer,
    Double,
    DateTime,
    Date,
    Time,
    AnyUri,
    HexBinary,
    Base64Binary,
    DayTimeDuration,
    YearMonthDuration,
}

const XS: &str = "http://www.w3.org/2001/XMLSchema#";

impl DataType {
    /// All supported dataTypes, in declaration order.
    pub const ALL: [DataType; 12] = [
        DataType::String,
        DataType::Boolean,
        DataType::Integer,
        DataType::Double,
        DataType::DateTime,
        DataType::Date,
        DataType::Time,
        DataType::AnyUri,
        DataType::HexBinary,
        DataType::Base64Binary,
        DataType::DayTimeDuration,
        DataType::YearMonthDuration,
    ];

    /// Resolve a dataType URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let local = uri.strip_prefix(XS)?;
        match local {
            "string" => Some(DataType::String),
            "boolean" => Some(DataType::Boolean),
            "integer" => Some(DataType::Integer),
            "double" => Some(DataType::Double),
            "dateTime" => Some(DataType::DateTime),
            "date" => Some(DataType::Date),
            "time" => Some(DataType::Time),
            "anyURI" => Some(DataType::AnyUri),
            "hexBinary" => Some(DataType::HexBinary),
            "base64Binary" => Some(DataType::Base64Binary),
            "dayTimeDuration" => Some(DataType::DayTimeDuration),
            "yearMonthDuration" => Some(DataType::YearMonthDuration),
            _ => None,
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            DataType::String => "http://www.w3.org/2001/XMLSchema#string",
            DataType::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            DataType::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            DataType::Double => "http://www.w3.org/2001/XMLSchema#double",
            DataType::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            DataType::Date => "http://www.w3.org/2001/XMLSchema#date",
            DataType::Time => "http://www.w3.org/2001/XMLSchema#time",
            DataType::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            DataType::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            DataType::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            DataType::DayTimeDuration => "http://www.w3.org/2001/XMLSchema#dayTimeDuration",
            DataType::YearMonthDuration => "http://www.w3.org/2001/XMLSchema#yearMonthDuration",
        }
    }

    /// Short local name used in function URIs (`string-equal`, `anyURI-equal`, ...).
    pub fn local_name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Double => "double",
            DataType::DateTime => "dateTime",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::AnyUri => "anyURI",
            DataType::HexBinary => "hexBinary",
            DataType::Base64Binary => "base64Binary",
            DataType::DayTimeDuration => "dayTimeDuration",
            DataType::YearMonthDuration => "yearMonthDuration",
        }
    }

    /// Parse a lexical form into a typed value.
    pub fn parse(self, lexical: &str) -> ValueResult<AttributeValue> {
        match self {
            DataType::String => Ok(AttributeValue::String(lexical.to_string())),
            DataType::Boolean => match lexical {
                "true" | "1" => Ok(AttributeValue::Boolean(true)),
                "false" | "0" => Ok(AttributeValue::Boolean(false)),
                _ => Err(ValueError::lexical(
                    "boolean",
                    lexical,
                    "expected true/false/1/0",
                )),
            },
            DataType::Integer => BigInt::from_str(lexical)
                .map(AttributeValue::Integer)
                .map_err(|e| ValueError::lexical("integer", lexical, e.to_string())),
            DataType::Double => parse_double(lexical).map(AttributeValue::Double),
            DataType::DateTime => DateTime::parse(lexical).map(AttributeValue::DateTime),
            DataType::Date => Date::parse(lexical).map(AttributeValue::Date),
            DataType::Time => Time::parse(lexical).map(AttributeValue::Time),
            DataType::AnyUri => Ok(AttributeValue::AnyUri(canonicalize_uri(lexical))),
            DataType::HexBinary => hex::decode(lexical)
                .map(AttributeValue::HexBinary)
                .map_err(|e| ValueError::lexical("hexBinary", lexical, e.to_string())),
            DataType::Base64Binary => BASE64_STANDARD
                .decode(lexical.trim())
                .map(AttributeValue::Base64Binary)
                .map_err(|e| ValueError::lexical("base64Binary", lexical, e.to_string())),
            DataType::DayTimeDuration => {
                DayTimeDuration::parse(lexical).map(AttributeValue::DayTimeDuration)
            }
            DataType::YearMonthDuration => {
                YearMonthDuration::parse(lexical).map(AttributeValue::YearMonthDuration)
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local_name())
    }
}

/// XSD double lexical forms include INF/-INF/NaN, which Rust's `from_str`
/// spells differently.
fn parse_double(lexical: &str) -> ValueResult<f64> {
    match lexical {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other
            .parse::<f64>()
            .map_err(|e| ValueError::lexical("double", other, e.to_string())),
    }
}

/// Reserved-character canonicalization for anyURI: percent-escapes get
/// uppercase hex, and escaped unreserved characters are decoded.
fn canonicalize_uri(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = String::with_capacity(uri.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                let decoded = (hi * 16 + lo) as u8;
                if decoded.is_ascii_alphanumeric() || matches!(decoded, b'-' | b'.' | b'_' | b'~') {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(char::from_digit(hi, 16).unwrap_or('0').to_ascii_uppercase());
                    out.push(char::from_digit(lo, 16).unwrap_or('0').to_ascii_uppercase());
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// AttributeValue — one canonical representation per dataType
// ---------------------------------------------------------------------------

/// A typed attribute value. Derived equality is the XACML equality relation:
/// cross-type comparisons are false, doubles follow IEEE 754 (`NaN != NaN`),
/// and the temporal types compare by instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(BigInt),
    Double(f64),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    AnyUri(String),
    HexBinary(Vec<u8>),
    Base64Binary(Vec<u8>),
    DayTimeDuration(DayTimeDuration),
    YearMonthDuration(YearMonthDuration),
}

impl AttributeValue {
    pub fn data_type(&self) -> DataType {
        match self {
            AttributeValue::String(_) => DataType::String,
            AttributeValue::Boolean(_) => DataType::Boolean,
            AttributeValue::Integer(_) => DataType::Integer,
            AttributeValue::Double(_) => DataType::Double,
            AttributeValue::DateTime(_) => DataType::DateTime,
            AttributeValue::Date(_) => DataType::Date,
            AttributeValue::Time(_) => DataType::Time,
            AttributeValue::AnyUri(_) => DataType::AnyUri,
            AttributeValue::HexBinary(_) => DataType::HexBinary,
            AttributeValue::Base64Binary(_) => DataType::Base64Binary,
            AttributeValue::DayTimeDuration(_) => DataType::DayTimeDuration,
            AttributeValue::YearMonthDuration(_) => DataType::YearMonthDuration,
        }
    }

    /// Serialization form. Temporal types keep their original lexical form;
    /// the rest render canonically.
    pub fn lexical(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Boolean(b) => b.to_string(),
            AttributeValue::Integer(i) => i.to_string(),
            AttributeValue::Double(d) => {
                if d.is_nan() {
                    "NaN".to_string()
                } else if d.is_infinite() {
                    if *d > 0.0 { "INF" } else { "-INF" }.to_string()
                } else {
                    d.to_string()
                }
            }
            AttributeValue::DateTime(dt) => dt.original().to_string(),
            AttributeValue::Date(d) => d.original().to_string(),
            AttributeValue::Time(t) => t.original().to_string(),
            AttributeValue::AnyUri(u) => u.clone(),
            AttributeValue::HexBinary(bytes) => hex::encode_upper(bytes),
            AttributeValue::Base64Binary(bytes) => BASE64_STANDARD.encode(bytes),
            AttributeValue::DayTimeDuration(d) => d.original().to_string(),
            AttributeValue::YearMonthDuration(d) => d.original().to_string(),
        }
    }

    /// Convenience constructors for the common cases.
    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn integer(i: i64) -> Self {
        AttributeValue::Integer(BigInt::from(i))
    }

    /// Ordering, where the dataType defines one.
    ///
    /// `None` means the pair is not orderable: different dataTypes, a
    /// non-orderable type (boolean, binary), or a NaN operand. Callers turn
    /// `None` into `Indeterminate(processing-error)`.
    ///
    /// `default_tz` (seconds east of UTC) applies to date/time values that
    /// carry no timezone designator.
    pub fn try_cmp(&self, other: &Self, default_tz: chrono::FixedOffset) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => Some(a.cmp(b)),
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => Some(a.cmp(b)),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.partial_cmp(b),
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => Some(a.cmp(b)),
            (AttributeValue::Date(a), AttributeValue::Date(b)) => {
                Some(a.cmp_with_default(b, default_tz))
            }
            (AttributeValue::Time(a), AttributeValue::Time(b)) => {
                Some(a.cmp_with_default(b, default_tz))
            }
            (AttributeValue::DayTimeDuration(a), AttributeValue::DayTimeDuration(b)) => {
                Some(a.cmp(b))
            }
            (AttributeValue::YearMonthDuration(a), AttributeValue::YearMonthDuration(b)) => {
                Some(a.cmp(b))
            }
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            AttributeValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Absolute value for the numeric types.
    pub fn abs(&self) -> Option<AttributeValue> {
        match self {
            AttributeValue::Integer(i) => Some(AttributeValue::Integer(i.abs())),
            AttributeValue::Double(d) => Some(AttributeValue::Double(d.abs())),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::utc_offset;

    #[test]
    fn test_data_type_uri_roundtrip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_uri(dt.uri()), Some(dt));
        }
    }

    #[test]
    fn test_data_type_unknown_uri() {
        assert_eq!(DataType::from_uri("http://example.com/unknown"), None);
        assert_eq!(
            DataType::from_uri("http://www.w3.org/2001/XMLSchema#gYear"),
            None
        );
    }

    #[test]
    fn test_parse_boolean_forms() {
        assert_eq!(
            DataType::Boolean.parse("true").unwrap(),
            AttributeValue::Boolean(true)
        );
        assert_eq!(
            DataType::Boolean.parse("0").unwrap(),
            AttributeValue::Boolean(false)
        );
        assert!(DataType::Boolean.parse("truee").is_err());
    }

    #[test]
    fn test_parse_integer_arbitrary_width() {
        let v = DataType::Integer
            .parse("123456789012345678901234567890")
            .unwrap();
        assert_eq!(v.lexical(), "123456789012345678901234567890");
    }

    #[test]
    fn test_parse_integer_signed() {
        assert_eq!(
            DataType::Integer.parse("-42").unwrap(),
            AttributeValue::integer(-42)
        );
        assert_eq!(
            DataType::Integer.parse("+7").unwrap(),
            AttributeValue::integer(7)
        );
    }

    #[test]
    fn test_parse_double_xsd_forms() {
        assert_eq!(
            DataType::Double.parse("INF").unwrap(),
            AttributeValue::Double(f64::INFINITY)
        );
        assert_eq!(
            DataType::Double.parse("-INF").unwrap(),
            AttributeValue::Double(f64::NEG_INFINITY)
        );
        let nan = DataType::Double.parse("NaN").unwrap();
        assert!(matches!(nan, AttributeValue::Double(d) if d.is_nan()));
    }

    #[test]
    fn test_nan_not_equal_to_itself() {
        let a = DataType::Double.parse("NaN").unwrap();
        let b = DataType::Double.parse("NaN").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_nan_ordering_is_an_error() {
        let a = DataType::Double.parse("NaN").unwrap();
        let b = DataType::Double.parse("1.0").unwrap();
        assert_eq!(a.try_cmp(&b, utc_offset()), None);
    }

    #[test]
    fn test_cross_type_equality_is_false() {
        let s = AttributeValue::string("1");
        let i = AttributeValue::integer(1);
        assert_ne!(s, i);
        assert_eq!(s.try_cmp(&i, utc_offset()), None);
    }

    #[test]
    fn test_any_uri_canonicalization() {
        // %7e is an escaped '~' (unreserved): decoded. %2F stays escaped,
        // with uppercase hex.
        let a = DataType::AnyUri.parse("http://ex.org/%7eme%2fdocs").unwrap();
        let b = DataType::AnyUri.parse("http://ex.org/~me%2Fdocs").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hex_binary_case_insensitive_equality() {
        let a = DataType::HexBinary.parse("0afb").unwrap();
        let b = DataType::HexBinary.parse("0AFB").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lexical(), "0AFB");
    }

    #[test]
    fn test_base64_binary_decoded_equality() {
        let a = DataType::Base64Binary.parse("aGVsbG8=").unwrap();
        assert_eq!(a, AttributeValue::Base64Binary(b"hello".to_vec()));
    }

    #[test]
    fn test_datetime_equality_across_offsets() {
        let a = DataType::DateTime.parse("2024-01-01T05:00:00Z").unwrap();
        let b = DataType::DateTime
            .parse("2024-01-01T00:00:00-05:00")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_datetime_without_timezone_is_syntax_error() {
        let err = DataType::DateTime.parse("2025-06-15T12:00:00").unwrap_err();
        assert!(matches!(err, ValueError::MissingTimezone(_)));
    }

    #[test]
    fn test_string_ordering() {
        let a = AttributeValue::string("alpha");
        let b = AttributeValue::string("beta");
        assert_eq!(a.try_cmp(&b, utc_offset()), Some(Ordering::Less));
    }

    #[test]
    fn test_boolean_not_orderable() {
        let a = AttributeValue::Boolean(true);
        let b = AttributeValue::Boolean(false);
        assert_eq!(a.try_cmp(&b, utc_offset()), None);
    }

    #[test]
    fn test_abs() {
        assert_eq!(
            AttributeValue::integer(-5).abs(),
            Some(AttributeValue::integer(5))
        );
        assert_eq!(
            AttributeValue::Double(-2.5).abs(),
            Some(AttributeValue::Double(2.5))
        );
        assert_eq!(AttributeValue::string("x").abs(), None);
    }

    #[test]
    fn test_attribute_value_serde_roundtrip() {
        let v = DataType::DateTime.parse("2026-12-31T23:59:59Z").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let restored: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, restored);
    }
}
