use thiserror::Error;

/// Single error enum for value parsing and bag construction.
///
/// These are *load-time* errors: a literal in a policy that fails to parse
/// aborts policy load, and a request attribute that fails to parse surfaces
/// as an `Indeterminate(syntax-error)` at the PDP boundary. Runtime
/// evaluation never raises `ValueError` past an expression; it is converted
/// to a [`crate::Status`] instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("unknown data type URI: {0}")]
    UnknownDataType(String),

    #[error("cannot parse '{lexical}' as {data_type}: {reason}")]
    Lexical {
        data_type: &'static str,
        lexical: String,
        reason: String,
    },

    #[error("dateTime '{0}' is missing a timezone designator (Z or +/-HH:MM)")]
    MissingTimezone(String),

    #[error("bag of {expected} cannot hold a {actual} value")]
    MixedBag {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("temporal arithmetic out of range: {0}")]
    TemporalOverflow(String),
}

impl ValueError {
    /// Convenience constructor for lexical parse failures.
    pub fn lexical(data_type: &'static str, lexical: &str, reason: impl Into<String>) -> Self {
        ValueError::Lexical {
            data_type,
            lexical: lexical.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ValueResult<T> = Result<T, ValueError>;
