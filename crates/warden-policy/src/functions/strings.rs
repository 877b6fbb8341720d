//! String functions and regex matching.

use num_traits::ToPrimitive;
use regex::Regex;

use warden_core::eval::boolean;
use warden_core::{AttributeValue, DataType, EvalResult, Evaluated, Status};

use crate::functions::eval_util::{take1, take2, typed};

/// `string-normalize-space`: strip leading and trailing whitespace.
pub fn normalize_space(args: Vec<Evaluated>) -> EvalResult {
    let value = typed(take1(args)?, DataType::String)?;
    match value {
        AttributeValue::String(s) => Ok(Evaluated::Value(AttributeValue::String(
            s.trim().to_string(),
        ))),
        _ => Err(Status::processing_error("expected string")),
    }
}

/// `string-normalize-to-lower-case`.
pub fn normalize_to_lower_case(args: Vec<Evaluated>) -> EvalResult {
    let value = typed(take1(args)?, DataType::String)?;
    match value {
        AttributeValue::String(s) => Ok(Evaluated::Value(AttributeValue::String(s.to_lowercase()))),
        _ => Err(Status::processing_error("expected string")),
    }
}

/// `string-substring(s, begin, end)`: character indices, `end = -1` meaning
/// "to the end of the string". Out-of-range indices are processing errors.
pub fn substring(args: Vec<Evaluated>) -> EvalResult {
    let mut iter = args.into_iter();
    let (Some(s), Some(begin), Some(end), None) =
        (iter.next(), iter.next(), iter.next(), iter.next())
    else {
        return Err(Status::processing_error("substring expects three arguments"));
    };

    let s = match typed(s.into_value()?, DataType::String)? {
        AttributeValue::String(s) => s,
        _ => return Err(Status::processing_error("expected string")),
    };
    let begin = integer_index(begin)?;
    let end_raw = match end.into_value()? {
        AttributeValue::Integer(i) => i,
        _ => return Err(Status::processing_error("substring indices must be integers")),
    };

    let chars: Vec<char> = s.chars().collect();
    let end = if end_raw == num_bigint::BigInt::from(-1) {
        chars.len()
    } else {
        end_raw
            .to_usize()
            .ok_or_else(|| Status::processing_error("substring end index out of range"))?
    };

    if begin > end || end > chars.len() {
        return Err(Status::processing_error(format!(
            "substring range {}..{} out of bounds for length {}",
            begin,
            end,
            chars.len()
        )));
    }
    Ok(Evaluated::Value(AttributeValue::String(
        chars[begin..end].iter().collect(),
    )))
}

fn integer_index(value: Evaluated) -> Result<usize, Status> {
    match value.into_value()? {
        AttributeValue::Integer(i) => i
            .to_usize()
            .ok_or_else(|| Status::processing_error("substring index out of range")),
        _ => Err(Status::processing_error("substring indices must be integers")),
    }
}

/// `string-concatenate`: two or more strings.
pub fn concatenate(args: Vec<Evaluated>) -> EvalResult {
    let mut out = String::new();
    for arg in args {
        match typed(arg.into_value()?, DataType::String)? {
            AttributeValue::String(s) => out.push_str(&s),
            _ => return Err(Status::processing_error("expected string")),
        }
    }
    Ok(Evaluated::Value(AttributeValue::String(out)))
}

/// `{string,anyURI}-regexp-match(pattern, value)`: an unanchored
/// contains-match, per the XPath `fn:matches` semantics the standard
/// borrows. An invalid pattern is a processing error at evaluation time.
pub fn regexp_match(data_type: DataType, args: Vec<Evaluated>) -> EvalResult {
    let (pattern, value) = take2(args)?;
    let pattern = match typed(pattern, DataType::String)? {
        AttributeValue::String(p) => p,
        _ => return Err(Status::processing_error("regex pattern must be a string")),
    };
    let value = typed(value, data_type)?;
    let haystack = match &value {
        AttributeValue::String(s) => s.clone(),
        AttributeValue::AnyUri(u) => u.clone(),
        _ => return Err(Status::processing_error("regexp-match expects string or anyURI")),
    };

    let regex = Regex::new(&pattern)
        .map_err(|e| Status::processing_error(format!("invalid regular expression: {}", e)))?;
    boolean(regex.is_match(&haystack))
}
