//! Equality and comparison over single values.

use chrono::FixedOffset;
use std::cmp::Ordering;

use warden_core::{DataType, EvalResult, Evaluated, Status};

use super::CmpOp;
use crate::functions::eval_util::{take2, typed};

/// `{type}-equal`: both operands single values of the function's dataType.
pub fn equal(data_type: DataType, args: Vec<Evaluated>) -> EvalResult {
    let (a, b) = take2(args)?;
    let a = typed(a, data_type)?;
    let b = typed(b, data_type)?;
    warden_core::eval::boolean(a == b)
}

/// `{type}-greater-than` and friends. Ordering against NaN (or any pair the
/// dataType does not order) is a processing error.
pub fn compare(
    data_type: DataType,
    op: CmpOp,
    args: Vec<Evaluated>,
    default_tz: FixedOffset,
) -> EvalResult {
    let (a, b) = take2(args)?;
    let a = typed(a, data_type)?;
    let b = typed(b, data_type)?;
    let ordering = a.try_cmp(&b, default_tz).ok_or_else(|| {
        Status::processing_error(format!(
            "values of type {} are not comparable here",
            data_type.local_name()
        ))
    })?;
    let outcome = match op {
        CmpOp::GreaterThan => ordering == Ordering::Greater,
        CmpOp::GreaterThanOrEqual => ordering != Ordering::Less,
        CmpOp::LessThan => ordering == Ordering::Less,
        CmpOp::LessThanOrEqual => ordering != Ordering::Greater,
    };
    warden_core::eval::boolean(outcome)
}
