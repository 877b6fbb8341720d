//! Logical functions.
//!
//! `and`, `or`, and `n-of` evaluate their arguments lazily and MUST NOT
//! report `Indeterminate` once a determining value has been seen:
//! `and(false, Indeterminate)` is `false`, `or(true, Indeterminate)` is
//! `true`. Only when the outcome still depends on an undecidable argument
//! does the Indeterminate win.

use num_traits::ToPrimitive;

use warden_core::eval::boolean;
use warden_core::{EvalResult, Evaluated, Status};

use crate::context::EvaluationContext;
use crate::expr::Expression;
use crate::functions::eval_util::take1;

/// `not`: strict boolean negation.
pub fn not(args: Vec<Evaluated>) -> EvalResult {
    let value = take1(args)?;
    match value.as_boolean() {
        Some(b) => boolean(!b),
        None => Err(Status::processing_error("not expects a boolean argument")),
    }
}

/// `and`: false short-circuits; an empty argument list is true.
pub fn and(args: &[Expression], ctx: &EvaluationContext) -> EvalResult {
    let mut pending: Option<Status> = None;
    for arg in args {
        match arg.evaluate(ctx).and_then(Evaluated::into_boolean) {
            Ok(false) => return boolean(false),
            Ok(true) => {}
            Err(status) => pending = Some(pending.take().unwrap_or(status)),
        }
    }
    match pending {
        Some(status) => Err(status),
        None => boolean(true),
    }
}

/// `or`: true short-circuits; an empty argument list is false.
pub fn or(args: &[Expression], ctx: &EvaluationContext) -> EvalResult {
    let mut pending: Option<Status> = None;
    for arg in args {
        match arg.evaluate(ctx).and_then(Evaluated::into_boolean) {
            Ok(true) => return boolean(true),
            Ok(false) => {}
            Err(status) => pending = Some(pending.take().unwrap_or(status)),
        }
    }
    match pending {
        Some(status) => Err(status),
        None => boolean(false),
    }
}

/// `n-of`: the first argument is the required count n; true once n of the
/// remaining arguments are true, false once more than (len - n) are false.
pub fn n_of(args: &[Expression], ctx: &EvaluationContext) -> EvalResult {
    let Some((first, rest)) = args.split_first() else {
        return Err(Status::processing_error("n-of requires a count argument"));
    };

    let n = match first.evaluate(ctx)?.into_value()? {
        warden_core::AttributeValue::Integer(i) => i.to_usize().ok_or_else(|| {
            Status::processing_error("n-of count out of range")
        })?,
        _ => {
            return Err(Status::processing_error(
                "n-of count must be an integer",
            ))
        }
    };

    if n == 0 {
        return boolean(true);
    }
    if n > rest.len() {
        return Err(Status::processing_error(format!(
            "n-of asks for {} of {} arguments",
            n,
            rest.len()
        )));
    }

    let mut trues = 0usize;
    let mut indeterminates = 0usize;
    let mut remaining = rest.len();
    let mut pending: Option<Status> = None;

    for arg in rest {
        remaining -= 1;
        match arg.evaluate(ctx).and_then(Evaluated::into_boolean) {
            Ok(true) => {
                trues += 1;
                if trues >= n {
                    return boolean(true);
                }
            }
            Ok(false) => {}
            Err(status) => {
                indeterminates += 1;
                pending = Some(pending.take().unwrap_or(status));
            }
        }
        // n is out of reach even if every undecided argument were true.
        if trues + indeterminates + remaining < n {
            return boolean(false);
        }
    }

    // Not enough trues; the outcome hinged on at least one Indeterminate.
    match pending {
        Some(status) => Err(status),
        None => boolean(false),
    }
}
