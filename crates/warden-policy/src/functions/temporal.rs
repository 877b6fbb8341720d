//! Duration arithmetic over dateTime and date.

use warden_core::{AttributeValue, EvalResult, Evaluated, Status};

use super::TemporalOp;
use crate::functions::eval_util::take2;

pub fn invoke(op: TemporalOp, args: Vec<Evaluated>) -> EvalResult {
    let (base, duration) = take2(args)?;
    let result = match op {
        TemporalOp::DateTimeAddDayTime | TemporalOp::DateTimeSubtractDayTime => {
            let (AttributeValue::DateTime(dt), AttributeValue::DayTimeDuration(d)) =
                (&base, &duration)
            else {
                return Err(Status::processing_error(
                    "expected (dateTime, dayTimeDuration) arguments",
                ));
            };
            let d = if matches!(op, TemporalOp::DateTimeSubtractDayTime) {
                d.negated()
            } else {
                d.clone()
            };
            AttributeValue::DateTime(dt.add_day_time(&d).map_err(Status::from)?)
        }
        TemporalOp::DateTimeAddYearMonth | TemporalOp::DateTimeSubtractYearMonth => {
            let (AttributeValue::DateTime(dt), AttributeValue::YearMonthDuration(d)) =
                (&base, &duration)
            else {
                return Err(Status::processing_error(
                    "expected (dateTime, yearMonthDuration) arguments",
                ));
            };
            let d = if matches!(op, TemporalOp::DateTimeSubtractYearMonth) {
                d.negated()
            } else {
                d.clone()
            };
            AttributeValue::DateTime(dt.add_year_month(&d).map_err(Status::from)?)
        }
        TemporalOp::DateAddYearMonth | TemporalOp::DateSubtractYearMonth => {
            let (AttributeValue::Date(date), AttributeValue::YearMonthDuration(d)) =
                (&base, &duration)
            else {
                return Err(Status::processing_error(
                    "expected (date, yearMonthDuration) arguments",
                ));
            };
            let d = if matches!(op, TemporalOp::DateSubtractYearMonth) {
                d.negated()
            } else {
                d.clone()
            };
            AttributeValue::Date(date.add_year_month(&d).map_err(Status::from)?)
        }
    };
    Ok(Evaluated::Value(result))
}
