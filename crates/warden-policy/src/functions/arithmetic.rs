//! Integer and double arithmetic.
//!
//! `add` and `multiply` are n-ary (two or more); `subtract`, `divide`, and
//! `mod` are binary; `abs` is unary. Division by zero and integer mod by
//! zero are processing errors, not panics.

use num_bigint::BigInt;
use num_traits::Zero;

use warden_core::{AttributeValue, DataType, EvalResult, Evaluated, Status};

use super::ArithOp;
use crate::functions::eval_util::typed;

pub fn invoke(data_type: DataType, op: ArithOp, args: Vec<Evaluated>) -> EvalResult {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(typed(arg.into_value()?, data_type)?);
    }

    match data_type {
        DataType::Integer => integer_op(op, values),
        DataType::Double => double_op(op, values),
        other => Err(Status::processing_error(format!(
            "no arithmetic over {}",
            other.local_name()
        ))),
    }
}

fn integers(values: Vec<AttributeValue>) -> Result<Vec<BigInt>, Status> {
    values
        .into_iter()
        .map(|v| match v {
            AttributeValue::Integer(i) => Ok(i),
            _ => Err(Status::processing_error("expected integer operand")),
        })
        .collect()
}

fn integer_op(op: ArithOp, values: Vec<AttributeValue>) -> EvalResult {
    let mut values = integers(values)?.into_iter();
    let first = values
        .next()
        .ok_or_else(|| Status::processing_error("arithmetic needs at least one operand"))?;

    let result = match op {
        ArithOp::Add => values.fold(first, |acc, v| acc + v),
        ArithOp::Multiply => values.fold(first, |acc, v| acc * v),
        ArithOp::Subtract => {
            let second = values
                .next()
                .ok_or_else(|| Status::processing_error("subtract needs two operands"))?;
            first - second
        }
        ArithOp::Divide => {
            let second = values
                .next()
                .ok_or_else(|| Status::processing_error("divide needs two operands"))?;
            if second.is_zero() {
                return Err(Status::processing_error("integer division by zero"));
            }
            first / second
        }
        ArithOp::Mod => {
            let second = values
                .next()
                .ok_or_else(|| Status::processing_error("mod needs two operands"))?;
            if second.is_zero() {
                return Err(Status::processing_error("integer mod by zero"));
            }
            first % second
        }
        ArithOp::Abs => {
            use num_traits::Signed;
            first.abs()
        }
    };
    Ok(Evaluated::Value(AttributeValue::Integer(result)))
}

fn doubles(values: Vec<AttributeValue>) -> Result<Vec<f64>, Status> {
    values
        .into_iter()
        .map(|v| match v {
            AttributeValue::Double(d) => Ok(d),
            _ => Err(Status::processing_error("expected double operand")),
        })
        .collect()
}

fn double_op(op: ArithOp, values: Vec<AttributeValue>) -> EvalResult {
    let mut values = doubles(values)?.into_iter();
    let first = values
        .next()
        .ok_or_else(|| Status::processing_error("arithmetic needs at least one operand"))?;

    let result = match op {
        ArithOp::Add => values.fold(first, |acc, v| acc + v),
        ArithOp::Multiply => values.fold(first, |acc, v| acc * v),
        ArithOp::Subtract => {
            let second = values
                .next()
                .ok_or_else(|| Status::processing_error("subtract needs two operands"))?;
            first - second
        }
        ArithOp::Divide => {
            let second = values
                .next()
                .ok_or_else(|| Status::processing_error("divide needs two operands"))?;
            if second == 0.0 {
                return Err(Status::processing_error("division by zero"));
            }
            first / second
        }
        ArithOp::Mod => return Err(Status::processing_error("mod is integer-only")),
        ArithOp::Abs => first.abs(),
    };
    Ok(Evaluated::Value(AttributeValue::Double(result)))
}
