//! Small shared helpers for strict function implementations.

use warden_core::{AttributeValue, Bag, DataType, Evaluated, Status};

/// Unwrap exactly one single-value argument.
pub(crate) fn take1(args: Vec<Evaluated>) -> Result<AttributeValue, Status> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next()) {
        (Some(a), None) => a.into_value(),
        _ => Err(Status::processing_error("expected exactly one argument")),
    }
}

/// Unwrap exactly two single-value arguments.
pub(crate) fn take2(args: Vec<Evaluated>) -> Result<(AttributeValue, AttributeValue), Status> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(a), Some(b), None) => Ok((a.into_value()?, b.into_value()?)),
        _ => Err(Status::processing_error("expected exactly two arguments")),
    }
}

/// Unwrap exactly one bag argument.
pub(crate) fn take1_bag(args: Vec<Evaluated>) -> Result<Bag, Status> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next()) {
        (Some(a), None) => a.into_bag(),
        _ => Err(Status::processing_error("expected exactly one argument")),
    }
}

/// Unwrap exactly two bag arguments.
pub(crate) fn take2_bags(args: Vec<Evaluated>) -> Result<(Bag, Bag), Status> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(a), Some(b), None) => Ok((a.into_bag()?, b.into_bag()?)),
        _ => Err(Status::processing_error("expected exactly two arguments")),
    }
}

/// Enforce an argument's dataType at runtime. Static checks catch most
/// mismatches at load; bags and variables can still smuggle a wrong type in.
pub(crate) fn typed(value: AttributeValue, expected: DataType) -> Result<AttributeValue, Status> {
    if value.data_type() == expected {
        Ok(value)
    } else {
        Err(Status::processing_error(format!(
            "expected {} argument, got {}",
            expected.local_name(),
            value.data_type().local_name()
        )))
    }
}

/// Enforce a bag's element dataType.
pub(crate) fn typed_bag(bag: Bag, expected: DataType) -> Result<Bag, Status> {
    if bag.data_type() == expected {
        Ok(bag)
    } else {
        Err(Status::processing_error(format!(
            "expected a bag of {}, got a bag of {}",
            expected.local_name(),
            bag.data_type().local_name()
        )))
    }
}
