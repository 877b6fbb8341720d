//! The engine-wide evaluation result type.
//!
//! Every expression evaluates to `Ok(Evaluated)` or `Err(Status)` — an
//! `Indeterminate` is a value carrying structured detail, never a panic or a
//! thrown error. This is what makes the short-circuit semantics of
//! `and`/`or`/`n-of` and the combining-algorithm escalation rules
//! expressible as ordinary control flow.

use crate::bag::Bag;
use crate::status::Status;
use crate::values::{AttributeValue, DataType};

/// A successfully evaluated expression: a single value or a bag.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Value(AttributeValue),
    Bag(Bag),
}

/// `Ok` carries a value or bag; `Err` is Indeterminate with its Status.
pub type EvalResult = Result<Evaluated, Status>;

impl Evaluated {
    pub fn is_bag(&self) -> bool {
        matches!(self, Evaluated::Bag(_))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Evaluated::Value(v) => v.data_type(),
            Evaluated::Bag(b) => b.data_type(),
        }
    }

    /// Unwrap a single value, or a processing error for a bag operand.
    pub fn into_value(self) -> Result<AttributeValue, Status> {
        match self {
            Evaluated::Value(v) => Ok(v),
            Evaluated::Bag(_) => Err(Status::processing_error(
                "expected a single value, got a bag",
            )),
        }
    }

    /// Unwrap a bag, or a processing error for a single-value operand.
    pub fn into_bag(self) -> Result<Bag, Status> {
        match self {
            Evaluated::Bag(b) => Ok(b),
            Evaluated::Value(_) => Err(Status::processing_error("expected a bag, got a value")),
        }
    }

    /// Unwrap a boolean value.
    pub fn into_boolean(self) -> Result<bool, Status> {
        match self.into_value()? {
            AttributeValue::Boolean(b) => Ok(b),
            other => Err(Status::processing_error(format!(
                "expected boolean, got {}",
                other.data_type().local_name()
            ))),
        }
    }
}

impl From<AttributeValue> for Evaluated {
    fn from(value: AttributeValue) -> Self {
        Evaluated::Value(value)
    }
}

impl From<Bag> for Evaluated {
    fn from(bag: Bag) -> Self {
        Evaluated::Bag(bag)
    }
}

/// Shorthand for a boolean result.
pub fn boolean(b: bool) -> EvalResult {
    Ok(Evaluated::Value(AttributeValue::Boolean(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_boolean() {
        assert!(boolean(true).unwrap().into_boolean().unwrap());
        let not_bool = Evaluated::Value(AttributeValue::string("x"));
        assert!(not_bool.into_boolean().is_err());
    }

    #[test]
    fn test_into_value_rejects_bag() {
        let bag = Evaluated::Bag(Bag::empty(DataType::String));
        assert!(bag.into_value().is_err());
    }

    #[test]
    fn test_into_bag_rejects_value() {
        let value = Evaluated::Value(AttributeValue::integer(1));
        assert!(value.into_bag().is_err());
    }

    #[test]
    fn test_data_type() {
        let value = Evaluated::Value(AttributeValue::integer(1));
        assert_eq!(value.data_type(), DataType::Integer);
        let bag = Evaluated::Bag(Bag::empty(DataType::Double));
        assert_eq!(bag.data_type(), DataType::Double);
        assert!(bag.is_bag());
    }
}
