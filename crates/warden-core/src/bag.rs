//! Bags: unordered multisets of attribute values of one dataType.
//!
//! Bags are never nested and the empty bag is a legal value. Element
//! equality is the XACML equality relation from [`crate::values`].

use serde::{Deserialize, Serialize};

use crate::error::{ValueError, ValueResult};
use crate::status::Status;
use crate::values::{AttributeValue, DataType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bag {
    data_type: DataType,
    values: Vec<AttributeValue>,
}

impl Bag {
    /// An empty bag of the given dataType.
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            values: Vec::new(),
        }
    }

    /// A bag holding exactly one value.
    pub fn of_one(value: AttributeValue) -> Self {
        Self {
            data_type: value.data_type(),
            values: vec![value],
        }
    }

    /// Build a bag from values, rejecting mixed dataTypes.
    pub fn from_values(
        data_type: DataType,
        values: impl IntoIterator<Item = AttributeValue>,
    ) -> ValueResult<Self> {
        let mut bag = Self::empty(data_type);
        for value in values {
            bag.push(value)?;
        }
        Ok(bag)
    }

    /// Append a value; the dataType must match.
    pub fn push(&mut self, value: AttributeValue) -> ValueResult<()> {
        if value.data_type() != self.data_type {
            return Err(ValueError::MixedBag {
                expected: self.data_type.local_name(),
                actual: value.data_type().local_name(),
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.iter()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// The single element of a one-element bag, or a processing error.
    pub fn one_and_only(&self) -> Result<&AttributeValue, Status> {
        if self.values.len() == 1 {
            Ok(&self.values[0])
        } else {
            Err(Status::processing_error(format!(
                "one-and-only requires a bag of size 1, got {}",
                self.values.len()
            )))
        }
    }

    /// Multiset union: all elements of both bags, duplicates kept.
    pub fn union(&self, other: &Bag) -> Bag {
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Bag {
            data_type: self.data_type,
            values,
        }
    }

    /// Multiset intersection: each element appears min(count_a, count_b) times.
    pub fn intersection(&self, other: &Bag) -> Bag {
        let mut remaining: Vec<&AttributeValue> = other.values.iter().collect();
        let mut values = Vec::new();
        for value in &self.values {
            if let Some(pos) = remaining.iter().position(|v| *v == value) {
                remaining.swap_remove(pos);
                values.push(value.clone());
            }
        }
        Bag {
            data_type: self.data_type,
            values,
        }
    }

    /// True when every distinct element of `self` occurs in `other`.
    pub fn subset_of(&self, other: &Bag) -> bool {
        self.values.iter().all(|v| other.contains(v))
    }

    /// Set equality: same distinct elements, multiplicity ignored.
    pub fn set_equals(&self, other: &Bag) -> bool {
        self.subset_of(other) && other.subset_of(self)
    }
}
