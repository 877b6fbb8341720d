//! The per-type bag function family.

use warden_core::eval::boolean;
use warden_core::{AttributeValue, Bag, DataType, EvalResult, Evaluated, Status};

use super::BagOp;
use crate::functions::eval_util::{take1_bag, take2_bags, typed, typed_bag};

pub fn invoke(data_type: DataType, op: BagOp, args: Vec<Evaluated>) -> EvalResult {
    match op {
        BagOp::Construct => {
            let mut bag = Bag::empty(data_type);
            for arg in args {
                let value = typed(arg.into_value()?, data_type)?;
                bag.push(value).map_err(Status::from)?;
            }
            Ok(Evaluated::Bag(bag))
        }
        BagOp::Size => {
            let bag = typed_bag(take1_bag(args)?, data_type)?;
            Ok(Evaluated::Value(AttributeValue::integer(bag.size() as i64)))
        }
        BagOp::OneAndOnly => {
            let bag = typed_bag(take1_bag(args)?, data_type)?;
            bag.one_and_only().map(|v| Evaluated::Value(v.clone()))
        }
        BagOp::IsIn => {
            let mut iter = args.into_iter();
            match (iter.next(), iter.next(), iter.next()) {
                (Some(value), Some(bag), None) => {
                    let value = typed(value.into_value()?, data_type)?;
                    let bag = typed_bag(bag.into_bag()?, data_type)?;
                    boolean(bag.contains(&value))
                }
                _ => Err(Status::processing_error("is-in expects a value and a bag")),
            }
        }
        BagOp::Intersection => {
            let (a, b) = take2_bags(args)?;
            let a = typed_bag(a, data_type)?;
            let b = typed_bag(b, data_type)?;
            Ok(Evaluated::Bag(a.intersection(&b)))
        }
        BagOp::Union => {
            let (a, b) = take2_bags(args)?;
            let a = typed_bag(a, data_type)?;
            let b = typed_bag(b, data_type)?;
            Ok(Evaluated::Bag(a.union(&b)))
        }
        BagOp::Subset => {
            let (a, b) = take2_bags(args)?;
            let a = typed_bag(a, data_type)?;
            let b = typed_bag(b, data_type)?;
            boolean(a.subset_of(&b))
        }
        BagOp::SetEquals => {
            let (a, b) = take2_bags(args)?;
            let a = typed_bag(a, data_type)?;
            let b = typed_bag(b, data_type)?;
            boolean(a.set_equals(&b))
        }
    }
}
