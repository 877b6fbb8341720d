//! Higher-order bag functions.
//!
//! The first argument is a function reference resolved at load; the
//! remaining arguments supply the values and bags the iteration draws from.
//! Supported shapes:
//!
//! - `any-of(f, value, bag)` / `all-of(f, value, bag)`
//! - `any-of-any(f, bag, bag)` — some pair matches
//! - `all-of-any(f, bag, bag)` — every x has some matching y
//! - `any-of-all(f, bag, bag)` — some x matches every y
//! - `all-of-all(f, bag, bag)` — every pair matches
//! - `map(f, bag)` — f applied elementwise, producing a bag
//!
//! An application that is `Indeterminate` only decides the result when no
//! determining element was found, mirroring `or`/`and`.

use warden_core::eval::boolean;
use warden_core::{AttributeValue, Bag, EvalResult, Evaluated, Status};

use super::{Function, HigherOrderOp};
use crate::context::EvaluationContext;
use crate::expr::Expression;

pub fn apply(op: HigherOrderOp, args: &[Expression], ctx: &EvaluationContext) -> EvalResult {
    let Some(Expression::FunctionReference(function)) = args.first() else {
        return Err(Status::processing_error(
            "higher-order function requires a function reference first",
        ));
    };

    match op {
        HigherOrderOp::AnyOf => {
            let value = args[1].evaluate(ctx)?.into_value()?;
            let bag = args[2].evaluate(ctx)?.into_bag()?;
            exists(function, ctx, bag.iter().map(|e| (value.clone(), e.clone())))
        }
        HigherOrderOp::AllOf => {
            let value = args[1].evaluate(ctx)?.into_value()?;
            let bag = args[2].evaluate(ctx)?.into_bag()?;
            forall(function, ctx, bag.iter().map(|e| (value.clone(), e.clone())))
        }
        HigherOrderOp::AnyOfAny => {
            let (a, b) = two_bags(args, ctx)?;
            exists(function, ctx, pairs(&a, &b))
        }
        HigherOrderOp::AllOfAll => {
            let (a, b) = two_bags(args, ctx)?;
            forall(function, ctx, pairs(&a, &b))
        }
        HigherOrderOp::AllOfAny => {
            let (a, b) = two_bags(args, ctx)?;
            // every x in a matches some y in b
            nested(function, ctx, &a, &b, Quantifier::ForAll, Quantifier::Exists)
        }
        HigherOrderOp::AnyOfAll => {
            let (a, b) = two_bags(args, ctx)?;
            // some x in a matches every y in b
            nested(function, ctx, &a, &b, Quantifier::Exists, Quantifier::ForAll)
        }
        HigherOrderOp::Map => {
            let bag = args[1].evaluate(ctx)?.into_bag()?;
            map(function, ctx, &bag)
        }
    }
}

fn two_bags(args: &[Expression], ctx: &EvaluationContext) -> Result<(Bag, Bag), Status> {
    let a = args[1].evaluate(ctx)?.into_bag()?;
    let b = args[2].evaluate(ctx)?.into_bag()?;
    Ok((a, b))
}

fn pairs<'b>(
    a: &'b Bag,
    b: &'b Bag,
) -> impl Iterator<Item = (AttributeValue, AttributeValue)> + 'b {
    a.iter()
        .flat_map(move |x| b.iter().map(move |y| (x.clone(), y.clone())))
}

fn call2(
    function: &Function,
    ctx: &EvaluationContext,
    a: AttributeValue,
    b: AttributeValue,
) -> Result<bool, Status> {
    super::invoke(
        function,
        vec![Evaluated::Value(a), Evaluated::Value(b)],
        ctx,
    )?
    .into_boolean()
}

/// OR over applications: any true wins; else a pending Indeterminate; else
/// false.
fn exists(
    function: &Function,
    ctx: &EvaluationContext,
    items: impl Iterator<Item = (AttributeValue, AttributeValue)>,
) -> EvalResult {
    let mut pending: Option<Status> = None;
    for (a, b) in items {
        match call2(function, ctx, a, b) {
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

/// AND over applications: any false wins; else a pending Indeterminate;
/// else true (vacuously for the empty iteration).
fn forall(
    function: &Function,
    ctx: &EvaluationContext,
    items: impl Iterator<Item = (AttributeValue, AttributeValue)>,
) -> EvalResult {
    let mut pending: Option<Status> = None;
    for (a, b) in items {
        match call2(function, ctx, a, b) {
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

#[derive(Clone, Copy)]
enum Quantifier {
    Exists,
    ForAll,
}

/// Two-level iteration for `all-of-any` / `any-of-all`.
fn nested(
    function: &Function,
    ctx: &EvaluationContext,
    a: &Bag,
    b: &Bag,
    outer: Quantifier,
    inner: Quantifier,
) -> EvalResult {
    let mut pending: Option<Status> = None;
    for x in a.iter() {
        let inner_result = match inner {
            Quantifier::Exists => exists(
                function,
                ctx,
                b.iter().map(|y| (x.clone(), y.clone())),
            ),
            Quantifier::ForAll => forall(
                function,
                ctx,
                b.iter().map(|y| (x.clone(), y.clone())),
            ),
        };
        match (outer, inner_result.and_then(Evaluated::into_boolean)) {
            (Quantifier::ForAll, Ok(false)) => return boolean(false),
            (Quantifier::Exists, Ok(true)) => return boolean(true),
            (_, Ok(_)) => {}
            (_, Err(status)) => pending = Some(pending.take().unwrap_or(status)),
        }
    }
    match (pending, outer) {
        (Some(status), _) => Err(status),
        (None, Quantifier::ForAll) => boolean(true),
        (None, Quantifier::Exists) => boolean(false),
    }
}

/// `map`: the referenced function must be unary; the result is a bag of the
/// produced values.
fn map(function: &Function, ctx: &EvaluationContext, bag: &Bag) -> EvalResult {
    let mut out: Option<Bag> = None;
    for item in bag.iter() {
        let produced = super::invoke(function, vec![Evaluated::Value(item.clone())], ctx)?
            .into_value()?;
        let out = out.get_or_insert_with(|| Bag::empty(produced.data_type()));
        out.push(produced).map_err(Status::from)?;
    }
    let result = out.unwrap_or_else(|| {
        Bag::empty(function.return_type().unwrap_or(bag.data_type()))
    });
    Ok(Evaluated::Bag(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{DataType, Request};

    use crate::context::AttributeSource;
    use crate::policy::NoReferences;

    fn with_ctx<R>(f: impl FnOnce(&EvaluationContext) -> R) -> R {
        let request = Request::default();
        let sources: Vec<Box<dyn AttributeSource>> = Vec::new();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        f(&ctx)
    }

    fn string_bag(items: &[&str]) -> Expression {
        Expression::Apply(Box::new(crate::expr::Apply {
            function: Function::Bag(DataType::String, super::super::BagOp::Construct),
            args: items
                .iter()
                .map(|s| Expression::Literal(AttributeValue::string(*s)))
                .collect(),
        }))
    }

    fn fref(f: Function) -> Expression {
        Expression::FunctionReference(f)
    }

    fn lit(s: &str) -> Expression {
        Expression::Literal(AttributeValue::string(s))
    }

    fn as_bool(result: EvalResult) -> bool {
        result.unwrap().into_boolean().unwrap()
    }

    #[test]
    fn test_any_of() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                lit("medical"),
                string_bag(&["financial", "medical"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AnyOf, &args, ctx)));
        });
    }

    #[test]
    fn test_any_of_no_match() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                lit("medical"),
                string_bag(&["financial"]),
            ];
            assert!(!as_bool(apply(HigherOrderOp::AnyOf, &args, ctx)));
        });
    }

    #[test]
    fn test_any_of_empty_bag_is_false() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                lit("medical"),
                string_bag(&[]),
            ];
            assert!(!as_bool(apply(HigherOrderOp::AnyOf, &args, ctx)));
        });
    }

    #[test]
    fn test_all_of() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                lit("medical"),
                string_bag(&["medical", "medical"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AllOf, &args, ctx)));
        });
    }

    #[test]
    fn test_all_of_empty_bag_is_true() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                lit("medical"),
                string_bag(&[]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AllOf, &args, ctx)));
        });
    }

    #[test]
    fn test_any_of_any() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                string_bag(&["a", "b"]),
                string_bag(&["c", "b"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AnyOfAny, &args, ctx)));
        });
    }

    #[test]
    fn test_all_of_any() {
        with_ctx(|ctx| {
            // every x in {a, b} appears in {b, a, c}
            let args = vec![
                fref(Function::Equal(DataType::String)),
                string_bag(&["a", "b"]),
                string_bag(&["b", "a", "c"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AllOfAny, &args, ctx)));
        });
    }

    #[test]
    fn test_any_of_all() {
        with_ctx(|ctx| {
            // some x equals every y: x = "a" against {a, a}
            let args = vec![
                fref(Function::Equal(DataType::String)),
                string_bag(&["z", "a"]),
                string_bag(&["a", "a"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AnyOfAll, &args, ctx)));
        });
    }

    #[test]
    fn test_all_of_all() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::Equal(DataType::String)),
                string_bag(&["a", "a"]),
                string_bag(&["a", "a"]),
            ];
            assert!(as_bool(apply(HigherOrderOp::AllOfAll, &args, ctx)));
            let args = vec![
                fref(Function::Equal(DataType::String)),
                string_bag(&["a", "b"]),
                string_bag(&["a", "a"]),
            ];
            assert!(!as_bool(apply(HigherOrderOp::AllOfAll, &args, ctx)));
        });
    }

    #[test]
    fn test_map() {
        with_ctx(|ctx| {
            let args = vec![
                fref(Function::NormalizeToLowerCase),
                string_bag(&["Train", "AGGREGATE"]),
            ];
            let bag = apply(HigherOrderOp::Map, &args, ctx)
                .unwrap()
                .into_bag()
                .unwrap();
            assert!(bag.contains(&AttributeValue::string("train")));
            assert!(bag.contains(&AttributeValue::string("aggregate")));
        });
    }

    #[test]
    fn test_missing_function_reference() {
        with_ctx(|ctx| {
            let args = vec![lit("oops"), lit("medical"), string_bag(&[])];
            assert!(apply(HigherOrderOp::AnyOf, &args, ctx).is_err());
        });
    }
}
