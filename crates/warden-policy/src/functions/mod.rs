//! The standard function catalog.
//!
//! Function URIs are resolved to a [`Function`] handle once, at policy load;
//! evaluation dispatches over the enum with no string lookup. The
//! short-circuit functions (`and`, `or`, `n-of`) and the higher-order family
//! control their own argument evaluation; every other function evaluates all
//! arguments strictly, and any `Indeterminate` argument makes the
//! application `Indeterminate`.

mod arithmetic;
mod bags;
mod equality;
mod eval_util;
mod higher_order;
mod logical;
mod strings;
mod temporal;

use std::fmt;

use warden_core::{DataType, EvalResult, Evaluated, Status};

use crate::context::EvaluationContext;
use crate::error::{PolicyLoadError, PolicyLoadResult};
use crate::expr::Expression;

// ---------------------------------------------------------------------------
// Operation discriminators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CmpOp {
    fn suffix(self) -> &'static str {
        match self {
            CmpOp::GreaterThan => "greater-than",
            CmpOp::GreaterThanOrEqual => "greater-than-or-equal",
            CmpOp::LessThan => "less-than",
            CmpOp::LessThanOrEqual => "less-than-or-equal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Abs,
}

impl ArithOp {
    fn suffix(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Subtract => "subtract",
            ArithOp::Multiply => "multiply",
            ArithOp::Divide => "divide",
            ArithOp::Mod => "mod",
            ArithOp::Abs => "abs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BagOp {
    Construct,
    Size,
    IsIn,
    OneAndOnly,
    Intersection,
    Union,
    Subset,
    SetEquals,
}

impl BagOp {
    fn suffix(self) -> &'static str {
        match self {
            BagOp::Construct => "bag",
            BagOp::Size => "bag-size",
            BagOp::IsIn => "is-in",
            BagOp::OneAndOnly => "one-and-only",
            BagOp::Intersection => "intersection",
            BagOp::Union => "union",
            BagOp::Subset => "subset",
            BagOp::SetEquals => "set-equals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HigherOrderOp {
    AnyOf,
    AllOf,
    AnyOfAny,
    AllOfAny,
    AnyOfAll,
    AllOfAll,
    Map,
}

impl HigherOrderOp {
    fn name(self) -> &'static str {
        match self {
            HigherOrderOp::AnyOf => "any-of",
            HigherOrderOp::AllOf => "all-of",
            HigherOrderOp::AnyOfAny => "any-of-any",
            HigherOrderOp::AllOfAny => "all-of-any",
            HigherOrderOp::AnyOfAll => "any-of-all",
            HigherOrderOp::AllOfAll => "all-of-all",
            HigherOrderOp::Map => "map",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalOp {
    DateTimeAddDayTime,
    DateTimeSubtractDayTime,
    DateTimeAddYearMonth,
    DateTimeSubtractYearMonth,
    DateAddYearMonth,
    DateSubtractYearMonth,
}

impl TemporalOp {
    fn name(self) -> &'static str {
        match self {
            TemporalOp::DateTimeAddDayTime => "dateTime-add-dayTimeDuration",
            TemporalOp::DateTimeSubtractDayTime => "dateTime-subtract-dayTimeDuration",
            TemporalOp::DateTimeAddYearMonth => "dateTime-add-yearMonthDuration",
            TemporalOp::DateTimeSubtractYearMonth => "dateTime-subtract-yearMonthDuration",
            TemporalOp::DateAddYearMonth => "date-add-yearMonthDuration",
            TemporalOp::DateSubtractYearMonth => "date-subtract-yearMonthDuration",
        }
    }
}

// ---------------------------------------------------------------------------
// Function — one handle per standard function
// ---------------------------------------------------------------------------

/// A resolved standard function. Formatting renders the local name
/// (`string-equal`, `n-of`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Equal(DataType),
    Compare(DataType, CmpOp),
    Arithmetic(DataType, ArithOp),
    Not,
    And,
    Or,
    NOf,
    Bag(DataType, BagOp),
    Higher(HigherOrderOp),
    NormalizeSpace,
    NormalizeToLowerCase,
    Substring,
    Concatenate,
    RegexpMatch(DataType),
    Temporal(TemporalOp),
}

const URI_PREFIXES: [&str; 3] = [
    "urn:oasis:names:tc:xacml:1.0:function:",
    "urn:oasis:names:tc:xacml:2.0:function:",
    "urn:oasis:names:tc:xacml:3.0:function:",
];

const COMPARABLE: [DataType; 6] = [
    DataType::String,
    DataType::Integer,
    DataType::Double,
    DataType::DateTime,
    DataType::Date,
    DataType::Time,
];

impl Function {
    /// Resolve a function URI. Any of the 1.0/2.0/3.0 URN prefixes is
    /// accepted for any function; the local name decides.
    pub fn from_uri(uri: &str) -> Option<Function> {
        let local = URI_PREFIXES
            .iter()
            .find_map(|prefix| uri.strip_prefix(prefix))?;
        Self::from_local_name(local)
    }

    fn from_local_name(local: &str) -> Option<Function> {
        match local {
            "not" => return Some(Function::Not),
            "and" => return Some(Function::And),
            "or" => return Some(Function::Or),
            "n-of" => return Some(Function::NOf),
            "string-normalize-space" => return Some(Function::NormalizeSpace),
            "string-normalize-to-lower-case" => return Some(Function::NormalizeToLowerCase),
            "string-substring" => return Some(Function::Substring),
            "string-concatenate" => return Some(Function::Concatenate),
            "string-regexp-match" => return Some(Function::RegexpMatch(DataType::String)),
            "anyURI-regexp-match" => return Some(Function::RegexpMatch(DataType::AnyUri)),
            _ => {}
        }

        for op in [
            HigherOrderOp::AnyOfAny,
            HigherOrderOp::AllOfAny,
            HigherOrderOp::AnyOfAll,
            HigherOrderOp::AllOfAll,
            HigherOrderOp::AnyOf,
            HigherOrderOp::AllOf,
            HigherOrderOp::Map,
        ] {
            if local == op.name() {
                return Some(Function::Higher(op));
            }
        }

        for op in [
            TemporalOp::DateTimeAddDayTime,
            TemporalOp::DateTimeSubtractDayTime,
            TemporalOp::DateTimeAddYearMonth,
            TemporalOp::DateTimeSubtractYearMonth,
            TemporalOp::DateAddYearMonth,
            TemporalOp::DateSubtractYearMonth,
        ] {
            if local == op.name() {
                return Some(Function::Temporal(op));
            }
        }

        // Type-prefixed families: {type}-equal, {type}-greater-than,
        // {type}-bag, {type}-add, ...
        let (data_type, suffix) = split_type_prefix(local)?;

        if suffix == "equal" {
            return Some(Function::Equal(data_type));
        }

        for op in [
            CmpOp::GreaterThanOrEqual,
            CmpOp::LessThanOrEqual,
            CmpOp::GreaterThan,
            CmpOp::LessThan,
        ] {
            if suffix == op.suffix() {
                if COMPARABLE.contains(&data_type) {
                    return Some(Function::Compare(data_type, op));
                }
                return None;
            }
        }

        for op in [
            BagOp::OneAndOnly,
            BagOp::Size,
            BagOp::IsIn,
            BagOp::Intersection,
            BagOp::Union,
            BagOp::Subset,
            BagOp::SetEquals,
            BagOp::Construct,
        ] {
            if suffix == op.suffix() {
                return Some(Function::Bag(data_type, op));
            }
        }

        if matches!(data_type, DataType::Integer | DataType::Double) {
            for op in [
                ArithOp::Add,
                ArithOp::Subtract,
                ArithOp::Multiply,
                ArithOp::Divide,
                ArithOp::Mod,
                ArithOp::Abs,
            ] {
                if suffix == op.suffix() {
                    if op == ArithOp::Mod && data_type != DataType::Integer {
                        return None;
                    }
                    return Some(Function::Arithmetic(data_type, op));
                }
            }
        }

        None
    }

    /// True when this function iterates with a function reference.
    pub fn is_higher_order(&self) -> bool {
        matches!(self, Function::Higher(_))
    }

    /// True when the function is usable inside a Target `<Match>`: a binary
    /// boolean predicate over two single values.
    pub fn is_match_function(&self) -> bool {
        matches!(
            self,
            Function::Equal(_) | Function::Compare(_, _) | Function::RegexpMatch(_)
        )
    }

    pub fn returns_bag(&self) -> bool {
        matches!(
            self,
            Function::Bag(_, BagOp::Construct)
                | Function::Bag(_, BagOp::Intersection)
                | Function::Bag(_, BagOp::Union)
                | Function::Higher(HigherOrderOp::Map)
        )
    }

    pub fn return_type(&self) -> Option<DataType> {
        match self {
            Function::Equal(_)
            | Function::Compare(_, _)
            | Function::Not
            | Function::And
            | Function::Or
            | Function::NOf
            | Function::RegexpMatch(_)
            | Function::Bag(_, BagOp::IsIn)
            | Function::Bag(_, BagOp::Subset)
            | Function::Bag(_, BagOp::SetEquals) => Some(DataType::Boolean),
            Function::Arithmetic(dt, _) => Some(*dt),
            Function::Bag(_, BagOp::Size) => Some(DataType::Integer),
            Function::Bag(dt, _) => Some(*dt),
            Function::NormalizeSpace
            | Function::NormalizeToLowerCase
            | Function::Substring
            | Function::Concatenate => Some(DataType::String),
            Function::Temporal(op) => match op {
                TemporalOp::DateAddYearMonth | TemporalOp::DateSubtractYearMonth => {
                    Some(DataType::Date)
                }
                _ => Some(DataType::DateTime),
            },
            Function::Higher(HigherOrderOp::Map) => None,
            Function::Higher(_) => Some(DataType::Boolean),
        }
    }

    /// Arity check performed at policy load.
    pub fn check_arity(&self, actual: usize) -> PolicyLoadResult<()> {
        let expected: (usize, Option<usize>) = match self {
            Function::Equal(_)
            | Function::Compare(_, _)
            | Function::RegexpMatch(_)
            | Function::Temporal(_)
            | Function::Bag(_, BagOp::IsIn)
            | Function::Bag(_, BagOp::Intersection)
            | Function::Bag(_, BagOp::Union)
            | Function::Bag(_, BagOp::Subset)
            | Function::Bag(_, BagOp::SetEquals) => (2, Some(2)),
            Function::Not
            | Function::Bag(_, BagOp::Size)
            | Function::Bag(_, BagOp::OneAndOnly)
            | Function::Arithmetic(_, ArithOp::Abs) => (1, Some(1)),
            Function::And | Function::Or => (0, None),
            Function::NOf => (1, None),
            Function::Arithmetic(_, ArithOp::Add) | Function::Arithmetic(_, ArithOp::Multiply) => {
                (2, None)
            }
            Function::Arithmetic(_, _) => (2, Some(2)),
            Function::Bag(_, BagOp::Construct) => (0, None),
            Function::NormalizeSpace | Function::NormalizeToLowerCase => (1, Some(1)),
            Function::Substring => (3, Some(3)),
            Function::Concatenate => (2, None),
            Function::Higher(HigherOrderOp::Map) => (2, Some(2)),
            Function::Higher(_) => (3, Some(3)),
        };

        let (min, max) = expected;
        let ok = actual >= min && max.map_or(true, |m| actual <= m);
        if ok {
            return Ok(());
        }
        let expected = match max {
            Some(m) if m == min => format!("{}", min),
            Some(m) => format!("{}..{}", min, m),
            None => format!("{}+", min),
        };
        Err(PolicyLoadError::BadArity {
            function: self.to_string(),
            expected,
            actual,
        })
    }
}

/// Split `"dateTime-greater-than"` into `(DataType::DateTime,
/// "greater-than")`. The separator must directly follow the type name, so
/// `date` never shadows `dateTime`.
fn split_type_prefix(local: &str) -> Option<(DataType, &str)> {
    for dt in DataType::ALL {
        if let Some(rest) = local.strip_prefix(dt.local_name()) {
            if let Some(suffix) = rest.strip_prefix('-') {
                return Some((dt, suffix));
            }
        }
    }
    None
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Equal(dt) => write!(f, "{}-equal", dt.local_name()),
            Function::Compare(dt, op) => write!(f, "{}-{}", dt.local_name(), op.suffix()),
            Function::Arithmetic(dt, op) => write!(f, "{}-{}", dt.local_name(), op.suffix()),
            Function::Not => write!(f, "not"),
            Function::And => write!(f, "and"),
            Function::Or => write!(f, "or"),
            Function::NOf => write!(f, "n-of"),
            Function::Bag(dt, op) => write!(f, "{}-{}", dt.local_name(), op.suffix()),
            Function::Higher(op) => write!(f, "{}", op.name()),
            Function::NormalizeSpace => write!(f, "string-normalize-space"),
            Function::NormalizeToLowerCase => write!(f, "string-normalize-to-lower-case"),
            Function::Substring => write!(f, "string-substring"),
            Function::Concatenate => write!(f, "string-concatenate"),
            Function::RegexpMatch(dt) => write!(f, "{}-regexp-match", dt.local_name()),
            Function::Temporal(op) => write!(f, "{}", op.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply a function to argument expressions. Lazy families dispatch first;
/// everything else evaluates strictly and propagates `Indeterminate`.
pub fn apply(function: &Function, args: &[Expression], ctx: &EvaluationContext) -> EvalResult {
    match function {
        Function::And => logical::and(args, ctx),
        Function::Or => logical::or(args, ctx),
        Function::NOf => logical::n_of(args, ctx),
        Function::Higher(op) => higher_order::apply(*op, args, ctx),
        _ => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(arg.evaluate(ctx)?);
            }
            invoke(function, evaluated, ctx)
        }
    }
}

/// Invoke a strict function over already-evaluated arguments. Used directly
/// by the higher-order iterators.
pub(crate) fn invoke(
    function: &Function,
    args: Vec<Evaluated>,
    ctx: &EvaluationContext,
) -> EvalResult {
    match function {
        Function::Equal(dt) => equality::equal(*dt, args),
        Function::Compare(dt, op) => comparison_invoke(*dt, *op, args, ctx),
        Function::Arithmetic(dt, op) => arithmetic::invoke(*dt, *op, args),
        Function::Not => logical::not(args),
        Function::Bag(dt, op) => bags::invoke(*dt, *op, args),
        Function::NormalizeSpace => strings::normalize_space(args),
        Function::NormalizeToLowerCase => strings::normalize_to_lower_case(args),
        Function::Substring => strings::substring(args),
        Function::Concatenate => strings::concatenate(args),
        Function::RegexpMatch(dt) => strings::regexp_match(*dt, args),
        Function::Temporal(op) => temporal::invoke(*op, args),
        Function::And | Function::Or | Function::NOf | Function::Higher(_) => Err(
            Status::processing_error(format!("{} cannot be invoked strictly", function)),
        ),
    }
}

fn comparison_invoke(
    data_type: DataType,
    op: CmpOp,
    args: Vec<Evaluated>,
    ctx: &EvaluationContext,
) -> EvalResult {
    equality::compare(data_type, op, args, ctx.default_tz())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_core_uris() {
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:string-equal"),
            Some(Function::Equal(DataType::String))
        );
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:dateTime-greater-than"),
            Some(Function::Compare(DataType::DateTime, CmpOp::GreaterThan))
        );
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:and"),
            Some(Function::And)
        );
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:string-one-and-only"),
            Some(Function::Bag(DataType::String, BagOp::OneAndOnly))
        );
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:3.0:function:any-of"),
            Some(Function::Higher(HigherOrderOp::AnyOf))
        );
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:2.0:function:string-concatenate"),
            Some(Function::Concatenate)
        );
        assert_eq!(
            Function::from_uri(
                "urn:oasis:names:tc:xacml:3.0:function:dateTime-add-dayTimeDuration"
            ),
            Some(Function::Temporal(TemporalOp::DateTimeAddDayTime))
        );
    }

    #[test]
    fn test_resolve_every_equal() {
        for dt in DataType::ALL {
            let uri = format!(
                "urn:oasis:names:tc:xacml:1.0:function:{}-equal",
                dt.local_name()
            );
            assert_eq!(Function::from_uri(&uri), Some(Function::Equal(dt)), "{}", uri);
        }
    }

    #[test]
    fn test_resolve_every_bag_family() {
        for dt in DataType::ALL {
            for op in [
                BagOp::Construct,
                BagOp::Size,
                BagOp::IsIn,
                BagOp::OneAndOnly,
                BagOp::Intersection,
                BagOp::Union,
                BagOp::Subset,
                BagOp::SetEquals,
            ] {
                let uri = format!(
                    "urn:oasis:names:tc:xacml:1.0:function:{}-{}",
                    dt.local_name(),
                    op.suffix()
                );
                assert_eq!(Function::from_uri(&uri), Some(Function::Bag(dt, op)), "{}", uri);
            }
        }
    }

    #[test]
    fn test_unknown_function_uri() {
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:frobnicate"),
            None
        );
        assert_eq!(Function::from_uri("not-even-a-urn"), None);
        // Comparison is only defined for ordered types.
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:boolean-greater-than"),
            None
        );
        // Mod is integer-only.
        assert_eq!(
            Function::from_uri("urn:oasis:names:tc:xacml:1.0:function:double-mod"),
            None
        );
    }

    #[test]
    fn test_arity_checks() {
        assert!(Function::Not.check_arity(1).is_ok());
        assert!(Function::Not.check_arity(2).is_err());
        assert!(Function::And.check_arity(0).is_ok());
        assert!(Function::Equal(DataType::String).check_arity(2).is_ok());
        assert!(Function::Equal(DataType::String).check_arity(1).is_err());
        assert!(Function::Arithmetic(DataType::Integer, ArithOp::Add)
            .check_arity(5)
            .is_ok());
        assert!(Function::Arithmetic(DataType::Integer, ArithOp::Add)
            .check_arity(1)
            .is_err());
        assert!(Function::Higher(HigherOrderOp::AnyOf).check_arity(3).is_ok());
        assert!(Function::Higher(HigherOrderOp::Map).check_arity(2).is_ok());
    }

    #[test]
    fn test_match_function_classification() {
        assert!(Function::Equal(DataType::String).is_match_function());
        assert!(Function::RegexpMatch(DataType::String).is_match_function());
        assert!(!Function::And.is_match_function());
        assert!(!Function::Bag(DataType::String, BagOp::IsIn).is_match_function());
    }

    #[test]
    fn test_return_metadata() {
        assert!(Function::Bag(DataType::String, BagOp::Construct).returns_bag());
        assert!(!Function::Equal(DataType::String).returns_bag());
        assert_eq!(
            Function::Bag(DataType::String, BagOp::Size).return_type(),
            Some(DataType::Integer)
        );
        assert_eq!(Function::NOf.return_type(), Some(DataType::Boolean));
    }

    #[test]
    fn test_display_local_names() {
        assert_eq!(Function::Equal(DataType::AnyUri).to_string(), "anyURI-equal");
        assert_eq!(
            Function::Compare(DataType::Integer, CmpOp::LessThanOrEqual).to_string(),
            "integer-less-than-or-equal"
        );
        assert_eq!(Function::Higher(HigherOrderOp::Map).to_string(), "map");
    }
}
