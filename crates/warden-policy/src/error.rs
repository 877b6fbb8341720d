use thiserror::Error;
use warden_core::ValueError;

/// Single error enum for policy-load failures.
///
/// These abort initialization: the PDP never starts with a half-loaded or
/// internally inconsistent policy tree. Runtime evaluation does not use this
/// type; it produces `Indeterminate` decisions instead.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("unknown function URI: {0}")]
    UnknownFunction(String),

    #[error("unknown combining algorithm URI: {0}")]
    UnknownCombiningAlgorithm(String),

    #[error("function {function} expects {expected} argument(s), got {actual}")]
    BadArity {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("'{function}' is not usable as a Match function")]
    NotAMatchFunction { function: String },

    #[error("higher-order function {function} requires a function reference as its first argument")]
    MissingFunctionReference { function: String },

    #[error("function references are only legal as the first argument of a higher-order function")]
    StrayFunctionReference,

    #[error("literal value rejected: {0}")]
    BadLiteral(#[from] ValueError),

    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    #[error("duplicate variable id '{0}'")]
    DuplicateVariableId(String),

    #[error("variable reference '{0}' has no definition in the enclosing policy")]
    UnknownVariable(String),

    #[error("condition of rule '{rule_id}' must return boolean, found {found}")]
    NonBooleanCondition { rule_id: String, found: String },

    #[error("{0}")]
    Invalid(String),
}

pub type PolicyLoadResult<T> = Result<T, PolicyLoadError>;
