//! Warden policy evaluation
//!
//! The evaluable half of the engine: expressions and the standard function
//! catalog, the policy tree (targets, rules, policies, policy sets,
//! obligation and advice expressions), the per-evaluation context with its
//! attribute-finder chain, and the combining algorithms.
//!
//! Everything here is pure with respect to the loaded policy tree: a policy
//! is immutable after load, a context is owned by one evaluation, and an
//! evaluation never raises an error past its boundary — failures travel as
//! `Indeterminate` decisions with structured status.

pub mod combining;
pub mod context;
pub mod error;
pub mod expr;
pub mod functions;
pub mod policy;
pub mod target;

pub use combining::{Combinable, CombiningAlg, DecisionBundle};
pub use context::{
    AttributeKey, AttributeSource, EnvironmentSource, EvaluationClock, EvaluationContext,
};
pub use error::{PolicyLoadError, PolicyLoadResult};
pub use expr::{Apply, AttributeDesignator, AttributeSelector, Expression};
pub use functions::Function;
pub use policy::{
    AdviceExpression, AttributeAssignmentExpression, NoReferences, ObligationExpression, Policy,
    PolicyChild, PolicyResolver, PolicySet, Rule, VariableDefinition,
};
pub use target::{AllOf, AnyOf, Match, MatchResult, MatchSource, Target};
