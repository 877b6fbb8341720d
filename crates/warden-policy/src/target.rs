//! Target matching with three-valued logic.
//!
//! A `Target` is a conjunction of `AnyOf`s; an `AnyOf` is a disjunction of
//! `AllOf`s; an `AllOf` is a conjunction of `Match`es. The three-valued
//! tables:
//!
//! - conjunction: `NoMatch` dominates, then `Indeterminate`, else `Match`
//! - disjunction: `Match` dominates, then `Indeterminate`, else `NoMatch`
//!
//! The empty target always matches.

use warden_core::{AttributeValue, Evaluated, Status};

use crate::context::EvaluationContext;
use crate::expr::{AttributeDesignator, AttributeSelector};
use crate::functions::{self, Function};

// ---------------------------------------------------------------------------
// MatchResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Match,
    NoMatch,
    Indeterminate(Status),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

// ---------------------------------------------------------------------------
// Match — one predicate over one attribute
// ---------------------------------------------------------------------------

/// Where a `Match` fetches its candidate bag from.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchSource {
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
}

/// Applies a binary boolean function to the literal and each element of the
/// fetched bag; any `true` element makes the `Match` match.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub function: Function,
    pub literal: AttributeValue,
    pub source: MatchSource,
}

impl Match {
    pub fn matches(&self, ctx: &EvaluationContext) -> MatchResult {
        let fetched = match &self.source {
            MatchSource::Designator(d) => d.evaluate(ctx),
            MatchSource::Selector(s) => s.evaluate(ctx),
        };
        let bag = match fetched.and_then(Evaluated::into_bag) {
            Ok(bag) => bag,
            Err(status) => return MatchResult::Indeterminate(status),
        };

        let mut pending: Option<Status> = None;
        for candidate in bag.iter() {
            let applied = functions::invoke(
                &self.function,
                vec![
                    Evaluated::Value(self.literal.clone()),
                    Evaluated::Value(candidate.clone()),
                ],
                ctx,
            )
            .and_then(Evaluated::into_boolean);
            match applied {
                Ok(true) => return MatchResult::Match,
                Ok(false) => {}
                Err(status) => pending = Some(pending.take().unwrap_or(status)),
            }
        }
        match pending {
            Some(status) => MatchResult::Indeterminate(status),
            None => MatchResult::NoMatch,
        }
    }
}

// ---------------------------------------------------------------------------
// AllOf / AnyOf / Target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AllOf {
    pub matches: Vec<Match>,
}

impl AllOf {
    pub fn matches(&self, ctx: &EvaluationContext) -> MatchResult {
        conjunction(self.matches.iter().map(|m| m.matches(ctx)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnyOf {
    pub all_ofs: Vec<AllOf>,
}

impl AnyOf {
    pub fn matches(&self, ctx: &EvaluationContext) -> MatchResult {
        disjunction(self.all_ofs.iter().map(|a| a.matches(ctx)))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Target {
    pub any_ofs: Vec<AnyOf>,
}

impl Target {
    /// A target with no constraints; it matches every request.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.any_ofs.is_empty()
    }

    pub fn matches(&self, ctx: &EvaluationContext) -> MatchResult {
        conjunction(self.any_ofs.iter().map(|a| a.matches(ctx)))
    }
}

/// `NoMatch` dominates: `NoMatch ∧ Indeterminate = NoMatch`.
fn conjunction(results: impl Iterator<Item = MatchResult>) -> MatchResult {
    let mut pending: Option<Status> = None;
    for result in results {
        match result {
            MatchResult::NoMatch => return MatchResult::NoMatch,
            MatchResult::Indeterminate(status) => {
                pending = Some(pending.take().unwrap_or(status))
            }
            MatchResult::Match => {}
        }
    }
    match pending {
        Some(status) => MatchResult::Indeterminate(status),
        None => MatchResult::Match,
    }
}

/// `Match` dominates: `Match ∨ Indeterminate = Match`.
fn disjunction(results: impl Iterator<Item = MatchResult>) -> MatchResult {
    let mut pending: Option<Status> = None;
    for result in results {
        match result {
            MatchResult::Match => return MatchResult::Match,
            MatchResult::Indeterminate(status) => {
                pending = Some(pending.take().unwrap_or(status))
            }
            MatchResult::NoMatch => {}
        }
    }
    match pending {
        Some(status) => MatchResult::Indeterminate(status),
        None => MatchResult::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::categories;
    use warden_core::{
        AttributeCategory, Bag, DataType, Request, RequestAttribute,
    };

    use crate::context::{AttributeKey, AttributeSource, EvaluationContext};
    use crate::policy::NoReferences;

    fn action_request(action: &str) -> Request {
        Request {
            attributes: vec![AttributeCategory {
                category: categories::ACTION.into(),
                content: None,
                attributes: vec![RequestAttribute {
                    id: "action".into(),
                    issuer: None,
                    values: Bag::of_one(AttributeValue::string(action)),
                    include_in_result: false,
                }],
            }],
            return_policy_id_list: false,
            combined_decision: false,
        }
    }

    fn action_match(literal: &str, must_be_present: bool) -> Match {
        Match {
            function: Function::Equal(DataType::String),
            literal: AttributeValue::string(literal),
            source: MatchSource::Designator(AttributeDesignator {
                key: AttributeKey::new(categories::ACTION, "action", DataType::String),
                must_be_present,
            }),
        }
    }

    fn target_of(matches: Vec<Match>) -> Target {
        Target {
            any_ofs: vec![AnyOf {
                all_ofs: vec![AllOf { matches }],
            }],
        }
    }

    fn with_request<R>(request: &Request, f: impl FnOnce(&EvaluationContext) -> R) -> R {
        let sources: Vec<Box<dyn AttributeSource>> = Vec::new();
        let ctx = EvaluationContext::new_utc(request, &sources, &NoReferences);
        f(&ctx)
    }

    #[test]
    fn test_empty_target_always_matches() {
        let request = Request::default();
        with_request(&request, |ctx| {
            assert_eq!(Target::empty().matches(ctx), MatchResult::Match);
        });
    }

    #[test]
    fn test_match_on_equal_value() {
        let request = action_request("train");
        with_request(&request, |ctx| {
            let target = target_of(vec![action_match("train", false)]);
            assert_eq!(target.matches(ctx), MatchResult::Match);
        });
    }

    #[test]
    fn test_no_match_on_other_value() {
        let request = action_request("evaluate");
        with_request(&request, |ctx| {
            let target = target_of(vec![action_match("train", false)]);
            assert_eq!(target.matches(ctx), MatchResult::NoMatch);
        });
    }

    #[test]
    fn test_closed_world_case_sensitivity() {
        let request = action_request("Train");
        with_request(&request, |ctx| {
            let target = target_of(vec![action_match("train", false)]);
            assert_eq!(target.matches(ctx), MatchResult::NoMatch);
        });
    }

    #[test]
    fn test_any_value_semantics_over_bag() {
        let mut request = action_request("train");
        request.attributes[0].attributes[0]
            .values
            .push(AttributeValue::string("aggregate"))
            .unwrap();
        with_request(&request, |ctx| {
            let target = target_of(vec![action_match("aggregate", false)]);
            assert_eq!(target.matches(ctx), MatchResult::Match);
        });
    }

    #[test]
    fn test_designator_indeterminate_propagates() {
        let request = Request::default();
        with_request(&request, |ctx| {
            let target = target_of(vec![action_match("train", true)]);
            assert!(matches!(target.matches(ctx), MatchResult::Indeterminate(_)));
        });
    }

    #[test]
    fn test_disjunction_match_beats_indeterminate() {
        let request = action_request("train");
        with_request(&request, |ctx| {
            let target = Target {
                any_ofs: vec![AnyOf {
                    all_ofs: vec![
                        AllOf {
                            // Indeterminate: required attribute that is absent
                            matches: vec![Match {
                                function: Function::Equal(DataType::String),
                                literal: AttributeValue::string("x"),
                                source: MatchSource::Designator(AttributeDesignator {
                                    key: AttributeKey::new(
                                        categories::SUBJECT,
                                        "absent",
                                        DataType::String,
                                    ),
                                    must_be_present: true,
                                }),
                            }],
                        },
                        AllOf {
                            matches: vec![action_match("train", false)],
                        },
                    ],
                }],
            };
            assert_eq!(target.matches(ctx), MatchResult::Match);
        });
    }

    #[test]
    fn test_conjunction_no_match_beats_indeterminate() {
        let request = action_request("evaluate");
        with_request(&request, |ctx| {
            let target = target_of(vec![
                action_match("train", false),
                Match {
                    function: Function::Equal(DataType::String),
                    literal: AttributeValue::string("x"),
                    source: MatchSource::Designator(AttributeDesignator {
                        key: AttributeKey::new(categories::SUBJECT, "absent", DataType::String),
                        must_be_present: true,
                    }),
                },
            ]);
            assert_eq!(target.matches(ctx), MatchResult::NoMatch);
        });
    }

    #[test]
    fn test_disjunction_no_match_with_indeterminate_is_indeterminate() {
        let request = action_request("evaluate");
        with_request(&request, |ctx| {
            let target = Target {
                any_ofs: vec![AnyOf {
                    all_ofs: vec![
                        AllOf {
                            matches: vec![Match {
                                function: Function::Equal(DataType::String),
                                literal: AttributeValue::string("x"),
                                source: MatchSource::Designator(AttributeDesignator {
                                    key: AttributeKey::new(
                                        categories::SUBJECT,
                                        "absent",
                                        DataType::String,
                                    ),
                                    must_be_present: true,
                                }),
                            }],
                        },
                        AllOf {
                            matches: vec![action_match("train", false)],
                        },
                    ],
                }],
            };
            assert!(matches!(target.matches(ctx), MatchResult::Indeterminate(_)));
        });
    }
}
