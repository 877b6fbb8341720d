//! The policy tree: rules, policies, policy sets, references, and the
//! obligation/advice expressions that ride on them.
//!
//! Trees are immutable after load. References to other policies are lazy
//! string handles resolved through a [`PolicyResolver`] at evaluation time;
//! documents never hold direct pointers to each other.

use std::collections::HashSet;
use std::sync::Arc;

use warden_core::{
    Advice, AttributeAssignment, DataType, Decision, Effect, Evaluated, IndeterminateKind,
    Obligation, Status,
};

use crate::combining::{combine, Combinable, CombiningAlg, DecisionBundle};
use crate::context::EvaluationContext;
use crate::error::{PolicyLoadError, PolicyLoadResult};
use crate::expr::Expression;
use crate::target::{MatchResult, Target};

// ---------------------------------------------------------------------------
// PolicyResolver — lazy reference resolution
// ---------------------------------------------------------------------------

/// Resolves `PolicyIdReference` / `PolicySetIdReference` handles. The policy
/// store implements this; evaluation never holds direct pointers between
/// documents.
pub trait PolicyResolver: Send + Sync {
    fn resolve_policy(&self, id: &str) -> Option<Arc<Policy>>;
    fn resolve_policy_set(&self, id: &str) -> Option<Arc<PolicySet>>;
}

/// Resolver that knows no documents. Useful for tests and for policies
/// without references.
pub struct NoReferences;

impl PolicyResolver for NoReferences {
    fn resolve_policy(&self, _id: &str) -> Option<Arc<Policy>> {
        None
    }

    fn resolve_policy_set(&self, _id: &str) -> Option<Arc<PolicySet>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Variables, obligations, advice
// ---------------------------------------------------------------------------

/// A named expression scoped to its policy, memoized per request.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub id: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeAssignmentExpression {
    pub id: String,
    pub category: Option<String>,
    pub expression: Expression,
}

/// An obligation template, evaluated lazily only when the enclosing
/// element's decision equals `fulfill_on`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObligationExpression {
    pub id: String,
    pub fulfill_on: Effect,
    pub assignments: Vec<AttributeAssignmentExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdviceExpression {
    pub id: String,
    pub applies_to: Effect,
    pub assignments: Vec<AttributeAssignmentExpression>,
}

/// Evaluate the obligation/advice expressions matching a definite decision.
///
/// A bag-valued assignment expression fans out into one assignment per
/// element. Any `Indeterminate` aborts the whole collection — the caller
/// escalates the element's decision rather than dropping obligations.
fn evaluate_attachments(
    obligations: &[ObligationExpression],
    advice: &[AdviceExpression],
    effect: Effect,
    ctx: &EvaluationContext,
) -> Result<(Vec<Obligation>, Vec<Advice>), Status> {
    let mut out_obligations = Vec::new();
    for expression in obligations.iter().filter(|o| o.fulfill_on == effect) {
        out_obligations.push(Obligation {
            id: expression.id.clone(),
            assignments: evaluate_assignments(&expression.assignments, ctx)?,
        });
    }
    let mut out_advice = Vec::new();
    for expression in advice.iter().filter(|a| a.applies_to == effect) {
        out_advice.push(Advice {
            id: expression.id.clone(),
            assignments: evaluate_assignments(&expression.assignments, ctx)?,
        });
    }
    Ok((out_obligations, out_advice))
}

fn evaluate_assignments(
    assignments: &[AttributeAssignmentExpression],
    ctx: &EvaluationContext,
) -> Result<Vec<AttributeAssignment>, Status> {
    let mut out = Vec::new();
    for assignment in assignments {
        match assignment.expression.evaluate(ctx)? {
            Evaluated::Value(value) => out.push(AttributeAssignment {
                id: assignment.id.clone(),
                category: assignment.category.clone(),
                value,
            }),
            Evaluated::Bag(bag) => {
                for value in bag.iter() {
                    out.push(AttributeAssignment {
                        id: assignment.id.clone(),
                        category: assignment.category.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub effect: Effect,
    pub description: Option<String>,
    pub target: Option<Target>,
    pub condition: Option<Expression>,
    pub obligations: Vec<ObligationExpression>,
    pub advice: Vec<AdviceExpression>,
}

impl Rule {
    /// Evaluate target, then condition, then the effect. An undecidable
    /// target or condition yields the effect-flavoured Indeterminate.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> DecisionBundle {
        match self.target.as_ref().map(|t| t.matches(ctx)) {
            Some(MatchResult::NoMatch) => return DecisionBundle::not_applicable(),
            Some(MatchResult::Indeterminate(status)) => {
                return DecisionBundle::indeterminate(self.effect.into(), status);
            }
            Some(MatchResult::Match) | None => {}
        }

        if let Some(condition) = &self.condition {
            match condition.evaluate(ctx).and_then(Evaluated::into_boolean) {
                Ok(true) => {}
                Ok(false) => return DecisionBundle::not_applicable(),
                Err(status) => {
                    return DecisionBundle::indeterminate(self.effect.into(), status);
                }
            }
        }

        let decision = match self.effect {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        };

        match evaluate_attachments(&self.obligations, &self.advice, self.effect, ctx) {
            Ok((obligations, advice)) => {
                let mut bundle = DecisionBundle::definite(decision);
                bundle.obligations = obligations;
                bundle.advice = advice;
                bundle
            }
            // Fail-closed: an obligation that cannot be evaluated escalates
            // the decision instead of being dropped.
            Err(status) => DecisionBundle::indeterminate(self.effect.into(), status),
        }
    }

    fn applicability(&self, ctx: &EvaluationContext) -> MatchResult {
        match &self.target {
            Some(target) => target.matches(ctx),
            None => MatchResult::Match,
        }
    }
}

impl Combinable for Rule {
    fn decide(&self, ctx: &EvaluationContext) -> DecisionBundle {
        self.evaluate(ctx)
    }

    fn applicability(&self, ctx: &EvaluationContext) -> MatchResult {
        Rule::applicability(self, ctx)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    pub target: Target,
    pub variables: Vec<VariableDefinition>,
    pub rules: Vec<Rule>,
    pub rule_combining: CombiningAlg,
    pub obligations: Vec<ObligationExpression>,
    pub advice: Vec<AdviceExpression>,
}

impl Policy {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> DecisionBundle {
        let target_result = self.target.matches(ctx);
        if target_result == MatchResult::NoMatch {
            return DecisionBundle::not_applicable();
        }

        ctx.push_variables(&self.id, &self.variables);
        let children: Vec<&dyn Combinable> =
            self.rules.iter().map(|r| r as &dyn Combinable).collect();
        let combined = combine(self.rule_combining, &children, ctx);
        let mut out = finish_element(
            combined,
            target_result,
            &self.obligations,
            &self.advice,
            ctx,
        );
        ctx.pop_variables();

        if out.decision != Decision::NotApplicable {
            out.policy_ids.insert(0, self.id.clone());
        }
        out
    }

    /// Structural checks performed once at load.
    pub fn validate(&self) -> PolicyLoadResult<()> {
        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            if !rule_ids.insert(&rule.id) {
                return Err(PolicyLoadError::DuplicateRuleId(rule.id.clone()));
            }
            if let Some(target) = &rule.target {
                validate_target(target)?;
            }
            if let Some(condition) = &rule.condition {
                condition.validate()?;
                if let Some(found) = condition.return_type() {
                    if found != DataType::Boolean {
                        return Err(PolicyLoadError::NonBooleanCondition {
                            rule_id: rule.id.clone(),
                            found: found.local_name().to_string(),
                        });
                    }
                }
            }
            validate_attachments(&rule.obligations, &rule.advice)?;
        }

        let mut variable_ids = HashSet::new();
        for variable in &self.variables {
            if !variable_ids.insert(&variable.id) {
                return Err(PolicyLoadError::DuplicateVariableId(variable.id.clone()));
            }
            variable.expression.validate()?;
        }
        for rule in &self.rules {
            if let Some(condition) = &rule.condition {
                check_variable_refs(condition, &variable_ids)?;
            }
        }

        validate_target(&self.target)?;
        validate_attachments(&self.obligations, &self.advice)?;
        Ok(())
    }
}

fn validate_target(target: &Target) -> PolicyLoadResult<()> {
    for any_of in &target.any_ofs {
        for all_of in &any_of.all_ofs {
            for m in &all_of.matches {
                if !m.function.is_match_function() {
                    return Err(PolicyLoadError::NotAMatchFunction {
                        function: m.function.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_attachments(
    obligations: &[ObligationExpression],
    advice: &[AdviceExpression],
) -> PolicyLoadResult<()> {
    for obligation in obligations {
        for assignment in &obligation.assignments {
            assignment.expression.validate()?;
        }
    }
    for item in advice {
        for assignment in &item.assignments {
            assignment.expression.validate()?;
        }
    }
    Ok(())
}

fn check_variable_refs(
    expression: &Expression,
    defined: &HashSet<&String>,
) -> PolicyLoadResult<()> {
    match expression {
        Expression::VariableReference(id) => {
            if !defined.iter().any(|d| *d == id) {
                return Err(PolicyLoadError::UnknownVariable(id.clone()));
            }
            Ok(())
        }
        Expression::Apply(apply) => {
            for arg in &apply.args {
                check_variable_refs(arg, defined)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Shared tail of Policy/PolicySet evaluation: apply the target result to
/// the combined child decision, then attach the element's own
/// obligations/advice.
fn finish_element(
    combined: DecisionBundle,
    target_result: MatchResult,
    obligations: &[ObligationExpression],
    advice: &[AdviceExpression],
    ctx: &EvaluationContext,
) -> DecisionBundle {
    let mut out = combined;

    if let MatchResult::Indeterminate(status) = target_result {
        // An undecidable target caps the element at Indeterminate, flavoured
        // by what the children would have produced.
        let kind = match out.decision {
            Decision::Permit => Some(IndeterminateKind::Permit),
            Decision::Deny => Some(IndeterminateKind::Deny),
            Decision::Indeterminate(kind) => Some(kind),
            Decision::NotApplicable => None,
        };
        if let Some(kind) = kind {
            let missing = out.missing.clone();
            let mut bundle = DecisionBundle::indeterminate(kind, status);
            for detail in missing {
                if !bundle.missing.contains(&detail) {
                    bundle.missing.push(detail);
                }
            }
            return bundle;
        }
        return out;
    }

    let effect = match out.decision {
        Decision::Permit => Some(Effect::Permit),
        Decision::Deny => Some(Effect::Deny),
        _ => None,
    };
    if let Some(effect) = effect {
        match evaluate_attachments(obligations, advice, effect, ctx) {
            Ok((own_obligations, own_advice)) => {
                out.obligations.extend(own_obligations);
                out.advice.extend(own_advice);
            }
            Err(status) => {
                let missing = out.missing.clone();
                let mut bundle = DecisionBundle::indeterminate(effect.into(), status);
                bundle.missing = missing;
                return bundle;
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// PolicySet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyChild {
    Policy(Arc<Policy>),
    PolicySet(Arc<PolicySet>),
    PolicyRef(String),
    PolicySetRef(String),
}

impl Combinable for PolicyChild {
    fn decide(&self, ctx: &EvaluationContext) -> DecisionBundle {
        match self {
            PolicyChild::Policy(policy) => policy.evaluate(ctx),
            PolicyChild::PolicySet(set) => set.evaluate(ctx),
            PolicyChild::PolicyRef(id) => match ctx.resolver().resolve_policy(id) {
                Some(policy) => policy.evaluate(ctx),
                None => unresolved(id),
            },
            PolicyChild::PolicySetRef(id) => match ctx.resolver().resolve_policy_set(id) {
                Some(set) => set.evaluate(ctx),
                None => unresolved(id),
            },
        }
    }

    fn applicability(&self, ctx: &EvaluationContext) -> MatchResult {
        match self {
            PolicyChild::Policy(policy) => policy.target.matches(ctx),
            PolicyChild::PolicySet(set) => set.target.matches(ctx),
            PolicyChild::PolicyRef(id) => match ctx.resolver().resolve_policy(id) {
                Some(policy) => policy.target.matches(ctx),
                None => MatchResult::Indeterminate(Status::processing_error(format!(
                    "unresolved policy reference '{}'",
                    id
                ))),
            },
            PolicyChild::PolicySetRef(id) => match ctx.resolver().resolve_policy_set(id) {
                Some(set) => set.target.matches(ctx),
                None => MatchResult::Indeterminate(Status::processing_error(format!(
                    "unresolved policy set reference '{}'",
                    id
                ))),
            },
        }
    }
}

fn unresolved(id: &str) -> DecisionBundle {
    DecisionBundle::indeterminate(
        IndeterminateKind::DenyOrPermit,
        Status::processing_error(format!("unresolved policy reference '{}'", id)),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    pub id: String,
    pub version: String,
    pub description: Option<String>,
    pub target: Target,
    pub children: Vec<PolicyChild>,
    pub policy_combining: CombiningAlg,
    pub obligations: Vec<ObligationExpression>,
    pub advice: Vec<AdviceExpression>,
}

impl PolicySet {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> DecisionBundle {
        let target_result = self.target.matches(ctx);
        if target_result == MatchResult::NoMatch {
            return DecisionBundle::not_applicable();
        }

        let children: Vec<&dyn Combinable> = self
            .children
            .iter()
            .map(|c| c as &dyn Combinable)
            .collect();
        let combined = combine(self.policy_combining, &children, ctx);
        let mut out = finish_element(
            combined,
            target_result,
            &self.obligations,
            &self.advice,
            ctx,
        );

        if out.decision != Decision::NotApplicable {
            out.policy_ids.insert(0, self.id.clone());
        }
        out
    }

    pub fn validate(&self) -> PolicyLoadResult<()> {
        validate_target(&self.target)?;
        validate_attachments(&self.obligations, &self.advice)?;
        for child in &self.children {
            match child {
                PolicyChild::Policy(policy) => policy.validate()?,
                PolicyChild::PolicySet(set) => set.validate()?,
                PolicyChild::PolicyRef(_) | PolicyChild::PolicySetRef(_) => {}
            }
        }
        Ok(())
    }

    /// Reference ids this set depends on, for load-time resolution checks.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for child in &self.children {
            match child {
                PolicyChild::PolicyRef(id) | PolicyChild::PolicySetRef(id) => out.push(id.as_str()),
                PolicyChild::PolicySet(set) => out.extend(set.references()),
                PolicyChild::Policy(_) => {}
            }
        }
        out
    }
}
