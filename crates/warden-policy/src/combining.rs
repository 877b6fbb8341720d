//! Decision-combining algorithms.
//!
//! Children are always evaluated in document order, so the `ordered-*`
//! variants share their unordered counterpart's implementation; the
//! reduction tables guarantee the unordered algorithms produce the same
//! result for any evaluation order.
//!
//! Obligation handling is fail-closed: a combined bundle keeps the
//! obligations of exactly the children whose decision equals the combined
//! decision, and missing-attribute details observed anywhere on the
//! evaluated path are carried upward regardless of the final decision.

use warden_core::{
    Advice, Decision, IndeterminateKind, MissingAttributeDetail, Obligation, Status,
};

use crate::context::EvaluationContext;
use crate::error::{PolicyLoadError, PolicyLoadResult};
use crate::target::MatchResult;

// ---------------------------------------------------------------------------
// DecisionBundle — a decision plus everything that travels with it
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionBundle {
    pub decision: Decision,
    /// Ok unless the decision is Indeterminate.
    pub status: Status,
    pub obligations: Vec<Obligation>,
    pub advice: Vec<Advice>,
    /// Missing-attribute descriptors observed while evaluating this element,
    /// kept even when a combining algorithm absorbs the Indeterminate that
    /// produced them.
    pub missing: Vec<MissingAttributeDetail>,
    /// Ids of policies that contributed a non-NotApplicable decision.
    pub policy_ids: Vec<String>,
}

impl DecisionBundle {
    pub fn not_applicable() -> Self {
        Self {
            decision: Decision::NotApplicable,
            status: Status::ok(),
            obligations: Vec::new(),
            advice: Vec::new(),
            missing: Vec::new(),
            policy_ids: Vec::new(),
        }
    }

    pub fn definite(decision: Decision) -> Self {
        Self {
            decision,
            ..Self::not_applicable()
        }
    }

    pub fn indeterminate(kind: IndeterminateKind, status: Status) -> Self {
        Self {
            decision: Decision::Indeterminate(kind),
            missing: status.missing.clone(),
            status,
            obligations: Vec::new(),
            advice: Vec::new(),
            policy_ids: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Combinable — what an algorithm sees of a child
// ---------------------------------------------------------------------------

/// A child element a combining algorithm can drive: full evaluation, or
/// target-only applicability for `only-one-applicable`.
pub trait Combinable {
    fn decide(&self, ctx: &EvaluationContext) -> DecisionBundle;
    fn applicability(&self, ctx: &EvaluationContext) -> MatchResult;
}

// ---------------------------------------------------------------------------
// CombiningAlg
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombiningAlg {
    DenyOverrides,
    PermitOverrides,
    FirstApplicable,
    OnlyOneApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
    OrderedDenyOverrides,
    OrderedPermitOverrides,
}

/// Whether a combining URI appears on a Policy (rules) or a PolicySet
/// (policies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombiningScope {
    Rule,
    Policy,
}

impl CombiningAlg {
    /// Resolve a combining-algorithm URI. Legacy 1.0/1.1 URIs and the 3.0
    /// URIs map to the same algorithms; `only-one-applicable` exists only at
    /// policy scope.
    pub fn from_uri(uri: &str, scope: CombiningScope) -> PolicyLoadResult<Self> {
        let marker = match scope {
            CombiningScope::Rule => ":rule-combining-algorithm:",
            CombiningScope::Policy => ":policy-combining-algorithm:",
        };
        let known_prefix = uri.starts_with("urn:oasis:names:tc:xacml:");
        let local = uri.rfind(marker).map(|pos| &uri[pos + marker.len()..]);

        let alg = match (known_prefix, local) {
            (true, Some("deny-overrides")) => Some(CombiningAlg::DenyOverrides),
            (true, Some("permit-overrides")) => Some(CombiningAlg::PermitOverrides),
            (true, Some("ordered-deny-overrides")) => Some(CombiningAlg::OrderedDenyOverrides),
            (true, Some("ordered-permit-overrides")) => Some(CombiningAlg::OrderedPermitOverrides),
            (true, Some("first-applicable")) => Some(CombiningAlg::FirstApplicable),
            (true, Some("deny-unless-permit")) => Some(CombiningAlg::DenyUnlessPermit),
            (true, Some("permit-unless-deny")) => Some(CombiningAlg::PermitUnlessDeny),
            (true, Some("only-one-applicable")) if scope == CombiningScope::Policy => {
                Some(CombiningAlg::OnlyOneApplicable)
            }
            _ => None,
        };
        alg.ok_or_else(|| PolicyLoadError::UnknownCombiningAlgorithm(uri.to_string()))
    }

    pub fn uri(self, scope: CombiningScope) -> String {
        let (version, name) = match self {
            CombiningAlg::DenyOverrides => ("3.0", "deny-overrides"),
            CombiningAlg::PermitOverrides => ("3.0", "permit-overrides"),
            CombiningAlg::OrderedDenyOverrides => ("3.0", "ordered-deny-overrides"),
            CombiningAlg::OrderedPermitOverrides => ("3.0", "ordered-permit-overrides"),
            CombiningAlg::FirstApplicable => ("1.0", "first-applicable"),
            CombiningAlg::OnlyOneApplicable => ("1.0", "only-one-applicable"),
            CombiningAlg::DenyUnlessPermit => ("3.0", "deny-unless-permit"),
            CombiningAlg::PermitUnlessDeny => ("3.0", "permit-unless-deny"),
        };
        let marker = match scope {
            CombiningScope::Rule => "rule-combining-algorithm",
            CombiningScope::Policy => "policy-combining-algorithm",
        };
        format!("urn:oasis:names:tc:xacml:{}:{}:{}", version, marker, name)
    }
}

// ---------------------------------------------------------------------------
// combine — the reduction entry point
// ---------------------------------------------------------------------------

pub fn combine(
    alg: CombiningAlg,
    children: &[&dyn Combinable],
    ctx: &EvaluationContext,
) -> DecisionBundle {
    match alg {
        CombiningAlg::DenyOverrides | CombiningAlg::OrderedDenyOverrides => {
            let bundles = evaluate_all(children, ctx);
            reduce_overrides(bundles, Decision::Deny)
        }
        CombiningAlg::PermitOverrides | CombiningAlg::OrderedPermitOverrides => {
            let bundles = evaluate_all(children, ctx);
            reduce_overrides(bundles, Decision::Permit)
        }
        CombiningAlg::FirstApplicable => first_applicable(children, ctx),
        CombiningAlg::OnlyOneApplicable => only_one_applicable(children, ctx),
        CombiningAlg::DenyUnlessPermit => default_unless(children, ctx, Decision::Permit),
        CombiningAlg::PermitUnlessDeny => default_unless(children, ctx, Decision::Deny),
    }
}

fn evaluate_all(children: &[&dyn Combinable], ctx: &EvaluationContext) -> Vec<DecisionBundle> {
    children.iter().map(|c| c.decide(ctx)).collect()
}

fn collect_missing(bundles: &[DecisionBundle]) -> Vec<MissingAttributeDetail> {
    let mut missing = Vec::new();
    for bundle in bundles {
        for detail in &bundle.missing {
            if !missing.contains(detail) {
                missing.push(detail.clone());
            }
        }
    }
    missing
}

/// Merge the obligations/advice/policy-ids of the children whose decision
/// equals `decision` into a result bundle.
fn gather(bundles: Vec<DecisionBundle>, decision: Decision) -> DecisionBundle {
    let missing = collect_missing(&bundles);
    let mut out = DecisionBundle::definite(decision);
    out.missing = missing;
    for bundle in bundles {
        if bundle.decision == decision {
            out.obligations.extend(bundle.obligations);
            out.advice.extend(bundle.advice);
        }
        if bundle.decision != Decision::NotApplicable {
            out.policy_ids.extend(bundle.policy_ids);
        }
    }
    out
}

/// Status for an Indeterminate outcome: the first contributing child status,
/// with every observed missing descriptor merged in.
fn indeterminate_from(bundles: Vec<DecisionBundle>, kind: IndeterminateKind) -> DecisionBundle {
    let missing = collect_missing(&bundles);
    let mut status = bundles
        .into_iter()
        .find(|b| b.decision.is_indeterminate())
        .map(|b| b.status)
        .unwrap_or_else(|| Status::processing_error("indeterminate combination"));
    status.missing = missing.clone();
    let mut out = DecisionBundle::indeterminate(kind, status);
    out.missing = missing;
    out
}

/// The XACML 3.0 `deny-overrides` table, parameterized by the overriding
/// effect so `permit-overrides` is its mirror image.
fn reduce_overrides(bundles: Vec<DecisionBundle>, overriding: Decision) -> DecisionBundle {
    let (other, kind_over, kind_other) = match overriding {
        Decision::Deny => (
            Decision::Permit,
            IndeterminateKind::Deny,
            IndeterminateKind::Permit,
        ),
        _ => (
            Decision::Deny,
            IndeterminateKind::Permit,
            IndeterminateKind::Deny,
        ),
    };

    let mut saw_over = false;
    let mut saw_other = false;
    let mut saw_ind_over = false;
    let mut saw_ind_other = false;
    let mut saw_ind_both = false;

    for bundle in &bundles {
        match bundle.decision {
            d if d == overriding => saw_over = true,
            d if d == other => saw_other = true,
            Decision::Indeterminate(IndeterminateKind::DenyOrPermit) => saw_ind_both = true,
            Decision::Indeterminate(k) if k == kind_over => saw_ind_over = true,
            Decision::Indeterminate(_) => saw_ind_other = true,
            _ => {}
        }
    }

    if saw_over {
        return gather(bundles, overriding);
    }
    if saw_ind_both {
        return indeterminate_from(bundles, IndeterminateKind::DenyOrPermit);
    }
    if saw_ind_over && (saw_ind_other || saw_other) {
        return indeterminate_from(bundles, IndeterminateKind::DenyOrPermit);
    }
    if saw_ind_over {
        return indeterminate_from(bundles, kind_over);
    }
    if saw_other {
        return gather(bundles, other);
    }
    if saw_ind_other {
        return indeterminate_from(bundles, kind_other);
    }
    let missing = collect_missing(&bundles);
    let mut out = DecisionBundle::not_applicable();
    out.missing = missing;
    out
}

/// Return the first child whose decision is not NotApplicable, carrying the
/// missing descriptors seen along the way.
fn first_applicable(children: &[&dyn Combinable], ctx: &EvaluationContext) -> DecisionBundle {
    let mut missing: Vec<MissingAttributeDetail> = Vec::new();
    for child in children {
        let bundle = child.decide(ctx);
        for detail in &bundle.missing {
            if !missing.contains(detail) {
                missing.push(detail.clone());
            }
        }
        if bundle.decision != Decision::NotApplicable {
            let mut out = bundle;
            out.missing = missing;
            return out;
        }
    }
    let mut out = DecisionBundle::not_applicable();
    out.missing = missing;
    out
}

/// Exactly one child may be applicable (by target); two or an undecidable
/// applicability are errors.
fn only_one_applicable(children: &[&dyn Combinable], ctx: &EvaluationContext) -> DecisionBundle {
    let mut selected: Option<usize> = None;
    for (index, child) in children.iter().enumerate() {
        match child.applicability(ctx) {
            MatchResult::Indeterminate(status) => {
                return DecisionBundle::indeterminate(IndeterminateKind::DenyOrPermit, status);
            }
            MatchResult::Match => {
                if selected.is_some() {
                    return DecisionBundle::indeterminate(
                        IndeterminateKind::DenyOrPermit,
                        Status::processing_error(
                            "more than one policy is applicable under only-one-applicable",
                        ),
                    );
                }
                selected = Some(index);
            }
            MatchResult::NoMatch => {}
        }
    }
    match selected {
        Some(index) => children[index].decide(ctx),
        None => DecisionBundle::not_applicable(),
    }
}

/// `deny-unless-permit` / `permit-unless-deny`: never NotApplicable, never
/// Indeterminate.
fn default_unless(
    children: &[&dyn Combinable],
    ctx: &EvaluationContext,
    wanted: Decision,
) -> DecisionBundle {
    let fallback = match wanted {
        Decision::Permit => Decision::Deny,
        _ => Decision::Permit,
    };
    let bundles = evaluate_all(children, ctx);
    let found = bundles.iter().any(|b| b.decision == wanted);
    gather(bundles, if found { wanted } else { fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Request;

    use crate::context::AttributeSource;
    use crate::policy::NoReferences;

    /// Test double: a child with a canned decision.
    struct Fixed(DecisionBundle);

    impl Combinable for Fixed {
        fn decide(&self, _ctx: &EvaluationContext) -> DecisionBundle {
            self.0.clone()
        }

        fn applicability(&self, _ctx: &EvaluationContext) -> MatchResult {
            match self.0.decision {
                Decision::NotApplicable => MatchResult::NoMatch,
                Decision::Indeterminate(_) => {
                    MatchResult::Indeterminate(self.0.status.clone())
                }
                _ => MatchResult::Match,
            }
        }
    }

    fn permit() -> Fixed {
        Fixed(DecisionBundle::definite(Decision::Permit))
    }

    fn deny() -> Fixed {
        Fixed(DecisionBundle::definite(Decision::Deny))
    }

    fn na() -> Fixed {
        Fixed(DecisionBundle::not_applicable())
    }

    fn ind(kind: IndeterminateKind) -> Fixed {
        Fixed(DecisionBundle::indeterminate(
            kind,
            Status::processing_error("test"),
        ))
    }

    fn run(alg: CombiningAlg, children: &[&dyn Combinable]) -> Decision {
        let request = Request::default();
        let sources: Vec<Box<dyn AttributeSource>> = Vec::new();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        combine(alg, children, &ctx).decision
    }

    #[test]
    fn test_deny_overrides_deny_wins() {
        let children: Vec<Box<dyn Combinable>> =
            vec![Box::new(permit()), Box::new(deny()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::DenyOverrides, &refs), Decision::Deny);
    }

    #[test]
    fn test_deny_overrides_deny_beats_indeterminate() {
        let children: Vec<Box<dyn Combinable>> = vec![
            Box::new(ind(IndeterminateKind::Permit)),
            Box::new(deny()),
        ];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::DenyOverrides, &refs), Decision::Deny);
    }

    #[test]
    fn test_deny_overrides_permit_when_no_deny() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(na()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::DenyOverrides, &refs), Decision::Permit);
    }

    #[test]
    fn test_deny_overrides_ind_d_with_permit_escalates() {
        let children: Vec<Box<dyn Combinable>> = vec![
            Box::new(ind(IndeterminateKind::Deny)),
            Box::new(permit()),
        ];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(
            run(CombiningAlg::DenyOverrides, &refs),
            Decision::Indeterminate(IndeterminateKind::DenyOrPermit)
        );
    }

    #[test]
    fn test_deny_overrides_ind_p_only() {
        let children: Vec<Box<dyn Combinable>> =
            vec![Box::new(ind(IndeterminateKind::Permit)), Box::new(na())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(
            run(CombiningAlg::DenyOverrides, &refs),
            Decision::Indeterminate(IndeterminateKind::Permit)
        );
    }

    #[test]
    fn test_deny_overrides_empty_is_not_applicable() {
        let refs: Vec<&dyn Combinable> = Vec::new();
        assert_eq!(run(CombiningAlg::DenyOverrides, &refs), Decision::NotApplicable);
    }

    #[test]
    fn test_permit_overrides_mirror() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(deny()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::PermitOverrides, &refs), Decision::Permit);
    }

    #[test]
    fn test_first_applicable_returns_first_decided() {
        let children: Vec<Box<dyn Combinable>> =
            vec![Box::new(na()), Box::new(deny()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::FirstApplicable, &refs), Decision::Deny);
    }

    #[test]
    fn test_first_applicable_propagates_indeterminate() {
        let children: Vec<Box<dyn Combinable>> = vec![
            Box::new(na()),
            Box::new(ind(IndeterminateKind::Permit)),
            Box::new(deny()),
        ];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(
            run(CombiningAlg::FirstApplicable, &refs),
            Decision::Indeterminate(IndeterminateKind::Permit)
        );
    }

    #[test]
    fn test_only_one_applicable_single() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(na()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::OnlyOneApplicable, &refs), Decision::Permit);
    }

    #[test]
    fn test_only_one_applicable_two_is_indeterminate() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(permit()), Box::new(deny())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(
            run(CombiningAlg::OnlyOneApplicable, &refs),
            Decision::Indeterminate(IndeterminateKind::DenyOrPermit)
        );
    }

    #[test]
    fn test_only_one_applicable_none_is_not_applicable() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(na())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(
            run(CombiningAlg::OnlyOneApplicable, &refs),
            Decision::NotApplicable
        );
    }

    #[test]
    fn test_deny_unless_permit_never_indeterminate() {
        let children: Vec<Box<dyn Combinable>> = vec![
            Box::new(ind(IndeterminateKind::Permit)),
            Box::new(na()),
        ];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::DenyUnlessPermit, &refs), Decision::Deny);
    }

    #[test]
    fn test_deny_unless_permit_permits() {
        let children: Vec<Box<dyn Combinable>> = vec![Box::new(deny()), Box::new(permit())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::DenyUnlessPermit, &refs), Decision::Permit);
    }

    #[test]
    fn test_permit_unless_deny_mirror() {
        let children: Vec<Box<dyn Combinable>> =
            vec![Box::new(ind(IndeterminateKind::Deny)), Box::new(na())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();
        assert_eq!(run(CombiningAlg::PermitUnlessDeny, &refs), Decision::Permit);
    }

    #[test]
    fn test_missing_details_survive_absorption() {
        let mut ind_bundle = DecisionBundle::indeterminate(
            IndeterminateKind::Permit,
            Status::missing_attribute(MissingAttributeDetail {
                category: "urn:example:resource".into(),
                attribute_id: "task_expires".into(),
                data_type: warden_core::DataType::DateTime,
                issuer: None,
            }),
        );
        ind_bundle.missing = ind_bundle.status.missing.clone();
        let children: Vec<Box<dyn Combinable>> =
            vec![Box::new(Fixed(ind_bundle)), Box::new(deny())];
        let refs: Vec<&dyn Combinable> = children.iter().map(|c| c.as_ref()).collect();

        let request = Request::default();
        let sources: Vec<Box<dyn AttributeSource>> = Vec::new();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let combined = combine(CombiningAlg::DenyOverrides, &refs, &ctx);
        assert_eq!(combined.decision, Decision::Deny);
        assert_eq!(combined.missing.len(), 1);
        assert_eq!(combined.missing[0].attribute_id, "task_expires");
    }

    #[test]
    fn test_combining_alg_uri_resolution() {
        let alg = CombiningAlg::from_uri(
            "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides",
            CombiningScope::Rule,
        )
        .unwrap();
        assert_eq!(alg, CombiningAlg::DenyOverrides);

        let legacy = CombiningAlg::from_uri(
            "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:deny-overrides",
            CombiningScope::Rule,
        )
        .unwrap();
        assert_eq!(legacy, CombiningAlg::DenyOverrides);

        let oon = CombiningAlg::from_uri(
            "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable",
            CombiningScope::Policy,
        )
        .unwrap();
        assert_eq!(oon, CombiningAlg::OnlyOneApplicable);
    }

    #[test]
    fn test_combining_alg_rejects_unknown_and_misplaced() {
        assert!(CombiningAlg::from_uri("urn:example:custom-alg", CombiningScope::Rule).is_err());
        // only-one-applicable never appears at rule scope
        assert!(CombiningAlg::from_uri(
            "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:only-one-applicable",
            CombiningScope::Rule,
        )
        .is_err());
    }

    #[test]
    fn test_uri_roundtrip() {
        for alg in [
            CombiningAlg::DenyOverrides,
            CombiningAlg::PermitOverrides,
            CombiningAlg::FirstApplicable,
            CombiningAlg::DenyUnlessPermit,
            CombiningAlg::PermitUnlessDeny,
            CombiningAlg::OrderedDenyOverrides,
            CombiningAlg::OrderedPermitOverrides,
        ] {
            let uri = alg.uri(CombiningScope::Rule);
            assert_eq!(CombiningAlg::from_uri(&uri, CombiningScope::Rule).unwrap(), alg);
        }
        let uri = CombiningAlg::OnlyOneApplicable.uri(CombiningScope::Policy);
        assert_eq!(
            CombiningAlg::from_uri(&uri, CombiningScope::Policy).unwrap(),
            CombiningAlg::OnlyOneApplicable
        );
    }
}
