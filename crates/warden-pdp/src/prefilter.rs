//! Bloom-filter candidate pruning.
//!
//! At load time the pre-filter harvests `(category, attributeId, literal)`
//! triples from the equality matches in top-level targets. Per evaluation, a
//! small Bloom filter is built over the same triples taken from the request's
//! attribute values; a policy whose target provably needs a literal the
//! request cannot supply is pruned before target matching.
//!
//! A Bloom hit is a *maybe* — only misses are actionable, so false positives
//! merely admit a candidate the target matcher will reject anyway. The
//! filter can prune, never admit, and never influences a decision on its own.

use sha2::{Digest, Sha256};

use warden_core::Request;
use warden_policy::{Function, Match, MatchSource, Target};
use warden_xml::PolicyDocument;

/// Two independent 64-bit hashes of one `(category, id, literal)` triple,
/// both derived from a single SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    h1: u64,
    h2: u64,
}

pub fn fingerprint(category: &str, id: &str, lexical: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(category.as_bytes());
    hasher.update([0u8]);
    hasher.update(id.as_bytes());
    hasher.update([0u8]);
    hasher.update(lexical.as_bytes());
    let digest = hasher.finalize();
    let mut h1 = [0u8; 8];
    let mut h2 = [0u8; 8];
    h1.copy_from_slice(&digest[0..8]);
    h2.copy_from_slice(&digest[8..16]);
    Fingerprint {
        h1: u64::from_be_bytes(h1),
        h2: u64::from_be_bytes(h2),
    }
}

// ---------------------------------------------------------------------------
// RequestFilter — per-evaluation Bloom over request values
// ---------------------------------------------------------------------------

const FILTER_WORDS: usize = 32;
const FILTER_BITS: u64 = (FILTER_WORDS as u64) * 64;

/// 2048-bit Bloom filter, two probes per entry. Requests carry at most a few
/// dozen values, keeping the false-positive rate negligible.
pub struct RequestFilter {
    bits: [u64; FILTER_WORDS],
}

impl RequestFilter {
    pub fn from_request(request: &Request) -> Self {
        let mut filter = Self {
            bits: [0; FILTER_WORDS],
        };
        for group in &request.attributes {
            for attribute in &group.attributes {
                for value in attribute.values.iter() {
                    filter.insert(fingerprint(
                        &group.category,
                        &attribute.id,
                        &value.lexical(),
                    ));
                }
            }
        }
        filter
    }

    fn insert(&mut self, fp: Fingerprint) {
        for bit in [fp.h1 % FILTER_BITS, fp.h2 % FILTER_BITS] {
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
    }

    pub fn maybe_contains(&self, fp: &Fingerprint) -> bool {
        [fp.h1 % FILTER_BITS, fp.h2 % FILTER_BITS]
            .iter()
            .all(|bit| self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }
}

// ---------------------------------------------------------------------------
// TargetPrefilter — harvested literals per root document
// ---------------------------------------------------------------------------

/// The literals an `AllOf` requires; an `AnyOf` is usable for pruning only
/// when every one of its `AllOf`s yielded at least one literal.
type AllOfLiterals = Vec<Fingerprint>;
type AnyOfFilter = Vec<AllOfLiterals>;

pub struct TargetPrefilter {
    per_root: Vec<Vec<AnyOfFilter>>,
}

impl TargetPrefilter {
    pub fn harvest(roots: &[PolicyDocument]) -> Self {
        let per_root = roots
            .iter()
            .map(|root| {
                let target = match root {
                    PolicyDocument::Policy(policy) => &policy.target,
                    PolicyDocument::PolicySet(set) => &set.target,
                };
                harvest_target(target)
            })
            .collect();
        Self { per_root }
    }

    /// False only when the root's target provably cannot match any request
    /// value: some conjunct's literals are all absent from the filter.
    pub fn admits(&self, root_index: usize, filter: &RequestFilter) -> bool {
        let Some(any_ofs) = self.per_root.get(root_index) else {
            return true;
        };
        for any_of in any_ofs {
            let satisfiable = any_of.iter().any(|all_of| {
                all_of.iter().all(|fp| filter.maybe_contains(fp))
            });
            if !satisfiable {
                return false;
            }
        }
        true
    }
}

fn harvest_target(target: &Target) -> Vec<AnyOfFilter> {
    let mut out = Vec::new();
    for any_of in &target.any_ofs {
        let mut filter: AnyOfFilter = Vec::with_capacity(any_of.all_ofs.len());
        let mut usable = true;
        for all_of in &any_of.all_ofs {
            let literals: AllOfLiterals = all_of
                .matches
                .iter()
                .filter_map(harvest_match)
                .collect();
            if literals.is_empty() {
                // An AllOf with no harvestable literal could match anything;
                // the whole AnyOf is useless for pruning.
                usable = false;
                break;
            }
            filter.push(literals);
        }
        if usable {
            out.push(filter);
        }
    }
    out
}

/// Only equality matches over designators pin an exact attribute value.
/// Environment attributes are excluded: the finder chain can synthesize
/// those even when the request carries none, so their absence from the
/// request proves nothing.
fn harvest_match(m: &Match) -> Option<Fingerprint> {
    if !matches!(m.function, Function::Equal(_)) {
        return None;
    }
    let MatchSource::Designator(designator) = &m.source else {
        return None;
    };
    if designator.key.category == warden_core::categories::ENVIRONMENT {
        return None;
    }
    Some(fingerprint(
        &designator.key.category,
        &designator.key.id,
        &m.literal.lexical(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_core::categories;
    use warden_core::{
        AttributeCategory, AttributeValue, Bag, DataType, RequestAttribute,
    };
    use warden_policy::{
        AllOf, AnyOf, AttributeDesignator, AttributeKey, CombiningAlg, Policy,
    };

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

    fn equality_target(action: &str) -> Target {
        Target {
            any_ofs: vec![AnyOf {
                all_ofs: vec![AllOf {
                    matches: vec![Match {
                        function: Function::Equal(DataType::String),
                        literal: AttributeValue::string(action),
                        source: MatchSource::Designator(AttributeDesignator {
                            key: AttributeKey::new(categories::ACTION, "action", DataType::String),
                            must_be_present: false,
                        }),
                    }],
                }],
            }],
        }
    }

    fn root(action: &str) -> PolicyDocument {
        PolicyDocument::Policy(Arc::new(Policy {
            id: format!("{}-policy", action),
            version: "1.0".into(),
            description: None,
            target: equality_target(action),
            variables: Vec::new(),
            rules: Vec::new(),
            rule_combining: CombiningAlg::DenyOverrides,
            obligations: Vec::new(),
            advice: Vec::new(),
        }))
    }

    #[test]
    fn test_prunes_unsatisfiable_target() {
        let roots = vec![root("train"), root("evaluate")];
        let prefilter = TargetPrefilter::harvest(&roots);
        let filter = RequestFilter::from_request(&action_request("train"));

        assert!(prefilter.admits(0, &filter));
        assert!(!prefilter.admits(1, &filter));
    }

    #[test]
    fn test_empty_target_is_always_admitted() {
        let doc = PolicyDocument::Policy(Arc::new(Policy {
            id: "open".into(),
            version: "1.0".into(),
            description: None,
            target: Target::empty(),
            variables: Vec::new(),
            rules: Vec::new(),
            rule_combining: CombiningAlg::DenyOverrides,
            obligations: Vec::new(),
            advice: Vec::new(),
        }));
        let prefilter = TargetPrefilter::harvest(&[doc]);
        let filter = RequestFilter::from_request(&action_request("anything"));
        assert!(prefilter.admits(0, &filter));
    }

    #[test]
    fn test_non_equality_match_disables_pruning() {
        let mut target = equality_target("train");
        target.any_ofs[0].all_ofs[0].matches[0].function =
            Function::RegexpMatch(DataType::String);
        let doc = PolicyDocument::Policy(Arc::new(Policy {
            id: "regex".into(),
            version: "1.0".into(),
            description: None,
            target,
            variables: Vec::new(),
            rules: Vec::new(),
            rule_combining: CombiningAlg::DenyOverrides,
            obligations: Vec::new(),
            advice: Vec::new(),
        }));
        let prefilter = TargetPrefilter::harvest(&[doc]);
        // Request without any matching literal still admitted: a regex match
        // cannot be fingerprinted.
        let filter = RequestFilter::from_request(&action_request("other"));
        assert!(prefilter.admits(0, &filter));
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_distinct() {
        let a = fingerprint("c", "id", "v");
        let b = fingerprint("c", "id", "v");
        let c = fingerprint("c", "id", "w");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_filter_membership() {
        let mut filter = RequestFilter {
            bits: [0; FILTER_WORDS],
        };
        let fp = fingerprint("c", "id", "v");
        assert!(!filter.maybe_contains(&fp));
        filter.insert(fp);
        assert!(filter.maybe_contains(&fp));
    }

    #[test]
    fn test_out_of_range_index_admits() {
        let prefilter = TargetPrefilter::harvest(&[]);
        let filter = RequestFilter::from_request(&action_request("x"));
        assert!(prefilter.admits(5, &filter));
    }
}
