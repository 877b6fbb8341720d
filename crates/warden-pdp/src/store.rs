//! The immutable policy store.
//!
//! Indexes every policy and policy set by id (inline children included),
//! rejects duplicates, and verifies at load that all references resolve and
//! that policy-set references contain no cycles. Implements
//! [`PolicyResolver`] so references stay lazy handles at evaluation time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use warden_policy::{Policy, PolicyChild, PolicyResolver, PolicySet};
use warden_xml::PolicyDocument;

use crate::error::{PdpError, PdpResult};

#[derive(Default)]
pub struct PolicyStore {
    policies: HashMap<String, Arc<Policy>>,
    policy_sets: HashMap<String, Arc<PolicySet>>,
    roots: Vec<PolicyDocument>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level document, indexing it and all inline descendants.
    pub fn insert(&mut self, document: PolicyDocument) -> PdpResult<()> {
        match &document {
            PolicyDocument::Policy(policy) => self.index_policy(policy.clone())?,
            PolicyDocument::PolicySet(set) => self.index_policy_set(set.clone())?,
        }
        self.roots.push(document);
        Ok(())
    }

    fn index_policy(&mut self, policy: Arc<Policy>) -> PdpResult<()> {
        if self.policies.contains_key(&policy.id) || self.policy_sets.contains_key(&policy.id) {
            return Err(PdpError::DuplicatePolicyId(policy.id.clone()));
        }
        self.policies.insert(policy.id.clone(), policy);
        Ok(())
    }

    fn index_policy_set(&mut self, set: Arc<PolicySet>) -> PdpResult<()> {
        if self.policy_sets.contains_key(&set.id) || self.policies.contains_key(&set.id) {
            return Err(PdpError::DuplicatePolicyId(set.id.clone()));
        }
        self.policy_sets.insert(set.id.clone(), set.clone());
        for child in &set.children {
            match child {
                PolicyChild::Policy(policy) => self.index_policy(policy.clone())?,
                PolicyChild::PolicySet(nested) => self.index_policy_set(nested.clone())?,
                PolicyChild::PolicyRef(_) | PolicyChild::PolicySetRef(_) => {}
            }
        }
        Ok(())
    }

    /// Verify that every reference resolves and that set references are
    /// acyclic. Called once after all documents are inserted.
    pub fn verify(&self) -> PdpResult<()> {
        if self.roots.is_empty() {
            return Err(PdpError::NoPolicies);
        }

        for set in self.policy_sets.values() {
            for child in &set.children {
                match child {
                    PolicyChild::PolicyRef(id) => {
                        if !self.policies.contains_key(id) {
                            return Err(PdpError::DanglingReference(id.clone()));
                        }
                    }
                    PolicyChild::PolicySetRef(id) => {
                        if !self.policy_sets.contains_key(id) {
                            return Err(PdpError::DanglingReference(id.clone()));
                        }
                    }
                    _ => {}
                }
            }
        }

        // Cycle check over set-to-set references. Policies cannot introduce
        // cycles: they have no references.
        let mut done: HashSet<&str> = HashSet::new();
        for id in self.policy_sets.keys() {
            let mut path: Vec<&str> = Vec::new();
            self.walk(id.as_str(), &mut path, &mut done)?;
        }
        Ok(())
    }

    fn walk<'s>(
        &'s self,
        id: &'s str,
        path: &mut Vec<&'s str>,
        done: &mut HashSet<&'s str>,
    ) -> PdpResult<()> {
        if done.contains(id) {
            return Ok(());
        }
        if path.contains(&id) {
            return Err(PdpError::ReferenceCycle(id.to_string()));
        }
        let Some(set) = self.policy_sets.get(id) else {
            return Ok(());
        };
        path.push(id);
        for child in &set.children {
            if let PolicyChild::PolicySetRef(next) = child {
                self.walk(next, path, done)?;
            }
        }
        path.pop();
        done.insert(id);
        Ok(())
    }

    pub fn roots(&self) -> &[PolicyDocument] {
        &self.roots
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len() + self.policy_sets.len()
    }
}

impl PolicyResolver for PolicyStore {
    fn resolve_policy(&self, id: &str) -> Option<Arc<Policy>> {
        self.policies.get(id).cloned()
    }

    fn resolve_policy_set(&self, id: &str) -> Option<Arc<PolicySet>> {
        self.policy_sets.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_policy::{CombiningAlg, Target};

    fn policy(id: &str) -> Arc<Policy> {
        Arc::new(Policy {
            id: id.into(),
            version: "1.0".into(),
            description: None,
            target: Target::empty(),
            variables: Vec::new(),
            rules: Vec::new(),
            rule_combining: CombiningAlg::DenyOverrides,
            obligations: Vec::new(),
            advice: Vec::new(),
        })
    }

    fn set(id: &str, children: Vec<PolicyChild>) -> Arc<PolicySet> {
        Arc::new(PolicySet {
            id: id.into(),
            version: "1.0".into(),
            description: None,
            target: Target::empty(),
            children,
            policy_combining: CombiningAlg::DenyOverrides,
            obligations: Vec::new(),
            advice: Vec::new(),
        })
    }

    #[test]
    fn test_insert_and_resolve() {
        let mut store = PolicyStore::new();
        store
            .insert(PolicyDocument::Policy(policy("p1")))
            .unwrap();
        assert!(store.resolve_policy("p1").is_some());
        assert!(store.resolve_policy("p2").is_none());
        store.verify().unwrap();
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut store = PolicyStore::new();
        store.insert(PolicyDocument::Policy(policy("p1"))).unwrap();
        let result = store.insert(PolicyDocument::Policy(policy("p1")));
        assert!(matches!(result, Err(PdpError::DuplicatePolicyId(_))));
    }

    #[test]
    fn test_inline_children_are_indexed() {
        let mut store = PolicyStore::new();
        let root = set("root", vec![PolicyChild::Policy(policy("inner"))]);
        store.insert(PolicyDocument::PolicySet(root)).unwrap();
        assert!(store.resolve_policy("inner").is_some());
        assert!(store.resolve_policy_set("root").is_some());
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut store = PolicyStore::new();
        let root = set("root", vec![PolicyChild::PolicyRef("ghost".into())]);
        store.insert(PolicyDocument::PolicySet(root)).unwrap();
        assert!(matches!(
            store.verify(),
            Err(PdpError::DanglingReference(_))
        ));
    }

    #[test]
    fn test_reference_cycle_rejected() {
        let mut store = PolicyStore::new();
        let a = set("a", vec![PolicyChild::PolicySetRef("b".into())]);
        let b = set("b", vec![PolicyChild::PolicySetRef("a".into())]);
        store.insert(PolicyDocument::PolicySet(a)).unwrap();
        store.insert(PolicyDocument::PolicySet(b)).unwrap();
        assert!(matches!(store.verify(), Err(PdpError::ReferenceCycle(_))));
    }

    #[test]
    fn test_empty_store_rejected() {
        let store = PolicyStore::new();
        assert!(matches!(store.verify(), Err(PdpError::NoPolicies)));
    }
}
