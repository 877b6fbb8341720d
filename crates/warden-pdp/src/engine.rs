//! The PDP: build once, evaluate forever.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{debug, info, warn};

use warden_audit::{AuditRecord, AuditSink};
use warden_core::{
    attribute_ids, categories, utc_offset, AttributeCategory, DataType, DateTime, Request,
    Response, ResultItem, Status, StatusCode,
};
use warden_policy::combining::{combine, Combinable, DecisionBundle};
use warden_policy::{
    AttributeSource, CombiningAlg, EnvironmentSource, EvaluationContext, MatchResult,
};
use warden_xml::{parse_policy_document, parse_request, PolicyDocument};

use crate::error::{PdpError, PdpResult};
use crate::prefilter::{RequestFilter, TargetPrefilter};
use crate::store::PolicyStore;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates policy documents and configuration, then builds an immutable
/// [`Pdp`]. Any load problem aborts the build; the PDP never starts
/// half-loaded.
pub struct PdpBuilder {
    documents: Vec<PolicyDocument>,
    sources: Vec<Box<dyn AttributeSource>>,
    sink: Option<Arc<dyn AuditSink>>,
    root_combining: CombiningAlg,
    default_tz: FixedOffset,
    prefilter: bool,
}

impl Default for PdpBuilder {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            sources: Vec::new(),
            sink: None,
            root_combining: CombiningAlg::DenyOverrides,
            default_tz: utc_offset(),
            prefilter: true,
        }
    }
}

impl PdpBuilder {
    /// Load one policy document from an XML string.
    pub fn policy_xml(mut self, xml: &str) -> PdpResult<Self> {
        self.documents.push(parse_policy_document(xml)?);
        Ok(self)
    }

    /// Load one policy document from a file.
    pub fn policy_file(self, path: &Path) -> PdpResult<Self> {
        let xml = std::fs::read_to_string(path).map_err(|source| PdpError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.policy_xml(&xml)
    }

    /// Load every `.xml` file in a directory, in name order.
    pub fn policy_dir(mut self, dir: &Path) -> PdpResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|source| PdpError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
            .collect();
        paths.sort();
        for path in paths {
            self = self.policy_file(&path)?;
        }
        Ok(self)
    }

    /// Append a finder module to the chain. Modules are consulted in
    /// registration order; the built-in environment source always runs last.
    pub fn attribute_source(mut self, source: Box<dyn AttributeSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Combining algorithm over the top-level documents. Defaults to
    /// deny-overrides.
    pub fn root_combining(mut self, alg: CombiningAlg) -> Self {
        self.root_combining = alg;
        self
    }

    /// Timezone applied to date/time values without a designator.
    pub fn default_timezone(mut self, offset: FixedOffset) -> Self {
        self.default_tz = offset;
        self
    }

    /// Enable or disable the Bloom candidate pre-filter.
    pub fn prefilter(mut self, enabled: bool) -> Self {
        self.prefilter = enabled;
        self
    }

    pub fn build(mut self) -> PdpResult<Pdp> {
        let mut store = PolicyStore::new();
        for document in self.documents {
            store.insert(document)?;
        }
        store.verify()?;

        let prefilter = self
            .prefilter
            .then(|| TargetPrefilter::harvest(store.roots()));

        self.sources.push(Box::new(EnvironmentSource));

        info!(
            policies = store.policy_count(),
            roots = store.roots().len(),
            prefilter = prefilter.is_some(),
            "policy decision point initialized"
        );

        Ok(Pdp {
            store,
            sources: self.sources,
            sink: self.sink,
            root_combining: self.root_combining,
            default_tz: self.default_tz,
            prefilter,
        })
    }
}

// ---------------------------------------------------------------------------
// Pdp
// ---------------------------------------------------------------------------

/// The decision point. Immutable after [`PdpBuilder::build`]; evaluations
/// share nothing mutable and may run concurrently.
pub struct Pdp {
    store: PolicyStore,
    sources: Vec<Box<dyn AttributeSource>>,
    sink: Option<Arc<dyn AuditSink>>,
    root_combining: CombiningAlg,
    default_tz: FixedOffset,
    prefilter: Option<TargetPrefilter>,
}

/// Adapter giving root documents to the combining algorithms.
struct RootChild<'d>(&'d PolicyDocument);

impl Combinable for RootChild<'_> {
    fn decide(&self, ctx: &EvaluationContext) -> DecisionBundle {
        match self.0 {
            PolicyDocument::Policy(policy) => policy.evaluate(ctx),
            PolicyDocument::PolicySet(set) => set.evaluate(ctx),
        }
    }

    fn applicability(&self, ctx: &EvaluationContext) -> MatchResult {
        match self.0 {
            PolicyDocument::Policy(policy) => policy.target.matches(ctx),
            PolicyDocument::PolicySet(set) => set.target.matches(ctx),
        }
    }
}

impl Pdp {
    pub fn builder() -> PdpBuilder {
        PdpBuilder::default()
    }

    /// Evaluate a parsed request. Total: always returns a Response.
    pub fn evaluate(&self, request: &Request) -> Response {
        let ctx = EvaluationContext::new(request, &self.sources, &self.store, self.default_tz);

        let request_filter = self
            .prefilter
            .as_ref()
            .map(|_| RequestFilter::from_request(request));

        let mut candidates: Vec<RootChild> = Vec::with_capacity(self.store.roots().len());
        for (index, root) in self.store.roots().iter().enumerate() {
            let admitted = match (&self.prefilter, &request_filter) {
                (Some(prefilter), Some(filter)) => prefilter.admits(index, filter),
                _ => true,
            };
            if admitted {
                candidates.push(RootChild(root));
            } else {
                debug!(policy = root.id(), "candidate pruned by pre-filter");
            }
        }

        let children: Vec<&dyn Combinable> = candidates
            .iter()
            .map(|c| c as &dyn Combinable)
            .collect();
        let bundle = combine(self.root_combining, &children, &ctx);

        let policy_refs = bundle.policy_ids.clone();
        let response = self.assemble(request, bundle);
        self.audit(request, &response, policy_refs);
        response
    }

    /// Evaluate a raw Request XML document. Malformed input becomes
    /// `Indeterminate(syntax-error)`; nothing is thrown past this boundary.
    pub fn evaluate_xml(&self, xml: &str) -> Response {
        match parse_request(xml) {
            Ok(request) => self.evaluate(&request),
            Err(error) => {
                warn!(%error, "request rejected at parse");
                let response = Response::indeterminate(Status::syntax_error(error.to_string()));
                self.audit(&Request::default(), &response, Vec::new());
                response
            }
        }
    }

    fn assemble(&self, request: &Request, bundle: DecisionBundle) -> Response {
        let status = if bundle.decision.is_indeterminate() {
            let mut status = bundle.status;
            for detail in bundle.missing {
                if !status.missing.contains(&detail) {
                    status.missing.push(detail);
                }
            }
            status
        } else {
            Status {
                code: StatusCode::Ok,
                message: None,
                missing: bundle.missing,
            }
        };

        let attributes = echoed_attributes(request);
        let policy_id_list = if request.return_policy_id_list {
            bundle.policy_ids
        } else {
            Vec::new()
        };

        Response {
            results: vec![ResultItem {
                decision: bundle.decision,
                status,
                obligations: bundle.obligations,
                advice: bundle.advice,
                attributes,
                policy_id_list,
            }],
        }
    }

    fn audit(&self, request: &Request, response: &Response, policy_refs: Vec<String>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Some(result) = response.result() else {
            return;
        };

        let mut record = AuditRecord::new(
            DateTime::now().original().to_string(),
            result.decision.as_str(),
        );
        record.subject = first_string(
            request,
            categories::SUBJECT,
            &[attribute_ids::SUBJECT_ID, "subject-id", "node_id"],
        );
        record.resource = first_string(
            request,
            categories::RESOURCE_LEGACY,
            &[attribute_ids::RESOURCE_ID, "resource-id", "task_id"],
        )
        .or_else(|| {
            first_string(
                request,
                categories::RESOURCE,
                &[attribute_ids::RESOURCE_ID, "resource-id", "task_id"],
            )
        });
        record.action = first_string(
            request,
            categories::ACTION,
            &[attribute_ids::ACTION_ID, "action-id", "action"],
        );
        record.policy_references = policy_refs;

        if let Err(error) = sink.emit(&record) {
            warn!(%error, "audit sink rejected decision record");
        }
    }
}

/// Category groups reduced to the attributes marked `IncludeInResult`.
fn echoed_attributes(request: &Request) -> Vec<AttributeCategory> {
    let mut out = Vec::new();
    for group in &request.attributes {
        let echoed: Vec<_> = group
            .attributes
            .iter()
            .filter(|a| a.include_in_result)
            .cloned()
            .collect();
        if !echoed.is_empty() {
            out.push(AttributeCategory {
                category: group.category.clone(),
                content: None,
                attributes: echoed,
            });
        }
    }
    out
}

/// First string value among the candidate attribute ids in a category.
fn first_string(request: &Request, category: &str, ids: &[&str]) -> Option<String> {
    for id in ids {
        let bag = request.bag(category, id, DataType::String, None);
        if let Some(value) = bag.iter().next() {
            return Some(value.lexical());
        };
    }
    None
}
