//! Per-evaluation context: attribute lookup, the finder chain, the fixed
//! evaluation clock, and variable memoization.
//!
//! A context is created for one evaluation and discarded with it. The
//! attribute-lookup cache is keyed by the full `(category, id, dataType,
//! issuer)` tuple and lives on the context — never in process-wide state,
//! where entries from one request would answer lookups for another.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use chrono::FixedOffset;
use tracing::debug;

use warden_core::{
    attribute_ids, categories, utc_offset, Bag, ContentNode, DataType, Date, DateTime, EvalResult,
    Request, Time,
};

use crate::expr::Expression;
use crate::policy::{PolicyResolver, VariableDefinition};

// ---------------------------------------------------------------------------
// AttributeKey — the full lookup tuple
// ---------------------------------------------------------------------------

/// Identifies one attribute bag: category, id, dataType, and optional issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    pub category: String,
    pub id: String,
    pub data_type: DataType,
    pub issuer: Option<String>,
}

impl AttributeKey {
    pub fn new(category: impl Into<String>, id: impl Into<String>, data_type: DataType) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            data_type,
            issuer: None,
        }
    }
}

// ---------------------------------------------------------------------------
// EvaluationClock — current-dateTime fixed per evaluation
// ---------------------------------------------------------------------------

/// The evaluation's notion of "now", fixed once when the context is built so
/// that every expression in one evaluation sees the same instant.
#[derive(Debug, Clone)]
pub struct EvaluationClock {
    now: DateTime,
    today: Date,
    time_of_day: Time,
}

impl EvaluationClock {
    /// Derive date and time-of-day views from one dateTime.
    pub fn at(now: DateTime) -> Self {
        let offset = now.tz_offset();
        let local = now.instant().with_timezone(&offset);
        Self {
            today: Date::from_naive(local.date_naive(), Some(offset)),
            time_of_day: Time::from_naive(local.time(), Some(offset)),
            now,
        }
    }

    pub fn now(&self) -> &DateTime {
        &self.now
    }

    pub fn today(&self) -> &Date {
        &self.today
    }

    pub fn time_of_day(&self) -> &Time {
        &self.time_of_day
    }
}

// ---------------------------------------------------------------------------
// AttributeSource — pluggable finder modules
// ---------------------------------------------------------------------------

/// A module that can supply attribute bags the request did not carry.
/// Modules form an ordered chain; the first non-empty bag wins. Modules must
/// be thread-safe; a module that does I/O may block its caller but must not
/// share per-request state.
pub trait AttributeSource: Send + Sync {
    fn name(&self) -> &str;

    /// A bag for the key, or None when this module has nothing to say.
    fn resolve(&self, key: &AttributeKey, clock: &EvaluationClock) -> Option<Bag>;
}

/// Built-in source for the environment clock attributes.
#[derive(Debug, Default)]
pub struct EnvironmentSource;

impl AttributeSource for EnvironmentSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn resolve(&self, key: &AttributeKey, clock: &EvaluationClock) -> Option<Bag> {
        if key.category != categories::ENVIRONMENT || key.issuer.is_some() {
            return None;
        }
        match (key.id.as_str(), key.data_type) {
            (attribute_ids::CURRENT_DATETIME, DataType::DateTime)
            | ("current-dateTime", DataType::DateTime) => Some(Bag::of_one(
                warden_core::AttributeValue::DateTime(clock.now().clone()),
            )),
            (attribute_ids::CURRENT_DATE, DataType::Date)
            | ("current-date", DataType::Date) => Some(Bag::of_one(
                warden_core::AttributeValue::Date(clock.today().clone()),
            )),
            (attribute_ids::CURRENT_TIME, DataType::Time)
            | ("current-time", DataType::Time) => Some(Bag::of_one(
                warden_core::AttributeValue::Time(clock.time_of_day().clone()),
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EvaluationContext
// ---------------------------------------------------------------------------

struct VariableScope {
    policy_id: String,
    definitions: Vec<VariableDefinition>,
}

/// Owned by exactly one evaluation. Interior mutability covers the caches;
/// the context itself is neither shared nor reused across requests.
pub struct EvaluationContext<'a> {
    request: &'a Request,
    sources: &'a [Box<dyn AttributeSource>],
    resolver: &'a dyn PolicyResolver,
    clock: EvaluationClock,
    default_tz: FixedOffset,
    attr_cache: RefCell<HashMap<AttributeKey, Bag>>,
    var_results: RefCell<HashMap<(String, String), EvalResult>>,
    var_in_flight: RefCell<HashSet<(String, String)>>,
    var_scopes: RefCell<Vec<VariableScope>>,
}

impl<'a> EvaluationContext<'a> {
    /// Build a context for one request. The clock is seeded from the
    /// request's environment `current-dateTime` when present, else from the
    /// host clock at this moment.
    pub fn new(
        request: &'a Request,
        sources: &'a [Box<dyn AttributeSource>],
        resolver: &'a dyn PolicyResolver,
        default_tz: FixedOffset,
    ) -> Self {
        let now = request_date_time(request).unwrap_or_else(DateTime::now);
        Self {
            request,
            sources,
            resolver,
            clock: EvaluationClock::at(now),
            default_tz,
            attr_cache: RefCell::new(HashMap::new()),
            var_results: RefCell::new(HashMap::new()),
            var_in_flight: RefCell::new(HashSet::new()),
            var_scopes: RefCell::new(Vec::new()),
        }
    }

    /// Context with the default timezone set to UTC.
    pub fn new_utc(
        request: &'a Request,
        sources: &'a [Box<dyn AttributeSource>],
        resolver: &'a dyn PolicyResolver,
    ) -> Self {
        Self::new(request, sources, resolver, utc_offset())
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn resolver(&self) -> &dyn PolicyResolver {
        self.resolver
    }

    pub fn clock(&self) -> &EvaluationClock {
        &self.clock
    }

    pub fn current_date_time(&self) -> &DateTime {
        self.clock.now()
    }

    /// Offset applied to date/time values lacking a timezone designator.
    pub fn default_tz(&self) -> FixedOffset {
        self.default_tz
    }

    /// The bag for an attribute key: request store first (bags across merged
    /// groups unioned), then the finder chain, else the empty bag. Cached for
    /// the lifetime of this context.
    pub fn attribute(&self, key: &AttributeKey) -> Bag {
        if let Some(hit) = self.attr_cache.borrow().get(key) {
            return hit.clone();
        }

        let mut bag = self.request.bag(
            &key.category,
            &key.id,
            key.data_type,
            key.issuer.as_deref(),
        );

        if bag.is_empty() {
            for source in self.sources {
                if let Some(found) = source.resolve(key, &self.clock) {
                    if !found.is_empty() && found.data_type() == key.data_type {
                        debug!(source = source.name(), id = %key.id, "attribute resolved by finder module");
                        bag = found;
                        break;
                    }
                }
            }
        }

        self.attr_cache.borrow_mut().insert(key.clone(), bag.clone());
        bag
    }

    /// The `<Content>` fragment of a category, if the request carried one.
    pub fn content(&self, category: &str) -> Option<&ContentNode> {
        self.request.content(category)
    }

    // --- variable scoping ---------------------------------------------------

    /// Enter a policy's variable scope. Paired with [`Self::pop_variables`].
    /// Definitions are cloned in: referenced policies resolve to shared
    /// handles at evaluation time, so the scope cannot borrow from them.
    pub fn push_variables(&self, policy_id: &str, definitions: &[VariableDefinition]) {
        self.var_scopes.borrow_mut().push(VariableScope {
            policy_id: policy_id.to_string(),
            definitions: definitions.to_vec(),
        });
    }

    pub fn pop_variables(&self) {
        self.var_scopes.borrow_mut().pop();
    }

    /// The innermost definition for a variable id, with its owning policy id.
    pub fn lookup_variable(&self, id: &str) -> Option<(String, Expression)> {
        let scopes = self.var_scopes.borrow();
        for scope in scopes.iter().rev() {
            if let Some(def) = scope.definitions.iter().find(|d| d.id == id) {
                return Some((scope.policy_id.clone(), def.expression.clone()));
            }
        }
        None
    }

    pub fn cached_variable(&self, policy_id: &str, id: &str) -> Option<EvalResult> {
        self.var_results
            .borrow()
            .get(&(policy_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn cache_variable(&self, policy_id: String, id: String, result: EvalResult) {
        self.var_results.borrow_mut().insert((policy_id, id), result);
    }

    /// Cycle guard for variable resolution. Returns false when the variable
    /// is already being evaluated higher up the stack.
    pub fn begin_variable(&self, policy_id: &str, id: &str) -> bool {
        self.var_in_flight
            .borrow_mut()
            .insert((policy_id.to_string(), id.to_string()))
    }

    pub fn end_variable(&self, policy_id: &str, id: &str) {
        self.var_in_flight
            .borrow_mut()
            .remove(&(policy_id.to_string(), id.to_string()));
    }
}

/// The request's environment current-dateTime, when it carries exactly one.
fn request_date_time(request: &Request) -> Option<DateTime> {
    for id in [attribute_ids::CURRENT_DATETIME, "current-dateTime"] {
        let bag = request.bag(categories::ENVIRONMENT, id, DataType::DateTime, None);
        if bag.size() == 1 {
            if let Ok(warden_core::AttributeValue::DateTime(dt)) =
                bag.one_and_only().map(|v| v.clone())
            {
                return Some(dt);
            }
        }
    }
    None
}
