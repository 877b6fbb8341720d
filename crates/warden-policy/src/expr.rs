//! The evaluable expression tree.
//!
//! One tagged union with a single `evaluate` dispatch point. Metadata
//! (`returns_bag`, `return_type`) is used by load-time validation; the hot
//! path never resolves anything by name.

use warden_core::{
    AttributeValue, Bag, ContentNode, DataType, EvalResult, Evaluated, MissingAttributeDetail,
    Status,
};

use crate::context::{AttributeKey, EvaluationContext};
use crate::error::{PolicyLoadError, PolicyLoadResult};
use crate::functions::{self, Function};

// ---------------------------------------------------------------------------
// Designator / Selector
// ---------------------------------------------------------------------------

/// Fetches an attribute bag by `(category, id, dataType, issuer?)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDesignator {
    pub key: AttributeKey,
    pub must_be_present: bool,
}

impl AttributeDesignator {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult {
        let bag = ctx.attribute(&self.key);
        if bag.is_empty() && self.must_be_present {
            return Err(Status::missing_attribute(MissingAttributeDetail {
                category: self.key.category.clone(),
                attribute_id: self.key.id.clone(),
                data_type: self.key.data_type,
                issuer: self.key.issuer.clone(),
            }));
        }
        Ok(Evaluated::Bag(bag))
    }
}

/// Fetches values out of a category's `<Content>` fragment via a path.
///
/// Supported path subset: absolute child steps (`/a/b/c`), `*` wildcards,
/// and a trailing `/@attr` or `/text()`. Predicates, functions, and other
/// axes are rejected as syntax errors.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub category: String,
    pub path: String,
    pub data_type: DataType,
    pub must_be_present: bool,
}

impl AttributeSelector {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult {
        let selected = match ctx.content(&self.category) {
            Some(content) => select_path(content, &self.path)?,
            None => Vec::new(),
        };

        let mut bag = Bag::empty(self.data_type);
        for text in selected {
            let value = self
                .data_type
                .parse(&text)
                .map_err(|e| Status::from(e))?;
            bag.push(value).map_err(Status::from)?;
        }

        if bag.is_empty() && self.must_be_present {
            return Err(Status::missing_attribute(MissingAttributeDetail {
                category: self.category.clone(),
                attribute_id: self.path.clone(),
                data_type: self.data_type,
                issuer: None,
            }));
        }
        Ok(Evaluated::Bag(bag))
    }
}

/// Evaluate the documented path subset against a content tree, returning the
/// selected text values.
pub fn select_path(content: &ContentNode, path: &str) -> Result<Vec<String>, Status> {
    if !path.starts_with('/') || path.contains("//") {
        return Err(Status::syntax_error(format!(
            "unsupported selector path '{}': only absolute child steps are supported",
            path
        )));
    }
    if path.contains('[') || path.contains(']') {
        return Err(Status::syntax_error(format!(
            "unsupported selector path '{}': predicates are not supported",
            path
        )));
    }

    let mut steps: Vec<&str> = path[1..].split('/').collect();
    if steps.iter().any(|s| s.is_empty()) {
        return Err(Status::syntax_error(format!("malformed selector path '{}'", path)));
    }

    enum Leaf<'p> {
        Text,
        Attribute(&'p str),
        Element,
    }

    let last = steps.last().copied().unwrap_or("");
    let leaf = if last == "text()" {
        steps.pop();
        Leaf::Text
    } else if let Some(name) = last.strip_prefix('@') {
        steps.pop();
        Leaf::Attribute(name)
    } else if last.contains('(') || last.contains(')') {
        return Err(Status::syntax_error(format!(
            "unsupported selector function in path '{}'",
            path
        )));
    } else {
        Leaf::Element
    };

    if steps.is_empty() {
        return Err(Status::syntax_error(format!("selector path '{}' selects nothing", path)));
    }

    // The first step names the content root element.
    let mut nodes: Vec<&ContentNode> =
        if steps[0] == "*" || steps[0] == content.name {
            vec![content]
        } else {
            Vec::new()
        };
    for step in &steps[1..] {
        let mut next = Vec::new();
        for node in nodes {
            next.extend(node.children_named(step));
        }
        nodes = next;
    }

    let mut out = Vec::new();
    for node in nodes {
        match leaf {
            Leaf::Text | Leaf::Element => {
                let text = node.deep_text();
                if !text.is_empty() {
                    out.push(text);
                }
            }
            Leaf::Attribute(name) => {
                if let Some(value) = node.attribute(name) {
                    out.push(value.to_string());
                }
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Apply and the Expression union
// ---------------------------------------------------------------------------

/// A function application over argument expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Apply {
    pub function: Function,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal attribute value, parsed eagerly at policy load.
    Literal(AttributeValue),
    Designator(AttributeDesignator),
    Selector(AttributeSelector),
    Apply(Box<Apply>),
    /// Resolves a `VariableDefinition` in the enclosing policy.
    VariableReference(String),
    /// A function handle; legal only as the first argument of a
    /// higher-order function.
    FunctionReference(Function),
}

impl Expression {
    pub fn evaluate(&self, ctx: &EvaluationContext) -> EvalResult {
        match self {
            Expression::Literal(value) => Ok(Evaluated::Value(value.clone())),
            Expression::Designator(d) => d.evaluate(ctx),
            Expression::Selector(s) => s.evaluate(ctx),
            Expression::Apply(apply) => functions::apply(&apply.function, &apply.args, ctx),
            Expression::VariableReference(id) => evaluate_variable(id, ctx),
            Expression::FunctionReference(_) => Err(Status::processing_error(
                "a function reference is not evaluable on its own",
            )),
        }
    }

    /// Whether evaluation produces a bag, when statically known.
    pub fn returns_bag(&self) -> Option<bool> {
        match self {
            Expression::Literal(_) => Some(false),
            Expression::Designator(_) | Expression::Selector(_) => Some(true),
            Expression::Apply(apply) => Some(apply.function.returns_bag()),
            Expression::VariableReference(_) => None,
            Expression::FunctionReference(_) => Some(false),
        }
    }

    /// The produced dataType, when statically known.
    pub fn return_type(&self) -> Option<DataType> {
        match self {
            Expression::Literal(value) => Some(value.data_type()),
            Expression::Designator(d) => Some(d.key.data_type),
            Expression::Selector(s) => Some(s.data_type),
            Expression::Apply(apply) => apply.function.return_type(),
            Expression::VariableReference(_) => None,
            Expression::FunctionReference(_) => None,
        }
    }

    /// Load-time structural validation: arity, higher-order shape, and the
    /// placement rule for function references.
    pub fn validate(&self) -> PolicyLoadResult<()> {
        self.validate_inner(false)
    }

    fn validate_inner(&self, function_ref_ok: bool) -> PolicyLoadResult<()> {
        match self {
            Expression::FunctionReference(_) if !function_ref_ok => {
                Err(PolicyLoadError::StrayFunctionReference)
            }
            Expression::FunctionReference(_) => Ok(()),
            Expression::Apply(apply) => {
                apply.function.check_arity(apply.args.len())?;
                let higher_order = apply.function.is_higher_order();
                if higher_order
                    && !matches!(apply.args.first(), Some(Expression::FunctionReference(_)))
                {
                    return Err(PolicyLoadError::MissingFunctionReference {
                        function: apply.function.to_string(),
                    });
                }
                for (i, arg) in apply.args.iter().enumerate() {
                    arg.validate_inner(higher_order && i == 0)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn evaluate_variable(id: &str, ctx: &EvaluationContext) -> EvalResult {
    let (policy_id, expression) = ctx.lookup_variable(id).ok_or_else(|| {
        Status::processing_error(format!("variable '{}' has no definition in scope", id))
    })?;

    if let Some(cached) = ctx.cached_variable(&policy_id, id) {
        return cached;
    }

    if !ctx.begin_variable(&policy_id, id) {
        return Err(Status::processing_error(format!(
            "variable '{}' is defined in terms of itself",
            id
        )));
    }
    let result = expression.evaluate(ctx);
    ctx.end_variable(&policy_id, id);

    ctx.cache_variable(policy_id, id.to_string(), result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::categories;
    use warden_core::{AttributeCategory, Request, RequestAttribute};

    use crate::context::AttributeSource;
    use crate::policy::NoReferences;

    fn request_with(category: &str, id: &str, values: Bag) -> Request {
        Request {
            attributes: vec![AttributeCategory {
                category: category.into(),
                content: None,
                attributes: vec![RequestAttribute {
                    id: id.into(),
                    issuer: None,
                    values,
                    include_in_result: false,
                }],
            }],
            return_policy_id_list: false,
            combined_decision: false,
        }
    }

    fn no_sources() -> Vec<Box<dyn AttributeSource>> {
        Vec::new()
    }

    #[test]
    fn test_literal_evaluates_to_itself() {
        let request = Request::default();
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let expr = Expression::Literal(AttributeValue::string("medical"));
        assert_eq!(
            expr.evaluate(&ctx).unwrap(),
            Evaluated::Value(AttributeValue::string("medical"))
        );
    }

    #[test]
    fn test_designator_returns_bag() {
        let request = request_with(
            categories::RESOURCE_LEGACY,
            "task_id",
            Bag::of_one(AttributeValue::string("medical")),
        );
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let expr = Expression::Designator(AttributeDesignator {
            key: AttributeKey::new(categories::RESOURCE_LEGACY, "task_id", DataType::String),
            must_be_present: false,
        });
        let bag = expr.evaluate(&ctx).unwrap().into_bag().unwrap();
        assert_eq!(bag.size(), 1);
    }

    #[test]
    fn test_designator_empty_not_required() {
        let request = Request::default();
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let expr = Expression::Designator(AttributeDesignator {
            key: AttributeKey::new(categories::RESOURCE_LEGACY, "task_id", DataType::String),
            must_be_present: false,
        });
        let bag = expr.evaluate(&ctx).unwrap().into_bag().unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_designator_missing_and_required() {
        let request = Request::default();
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let expr = Expression::Designator(AttributeDesignator {
            key: AttributeKey::new(
                categories::RESOURCE_LEGACY,
                "task_expires",
                DataType::DateTime,
            ),
            must_be_present: true,
        });
        let status = expr.evaluate(&ctx).unwrap_err();
        assert_eq!(status.code, warden_core::StatusCode::MissingAttribute);
        assert_eq!(status.missing.len(), 1);
        assert_eq!(status.missing[0].attribute_id, "task_expires");
        assert_eq!(status.missing[0].data_type, DataType::DateTime);
    }

    fn record_content() -> ContentNode {
        ContentNode {
            name: "record".into(),
            attributes: vec![],
            children: vec![
                ContentNode {
                    name: "ward".into(),
                    attributes: vec![("code".into(), "ONC".into())],
                    children: vec![],
                    text: "oncology".into(),
                },
                ContentNode {
                    name: "ward".into(),
                    attributes: vec![],
                    children: vec![],
                    text: "cardiology".into(),
                },
            ],
            text: String::new(),
        }
    }

    #[test]
    fn test_select_path_elements() {
        let selected = select_path(&record_content(), "/record/ward").unwrap();
        assert_eq!(selected, vec!["oncology".to_string(), "cardiology".to_string()]);
    }

    #[test]
    fn test_select_path_attribute() {
        let selected = select_path(&record_content(), "/record/ward/@code").unwrap();
        assert_eq!(selected, vec!["ONC".to_string()]);
    }

    #[test]
    fn test_select_path_text_leaf() {
        let selected = select_path(&record_content(), "/record/ward/text()").unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_path_wildcard() {
        let selected = select_path(&record_content(), "/*/ward").unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_path_rejects_predicates() {
        let status = select_path(&record_content(), "/record/ward[1]").unwrap_err();
        assert_eq!(status.code, warden_core::StatusCode::SyntaxError);
    }

    #[test]
    fn test_select_path_rejects_descendant_axis() {
        let status = select_path(&record_content(), "//ward").unwrap_err();
        assert_eq!(status.code, warden_core::StatusCode::SyntaxError);
    }

    #[test]
    fn test_selector_wraps_values() {
        let mut request = Request::default();
        request.merge_group(AttributeCategory {
            category: categories::RESOURCE_LEGACY.into(),
            content: Some(record_content()),
            attributes: vec![],
        });
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let selector = AttributeSelector {
            category: categories::RESOURCE_LEGACY.into(),
            path: "/record/ward".into(),
            data_type: DataType::String,
            must_be_present: false,
        };
        let bag = selector.evaluate(&ctx).unwrap().into_bag().unwrap();
        assert_eq!(bag.size(), 2);
    }

    #[test]
    fn test_selector_missing_content_required() {
        let request = Request::default();
        let sources = no_sources();
        let ctx = EvaluationContext::new_utc(&request, &sources, &NoReferences);
        let selector = AttributeSelector {
            category: categories::RESOURCE_LEGACY.into(),
            path: "/record/ward".into(),
            data_type: DataType::String,
            must_be_present: true,
        };
        let status = selector.evaluate(&ctx).unwrap_err();
        assert_eq!(status.code, warden_core::StatusCode::MissingAttribute);
    }

    #[test]
    fn test_stray_function_reference_rejected_at_load() {
        let expr = Expression::Apply(Box::new(Apply {
            function: Function::Not,
            args: vec![Expression::FunctionReference(Function::Equal(
                DataType::String,
            ))],
        }));
        assert!(matches!(
            expr.validate(),
            Err(PolicyLoadError::StrayFunctionReference)
        ));
    }

    #[test]
    fn test_validate_checks_arity() {
        let expr = Expression::Apply(Box::new(Apply {
            function: Function::Not,
            args: vec![],
        }));
        assert!(matches!(
            expr.validate(),
            Err(PolicyLoadError::BadArity { .. })
        ));
    }
}
