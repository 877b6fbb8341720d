//! Policy / PolicySet XML loader.

use std::sync::Arc;

use warden_core::{ContentNode, DataType, Effect};
use warden_policy::combining::CombiningScope;
use warden_policy::{
    AdviceExpression, AllOf, AnyOf, Apply, AttributeAssignmentExpression, AttributeDesignator,
    AttributeKey, AttributeSelector, CombiningAlg, Expression, Function, Match, MatchSource,
    ObligationExpression, Policy, PolicyChild, PolicyLoadError, PolicySet, Rule, Target,
    VariableDefinition,
};

use crate::dom;
use crate::error::{XmlError, XmlResult};

/// A loaded top-level document.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyDocument {
    Policy(Arc<Policy>),
    PolicySet(Arc<PolicySet>),
}

impl PolicyDocument {
    pub fn id(&self) -> &str {
        match self {
            PolicyDocument::Policy(p) => &p.id,
            PolicyDocument::PolicySet(s) => &s.id,
        }
    }
}

/// Parse one Policy or PolicySet document and run the load-time validation
/// pass. Any failure aborts the load; the engine never holds a half-checked
/// tree.
pub fn parse_policy_document(xml: &str) -> XmlResult<PolicyDocument> {
    let doc = dom::parse_document(xml)?;
    match doc.name.as_str() {
        "Policy" => {
            let policy = parse_policy(&doc)?;
            policy.validate()?;
            Ok(PolicyDocument::Policy(Arc::new(policy)))
        }
        "PolicySet" => {
            let set = parse_policy_set(&doc)?;
            set.validate()?;
            Ok(PolicyDocument::PolicySet(Arc::new(set)))
        }
        other => Err(XmlError::unexpected("document", other)),
    }
}

fn parse_policy(node: &ContentNode) -> XmlResult<Policy> {
    let id = required(node, "PolicyId")?;
    let version = node.attribute("Version").unwrap_or("1.0").to_string();
    let alg_uri = required(node, "RuleCombiningAlgId")?;
    let rule_combining = CombiningAlg::from_uri(&alg_uri, CombiningScope::Rule)?;

    let mut policy = Policy {
        id,
        version,
        description: None,
        target: Target::empty(),
        variables: Vec::new(),
        rules: Vec::new(),
        rule_combining,
        obligations: Vec::new(),
        advice: Vec::new(),
    };

    for child in &node.children {
        match child.name.as_str() {
            "Description" => policy.description = Some(child.text.trim().to_string()),
            "Target" => policy.target = parse_target(child)?,
            "VariableDefinition" => policy.variables.push(parse_variable(child)?),
            "Rule" => policy.rules.push(parse_rule(child)?),
            "ObligationExpressions" => policy.obligations = parse_obligations(child)?,
            "AdviceExpressions" => policy.advice = parse_advice(child)?,
            other => return Err(XmlError::unexpected("Policy", other)),
        }
    }
    Ok(policy)
}

fn parse_policy_set(node: &ContentNode) -> XmlResult<PolicySet> {
    let id = required(node, "PolicySetId")?;
    let version = node.attribute("Version").unwrap_or("1.0").to_string();
    let alg_uri = required(node, "PolicyCombiningAlgId")?;
    let policy_combining = CombiningAlg::from_uri(&alg_uri, CombiningScope::Policy)?;

    let mut set = PolicySet {
        id,
        version,
        description: None,
        target: Target::empty(),
        children: Vec::new(),
        policy_combining,
        obligations: Vec::new(),
        advice: Vec::new(),
    };

    for child in &node.children {
        match child.name.as_str() {
            "Description" => set.description = Some(child.text.trim().to_string()),
            "Target" => set.target = parse_target(child)?,
            "Policy" => set
                .children
                .push(PolicyChild::Policy(Arc::new(parse_policy(child)?))),
            "PolicySet" => set
                .children
                .push(PolicyChild::PolicySet(Arc::new(parse_policy_set(child)?))),
            "PolicyIdReference" => set
                .children
                .push(PolicyChild::PolicyRef(child.text.trim().to_string())),
            "PolicySetIdReference" => set
                .children
                .push(PolicyChild::PolicySetRef(child.text.trim().to_string())),
            "ObligationExpressions" => set.obligations = parse_obligations(child)?,
            "AdviceExpressions" => set.advice = parse_advice(child)?,
            other => return Err(XmlError::unexpected("PolicySet", other)),
        }
    }
    Ok(set)
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

fn parse_target(node: &ContentNode) -> XmlResult<Target> {
    let mut target = Target::empty();
    for child in &node.children {
        match child.name.as_str() {
            "AnyOf" => target.any_ofs.push(parse_any_of(child)?),
            other => return Err(XmlError::unexpected("Target", other)),
        }
    }
    Ok(target)
}

fn parse_any_of(node: &ContentNode) -> XmlResult<AnyOf> {
    let mut any_of = AnyOf {
        all_ofs: Vec::new(),
    };
    for child in &node.children {
        match child.name.as_str() {
            "AllOf" => any_of.all_ofs.push(parse_all_of(child)?),
            other => return Err(XmlError::unexpected("AnyOf", other)),
        }
    }
    Ok(any_of)
}

fn parse_all_of(node: &ContentNode) -> XmlResult<AllOf> {
    let mut all_of = AllOf {
        matches: Vec::new(),
    };
    for child in &node.children {
        match child.name.as_str() {
            "Match" => all_of.matches.push(parse_match(child)?),
            other => return Err(XmlError::unexpected("AllOf", other)),
        }
    }
    Ok(all_of)
}

fn parse_match(node: &ContentNode) -> XmlResult<Match> {
    let match_uri = required(node, "MatchId")?;
    let function = Function::from_uri(&match_uri)
        .ok_or_else(|| PolicyLoadError::UnknownFunction(match_uri.clone()))?;
    if !function.is_match_function() {
        return Err(PolicyLoadError::NotAMatchFunction {
            function: function.to_string(),
        }
        .into());
    }

    let mut literal = None;
    let mut source = None;
    for child in &node.children {
        match child.name.as_str() {
            "AttributeValue" => literal = Some(parse_literal(child)?),
            "AttributeDesignator" => {
                source = Some(MatchSource::Designator(parse_designator(child)?))
            }
            "AttributeSelector" => source = Some(MatchSource::Selector(parse_selector(child)?)),
            other => return Err(XmlError::unexpected("Match", other)),
        }
    }

    let literal =
        literal.ok_or_else(|| XmlError::Invalid("Match requires an AttributeValue".into()))?;
    let source = source.ok_or_else(|| {
        XmlError::Invalid("Match requires an AttributeDesignator or AttributeSelector".into())
    })?;
    Ok(Match {
        function,
        literal,
        source,
    })
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn parse_literal(node: &ContentNode) -> XmlResult<warden_core::AttributeValue> {
    let data_type_uri = required(node, "DataType")?;
    let data_type = DataType::from_uri(&data_type_uri)
        .ok_or_else(|| XmlError::UnknownDataType(data_type_uri.clone()))?;
    Ok(data_type.parse(node.text.trim())?)
}

fn parse_designator(node: &ContentNode) -> XmlResult<AttributeDesignator> {
    let category = required(node, "Category")?;
    let id = required(node, "AttributeId")?;
    let data_type_uri = required(node, "DataType")?;
    let data_type = DataType::from_uri(&data_type_uri)
        .ok_or_else(|| XmlError::UnknownDataType(data_type_uri.clone()))?;
    let mut key = AttributeKey::new(category, id, data_type);
    key.issuer = node.attribute("Issuer").map(str::to_string);
    Ok(AttributeDesignator {
        key,
        must_be_present: node.attribute("MustBePresent") == Some("true"),
    })
}

fn parse_selector(node: &ContentNode) -> XmlResult<AttributeSelector> {
    let category = required(node, "Category")?;
    let path = required(node, "Path")?;
    let data_type_uri = required(node, "DataType")?;
    let data_type = DataType::from_uri(&data_type_uri)
        .ok_or_else(|| XmlError::UnknownDataType(data_type_uri.clone()))?;
    Ok(AttributeSelector {
        category,
        path,
        data_type,
        must_be_present: node.attribute("MustBePresent") == Some("true"),
    })
}

fn parse_expression(node: &ContentNode) -> XmlResult<Expression> {
    match node.name.as_str() {
        "AttributeValue" => Ok(Expression::Literal(parse_literal(node)?)),
        "AttributeDesignator" => Ok(Expression::Designator(parse_designator(node)?)),
        "AttributeSelector" => Ok(Expression::Selector(parse_selector(node)?)),
        "VariableReference" => {
            let id = required(node, "VariableId")?;
            Ok(Expression::VariableReference(id))
        }
        "Function" => {
            let uri = required(node, "FunctionId")?;
            let function = Function::from_uri(&uri)
                .ok_or_else(|| PolicyLoadError::UnknownFunction(uri.clone()))?;
            Ok(Expression::FunctionReference(function))
        }
        "Apply" => {
            let uri = required(node, "FunctionId")?;
            let function = Function::from_uri(&uri)
                .ok_or_else(|| PolicyLoadError::UnknownFunction(uri.clone()))?;
            let mut args = Vec::new();
            for child in &node.children {
                args.push(parse_expression(child)?);
            }
            Ok(Expression::Apply(Box::new(Apply { function, args })))
        }
        other => Err(XmlError::unexpected("expression", other)),
    }
}

fn parse_variable(node: &ContentNode) -> XmlResult<VariableDefinition> {
    let id = required(node, "VariableId")?;
    let expression = single_expression(node, "VariableDefinition")?;
    Ok(VariableDefinition { id, expression })
}

/// An element that wraps exactly one expression child.
fn single_expression(node: &ContentNode, parent: &str) -> XmlResult<Expression> {
    let mut found = None;
    for child in &node.children {
        if found.is_some() {
            return Err(XmlError::Invalid(format!(
                "{} holds more than one expression",
                parent
            )));
        }
        found = Some(parse_expression(child)?);
    }
    found.ok_or_else(|| XmlError::Invalid(format!("{} holds no expression", parent)))
}

// ---------------------------------------------------------------------------
// Rules, obligations, advice
// ---------------------------------------------------------------------------

fn parse_rule(node: &ContentNode) -> XmlResult<Rule> {
    let id = required(node, "RuleId")?;
    let effect_name = required(node, "Effect")?;
    let effect = Effect::from_str_name(&effect_name)
        .ok_or_else(|| XmlError::Invalid(format!("unknown rule effect '{}'", effect_name)))?;

    let mut rule = Rule {
        id,
        effect,
        description: None,
        target: None,
        condition: None,
        obligations: Vec::new(),
        advice: Vec::new(),
    };

    for child in &node.children {
        match child.name.as_str() {
            "Description" => rule.description = Some(child.text.trim().to_string()),
            "Target" => rule.target = Some(parse_target(child)?),
            "Condition" => rule.condition = Some(single_expression(child, "Condition")?),
            "ObligationExpressions" => rule.obligations = parse_obligations(child)?,
            "AdviceExpressions" => rule.advice = parse_advice(child)?,
            other => return Err(XmlError::unexpected("Rule", other)),
        }
    }
    Ok(rule)
}

fn parse_obligations(node: &ContentNode) -> XmlResult<Vec<ObligationExpression>> {
    let mut out = Vec::new();
    for child in &node.children {
        if child.name != "ObligationExpression" {
            return Err(XmlError::unexpected("ObligationExpressions", &child.name));
        }
        let id = required(child, "ObligationId")?;
        let fulfill_on_name = required(child, "FulfillOn")?;
        let fulfill_on = Effect::from_str_name(&fulfill_on_name).ok_or_else(|| {
            XmlError::Invalid(format!("unknown FulfillOn '{}'", fulfill_on_name))
        })?;
        out.push(ObligationExpression {
            id,
            fulfill_on,
            assignments: parse_assignments(child)?,
        });
    }
    Ok(out)
}

fn parse_advice(node: &ContentNode) -> XmlResult<Vec<AdviceExpression>> {
    let mut out = Vec::new();
    for child in &node.children {
        if child.name != "AdviceExpression" {
            return Err(XmlError::unexpected("AdviceExpressions", &child.name));
        }
        let id = required(child, "AdviceId")?;
        let applies_to_name = required(child, "AppliesTo")?;
        let applies_to = Effect::from_str_name(&applies_to_name).ok_or_else(|| {
            XmlError::Invalid(format!("unknown AppliesTo '{}'", applies_to_name))
        })?;
        out.push(AdviceExpression {
            id,
            applies_to,
            assignments: parse_assignments(child)?,
        });
    }
    Ok(out)
}

fn parse_assignments(node: &ContentNode) -> XmlResult<Vec<AttributeAssignmentExpression>> {
    let mut out = Vec::new();
    for child in &node.children {
        if child.name != "AttributeAssignmentExpression" {
            return Err(XmlError::unexpected(&node.name, &child.name));
        }
        let id = required(child, "AttributeId")?;
        let category = child.attribute("Category").map(str::to_string);
        let expression = single_expression(child, "AttributeAssignmentExpression")?;
        out.push(AttributeAssignmentExpression {
            id,
            category,
            expression,
        });
    }
    Ok(out)
}

fn required(node: &ContentNode, attribute: &str) -> XmlResult<String> {
    node.attribute(attribute)
        .map(str::to_string)
        .ok_or_else(|| XmlError::missing_attr(&node.name, attribute))
}
