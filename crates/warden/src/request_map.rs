//! Builds a XACML Request from `/getDecision` query parameters.
//!
//! The governance attribute map mirrors the request layout federated
//! enforcement points send: the action string goes to the action category,
//! task facts to resource, node credentials to subject, and the clock to
//! environment. Unrecognized parameters land in the resource category as
//! strings, so extra query noise can never widen access.

use std::collections::HashMap;

use warden_core::{
    categories, AttributeCategory, Bag, DataType, Request, RequestAttribute, ValueError,
};

/// Where a known query parameter goes.
fn parameter_slot(name: &str) -> (&'static str, DataType) {
    match name {
        "action" => (categories::ACTION, DataType::String),
        "task_id" => (categories::RESOURCE_LEGACY, DataType::String),
        "task_expires" => (categories::RESOURCE_LEGACY, DataType::DateTime),
        "is_member_of_task" => (categories::SUBJECT, DataType::Boolean),
        "task_membership_expires" => (categories::SUBJECT, DataType::DateTime),
        "task_role" => (categories::SUBJECT, DataType::String),
        "node_id" => (categories::SUBJECT, DataType::String),
        "current-dateTime" => (categories::ENVIRONMENT, DataType::DateTime),
        _ => (categories::RESOURCE_LEGACY, DataType::String),
    }
}

/// Build a Request from query parameters. A value that fails its dataType's
/// lexical rules (for instance a dateTime without a timezone) is a
/// [`ValueError`]; the HTTP layer maps it to an Indeterminate decision.
pub fn build_request(params: &HashMap<String, String>) -> Result<Request, ValueError> {
    let mut request = Request::default();
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();

    for name in names {
        let raw = &params[name];
        let (category, data_type) = parameter_slot(name);
        let value = data_type.parse(raw)?;
        request.merge_group(AttributeCategory {
            category: category.to_string(),
            content: None,
            attributes: vec![RequestAttribute {
                id: name.clone(),
                issuer: None,
                values: Bag::of_one(value),
                include_in_result: false,
            }],
        });
    }
    Ok(request)
}
