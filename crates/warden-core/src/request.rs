//! The parsed Request model.

use serde::{Deserialize, Serialize};

use crate::bag::Bag;
use crate::content::ContentNode;
use crate::values::DataType;

/// Standard category URIs.
pub mod categories {
    pub const SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    /// Legacy 1.0 resource category, still common in deployed requests.
    pub const RESOURCE_LEGACY: &str = "urn:oasis:names:tc:xacml:1.0:attribute-category:resource";
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

/// Standard attribute identifier URIs.
pub mod attribute_ids {
    pub const ACTION_ID: &str = "urn:oasis:names:tc:xacml:1.0:action:action-id";
    pub const SUBJECT_ID: &str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
    pub const RESOURCE_ID: &str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
    pub const CURRENT_DATETIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-dateTime";
    pub const CURRENT_DATE: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-date";
    pub const CURRENT_TIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-time";
}

// ---------------------------------------------------------------------------
// Request attributes
// ---------------------------------------------------------------------------

/// One `<Attribute>` inside a category group. All values of one attribute
/// element share a dataType; multi-valued attributes are bags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAttribute {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub values: Bag,
    #[serde(default)]
    pub include_in_result: bool,
}

/// One `<Attributes Category="...">` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCategory {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentNode>,
    pub attributes: Vec<RequestAttribute>,
}

/// A parsed access request: category groups plus the two response-shaping
/// flags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Request {
    pub attributes: Vec<AttributeCategory>,
    #[serde(default)]
    pub return_policy_id_list: bool,
    #[serde(default)]
    pub combined_decision: bool,
}

impl Request {
    /// The category group for a URI, if any. Loaders merge duplicates, so at
    /// most one group per category exists after parse.
    pub fn category(&self, category: &str) -> Option<&AttributeCategory> {
        self.attributes.iter().find(|c| c.category == category)
    }

    /// Union of all value bags matching `(category, id, data_type)` and, when
    /// given, the issuer. Returns an empty bag when nothing matches.
    pub fn bag(
        &self,
        category: &str,
        id: &str,
        data_type: DataType,
        issuer: Option<&str>,
    ) -> Bag {
        let mut out = Bag::empty(data_type);
        for group in self.attributes.iter().filter(|c| c.category == category) {
            for attr in &group.attributes {
                if attr.id != id || attr.values.data_type() != data_type {
                    continue;
                }
                if let Some(wanted) = issuer {
                    if attr.issuer.as_deref() != Some(wanted) {
                        continue;
                    }
                }
                out = out.union(&attr.values);
            }
        }
        out
    }

    /// The `<Content>` fragment of a category, if any.
    pub fn content(&self, category: &str) -> Option<&ContentNode> {
        self.category(category).and_then(|c| c.content.as_ref())
    }

    /// Merge another parsed group into this request, unioning with an
    /// existing group of the same category.
    pub fn merge_group(&mut self, group: AttributeCategory) {
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|c| c.category == group.category)
        {
            existing.attributes.extend(group.attributes);
            if existing.content.is_none() {
                existing.content = group.content;
            }
        } else {
            self.attributes.push(group);
        }
    }
}
