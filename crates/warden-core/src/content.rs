//! Opaque `<Content>` fragments.
//!
//! A request category may carry a free-form XML fragment. The engine keeps
//! it as a minimal owned tree and exposes it to attribute selectors; it is
//! never interpreted beyond the documented path subset.

use serde::{Deserialize, Serialize};

/// One element of a `<Content>` fragment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentNode {
    /// Local element name (namespace prefixes stripped).
    pub name: String,
    /// Attribute name/value pairs in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
    /// Concatenated character data directly inside this element.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl ContentNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Value of a named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct children with a given name (`*` matches every child).
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ContentNode> {
        self.children
            .iter()
            .filter(move |c| name == "*" || c.name == name)
    }

    /// The text of this element and all descendants, in document order.
    pub fn deep_text(&self) -> String {
        let mut out = self.text.trim().to_string();
        for child in &self.children {
            let t = child.deep_text();
            if !t.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&t);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ContentNode {
        ContentNode {
            name: "record".into(),
            attributes: vec![("id".into(), "r1".into())],
            children: vec![
                ContentNode {
                    name: "owner".into(),
                    text: "alice".into(),
                    ..Default::default()
                },
                ContentNode {
                    name: "owner".into(),
                    text: "bob".into(),
                    ..Default::default()
                },
                ContentNode {
                    name: "ward".into(),
                    text: "oncology".into(),
                    ..Default::default()
                },
            ],
            text: String::new(),
        }
    }

    #[test]
    fn test_attribute_lookup() {
        let node = sample();
        assert_eq!(node.attribute("id"), Some("r1"));
        assert_eq!(node.attribute("missing"), None);
    }

    #[test]
    fn test_children_named() {
        let node = sample();
        assert_eq!(node.children_named("owner").count(), 2);
        assert_eq!(node.children_named("*").count(), 3);
        assert_eq!(node.children_named("ward").count(), 1);
    }

    #[test]
    fn test_deep_text() {
        let node = sample();
        assert_eq!(node.deep_text(), "alice bob oncology");
    }
}
