//! One-pass XML reader producing an owned [`ContentNode`] tree.
//!
//! Element and attribute names are reduced to their local part; namespace
//! declarations are dropped. This is intentionally scoped to what the XACML
//! core schema and `<Content>` fragments need, not a general XML data model.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use warden_core::ContentNode;

use crate::error::{XmlError, XmlResult};

/// Parse a complete document into its root element.
pub fn parse_document(xml: &str) -> XmlResult<ContentNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<ContentNode> = Vec::new();
    let mut root: Option<ContentNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(node_from(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let node = node_from(e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(ref e)) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| XmlError::Malformed(err.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(XmlError::Malformed(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed element".into()));
    }
    root.ok_or_else(|| XmlError::Malformed("document has no root element".into()))
}

fn attach(
    stack: &mut Vec<ContentNode>,
    root: &mut Option<ContentNode>,
    node: ContentNode,
) -> XmlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        Ok(())
    } else if root.is_none() {
        *root = Some(node);
        Ok(())
    } else {
        Err(XmlError::Malformed(
            "document has more than one root element".into(),
        ))
    }
}

fn node_from(e: &BytesStart) -> XmlResult<ContentNode> {
    let mut node = ContentNode::new(local_name(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError::Malformed(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.0).to_string();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError::Malformed(err.to_string()))?
            .to_string();
        node.attributes.push((local_attr_name(&key), value));
    }
    Ok(node)
}

/// Local part of a qualified element name.
fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rfind(':') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name.to_string(),
    }
}

fn local_attr_name(name: &str) -> String {
    match name.rfind(':') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name.to_string(),
    }
}

/// Escape character data for XML output.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Serialize a content tree back to markup (used for echoed `<Content>`).
pub fn write_node(node: &ContentNode, out: &mut String) {
    out.push('<');
    out.push_str(&node.name);
    for (key, value) in &node.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if node.children.is_empty() && node.text.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    out.push_str(&escape(node.text.trim()));
    for child in &node.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&node.name);
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <record id="r1">
              <ward code="ONC">oncology</ward>
              <ward>cardiology</ward>
            </record>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "record");
        assert_eq!(doc.attribute("id"), Some("r1"));
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[0].attribute("code"), Some("ONC"));
        assert_eq!(doc.children[0].text.trim(), "oncology");
    }

    #[test]
    fn test_prefixed_names_are_localized() {
        let doc = parse_document(
            r#"<x:Request xmlns:x="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
                 <x:Attributes x:Category="c"/>
               </x:Request>"#,
        )
        .unwrap();
        assert_eq!(doc.name, "Request");
        assert_eq!(doc.children[0].name, "Attributes");
        assert_eq!(doc.children[0].attribute("Category"), Some("c"));
    }

    #[test]
    fn test_self_closing_elements() {
        let doc = parse_document(r#"<a><b x="1"/><b x="2"/></a>"#).unwrap();
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.children[1].attribute("x"), Some("2"));
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("no markup at all").is_err());
        assert!(parse_document("<a/><b/>").is_err());
    }

    #[test]
    fn test_entity_unescaping() {
        let doc = parse_document("<a>fish &amp; chips</a>").unwrap();
        assert_eq!(doc.text.trim(), "fish & chips");
    }

    #[test]
    fn test_write_node_roundtrip() {
        let doc = parse_document(r#"<a k="v"><b>text</b></a>"#).unwrap();
        let mut out = String::new();
        write_node(&doc, &mut out);
        let again = parse_document(&out).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<&">"#), "&lt;&amp;&quot;&gt;");
    }
}
