//! Request XML loader and serializer.

use warden_core::{
    AttributeCategory, Bag, ContentNode, DataType, Request, RequestAttribute,
};

use crate::dom::{self, escape, write_node};
use crate::error::{XmlError, XmlResult};
use crate::XACML_NS;

/// Parse a XACML 3.0 `<Request>` document.
///
/// Unknown top-level elements are rejected; duplicate `<Attributes>` groups
/// for one category are merged with their bags unioned.
pub fn parse_request(xml: &str) -> XmlResult<Request> {
    let doc = dom::parse_document(xml)?;
    if doc.name != "Request" {
        return Err(XmlError::unexpected("document", &doc.name));
    }

    let mut request = Request {
        attributes: Vec::new(),
        return_policy_id_list: flag(&doc, "ReturnPolicyIdList"),
        combined_decision: flag(&doc, "CombinedDecision"),
    };

    for child in &doc.children {
        match child.name.as_str() {
            "Attributes" => {
                let group = parse_attributes_group(child)?;
                request.merge_group(group);
            }
            other => return Err(XmlError::unexpected("Request", other)),
        }
    }
    Ok(request)
}

fn flag(node: &ContentNode, attribute: &str) -> bool {
    node.attribute(attribute) == Some("true")
}

fn parse_attributes_group(node: &ContentNode) -> XmlResult<AttributeCategory> {
    let category = node
        .attribute("Category")
        .ok_or_else(|| XmlError::missing_attr("Attributes", "Category"))?
        .to_string();

    let mut content = None;
    let mut attributes = Vec::new();
    for child in &node.children {
        match child.name.as_str() {
            "Content" => {
                // The fragment root is the single element inside <Content>.
                content = child.children.first().cloned();
            }
            "Attribute" => attributes.push(parse_attribute(child)?),
            other => return Err(XmlError::unexpected("Attributes", other)),
        }
    }

    Ok(AttributeCategory {
        category,
        content,
        attributes,
    })
}

fn parse_attribute(node: &ContentNode) -> XmlResult<RequestAttribute> {
    let id = node
        .attribute("AttributeId")
        .ok_or_else(|| XmlError::missing_attr("Attribute", "AttributeId"))?
        .to_string();
    let issuer = node.attribute("Issuer").map(str::to_string);
    let include_in_result = node.attribute("IncludeInResult") == Some("true");

    let mut bag: Option<Bag> = None;
    for child in &node.children {
        if child.name != "AttributeValue" {
            return Err(XmlError::unexpected("Attribute", &child.name));
        }
        let data_type_uri = child
            .attribute("DataType")
            .ok_or_else(|| XmlError::missing_attr("AttributeValue", "DataType"))?;
        let data_type = DataType::from_uri(data_type_uri)
            .ok_or_else(|| XmlError::UnknownDataType(data_type_uri.to_string()))?;
        let value = data_type.parse(child.text.trim())?;

        let bag = bag.get_or_insert_with(|| Bag::empty(data_type));
        bag.push(value).map_err(XmlError::Value)?;
    }

    let values = bag.ok_or_else(|| {
        XmlError::Invalid(format!("attribute '{}' carries no AttributeValue", id))
    })?;

    Ok(RequestAttribute {
        id,
        issuer,
        values,
        include_in_result,
    })
}

/// Serialize a Request back to XML. `parse(serialize(r))` is equivalent to
/// `r` modulo whitespace and attribute order within a category.
pub fn serialize_request(request: &Request) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<Request xmlns=\"{}\" ReturnPolicyIdList=\"{}\" CombinedDecision=\"{}\">",
        XACML_NS, request.return_policy_id_list, request.combined_decision
    ));
    for group in &request.attributes {
        write_attributes_group(group, &mut out);
    }
    out.push_str("</Request>");
    out
}

pub(crate) fn write_attributes_group(group: &AttributeCategory, out: &mut String) {
    out.push_str(&format!(
        "<Attributes Category=\"{}\">",
        escape(&group.category)
    ));
    if let Some(content) = &group.content {
        out.push_str("<Content>");
        write_node(content, out);
        out.push_str("</Content>");
    }
    for attribute in &group.attributes {
        out.push_str(&format!(
            "<Attribute AttributeId=\"{}\" IncludeInResult=\"{}\"",
            escape(&attribute.id),
            attribute.include_in_result
        ));
        if let Some(issuer) = &attribute.issuer {
            out.push_str(&format!(" Issuer=\"{}\"", escape(issuer)));
        }
        out.push('>');
        for value in attribute.values.iter() {
            out.push_str(&format!(
                "<AttributeValue DataType=\"{}\">{}</AttributeValue>",
                value.data_type().uri(),
                escape(&value.lexical())
            ));
        }
        out.push_str("</Attribute>");
    }
    out.push_str("</Attributes>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{categories, AttributeValue};

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
  <Attributes Category="urn:oasis:names:tc:xacml:3.0:attribute-category:action">
    <Attribute AttributeId="action" IncludeInResult="true">
      <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">task-authorization</AttributeValue>
    </Attribute>
  </Attributes>
  <Attributes Category="urn:oasis:names:tc:xacml:1.0:attribute-category:resource">
    <Attribute AttributeId="task_id" IncludeInResult="true">
      <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">medical</AttributeValue>
    </Attribute>
    <Attribute AttributeId="task_expires" IncludeInResult="true">
      <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#dateTime">2026-12-31T23:59:59Z</AttributeValue>
    </Attribute>
  </Attributes>
  <Attributes Category="urn:oasis:names:tc:xacml:3.0:attribute-category:environment">
    <Attribute AttributeId="current-dateTime" IncludeInResult="false">
      <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#dateTime">2025-01-01T00:00:00Z</AttributeValue>
    </Attribute>
  </Attributes>
</Request>"#;

    #[test]
    fn test_parse_request() {
        let request = parse_request(SAMPLE).unwrap();
        assert_eq!(request.attributes.len(), 3);
        let bag = request.bag(
            categories::RESOURCE_LEGACY,
            "task_id",
            DataType::String,
            None,
        );
        assert!(bag.contains(&AttributeValue::string("medical")));
    }

    #[test]
    fn test_parse_request_flags_default_false() {
        let request = parse_request(SAMPLE).unwrap();
        assert!(!request.return_policy_id_list);
        assert!(!request.combined_decision);
    }

    #[test]
    fn test_parse_request_flags() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17"
                       ReturnPolicyIdList="true" CombinedDecision="false"/>"#;
        let request = parse_request(xml).unwrap();
        assert!(request.return_policy_id_list);
    }

    #[test]
    fn test_duplicate_categories_are_merged() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Attributes Category="urn:oasis:names:tc:xacml:1.0:subject-category:access-subject">
            <Attribute AttributeId="task_role" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">participant</AttributeValue>
            </Attribute>
          </Attributes>
          <Attributes Category="urn:oasis:names:tc:xacml:1.0:subject-category:access-subject">
            <Attribute AttributeId="task_role" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">observer</AttributeValue>
            </Attribute>
          </Attributes>
        </Request>"#;
        let request = parse_request(xml).unwrap();
        assert_eq!(request.attributes.len(), 1);
        let bag = request.bag(categories::SUBJECT, "task_role", DataType::String, None);
        assert_eq!(bag.size(), 2);
    }

    #[test]
    fn test_multi_valued_attribute() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Attributes Category="urn:oasis:names:tc:xacml:1.0:subject-category:access-subject">
            <Attribute AttributeId="task_role" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">participant</AttributeValue>
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">observer</AttributeValue>
            </Attribute>
          </Attributes>
        </Request>"#;
        let request = parse_request(xml).unwrap();
        let bag = request.bag(categories::SUBJECT, "task_role", DataType::String, None);
        assert_eq!(bag.size(), 2);
    }

    #[test]
    fn test_unknown_top_level_element_rejected() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Bogus/>
        </Request>"#;
        assert!(matches!(
            parse_request(xml),
            Err(XmlError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_unknown_data_type_rejected() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Attributes Category="urn:oasis:names:tc:xacml:3.0:attribute-category:action">
            <Attribute AttributeId="action" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#gYear">2024</AttributeValue>
            </Attribute>
          </Attributes>
        </Request>"#;
        assert!(matches!(
            parse_request(xml),
            Err(XmlError::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_datetime_without_timezone_rejected() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Attributes Category="urn:oasis:names:tc:xacml:3.0:attribute-category:environment">
            <Attribute AttributeId="current-dateTime" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#dateTime">2025-06-15T12:00:00</AttributeValue>
            </Attribute>
          </Attributes>
        </Request>"#;
        assert!(matches!(parse_request(xml), Err(XmlError::Value(_))));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(matches!(
            parse_request("<Request><Attributes>"),
            Err(XmlError::Malformed(_))
        ));
    }

    #[test]
    fn test_content_preserved() {
        let xml = r#"<Request xmlns="urn:oasis:names:tc:xacml:3.0:core:schema:wd-17">
          <Attributes Category="urn:oasis:names:tc:xacml:1.0:attribute-category:resource">
            <Content><record><ward>oncology</ward></record></Content>
            <Attribute AttributeId="task_id" IncludeInResult="false">
              <AttributeValue DataType="http://www.w3.org/2001/XMLSchema#string">medical</AttributeValue>
            </Attribute>
          </Attributes>
        </Request>"#;
        let request = parse_request(xml).unwrap();
        let content = request.content(categories::RESOURCE_LEGACY).unwrap();
        assert_eq!(content.name, "record");
        assert_eq!(content.children[0].text.trim(), "oncology");
    }

    #[test]
    fn test_roundtrip_modulo_layout() {
        let request = parse_request(SAMPLE).unwrap();
        let serialized = serialize_request(&request);
        let reparsed = parse_request(&serialized).unwrap();
        assert_eq!(request, reparsed);
    }
}
