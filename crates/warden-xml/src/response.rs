//! Response XML serializer.

use warden_core::{Advice, Obligation, Response, ResultItem, Status};

use crate::dom::escape;
use crate::request::write_attributes_group;
use crate::XACML_NS;

/// Serialize a Response document. Decisions appear as the literal strings
/// `Permit`, `Deny`, `NotApplicable`, `Indeterminate`.
pub fn serialize_response(response: &Response) -> String {
    let mut out = String::new();
    out.push_str(&format!("<Response xmlns=\"{}\">", XACML_NS));
    for result in &response.results {
        write_result(result, &mut out);
    }
    out.push_str("</Response>");
    out
}

fn write_result(result: &ResultItem, out: &mut String) {
    out.push_str("<Result>");
    out.push_str(&format!("<Decision>{}</Decision>", result.decision.as_str()));
    write_status(&result.status, out);

    if !result.obligations.is_empty() {
        out.push_str("<Obligations>");
        for obligation in &result.obligations {
            write_obligation(obligation, out);
        }
        out.push_str("</Obligations>");
    }

    if !result.advice.is_empty() {
        out.push_str("<AssociatedAdvice>");
        for advice in &result.advice {
            write_advice(advice, out);
        }
        out.push_str("</AssociatedAdvice>");
    }

    for group in &result.attributes {
        write_attributes_group(group, out);
    }

    if !result.policy_id_list.is_empty() {
        out.push_str("<PolicyIdentifierList>");
        for id in &result.policy_id_list {
            out.push_str(&format!(
                "<PolicyIdReference>{}</PolicyIdReference>",
                escape(id)
            ));
        }
        out.push_str("</PolicyIdentifierList>");
    }

    out.push_str("</Result>");
}

fn write_status(status: &Status, out: &mut String) {
    out.push_str("<Status>");
    out.push_str(&format!("<StatusCode Value=\"{}\"/>", status.code.uri()));
    if let Some(message) = &status.message {
        out.push_str(&format!(
            "<StatusMessage>{}</StatusMessage>",
            escape(message)
        ));
    }
    if !status.missing.is_empty() {
        out.push_str("<StatusDetail>");
        for detail in &status.missing {
            out.push_str(&format!(
                "<MissingAttributeDetail Category=\"{}\" AttributeId=\"{}\" DataType=\"{}\"",
                escape(&detail.category),
                escape(&detail.attribute_id),
                detail.data_type.uri()
            ));
            if let Some(issuer) = &detail.issuer {
                out.push_str(&format!(" Issuer=\"{}\"", escape(issuer)));
            }
            out.push_str("/>");
        }
        out.push_str("</StatusDetail>");
    }
    out.push_str("</Status>");
}

fn write_obligation(obligation: &Obligation, out: &mut String) {
    out.push_str(&format!(
        "<Obligation ObligationId=\"{}\">",
        escape(&obligation.id)
    ));
    for assignment in &obligation.assignments {
        write_assignment(
            &assignment.id,
            assignment.category.as_deref(),
            &assignment.value,
            out,
        );
    }
    out.push_str("</Obligation>");
}

fn write_advice(advice: &Advice, out: &mut String) {
    out.push_str(&format!("<Advice AdviceId=\"{}\">", escape(&advice.id)));
    for assignment in &advice.assignments {
        write_assignment(
            &assignment.id,
            assignment.category.as_deref(),
            &assignment.value,
            out,
        );
    }
    out.push_str("</Advice>");
}

fn write_assignment(
    id: &str,
    category: Option<&str>,
    value: &warden_core::AttributeValue,
    out: &mut String,
) {
    out.push_str(&format!(
        "<AttributeAssignment AttributeId=\"{}\" DataType=\"{}\"",
        escape(id),
        value.data_type().uri()
    ));
    if let Some(category) = category {
        out.push_str(&format!(" Category=\"{}\"", escape(category)));
    }
    out.push_str(&format!(">{}</AttributeAssignment>", escape(&value.lexical())));
}
