//! The Response model assembled by the PDP.

use serde::{Deserialize, Serialize};

use crate::decision::{Decision, IndeterminateKind};
use crate::request::AttributeCategory;
use crate::status::Status;
use crate::values::AttributeValue;

/// An evaluated `<AttributeAssignment>` attached to an obligation or advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub value: AttributeValue,
}

/// An obligation the PEP must discharge when enforcing the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<AttributeAssignment>,
}

/// Advice the PEP may take into account; ignoring it is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<AttributeAssignment>,
}

/// One `<Result>` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub decision: Decision,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<Obligation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<Advice>,
    /// Request attributes echoed back because they carried
    /// `IncludeInResult="true"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeCategory>,
    /// Identifiers of the policies that contributed to the decision, present
    /// when the request set `ReturnPolicyIdList`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_id_list: Vec<String>,
}

/// A complete Response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub results: Vec<ResultItem>,
}

impl Response {
    /// Single-result response for a decision with an ok status.
    pub fn of_decision(decision: Decision) -> Self {
        Self {
            results: vec![ResultItem {
                decision,
                status: Status::ok(),
                obligations: Vec::new(),
                advice: Vec::new(),
                attributes: Vec::new(),
                policy_id_list: Vec::new(),
            }],
        }
    }

    /// Single-result Indeterminate response carrying a failure status. This
    /// is the shape every malformed request collapses to; nothing escapes
    /// the PDP boundary as an error.
    pub fn indeterminate(status: Status) -> Self {
        Self {
            results: vec![ResultItem {
                decision: Decision::Indeterminate(IndeterminateKind::DenyOrPermit),
                status,
                obligations: Vec::new(),
                advice: Vec::new(),
                attributes: Vec::new(),
                policy_id_list: Vec::new(),
            }],
        }
    }

    /// The first result. Responses built by this engine always carry
    /// exactly one.
    pub fn result(&self) -> Option<&ResultItem> {
        self.results.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    #[test]
    fn test_indeterminate_response_shape() {
        let response = Response::indeterminate(Status::syntax_error("malformed XML"));
        let result = response.result().unwrap();
        assert_eq!(result.decision.as_str(), "Indeterminate");
        assert_eq!(result.status.code, StatusCode::SyntaxError);
    }

    #[test]
    fn test_of_decision() {
        let response = Response::of_decision(Decision::Permit);
        let result = response.result().unwrap();
        assert_eq!(result.decision, Decision::Permit);
        assert!(result.status.is_ok());
        assert!(result.obligations.is_empty());
    }
}
