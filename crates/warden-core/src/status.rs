//! Status codes carried by Indeterminate results and Response elements.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValueError;
use crate::values::DataType;

// ---------------------------------------------------------------------------
// StatusCode — the standard status code URIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    pub fn uri(self) -> &'static str {
        match self {
            StatusCode::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:xacml:1.0:status:ok" => Some(StatusCode::Ok),
            "urn:oasis:names:tc:xacml:1.0:status:missing-attribute" => {
                Some(StatusCode::MissingAttribute)
            }
            "urn:oasis:names:tc:xacml:1.0:status:syntax-error" => Some(StatusCode::SyntaxError),
            "urn:oasis:names:tc:xacml:1.0:status:processing-error" => {
                Some(StatusCode::ProcessingError)
            }
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

// ---------------------------------------------------------------------------
// MissingAttributeDetail — which attribute was needed and absent
// ---------------------------------------------------------------------------

/// Descriptor of an attribute a designator needed and could not obtain.
/// Downstream callers use these to request more attributes and retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAttributeDetail {
    pub category: String,
    pub attribute_id: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

// ---------------------------------------------------------------------------
// Status — structured "why" for an Indeterminate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingAttributeDetail>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
            missing: Vec::new(),
        }
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::SyntaxError,
            message: Some(message.into()),
            missing: Vec::new(),
        }
    }

    pub fn processing_error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::ProcessingError,
            message: Some(message.into()),
            missing: Vec::new(),
        }
    }

    pub fn missing_attribute(detail: MissingAttributeDetail) -> Self {
        Self {
            code: StatusCode::MissingAttribute,
            message: Some(format!(
                "missing attribute '{}' of type {} in category '{}'",
                detail.attribute_id,
                detail.data_type.local_name(),
                detail.category
            )),
            missing: vec![detail],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl From<ValueError> for Status {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::TemporalOverflow(_) => Status::processing_error(err.to_string()),
            _ => Status::syntax_error(err.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}
