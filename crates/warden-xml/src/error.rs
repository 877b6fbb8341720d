use thiserror::Error;

use warden_core::ValueError;
use warden_policy::PolicyLoadError;

/// Single error enum for XML load and serialization failures.
///
/// At the PDP boundary these collapse into a
/// `Response{Indeterminate(syntax-error)}`; they exist as errors so that
/// policy load can abort initialization with a real cause.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("unexpected element <{element}> inside <{parent}>")]
    UnexpectedElement { parent: String, element: String },

    #[error("element <{element}> is missing required attribute '{attribute}'")]
    MissingXmlAttribute {
        element: String,
        attribute: String,
    },

    #[error("unknown data type URI: {0}")]
    UnknownDataType(String),

    #[error("attribute value rejected: {0}")]
    Value(#[from] ValueError),

    #[error(transparent)]
    Policy(#[from] PolicyLoadError),

    #[error("{0}")]
    Invalid(String),
}

impl XmlError {
    pub fn unexpected(parent: &str, element: &str) -> Self {
        XmlError::UnexpectedElement {
            parent: parent.to_string(),
            element: element.to_string(),
        }
    }

    pub fn missing_attr(element: &str, attribute: &str) -> Self {
        XmlError::MissingXmlAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

pub type XmlResult<T> = Result<T, XmlError>;
