//! XACML 3.0 XML loaders and serializers.
//!
//! The wire format is the core schema
//! `urn:oasis:names:tc:xacml:3.0:core:schema:wd-17`. Parsing goes through a
//! small owned DOM (one event-reader pass), then a tree walk; element and
//! attribute names are matched by local name, so prefixed documents load the
//! same as default-namespace ones.

pub mod dom;
pub mod error;
pub mod policy;
pub mod request;
pub mod response;

pub use error::{XmlError, XmlResult};
pub use policy::{parse_policy_document, PolicyDocument};
pub use request::{parse_request, serialize_request};
pub use response::serialize_response;

/// The XACML 3.0 core schema namespace.
pub const XACML_NS: &str = "urn:oasis:names:tc:xacml:3.0:core:schema:wd-17";
