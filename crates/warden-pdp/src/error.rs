use thiserror::Error;

use warden_xml::XmlError;

/// Single error enum for PDP initialization.
///
/// Every variant aborts startup: the PDP never serves with a half-loaded
/// policy tree. Evaluation-time failures are decisions, not errors.
#[derive(Debug, Error)]
pub enum PdpError {
    #[error("cannot read policy source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error("duplicate policy id '{0}'")]
    DuplicatePolicyId(String),

    #[error("reference to unknown policy '{0}'")]
    DanglingReference(String),

    #[error("policy set reference cycle through '{0}'")]
    ReferenceCycle(String),

    #[error("no policy documents were loaded")]
    NoPolicies,
}

pub type PdpResult<T> = Result<T, PdpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PdpError::DuplicatePolicyId("medical".into());
        assert!(format!("{}", err).contains("medical"));
        assert!(format!("{}", PdpError::NoPolicies).contains("no policy"));
    }
}
