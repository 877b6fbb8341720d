use thiserror::Error;

/// Single error enum for audit recording and signing.
///
/// Messages never include key material.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to serialize audit record: {0}")]
    Serialization(String),

    #[error("audit sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing key rejected: {0}")]
    InvalidKey(String),

    #[error("signature operation failed: {0}")]
    Signature(String),

    #[error("audit sink unavailable: {0}")]
    SinkUnavailable(String),
}

pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_no_key_material() {
        let err = AuditError::InvalidKey("not PEM".into());
        let msg = format!("{}", err);
        assert!(msg.contains("rejected"));
        assert!(!msg.contains("BEGIN"));
    }
}
