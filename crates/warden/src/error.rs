use thiserror::Error;

use warden_audit::AuditError;
use warden_pdp::PdpError;

/// Single error enum for server startup and CLI operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Pdp(#[from] PdpError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
