//! Audit records for policy decisions.
//!
//! The PDP emits one [`AuditRecord`] per evaluation through an
//! [`AuditSink`]. Transport and retention are out of scope; this crate
//! provides an in-memory sink for tests, a `tracing` sink for structured
//! logs, and a JSON-lines file sink with SHA-256 hash chaining and an
//! optional detached ES256 JWS per record.

pub mod error;
pub mod jws;
pub mod record;
pub mod sink;

pub use error::{AuditError, AuditResult};
pub use jws::Es256Signer;
pub use record::AuditRecord;
pub use sink::{verify_chain, AuditSink, InMemoryAuditSink, SignedJsonlSink, TracingAuditSink};
