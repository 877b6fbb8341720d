//! Audit sinks.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{AuditError, AuditResult};
use crate::jws::Es256Signer;
use crate::record::AuditRecord;

/// Destination for audit records. Emission happens after every evaluation;
/// implementations must be thread-safe.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()>;
}

// ---------------------------------------------------------------------------
// InMemoryAuditSink — for tests
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records
            .lock()
            .map_err(|_| AuditError::SinkUnavailable("lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TracingAuditSink — one structured log line per decision
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        info!(
            target: "warden::audit",
            id = %record.id,
            decision = %record.decision,
            subject = record.subject.as_deref().unwrap_or("-"),
            resource = record.resource.as_deref().unwrap_or("-"),
            action = record.action.as_deref().unwrap_or("-"),
            policies = ?record.policy_references,
            "decision recorded"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SignedJsonlSink — hash-chained JSON lines, optionally JWS-signed
// ---------------------------------------------------------------------------

/// A line as written to the log file: the record, the chain hash over
/// `previous_hash || canonical_record`, and the optional detached JWS.
#[derive(Debug, Serialize)]
struct SignedLine<'r> {
    #[serde(flatten)]
    record: &'r AuditRecord,
    chain_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jws: Option<String>,
}

/// Appends one JSON line per record. Records are hash-chained for tamper
/// evidence; with a signer configured, each line carries a detached ES256
/// JWS over the canonical record bytes.
pub struct SignedJsonlSink {
    state: Mutex<SinkState>,
    signer: Option<Es256Signer>,
}

struct SinkState {
    file: File,
    previous_hash: Option<[u8; 32]>,
}

impl SignedJsonlSink {
    pub fn create(path: &Path, signer: Option<Es256Signer>) -> AuditResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            state: Mutex::new(SinkState {
                file,
                previous_hash: None,
            }),
            signer,
        })
    }
}

impl AuditSink for SignedJsonlSink {
    fn emit(&self, record: &AuditRecord) -> AuditResult<()> {
        let canonical = record.canonical_bytes()?;

        let mut state = self
            .state
            .lock()
            .map_err(|_| AuditError::SinkUnavailable("lock poisoned".into()))?;

        let mut hasher = Sha256::new();
        if let Some(previous) = &state.previous_hash {
            hasher.update(previous);
        }
        hasher.update(&canonical);
        let digest = hasher.finalize();
        let mut chain = [0u8; 32];
        chain.copy_from_slice(&digest);

        let jws = match &self.signer {
            Some(signer) => Some(signer.sign_detached(&canonical)?),
            None => None,
        };

        let line = SignedLine {
            record,
            chain_hash: hex::encode(chain),
            jws,
        };
        let mut serialized = serde_json::to_vec(&line)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        serialized.push(b'\n');
        state.file.write_all(&serialized)?;
        state.file.flush()?;
        state.previous_hash = Some(chain);
        Ok(())
    }
}

/// Recompute the hash chain of a parsed log and report whether it is intact.
pub fn verify_chain(records: &[AuditRecord], chain_hashes: &[String]) -> AuditResult<bool> {
    if records.len() != chain_hashes.len() {
        return Ok(false);
    }
    let mut previous: Option<[u8; 32]> = None;
    for (record, expected) in records.iter().zip(chain_hashes) {
        let canonical = record.canonical_bytes()?;
        let mut hasher = Sha256::new();
        if let Some(previous) = &previous {
            hasher.update(previous);
        }
        hasher.update(&canonical);
        let digest = hasher.finalize();
        if hex::encode(digest) != *expected {
            return Ok(false);
        }
        let mut chain = [0u8; 32];
        chain.copy_from_slice(&digest);
        previous = Some(chain);
    }
    Ok(true)
}
