//! The audit record emitted after every evaluation.

use serde::{Deserialize, Serialize};

/// One decision, flattened for downstream consumers. The canonical JSON
/// form of this struct is what gets hash-chained and signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record id.
    pub id: String,
    /// RFC 3339 timestamp of the evaluation.
    pub timestamp: String,
    /// Decision literal: Permit / Deny / NotApplicable / Indeterminate.
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Policies that contributed to the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn new(timestamp: impl Into<String>, decision: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: timestamp.into(),
            decision: decision.into(),
            subject: None,
            resource: None,
            action: None,
            policy_references: Vec::new(),
            extras: None,
        }
    }

    /// Canonical JSON bytes used for chaining and signing.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, crate::AuditError> {
        serde_json::to_vec(self).map_err(|e| crate::AuditError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_unique() {
        let a = AuditRecord::new("2025-01-01T00:00:00Z", "Permit");
        let b = AuditRecord::new("2025-01-01T00:00:00Z", "Permit");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut record = AuditRecord::new("2025-01-01T00:00:00Z", "Deny");
        record.subject = Some("node-7".into());
        record.resource = Some("medical".into());
        record.action = Some("train".into());
        record.policy_references = vec!["train-policy".into()];

        let json = serde_json::to_string(&record).unwrap();
        let restored: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn test_optional_fields_omitted_from_json() {
        let record = AuditRecord::new("2025-01-01T00:00:00Z", "NotApplicable");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("subject"));
        assert!(!json.contains("extras"));
    }
}
