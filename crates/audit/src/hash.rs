//! Hash chain utilities for audit log integrity

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::entry::AuditEntry;

/// `prev_hash` of the first entry in the log
pub const GENESIS_HASH: &str = "GENESIS";

fn update_opt(hasher: &mut Sha256, value: &Option<String>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

/// Calculate SHA256 hash of entry content (excluding the hash field itself)
pub fn calculate_entry_hash(entry: &AuditEntry) -> String {
    let mut hasher = Sha256::new();

    hasher.update(entry.id.to_le_bytes());
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.created_at.to_rfc3339().as_bytes());
    hasher.update(entry.case_id.as_str().as_bytes());
    hasher.update(entry.action.as_ref().as_bytes());
    hasher.update(entry.actor_id.as_bytes());
    hasher.update(entry.actor_role.as_ref().as_bytes());

    // Typed payloads hash through their JSON form; struct field order is fixed
    hasher.update(serde_json::to_string(&entry.target).unwrap_or_default().as_bytes());
    hasher.update(serde_json::to_string(&entry.change).unwrap_or_default().as_bytes());

    update_opt(&mut hasher, &entry.reason);
    update_opt(&mut hasher, &entry.ip_address);
    update_opt(&mut hasher, &entry.user_agent);

    hex::encode(hasher.finalize())
}

/// Verify hash chain integrity of a full, id-ordered log
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();

    for (i, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                id: entry.id,
                expected: prev_hash,
                actual: entry.prev_hash.clone(),
            });
        }

        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                id: entry.id,
                expected: calculated,
                actual: entry.hash.clone(),
            });
        }

        if i > 0 && entry.id != entries[i - 1].id + 1 {
            return Err(ChainError::InvalidSequence {
                expected: entries[i - 1].id + 1,
                actual: entry.id,
            });
        }

        prev_hash = entry.hash.clone();
    }

    Ok(())
}

/// Errors in hash chain verification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Broken link at entry {id}: expected prev_hash '{expected}', got '{actual}'")]
    BrokenLink {
        id: u64,
        expected: String,
        actual: String,
    },

    #[error("Invalid hash at entry {id}: expected '{expected}', got '{actual}'")]
    InvalidHash {
        id: u64,
        expected: String,
        actual: String,
    },

    #[error("Invalid sequence: expected {expected}, got {actual}")]
    InvalidSequence { expected: u64, actual: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditAction, AuditChange, AuditDraft, AuditTarget};
    use chrono::Utc;
    use kycflow_core::{Actor, CaseId};

    fn chain(n: u64) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = Vec::new();
        for id in 1..=n {
            let prev = entries
                .last()
                .map(|e| e.hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string());
            let draft = AuditDraft::new(
                CaseId::new(format!("KYC-{id}")),
                AuditAction::KycSubmit,
                &Actor::applicant(format!("USER-{id}")),
                AuditTarget::KycCase(CaseId::new(format!("KYC-{id}"))),
                AuditChange::Unchanged,
                Utc::now(),
            );
            entries.push(draft.seal(id, &prev));
        }
        entries
    }

    #[test]
    fn test_hash_deterministic() {
        let entries = chain(1);
        assert_eq!(calculate_entry_hash(&entries[0]), calculate_entry_hash(&entries[0]));
        assert_eq!(entries[0].hash, calculate_entry_hash(&entries[0]));
    }

    #[test]
    fn test_verify_valid_chain() {
        assert!(verify_chain(&chain(3)).is_ok());
        assert!(verify_chain(&[]).is_ok());
    }

    #[test]
    fn test_tampered_reason_detected() {
        let mut entries = chain(3);
        entries[1].reason = Some("edited after the fact".to_string());

        let result = verify_chain(&entries);
        assert!(matches!(result, Err(ChainError::InvalidHash { id: 2, .. })));
    }

    #[test]
    fn test_verify_broken_chain() {
        let mut entries = chain(3);
        entries.remove(1);

        let result = verify_chain(&entries);
        assert!(matches!(result, Err(ChainError::BrokenLink { id: 3, .. })));
    }
}
