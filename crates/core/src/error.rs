//! KYC workflow errors

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::case::CaseStatus;
use crate::document::DocumentType;

/// Errors surfaced by every workflow operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KycError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {action} from {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Required documents not approved: {}", join_types(.missing))]
    IncompleteDocuments { missing: Vec<DocumentType> },

    #[error("Concurrent modification of {0}")]
    ConcurrentModification(String),

    #[error("Too many items: {count} exceeds the maximum batch size of {max}")]
    TooManyItems { count: usize, max: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Case {case_id} is {status}; documents can only change while pending")]
    CaseImmutable { case_id: String, status: CaseStatus },

    #[error("A {0} document is already on file")]
    DuplicateRequiredSlot(DocumentType),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

fn join_types(types: &[DocumentType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for workflow operations
pub type KycResult<T> = Result<T, KycError>;

/// Fieldless error classification, used to tag per-item bulk failures
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    IncompleteDocuments,
    ConcurrentModification,
    TooManyItems,
    StorageUnavailable,
    NotFound,
    CaseImmutable,
    DuplicateRequiredSlot,
    Forbidden,
}

impl KycError {
    pub fn validation(message: impl Into<String>) -> Self {
        KycError::Validation(message.into())
    }

    pub fn invalid_transition(from: impl ToString, action: impl ToString) -> Self {
        KycError::InvalidTransition {
            from: from.to_string(),
            action: action.to_string(),
        }
    }

    pub fn case_not_found(id: impl ToString) -> Self {
        KycError::NotFound {
            entity: "Case",
            id: id.to_string(),
        }
    }

    pub fn document_not_found(id: impl ToString) -> Self {
        KycError::NotFound {
            entity: "Document",
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            KycError::Validation(_) => ErrorKind::Validation,
            KycError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            KycError::IncompleteDocuments { .. } => ErrorKind::IncompleteDocuments,
            KycError::ConcurrentModification(_) => ErrorKind::ConcurrentModification,
            KycError::TooManyItems { .. } => ErrorKind::TooManyItems,
            KycError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            KycError::NotFound { .. } => ErrorKind::NotFound,
            KycError::CaseImmutable { .. } => ErrorKind::CaseImmutable,
            KycError::DuplicateRequiredSlot(_) => ErrorKind::DuplicateRequiredSlot,
            KycError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }

    /// Transient failures that may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KycError::StorageUnavailable(_) | KycError::ConcurrentModification(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_documents_message() {
        let err = KycError::IncompleteDocuments {
            missing: vec![DocumentType::IdentityFront, DocumentType::SelfieVerification],
        };
        assert_eq!(
            err.to_string(),
            "Required documents not approved: identity_front, selfie_verification"
        );
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = KycError::invalid_transition(CaseStatus::Approved, "reject");
        assert_eq!(err.to_string(), "Invalid transition: cannot reject from approved");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn test_retryable() {
        assert!(KycError::StorageUnavailable("timeout".into()).is_retryable());
        assert!(KycError::ConcurrentModification("KYC-1".into()).is_retryable());
        assert!(!KycError::validation("bad").is_retryable());
        assert!(!KycError::case_not_found("KYC-1").is_retryable());
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidTransition).unwrap(),
            "\"invalid_transition\""
        );
        assert_eq!(ErrorKind::TooManyItems.to_string(), "too_many_items");
    }
}
