//! Persistence errors

use kycflow_core::KycError;
use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend unreachable (injected outages, dropped pools)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    // === Record errors ===
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Record already exists: {entity} with id {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Version conflict on {case_id}: expected {expected}, found {actual}")]
    VersionConflict {
        case_id: String,
        expected: u64,
        actual: u64,
    },
}

/// Result type alias for StoreError
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for KycError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => KycError::NotFound { entity, id },
            StoreError::VersionConflict { case_id, .. } => {
                KycError::ConcurrentModification(case_id)
            }
            StoreError::AlreadyExists { entity, id } => {
                KycError::validation(format!("{entity} {id} already has an active case"))
            }
            StoreError::Serialization(e) => {
                KycError::StorageUnavailable(format!("corrupt record: {e}"))
            }
            other => KycError::StorageUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kycflow_core::ErrorKind;

    #[test]
    fn test_error_mapping() {
        let kyc: KycError = StoreError::not_found("Case", "KYC-1").into();
        assert_eq!(kyc, KycError::case_not_found("KYC-1"));

        let kyc: KycError = StoreError::VersionConflict {
            case_id: "KYC-1".into(),
            expected: 2,
            actual: 3,
        }
        .into();
        assert_eq!(kyc.kind(), ErrorKind::ConcurrentModification);

        let kyc: KycError = StoreError::Unavailable("down".into()).into();
        assert_eq!(kyc.kind(), ErrorKind::StorageUnavailable);
    }
}
