//! KYCFlow Core - Domain types
//!
//! This crate contains the fundamental types used across KYCFlow:
//! - `VerificationRecord`: the top-level KYC case and its review state
//! - `Document`: a per-slot identity document attached to a case
//! - `Actor`: the already-authenticated caller passed into every operation
//! - `KycError`: the workflow error taxonomy
//! - `KycConfig`: tunable limits (batch size, timeouts, validity windows)

pub mod actor;
pub mod case;
pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod page;
pub mod risk;
pub mod validation;

pub use actor::{Actor, Role};
pub use case::{CaseStatus, PersonalInfo, RiskLevel, VerificationRecord};
pub use config::KycConfig;
pub use document::{
    active_documents, missing_required, Document, DocumentStatus, DocumentType, FileRef,
};
pub use error::{ErrorKind, KycError, KycResult};
pub use ids::{CaseId, DocumentId};
pub use page::{PageRequest, Paginated, Pagination};
pub use risk::RiskAssessment;
