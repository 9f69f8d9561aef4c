//! # KYCFlow Review
//!
//! The write side of the KYC workflow:
//!
//! - [`ReviewEngine`]: case state machine, one journaled commit per transition
//! - [`DocumentRegistry`]: per-slot uploads, verification and access journaling
//! - [`BulkCoordinator`]: one action over many cases, bounded fan-out
//! - [`ExpirySweeper`]: moves lapsed approvals to expired
//! - [`KycService`]: the facade the outer layers call
//!
//! Every store call goes through [`TimedStore`], and every mutation of a case
//! holds that case's lock from [`CaseLocks`].

pub mod bulk;
pub mod documents;
pub mod engine;
pub mod locks;
pub mod service;
pub mod sweeper;
pub mod timed;

pub use bulk::{BulkCoordinator, BulkFailure, BulkResult};
pub use documents::DocumentRegistry;
pub use engine::{plan_transition, ReviewAction, ReviewEngine, ReviewParams, SYSTEM_ACTOR_ID};
pub use locks::{CaseGuard, CaseLocks};
pub use service::KycService;
pub use sweeper::{ExpirySweeper, SweepReport};
pub use timed::TimedStore;

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};
    use kycflow_audit::{AuditAction, AuditChange, AuditDraft, AuditTarget};
    use kycflow_core::risk::*;
    use kycflow_core::{
        Actor, CaseId, Document, DocumentStatus, DocumentType, FileRef, PersonalInfo,
        RiskAssessment, VerificationRecord,
    };
    use kycflow_store::{KycStore, MemoryStore};

    pub fn personal_info() -> PersonalInfo {
        PersonalInfo {
            first_name: "Minh".to_string(),
            last_name: "Tran".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1988, 11, 2).unwrap(),
            nationality: "VN".to_string(),
            address: "45 Nguyen Hue Boulevard, District 1".to_string(),
            phone_number: "+84 903 111 222".to_string(),
            email: Some("minh.tran@example.com".to_string()),
        }
    }

    pub fn risk_assessment() -> RiskAssessment {
        RiskAssessment {
            employment_status: EmploymentStatus::Employed,
            annual_income: AnnualIncome::From50kTo100k,
            source_of_funds: SourceOfFunds::Salary,
            investment_experience: InvestmentExperience::Beginner,
            crypto_experience: CryptoExperience::Basic,
            risk_tolerance: RiskTolerance::Moderate,
            investment_horizon: InvestmentHorizon::LongTerm,
            is_politically_exposed: false,
            has_criminal_record: false,
            sanctions_list_check: true,
            investment_goals: vec!["retirement".to_string()],
            additional_notes: None,
        }
    }

    pub fn sample_record(applicant_id: &str) -> VerificationRecord {
        VerificationRecord::new(applicant_id, personal_info(), risk_assessment(), Utc::now())
    }

    /// The required slots, each approved by REV-1
    pub fn approved_documents(case_id: &CaseId) -> Vec<Document> {
        [
            DocumentType::IdentityFront,
            DocumentType::ProofOfAddress,
            DocumentType::SelfieVerification,
        ]
        .into_iter()
        .map(|document_type| {
            let mut doc = Document::new(
                case_id.clone(),
                document_type,
                file(&format!("{document_type}.jpg")),
                None,
                None,
                Utc::now(),
            );
            doc.verification_status = DocumentStatus::Approved;
            doc.verified_by = Some("REV-1".to_string());
            doc.verified_at = Some(Utc::now());
            doc
        })
        .collect()
    }

    pub fn file(name: &str) -> FileRef {
        let mime = if name.ends_with(".pdf") {
            "application/pdf"
        } else if name.ends_with(".png") {
            "image/png"
        } else {
            "image/jpeg"
        };
        FileRef::new(format!("s3://kyc-docs/{name}"), name, mime, 180_000)
    }

    pub async fn insert_case(store: &Arc<MemoryStore>, applicant_id: &str) -> VerificationRecord {
        let record = sample_record(applicant_id);
        let draft = AuditDraft::new(
            record.id.clone(),
            AuditAction::KycSubmit,
            &Actor::applicant(applicant_id),
            AuditTarget::KycCase(record.id.clone()),
            AuditChange::case(None, Some(&record)),
            Utc::now(),
        );
        store.insert_case(&record, draft).await.unwrap();
        record
    }
}
