//! Document Registry - per-slot uploads and verification

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use kycflow_audit::{AuditAction, AuditChange, AuditDraft, AuditTarget};
use kycflow_core::validation::validate_file_ref;
use kycflow_core::{
    active_documents, Actor, CaseId, CaseStatus, Document, DocumentId, DocumentStatus,
    DocumentType, FileRef, KycConfig, KycError, KycResult, VerificationRecord,
};
use kycflow_store::CaseCommit;

use crate::locks::CaseLocks;
use crate::timed::TimedStore;

pub struct DocumentRegistry {
    store: TimedStore,
    locks: Arc<CaseLocks>,
    config: KycConfig,
}

fn require_owner(record: &VerificationRecord, actor: &Actor) -> KycResult<()> {
    if actor.id == record.applicant_id {
        Ok(())
    } else {
        Err(KycError::Forbidden(format!(
            "actor {} does not own case {}",
            actor.id, record.id
        )))
    }
}

impl DocumentRegistry {
    pub fn new(store: TimedStore, locks: Arc<CaseLocks>, config: KycConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Upload into a slot. Only the owning applicant, only while pending.
    /// A rejected slot may be re-uploaded; the new document supersedes it.
    pub async fn upload(
        &self,
        case_id: &CaseId,
        document_type: DocumentType,
        file: FileRef,
        document_number: Option<String>,
        actor: &Actor,
    ) -> KycResult<Document> {
        validate_file_ref(&file, &self.config)?;
        let _guard = self.locks.try_acquire(case_id)?;

        let record = self.store.get_case(case_id).await?;
        require_owner(&record, actor)?;
        if record.status != CaseStatus::Pending {
            return Err(KycError::CaseImmutable {
                case_id: case_id.to_string(),
                status: record.status,
            });
        }

        let existing = self.store.documents_for_case(case_id).await?;
        let supersedes = match active_documents(&existing).get(&document_type) {
            Some(current) if current.verification_status != DocumentStatus::Rejected => {
                return Err(KycError::DuplicateRequiredSlot(document_type));
            }
            Some(rejected) => Some(rejected.id.clone()),
            None => None,
        };

        let now = Utc::now();
        let document_number = document_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let document = Document::new(
            case_id.clone(),
            document_type,
            file,
            document_number,
            supersedes,
            now,
        );
        let mut touched = record.clone();
        touched.updated_at = now;

        let draft = AuditDraft::new(
            case_id.clone(),
            AuditAction::DocumentUploaded,
            actor,
            AuditTarget::Document(document.id.clone()),
            AuditChange::document(None, &document),
            now,
        );
        self.store
            .commit(
                CaseCommit::new(record.version, touched)
                    .with_document(document.clone())
                    .with_audit(draft),
            )
            .await?;

        info!(
            case_id = %case_id,
            document_id = %document.id,
            document_type = %document_type,
            "Document uploaded"
        );
        Ok(document)
    }

    /// Approve or reject a pending document. Serialized under the case lock.
    pub async fn verify(
        &self,
        document_id: &DocumentId,
        status: DocumentStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> KycResult<Document> {
        actor.require_reviewer()?;
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let audit_action = match status {
            DocumentStatus::Approved => AuditAction::DocumentApprove,
            DocumentStatus::Rejected if reason.is_none() => {
                return Err(KycError::validation("reason: required to reject a document"));
            }
            DocumentStatus::Rejected => AuditAction::DocumentReject,
            DocumentStatus::Pending => {
                return Err(KycError::validation(
                    "status: a document can only be verified as approved or rejected",
                ));
            }
        };

        let case_id = self.store.get_document(document_id).await?.case_id;
        let _guard = self.locks.try_acquire(&case_id)?;

        // Re-read under the lock
        let document = self.store.get_document(document_id).await?;
        let record = self.store.get_case(&case_id).await?;
        if record.is_terminal() {
            return Err(KycError::invalid_transition(
                record.status,
                format!("verify document {document_id}"),
            ));
        }
        if document.verification_status != DocumentStatus::Pending {
            return Err(KycError::invalid_transition(
                document.verification_status,
                audit_action,
            ));
        }

        let now = Utc::now();
        let mut verified = document.clone();
        verified.verification_status = status;
        verified.rejection_reason = reason.clone();
        verified.verified_by = Some(actor.id.clone());
        verified.verified_at = Some(now);

        let mut touched = record.clone();
        touched.updated_at = now;

        let draft = AuditDraft::new(
            case_id.clone(),
            audit_action,
            actor,
            AuditTarget::Document(document.id.clone()),
            AuditChange::document(Some(&document), &verified),
            now,
        )
        .with_reason(reason);
        self.store
            .commit(
                CaseCommit::new(record.version, touched)
                    .with_document(verified.clone())
                    .with_audit(draft),
            )
            .await?;

        info!(
            case_id = %case_id,
            document_id = %document_id,
            status = %status,
            reviewer = %actor.id,
            "Document verified"
        );
        Ok(verified)
    }

    /// All documents of a case in upload order, superseded ones included
    pub async fn list(&self, case_id: &CaseId) -> KycResult<Vec<Document>> {
        self.store.get_case(case_id).await?;
        self.store.documents_for_case(case_id).await
    }

    pub async fn get(&self, document_id: &DocumentId) -> KycResult<Document> {
        self.store.get_document(document_id).await
    }

    /// Open a document for viewing. Reviewers and the owning applicant only;
    /// every access is journaled.
    pub async fn access(&self, document_id: &DocumentId, actor: &Actor) -> KycResult<Document> {
        let document = self.store.get_document(document_id).await?;
        if !actor.is_reviewer() {
            let record = self.store.get_case(&document.case_id).await?;
            require_owner(&record, actor)?;
        }

        let draft = AuditDraft::new(
            document.case_id.clone(),
            AuditAction::DocumentAccessed,
            actor,
            AuditTarget::Document(document.id.clone()),
            AuditChange::Unchanged,
            Utc::now(),
        );
        self.store.append_audit(draft).await?;
        Ok(document)
    }
}
