//! KYC Service - the public operation surface
//!
//! Wires the engine, the document registry, the bulk coordinator and the
//! expiry sweeper over one store, one lock table and one config.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::info;

use kycflow_audit::{AuditAction, AuditChange, AuditDraft, AuditEntry, AuditPage, AuditTarget};
use kycflow_core::validation::{validate_personal_info, validate_risk_assessment};
use kycflow_core::{
    Actor, CaseId, CaseStatus, Document, DocumentId, DocumentStatus, DocumentType, FileRef,
    KycConfig, KycError, KycResult, PageRequest, Paginated, PersonalInfo, RiskAssessment,
    VerificationRecord,
};
use kycflow_query::{compute_stats, search, SearchFilters, SortSpec, StatsSummary, TimeRange};
use kycflow_store::{CaseCommit, KycStore};

use crate::bulk::{BulkCoordinator, BulkResult};
use crate::documents::DocumentRegistry;
use crate::engine::{retry_once, ReviewAction, ReviewEngine, ReviewParams};
use crate::locks::CaseLocks;
use crate::sweeper::{ExpirySweeper, SweepReport};
use crate::timed::TimedStore;

pub struct KycService {
    store: TimedStore,
    locks: Arc<CaseLocks>,
    engine: Arc<ReviewEngine>,
    documents: DocumentRegistry,
    bulk: BulkCoordinator,
    sweeper: Arc<ExpirySweeper>,
    config: KycConfig,
}

impl KycService {
    pub fn new(store: Arc<dyn KycStore>, config: KycConfig) -> Self {
        let store = TimedStore::new(store, config.operation_timeout());
        let locks = Arc::new(CaseLocks::new());
        let engine = Arc::new(ReviewEngine::new(
            store.clone(),
            locks.clone(),
            config.clone(),
        ));
        let documents = DocumentRegistry::new(store.clone(), locks.clone(), config.clone());
        let bulk = BulkCoordinator::new(engine.clone(), &config);
        let sweeper = Arc::new(ExpirySweeper::new(engine.clone(), store.clone()));

        Self {
            store,
            locks,
            engine,
            documents,
            bulk,
            sweeper,
            config,
        }
    }

    pub fn config(&self) -> &KycConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ReviewEngine> {
        &self.engine
    }

    // === Applicant operations ===

    /// Open a new case. An applicant has at most one active case.
    pub async fn submit_verification(
        &self,
        actor: &Actor,
        personal_info: PersonalInfo,
        risk_assessment: RiskAssessment,
    ) -> KycResult<CaseId> {
        if actor.is_reviewer() {
            return Err(KycError::Forbidden(
                "reviewers cannot submit verifications".to_string(),
            ));
        }
        let now = Utc::now();
        validate_personal_info(&personal_info, now.date_naive(), self.config.min_applicant_age)?;
        validate_risk_assessment(&risk_assessment)?;

        if let Some(active) = self.store.find_active_case(&actor.id).await? {
            return Err(KycError::validation(format!(
                "applicant: {} already has an active case {}",
                actor.id, active.id
            )));
        }

        let record = VerificationRecord::new(actor.id.clone(), personal_info, risk_assessment, now);
        let draft = AuditDraft::new(
            record.id.clone(),
            AuditAction::KycSubmit,
            actor,
            AuditTarget::KycCase(record.id.clone()),
            AuditChange::case(None, Some(&record)),
            now,
        );
        self.store.insert_case(&record, draft).await?;

        info!(case_id = %record.id, applicant = %actor.id, "Verification submitted");
        Ok(record.id)
    }

    /// Replace the personal details of a pending case
    pub async fn amend_personal_info(
        &self,
        case_id: &CaseId,
        actor: &Actor,
        personal_info: PersonalInfo,
    ) -> KycResult<VerificationRecord> {
        let now = Utc::now();
        validate_personal_info(&personal_info, now.date_naive(), self.config.min_applicant_age)?;
        let _guard = self.locks.try_acquire(case_id)?;

        let record = self.store.get_case(case_id).await?;
        if actor.id != record.applicant_id {
            return Err(KycError::Forbidden(format!(
                "actor {} does not own case {}",
                actor.id, case_id
            )));
        }
        if record.status != CaseStatus::Pending {
            return Err(KycError::CaseImmutable {
                case_id: case_id.to_string(),
                status: record.status,
            });
        }

        let mut next = record.clone();
        next.personal_info = personal_info;
        next.updated_at = now;
        let draft = AuditDraft::new(
            case_id.clone(),
            AuditAction::KycUpdate,
            actor,
            AuditTarget::KycCase(case_id.clone()),
            AuditChange::case(Some(&record), Some(&next)),
            now,
        );
        let committed = self
            .store
            .commit(CaseCommit::new(record.version, next).with_audit(draft))
            .await?;

        info!(case_id = %case_id, "Personal info amended");
        Ok(committed.record)
    }

    pub async fn upload_document(
        &self,
        case_id: &CaseId,
        document_type: DocumentType,
        file: FileRef,
        actor: &Actor,
    ) -> KycResult<DocumentId> {
        self.upload_document_with_number(case_id, document_type, file, None, actor)
            .await
    }

    /// Upload with the number printed on the document, which search indexes
    pub async fn upload_document_with_number(
        &self,
        case_id: &CaseId,
        document_type: DocumentType,
        file: FileRef,
        document_number: Option<String>,
        actor: &Actor,
    ) -> KycResult<DocumentId> {
        let document = self
            .documents
            .upload(case_id, document_type, file, document_number, actor)
            .await?;
        Ok(document.id)
    }

    // === Reviewer operations ===

    /// Apply a reviewer action. Without a version token a lost race is
    /// retried once.
    pub async fn review_case(
        &self,
        case_id: &CaseId,
        action: ReviewAction,
        actor: &Actor,
        params: &ReviewParams,
    ) -> KycResult<VerificationRecord> {
        if params.expected_version.is_some() {
            return self.engine.transition(case_id, action, actor, params).await;
        }
        retry_once(|| self.engine.transition(case_id, action, actor, params)).await
    }

    pub async fn verify_document(
        &self,
        document_id: &DocumentId,
        status: DocumentStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> KycResult<Document> {
        self.documents.verify(document_id, status, actor, reason).await
    }

    /// Open a document; the access is journaled
    pub async fn view_document(
        &self,
        document_id: &DocumentId,
        actor: &Actor,
    ) -> KycResult<Document> {
        self.documents.access(document_id, actor).await
    }

    pub async fn bulk_review(
        &self,
        action: ReviewAction,
        case_ids: &[CaseId],
        actor: &Actor,
        params: &ReviewParams,
    ) -> KycResult<BulkResult> {
        self.bulk.apply(action, case_ids, actor, params).await
    }

    /// Remove a closed case and its documents. The audit trail stays.
    pub async fn expunge_case(&self, case_id: &CaseId, actor: &Actor) -> KycResult<()> {
        actor.require_reviewer()?;
        let _guard = self.locks.try_acquire(case_id)?;

        let record = self.store.get_case(case_id).await?;
        if !matches!(record.status, CaseStatus::Rejected | CaseStatus::Expired) {
            return Err(KycError::invalid_transition(record.status, "expunge"));
        }

        let draft = AuditDraft::new(
            case_id.clone(),
            AuditAction::KycExpunged,
            actor,
            AuditTarget::KycCase(case_id.clone()),
            AuditChange::case(Some(&record), None),
            Utc::now(),
        );
        self.store
            .expunge_case(case_id, record.version, draft)
            .await?;

        info!(case_id = %case_id, actor = %actor.id, "Case expunged");
        Ok(())
    }

    // === Reads ===

    pub async fn get_case(&self, case_id: &CaseId) -> KycResult<VerificationRecord> {
        self.store.get_case(case_id).await
    }

    pub async fn list_documents(&self, case_id: &CaseId) -> KycResult<Vec<Document>> {
        self.documents.list(case_id).await
    }

    /// Entries of a case and its documents, newest first. An expunged case
    /// still has its trail.
    pub async fn list_audit_trail(
        &self,
        case_id: &CaseId,
        page: &PageRequest,
    ) -> KycResult<AuditPage> {
        page.validate()?;
        let trail = self.store.audit_for_case(case_id, page).await?;
        if trail.pagination.total_records == 0 {
            self.store.get_case(case_id).await?;
        }
        Ok(trail)
    }

    /// The whole journal in id order
    pub async fn audit_log(&self) -> KycResult<Vec<AuditEntry>> {
        self.store.audit_log().await
    }

    pub async fn search_cases(
        &self,
        filters: &SearchFilters,
        sort: SortSpec,
        page: &PageRequest,
    ) -> KycResult<Paginated<VerificationRecord>> {
        let records = self.store.list_cases().await?;
        let documents = self.store.list_documents().await?;
        search(records, &documents, filters, sort, page)
    }

    pub async fn get_stats(&self, range: TimeRange) -> KycResult<StatsSummary> {
        self.get_stats_at(range, Utc::now()).await
    }

    /// Stats with the window anchored at `now`
    pub async fn get_stats_at(
        &self,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> KycResult<StatsSummary> {
        let records = self.store.list_cases().await?;
        compute_stats(&records, &range, now)
    }

    // === Expiry ===

    pub async fn expire_due(&self, now: DateTime<Utc>) -> KycResult<SweepReport> {
        self.sweeper.sweep_at(now).await
    }

    /// Start the periodic sweep at the configured interval
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.sweeper.clone().spawn(self.config.sweep_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{file, personal_info, risk_assessment};
    use kycflow_core::{ErrorKind, RiskLevel};
    use kycflow_store::MemoryStore;

    fn service() -> (KycService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (KycService::new(store.clone(), KycConfig::default()), store)
    }

    async fn submit(service: &KycService, applicant: &str) -> CaseId {
        service
            .submit_verification(&Actor::applicant(applicant), personal_info(), risk_assessment())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_creates_pending_case() {
        let (service, _) = service();
        let case_id = submit(&service, "USER-1").await;

        let record = service.get_case(&case_id).await.unwrap();
        assert_eq!(record.status, CaseStatus::Pending);
        assert_eq!(record.applicant_id, "USER-1");
        assert_eq!(record.version, 1);

        let trail = service
            .list_audit_trail(&case_id, &PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(trail.records.len(), 1);
        assert_eq!(trail.records[0].action, AuditAction::KycSubmit);
    }

    #[tokio::test]
    async fn test_one_active_case_per_applicant() {
        let (service, _) = service();
        submit(&service, "USER-1").await;

        let err = service
            .submit_verification(&Actor::applicant("USER-1"), personal_info(), risk_assessment())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_submit_validates_input() {
        let (service, _) = service();
        let mut info = personal_info();
        info.date_of_birth = Utc::now().date_naive();

        let err = service
            .submit_verification(&Actor::applicant("USER-1"), info, risk_assessment())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .submit_verification(&Actor::reviewer("REV-1"), personal_info(), risk_assessment())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_amend_only_while_pending() {
        let (service, _) = service();
        let owner = Actor::applicant("USER-1");
        let case_id = submit(&service, "USER-1").await;

        let mut info = personal_info();
        info.address = "9 Hai Ba Trung Street, District 3".to_string();
        let amended = service
            .amend_personal_info(&case_id, &owner, info.clone())
            .await
            .unwrap();
        assert_eq!(amended.personal_info.address, info.address);
        assert_eq!(amended.version, 2);

        let reviewer = Actor::reviewer("REV-1");
        service
            .review_case(&case_id, ReviewAction::Assign, &reviewer, &ReviewParams::new())
            .await
            .unwrap();
        let err = service
            .amend_personal_info(&case_id, &owner, info)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaseImmutable);
    }

    #[tokio::test]
    async fn test_full_approval_flow() {
        let (service, _) = service();
        let owner = Actor::applicant("USER-1");
        let reviewer = Actor::reviewer("REV-1");
        let case_id = submit(&service, "USER-1").await;

        let mut doc_ids = Vec::new();
        for (document_type, name) in [
            (DocumentType::IdentityFront, "front.jpg"),
            (DocumentType::ProofOfAddress, "bill.pdf"),
            (DocumentType::SelfieVerification, "selfie.png"),
        ] {
            let id = service
                .upload_document(&case_id, document_type, file(name), &owner)
                .await
                .unwrap();
            doc_ids.push(id);
        }

        service
            .review_case(&case_id, ReviewAction::Assign, &reviewer, &ReviewParams::new())
            .await
            .unwrap();

        // Documents still pending
        let approve = ReviewParams::new().with_risk_level(RiskLevel::Low);
        let err = service
            .review_case(&case_id, ReviewAction::Approve, &reviewer, &approve)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompleteDocuments);

        for id in &doc_ids {
            service
                .verify_document(id, DocumentStatus::Approved, &reviewer, None)
                .await
                .unwrap();
        }
        let approved = service
            .review_case(&case_id, ReviewAction::Approve, &reviewer, &approve)
            .await
            .unwrap();
        assert_eq!(approved.status, CaseStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("REV-1"));

        // Terminal cases accept no more documents
        let err = service
            .upload_document(&case_id, DocumentType::IdentityBack, file("back.jpg"), &owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaseImmutable);
    }

    #[tokio::test]
    async fn test_expunge_keeps_trail() {
        let (service, _) = service();
        let reviewer = Actor::reviewer("REV-1");
        let case_id = submit(&service, "USER-1").await;

        let err = service.expunge_case(&case_id, &reviewer).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        service
            .review_case(&case_id, ReviewAction::Assign, &reviewer, &ReviewParams::new())
            .await
            .unwrap();
        service
            .review_case(
                &case_id,
                ReviewAction::Reject,
                &reviewer,
                &ReviewParams::new().with_reason("sanctions hit"),
            )
            .await
            .unwrap();
        service.expunge_case(&case_id, &reviewer).await.unwrap();

        let err = service.get_case(&case_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let trail = service
            .list_audit_trail(&case_id, &PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(trail.records[0].action, AuditAction::KycExpunged);
        assert_eq!(trail.pagination.total_records, 4);

        // The applicant may start over
        submit(&service, "USER-1").await;
    }

    #[tokio::test]
    async fn test_audit_trail_of_unknown_case() {
        let (service, _) = service();
        let err = service
            .list_audit_trail(&CaseId::new("KYC-nope"), &PageRequest::first(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service
            .list_audit_trail(&CaseId::new("KYC-nope"), &PageRequest::new(0, 10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
