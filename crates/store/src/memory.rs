//! In-memory store
//!
//! Used by tests and by embedders that keep no durable state. Supports fault
//! injection: `set_unavailable(true)` fails every call, `set_latency` delays
//! every call before it touches state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use kycflow_audit::{AuditDraft, AuditEntry, AuditPage};
use kycflow_core::{CaseId, Document, DocumentId, PageRequest, VerificationRecord};

use crate::error::{StoreError, StoreResult};
use crate::{page_newest_first, seal_all, CaseCommit, Committed, KycStore};

#[derive(Default)]
struct State {
    cases: BTreeMap<CaseId, VerificationRecord>,
    /// Upload order
    documents: Vec<Document>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn tail(&self) -> Option<(u64, String)> {
        self.audit.last().map(|e| (e.id, e.hash.clone()))
    }

    fn append(&mut self, drafts: Vec<AuditDraft>) -> Vec<AuditEntry> {
        let sealed = seal_all(drafts, self.tail());
        self.audit.extend(sealed.iter().cloned());
        sealed
    }

    fn check_version(&self, id: &CaseId, expected: u64) -> StoreResult<&VerificationRecord> {
        let current = self
            .cases
            .get(id)
            .ok_or_else(|| StoreError::not_found("Case", id))?;
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                case_id: id.to_string(),
                expected,
                actual: current.version,
            });
        }
        Ok(current)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn gate(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KycStore for MemoryStore {
    async fn insert_case(
        &self,
        record: &VerificationRecord,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry> {
        self.gate().await?;
        let mut state = self.state.write().await;

        if state.cases.contains_key(&record.id) {
            return Err(StoreError::already_exists("Case", &record.id));
        }
        if state
            .cases
            .values()
            .any(|c| c.applicant_id == record.applicant_id && c.is_active())
        {
            return Err(StoreError::already_exists("Applicant", &record.applicant_id));
        }

        state.cases.insert(record.id.clone(), record.clone());
        let mut sealed = state.append(vec![audit]);
        debug!(case_id = %record.id, "Case inserted");
        sealed
            .pop()
            .ok_or_else(|| StoreError::Unavailable("audit entry was not sealed".to_string()))
    }

    async fn get_case(&self, id: &CaseId) -> StoreResult<VerificationRecord> {
        self.gate().await?;
        self.state
            .read()
            .await
            .cases
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Case", id))
    }

    async fn find_active_case(&self, applicant_id: &str) -> StoreResult<Option<VerificationRecord>> {
        self.gate().await?;
        Ok(self
            .state
            .read()
            .await
            .cases
            .values()
            .find(|c| c.applicant_id == applicant_id && c.is_active())
            .cloned())
    }

    async fn list_cases(&self) -> StoreResult<Vec<VerificationRecord>> {
        self.gate().await?;
        Ok(self.state.read().await.cases.values().cloned().collect())
    }

    async fn documents_for_case(&self, id: &CaseId) -> StoreResult<Vec<Document>> {
        self.gate().await?;
        Ok(self
            .state
            .read()
            .await
            .documents
            .iter()
            .filter(|d| &d.case_id == id)
            .cloned()
            .collect())
    }

    async fn list_documents(&self) -> StoreResult<Vec<Document>> {
        self.gate().await?;
        Ok(self.state.read().await.documents.clone())
    }

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Document> {
        self.gate().await?;
        self.state
            .read()
            .await
            .documents
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Document", id))
    }

    async fn commit(&self, commit: CaseCommit) -> StoreResult<Committed> {
        self.gate().await?;
        let mut state = self.state.write().await;

        let case_id = commit.record.id.clone();
        state.check_version(&case_id, commit.expected_version)?;

        let mut record = commit.record;
        record.version = commit.expected_version + 1;

        for doc in commit.documents {
            match state.documents.iter_mut().find(|d| d.id == doc.id) {
                Some(existing) => *existing = doc,
                None => state.documents.push(doc),
            }
        }
        state.cases.insert(case_id.clone(), record.clone());
        let audit = state.append(commit.audit);

        debug!(case_id = %case_id, version = record.version, "Commit applied");
        Ok(Committed { record, audit })
    }

    async fn append_audit(&self, draft: AuditDraft) -> StoreResult<AuditEntry> {
        self.gate().await?;
        let mut state = self.state.write().await;
        state
            .append(vec![draft])
            .pop()
            .ok_or_else(|| StoreError::Unavailable("audit entry was not sealed".to_string()))
    }

    async fn audit_for_case(&self, id: &CaseId, page: &PageRequest) -> StoreResult<AuditPage> {
        self.gate().await?;
        let entries = self
            .state
            .read()
            .await
            .audit
            .iter()
            .filter(|e| &e.case_id == id)
            .cloned()
            .collect();
        Ok(page_newest_first(entries, page))
    }

    async fn audit_log(&self) -> StoreResult<Vec<AuditEntry>> {
        self.gate().await?;
        Ok(self.state.read().await.audit.clone())
    }

    async fn expunge_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry> {
        self.gate().await?;
        let mut state = self.state.write().await;
        state.check_version(id, expected_version)?;

        state.cases.remove(id);
        state.documents.retain(|d| &d.case_id != id);
        let mut sealed = state.append(vec![audit]);
        debug!(case_id = %id, "Case expunged");
        sealed
            .pop()
            .ok_or_else(|| StoreError::Unavailable("audit entry was not sealed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{draft_at, draft_for, sample_record};
    use kycflow_audit::{verify_chain, AuditAction};

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let record = sample_record("USER-1");

        let entry = store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();
        assert_eq!(entry.id, 1);

        let loaded = store.get_case(&record.id).await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_one_active_case_per_applicant() {
        let store = MemoryStore::new();
        let first = sample_record("USER-1");
        store
            .insert_case(&first, draft_for(&first, AuditAction::KycSubmit))
            .await
            .unwrap();

        let second = sample_record("USER-1");
        let result = store
            .insert_case(&second, draft_for(&second, AuditAction::KycSubmit))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_commit_version_check() {
        let store = MemoryStore::new();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();

        let committed = store
            .commit(
                CaseCommit::new(1, record.clone())
                    .with_audit(draft_for(&record, AuditAction::KycUpdate)),
            )
            .await
            .unwrap();
        assert_eq!(committed.record.version, 2);
        assert_eq!(committed.audit[0].id, 2);

        // Stale writer
        let stale = store.commit(CaseCommit::new(1, record.clone())).await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        assert!(verify_chain(&store.audit_log().await.unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_outage_leaves_state_untouched() {
        let store = MemoryStore::new();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();

        store.set_unavailable(true);
        let result = store.commit(CaseCommit::new(1, record.clone())).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.set_unavailable(false);
        assert_eq!(store.get_case(&record.id).await.unwrap().version, 1);
        assert_eq!(store.audit_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expunge_keeps_audit() {
        let store = MemoryStore::new();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();

        store
            .expunge_case(&record.id, 1, draft_for(&record, AuditAction::KycExpunged))
            .await
            .unwrap();

        assert!(store.get_case(&record.id).await.unwrap_err().is_not_found());
        let page = store
            .audit_for_case(&record.id, &PageRequest::first(10))
            .await
            .unwrap();
        assert_eq!(page.pagination.total_records, 2);
        assert_eq!(page.records[0].action, AuditAction::KycExpunged);
    }

    #[tokio::test]
    async fn test_audit_ties_newest_id_first() {
        let store = MemoryStore::new();
        let record = sample_record("USER-1");
        let at = chrono::Utc::now();
        store
            .insert_case(&record, draft_at(&record, AuditAction::KycSubmit, at))
            .await
            .unwrap();
        for _ in 0..3 {
            store
                .append_audit(draft_at(&record, AuditAction::DocumentAccessed, at))
                .await
                .unwrap();
        }

        let page = store
            .audit_for_case(&record.id, &PageRequest::first(10))
            .await
            .unwrap();
        let ids: Vec<u64> = page.records.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
        assert!(page.records.iter().all(|e| e.created_at == at));
    }
}
