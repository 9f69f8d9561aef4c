//! Store access with a per-call deadline

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use kycflow_audit::{AuditDraft, AuditEntry, AuditPage};
use kycflow_core::{CaseId, Document, DocumentId, KycError, KycResult, PageRequest, VerificationRecord};
use kycflow_store::{CaseCommit, Committed, KycStore, StoreResult};

/// Wraps every store call in `tokio::time::timeout`; an elapsed deadline is
/// reported as `StorageUnavailable`, like any other backend failure.
#[derive(Clone)]
pub struct TimedStore {
    inner: Arc<dyn KycStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn KycStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &Arc<dyn KycStore> {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> KycResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(KycError::from),
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(KycError::StorageUnavailable(format!(
                    "{op} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    pub async fn insert_case(
        &self,
        record: &VerificationRecord,
        audit: AuditDraft,
    ) -> KycResult<AuditEntry> {
        self.run("insert_case", self.inner.insert_case(record, audit))
            .await
    }

    pub async fn get_case(&self, id: &CaseId) -> KycResult<VerificationRecord> {
        self.run("get_case", self.inner.get_case(id)).await
    }

    pub async fn find_active_case(&self, applicant_id: &str) -> KycResult<Option<VerificationRecord>> {
        self.run("find_active_case", self.inner.find_active_case(applicant_id))
            .await
    }

    pub async fn list_cases(&self) -> KycResult<Vec<VerificationRecord>> {
        self.run("list_cases", self.inner.list_cases()).await
    }

    pub async fn documents_for_case(&self, id: &CaseId) -> KycResult<Vec<Document>> {
        self.run("documents_for_case", self.inner.documents_for_case(id))
            .await
    }

    pub async fn list_documents(&self) -> KycResult<Vec<Document>> {
        self.run("list_documents", self.inner.list_documents()).await
    }

    pub async fn get_document(&self, id: &DocumentId) -> KycResult<Document> {
        self.run("get_document", self.inner.get_document(id)).await
    }

    pub async fn commit(&self, commit: CaseCommit) -> KycResult<Committed> {
        self.run("commit", self.inner.commit(commit)).await
    }

    pub async fn append_audit(&self, draft: AuditDraft) -> KycResult<AuditEntry> {
        self.run("append_audit", self.inner.append_audit(draft)).await
    }

    pub async fn audit_for_case(&self, id: &CaseId, page: &PageRequest) -> KycResult<AuditPage> {
        self.run("audit_for_case", self.inner.audit_for_case(id, page))
            .await
    }

    pub async fn audit_log(&self) -> KycResult<Vec<AuditEntry>> {
        self.run("audit_log", self.inner.audit_log()).await
    }

    pub async fn expunge_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        audit: AuditDraft,
    ) -> KycResult<AuditEntry> {
        self.run(
            "expunge_case",
            self.inner.expunge_case(id, expected_version, audit),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kycflow_core::ErrorKind;
    use kycflow_store::MemoryStore;

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = Arc::new(MemoryStore::new());
        store.set_latency(Duration::from_millis(200));
        let timed = TimedStore::new(store, Duration::from_millis(20));

        let err = timed.list_cases().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
        assert!(err.to_string().contains("list_cases timed out"));
    }

    #[tokio::test]
    async fn test_not_found_maps_through() {
        let timed = TimedStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        let err = timed.get_case(&CaseId::new("KYC-missing")).await.unwrap_err();
        assert_eq!(err, KycError::case_not_found("KYC-missing"));
    }
}
