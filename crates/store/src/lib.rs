//! # KYCFlow Store
//!
//! Persistence behind the [`KycStore`] trait:
//!
//! - [`MemoryStore`]: tokio `RwLock` over plain collections, with fault
//!   injection (outages, latency) for failure-path tests
//! - [`SqliteStore`]: sqlx SQLite pool, one transaction per commit
//!
//! Every mutation goes through [`KycStore::commit`] (or the creation and
//! expunge calls), which applies the record change, the document upserts and
//! the audit entries atomically. The version check happens inside that same
//! critical section, so a stale writer can never overwrite a newer state.

pub mod error;
pub mod memory;
pub mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use kycflow_audit::{AuditDraft, AuditEntry, AuditPage, GENESIS_HASH};
use kycflow_core::{CaseId, Document, DocumentId, PageRequest, Paginated, VerificationRecord};

/// One atomic mutation of a case
#[derive(Debug, Clone)]
pub struct CaseCommit {
    /// Version the caller read; the commit fails if the stored one differs
    pub expected_version: u64,
    /// New state of the record; its `version` is overwritten by the store
    pub record: VerificationRecord,
    /// Documents to insert or replace (matched by id)
    pub documents: Vec<Document>,
    /// Audit entries, sealed in order
    pub audit: Vec<AuditDraft>,
}

impl CaseCommit {
    pub fn new(expected_version: u64, record: VerificationRecord) -> Self {
        Self {
            expected_version,
            record,
            documents: Vec::new(),
            audit: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_audit(mut self, draft: AuditDraft) -> Self {
        self.audit.push(draft);
        self
    }
}

/// Result of a successful commit
#[derive(Debug, Clone)]
pub struct Committed {
    pub record: VerificationRecord,
    pub audit: Vec<AuditEntry>,
}

#[async_trait]
pub trait KycStore: Send + Sync {
    /// Insert a new case with its creation entry.
    /// Fails with `AlreadyExists` when the applicant already has an active case.
    async fn insert_case(
        &self,
        record: &VerificationRecord,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry>;

    async fn get_case(&self, id: &CaseId) -> StoreResult<VerificationRecord>;

    async fn find_active_case(&self, applicant_id: &str) -> StoreResult<Option<VerificationRecord>>;

    async fn list_cases(&self) -> StoreResult<Vec<VerificationRecord>>;

    /// Documents of a case in upload order, superseded ones included
    async fn documents_for_case(&self, id: &CaseId) -> StoreResult<Vec<Document>>;

    /// Every document in upload order
    async fn list_documents(&self) -> StoreResult<Vec<Document>>;

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Document>;

    /// Apply a case mutation atomically; bumps the version by one
    async fn commit(&self, commit: CaseCommit) -> StoreResult<Committed>;

    /// Journal an action that changes no state (document access)
    async fn append_audit(&self, draft: AuditDraft) -> StoreResult<AuditEntry>;

    /// Entries of a case and its documents, newest first
    async fn audit_for_case(&self, id: &CaseId, page: &PageRequest) -> StoreResult<AuditPage>;

    /// The whole log in id order
    async fn audit_log(&self) -> StoreResult<Vec<AuditEntry>>;

    /// Remove a case and its documents; audit entries are kept
    async fn expunge_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry>;
}

/// Seal drafts onto the tail of the log
pub(crate) fn seal_all(drafts: Vec<AuditDraft>, tail: Option<(u64, String)>) -> Vec<AuditEntry> {
    let (mut last_id, mut last_hash) = tail.unwrap_or((0, GENESIS_HASH.to_string()));
    drafts
        .into_iter()
        .map(|draft| {
            let entry = draft.seal(last_id + 1, &last_hash);
            last_id = entry.id;
            last_hash = entry.hash.clone();
            entry
        })
        .collect()
}

/// Newest first, ties broken by id descending
pub(crate) fn page_newest_first(mut entries: Vec<AuditEntry>, page: &PageRequest) -> AuditPage {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Paginated::from_sorted(entries, page)
}
