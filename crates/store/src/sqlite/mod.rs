//! SQLite store (sqlx)
//!
//! The pool holds a single connection: SQLite serializes writers anyway, and
//! one connection keeps every commit transaction strictly ordered.

pub mod schema;

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use kycflow_audit::{AuditDraft, AuditEntry, AuditPage};
use kycflow_core::{
    CaseId, CaseStatus, Document, DocumentId, PageRequest, Paginated, Pagination,
    VerificationRecord,
};

use crate::error::{StoreError, StoreResult};
use crate::{seal_all, CaseCommit, Committed, KycStore};
use schema::{decode, decode_all, init_schema, timestamp};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect(&db_url).await
    }

    /// Private in-memory database
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn connect(db_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(db_url)
            .await?;
        init_schema(&pool).await?;
        debug!(db_url, "SQLite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn current_version(
    tx: &mut Transaction<'_, Sqlite>,
    id: &CaseId,
    expected: u64,
) -> StoreResult<()> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM cases WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

    match version {
        None => Err(StoreError::not_found("Case", id)),
        Some(actual) if actual as u64 != expected => Err(StoreError::VersionConflict {
            case_id: id.to_string(),
            expected,
            actual: actual as u64,
        }),
        Some(_) => Ok(()),
    }
}

async fn append_audit_tx(
    tx: &mut Transaction<'_, Sqlite>,
    drafts: Vec<AuditDraft>,
) -> StoreResult<Vec<AuditEntry>> {
    let tail = sqlx::query("SELECT id, hash FROM audit_log ORDER BY id DESC LIMIT 1")
        .fetch_optional(&mut **tx)
        .await?;
    let tail = match tail {
        Some(row) => Some((
            row.try_get::<i64, _>("id")? as u64,
            row.try_get::<String, _>("hash")?,
        )),
        None => None,
    };

    let sealed = seal_all(drafts, tail);
    for entry in &sealed {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, case_id, action, created_at, prev_hash, hash, data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id as i64)
        .bind(entry.case_id.as_str())
        .bind(entry.action.as_ref())
        .bind(timestamp(&entry.created_at))
        .bind(&entry.prev_hash)
        .bind(&entry.hash)
        .bind(serde_json::to_string(entry)?)
        .execute(&mut **tx)
        .await?;
    }
    Ok(sealed)
}

async fn upsert_document_tx(tx: &mut Transaction<'_, Sqlite>, doc: &Document) -> StoreResult<()> {
    // ON CONFLICT DO UPDATE keeps `seq`, so upload order survives re-verification
    sqlx::query(
        r#"
        INSERT INTO documents (id, case_id, document_type, data)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET data = excluded.data
        "#,
    )
    .bind(doc.id.as_str())
    .bind(doc.case_id.as_str())
    .bind(doc.document_type.as_ref())
    .bind(serde_json::to_string(doc)?)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn first_entry(mut sealed: Vec<AuditEntry>) -> StoreResult<AuditEntry> {
    sealed
        .pop()
        .ok_or_else(|| StoreError::Unavailable("audit entry was not sealed".to_string()))
}

#[async_trait]
impl KycStore for SqliteStore {
    async fn insert_case(
        &self,
        record: &VerificationRecord,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry> {
        let mut tx = self.pool.begin().await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cases WHERE applicant_id = ? AND status NOT IN (?, ?)",
        )
        .bind(&record.applicant_id)
        .bind(CaseStatus::Rejected.as_ref())
        .bind(CaseStatus::Expired.as_ref())
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(StoreError::already_exists("Applicant", &record.applicant_id));
        }

        sqlx::query(
            r#"
            INSERT INTO cases (id, applicant_id, status, version, submitted_at, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(&record.applicant_id)
        .bind(record.status.as_ref())
        .bind(record.version as i64)
        .bind(timestamp(&record.submitted_at))
        .bind(serde_json::to_string(record)?)
        .execute(&mut *tx)
        .await?;

        let sealed = append_audit_tx(&mut tx, vec![audit]).await?;
        tx.commit().await?;

        debug!(case_id = %record.id, "Case inserted");
        first_entry(sealed)
    }

    async fn get_case(&self, id: &CaseId) -> StoreResult<VerificationRecord> {
        let row = sqlx::query("SELECT data FROM cases WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Case", id))?;
        decode(&row)
    }

    async fn find_active_case(&self, applicant_id: &str) -> StoreResult<Option<VerificationRecord>> {
        let row = sqlx::query(
            "SELECT data FROM cases WHERE applicant_id = ? AND status NOT IN (?, ?) LIMIT 1",
        )
        .bind(applicant_id)
        .bind(CaseStatus::Rejected.as_ref())
        .bind(CaseStatus::Expired.as_ref())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(decode::<VerificationRecord>).transpose()
    }

    async fn list_cases(&self) -> StoreResult<Vec<VerificationRecord>> {
        let rows = sqlx::query("SELECT data FROM cases ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows)
    }

    async fn documents_for_case(&self, id: &CaseId) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT data FROM documents WHERE case_id = ? ORDER BY seq")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows)
    }

    async fn list_documents(&self) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query("SELECT data FROM documents ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows)
    }

    async fn get_document(&self, id: &DocumentId) -> StoreResult<Document> {
        let row = sqlx::query("SELECT data FROM documents WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Document", id))?;
        decode(&row)
    }

    async fn commit(&self, commit: CaseCommit) -> StoreResult<Committed> {
        let mut tx = self.pool.begin().await?;

        let case_id = commit.record.id.clone();
        current_version(&mut tx, &case_id, commit.expected_version).await?;

        let mut record = commit.record;
        record.version = commit.expected_version + 1;

        sqlx::query(
            r#"
            UPDATE cases SET status = ?, version = ?, data = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(record.status.as_ref())
        .bind(record.version as i64)
        .bind(serde_json::to_string(&record)?)
        .bind(case_id.as_str())
        .bind(commit.expected_version as i64)
        .execute(&mut *tx)
        .await?;

        for doc in &commit.documents {
            upsert_document_tx(&mut tx, doc).await?;
        }
        let audit = append_audit_tx(&mut tx, commit.audit).await?;

        tx.commit().await?;
        debug!(case_id = %case_id, version = record.version, "Commit applied");
        Ok(Committed { record, audit })
    }

    async fn append_audit(&self, draft: AuditDraft) -> StoreResult<AuditEntry> {
        let mut tx = self.pool.begin().await?;
        let sealed = append_audit_tx(&mut tx, vec![draft]).await?;
        tx.commit().await?;
        first_entry(sealed)
    }

    async fn audit_for_case(&self, id: &CaseId, page: &PageRequest) -> StoreResult<AuditPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE case_id = ?")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT data FROM audit_log
            WHERE case_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(id.as_str())
        .bind(page.limit as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated {
            records: decode_all(&rows)?,
            pagination: Pagination::new(page, total as usize),
        })
    }

    async fn audit_log(&self) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query("SELECT data FROM audit_log ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows)
    }

    async fn expunge_case(
        &self,
        id: &CaseId,
        expected_version: u64,
        audit: AuditDraft,
    ) -> StoreResult<AuditEntry> {
        let mut tx = self.pool.begin().await?;
        current_version(&mut tx, id, expected_version).await?;

        sqlx::query("DELETE FROM documents WHERE case_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cases WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        let sealed = append_audit_tx(&mut tx, vec![audit]).await?;

        tx.commit().await?;
        debug!(case_id = %id, "Case expunged");
        first_entry(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{draft_at, draft_for, sample_record};
    use kycflow_audit::{verify_chain, AuditAction};
    use kycflow_core::{DocumentType, FileRef};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kyc.db");
        let record = sample_record("USER-1");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
                .await
                .unwrap();
            store.close().await;
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.get_case(&record.id).await.unwrap(), record);
        assert_eq!(
            store.find_active_case("USER-1").await.unwrap().map(|c| c.id),
            Some(record.id.clone())
        );
        assert_eq!(store.audit_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_with_documents() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();

        let doc = Document::new(
            record.id.clone(),
            DocumentType::IdentityFront,
            FileRef::new("s3://kyc/front.png", "front.png", "image/png", 512),
            None,
            None,
            chrono::Utc::now(),
        );
        let committed = store
            .commit(
                CaseCommit::new(1, record.clone())
                    .with_document(doc.clone())
                    .with_audit(draft_for(&record, AuditAction::DocumentUploaded)),
            )
            .await
            .unwrap();

        assert_eq!(committed.record.version, 2);
        assert_eq!(store.get_case(&record.id).await.unwrap().version, 2);
        assert_eq!(store.documents_for_case(&record.id).await.unwrap(), vec![doc.clone()]);
        assert_eq!(store.get_document(&doc.id).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_stale_commit_rolls_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();
        store.commit(CaseCommit::new(1, record.clone())).await.unwrap();

        let stale = store
            .commit(
                CaseCommit::new(1, record.clone())
                    .with_audit(draft_for(&record, AuditAction::KycUpdate)),
            )
            .await;
        assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));
        assert_eq!(store.audit_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_paging_and_chain() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = sample_record("USER-1");
        store
            .insert_case(&record, draft_for(&record, AuditAction::KycSubmit))
            .await
            .unwrap();
        for version in 1..=4 {
            store
                .commit(
                    CaseCommit::new(version, record.clone())
                        .with_audit(draft_for(&record, AuditAction::KycUpdate)),
                )
                .await
                .unwrap();
        }

        let page = store
            .audit_for_case(&record.id, &PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.pagination.total_records, 5);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.records[0].id, 5);
        assert_eq!(page.records[1].id, 4);

        assert!(verify_chain(&store.audit_log().await.unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_is_an_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.close().await;

        let result = store.list_cases().await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_audit_ties_newest_id_first() {
        let store = SqliteStore::in_memory().await.unwrap();
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
