//! SQLite schema and row codecs
//!
//! Typed payloads live in a JSON `data` column; the scalar columns next to it
//! exist only for lookups, ordering and the version check.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::StoreResult;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cases (
        id TEXT PRIMARY KEY,
        applicant_id TEXT NOT NULL,
        status TEXT NOT NULL,
        version INTEGER NOT NULL,
        submitted_at TEXT NOT NULL,
        data TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_cases_applicant
    ON cases(applicant_id, status)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        case_id TEXT NOT NULL,
        document_type TEXT NOT NULL,
        data TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_documents_case
    ON documents(case_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY,
        case_id TEXT NOT NULL,
        action TEXT NOT NULL,
        created_at TEXT NOT NULL,
        prev_hash TEXT NOT NULL,
        hash TEXT NOT NULL,
        data TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_case
    ON audit_log(case_id, created_at)
    "#,
];

/// Create tables and indexes if missing
pub async fn init_schema(pool: &SqlitePool) -> StoreResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Fixed-width UTC timestamp, so text ordering matches time ordering
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode the JSON `data` column of a row
pub fn decode<T: DeserializeOwned>(row: &SqliteRow) -> StoreResult<T> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

pub fn decode_all<T: DeserializeOwned>(rows: &[SqliteRow]) -> StoreResult<Vec<T>> {
    rows.iter().map(decode::<T>).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let fractional = whole + chrono::Duration::microseconds(120);

        assert_eq!(timestamp(&whole), "2024-01-02T03:04:05.000000Z");
        assert_eq!(timestamp(&fractional), "2024-01-02T03:04:05.000120Z");
        assert!(timestamp(&whole) < timestamp(&fractional));
    }
}
