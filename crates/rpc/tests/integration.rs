//! Integration tests for KYCFlow
//!
//! These tests drive the CLI command layer over an on-disk data directory:
//! submission file → documents → review → audit export and chain checks.

use std::path::Path;

use kycflow_audit::AuditLedger;
use kycflow_core::{
    CaseId, CaseStatus, DocumentStatus, DocumentType, FileRef, KycConfig, PageRequest,
};
use kycflow_query::{SearchFilters, SortSpec, TimeRange};
use kycflow_review::{ReviewAction, ReviewParams};
use kycflow_rpc::{commands, AppContext};
use tempfile::TempDir;

const SUBMISSION: &str = r#"{
    "personal_info": {
        "first_name": "Linh",
        "last_name": "Vo",
        "date_of_birth": "1992-07-21",
        "nationality": "VN",
        "address": "88 Dong Khoi Street, District 1",
        "phone_number": "+84 28 3822 7788",
        "email": "linh.vo@example.com"
    },
    "risk_assessment": {
        "employment_status": "employed",
        "annual_income": "50k_100k",
        "source_of_funds": "salary",
        "investment_experience": "beginner",
        "crypto_experience": "none",
        "risk_tolerance": "moderate",
        "investment_horizon": "long_term",
        "is_politically_exposed": false,
        "has_criminal_record": false,
        "sanctions_list_check": true,
        "investment_goals": ["savings"]
    }
}"#;

fn write_submission(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("submission.json");
    std::fs::write(&path, SUBMISSION).unwrap();
    path
}

async fn submitted_case(ctx: &AppContext, dir: &Path, applicant: &str) -> CaseId {
    commands::submit(ctx, applicant, &write_submission(dir))
        .await
        .unwrap()
}

async fn approve_documents(ctx: &AppContext, case_id: &CaseId, applicant: &str) {
    for (document_type, name, mime) in [
        (DocumentType::IdentityFront, "passport.jpg", "image/jpeg"),
        (DocumentType::ProofOfAddress, "statement.pdf", "application/pdf"),
        (DocumentType::SelfieVerification, "selfie.png", "image/png"),
    ] {
        let file = FileRef::new(format!("s3://kyc/{name}"), name, mime, 64_000);
        let number = (document_type == DocumentType::IdentityFront).then(|| "C7788123".to_string());
        let id = commands::upload(ctx, case_id, applicant, document_type, file, number)
            .await
            .unwrap();
        commands::verify_document(ctx, &id, "REV-1", DocumentStatus::Approved, None)
            .await
            .unwrap();
    }
}

/// Test: Submit → Upload → Assign → Approve → Audit export
#[tokio::test]
async fn test_full_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path();

    let ctx = AppContext::new(data_path).await.unwrap();
    assert!(ctx.db_path().exists());

    // 1. Submit
    let case_id = submitted_case(&ctx, data_path, "USER-LINH").await;

    // 2. Documents
    approve_documents(&ctx, &case_id, "USER-LINH").await;

    // 3. Assign and approve
    commands::review(&ctx, &case_id, ReviewAction::Assign, "REV-1", &ReviewParams::new())
        .await
        .unwrap();
    let params = ReviewParams::new().with_risk_level(kycflow_core::RiskLevel::Medium);
    commands::review(&ctx, &case_id, ReviewAction::Approve, "REV-1", &params)
        .await
        .unwrap();

    let record = ctx.service.get_case(&case_id).await.unwrap();
    assert_eq!(record.status, CaseStatus::Approved);

    // 4. Document number is searchable
    let found = ctx
        .service
        .search_cases(
            &SearchFilters {
                search_query: Some("c7788".to_string()),
                ..SearchFilters::default()
            },
            SortSpec::default(),
            &PageRequest::first(10),
        )
        .await
        .unwrap();
    assert_eq!(found.records.len(), 1);

    // 5. Chain verifies and exports
    assert!(commands::verify_audit_chain(&ctx).await.unwrap());
    let written = commands::export_audit(&ctx, None).await.unwrap();
    assert_eq!(written, 9);

    // Exporting again appends nothing
    let written = commands::export_audit(&ctx, None).await.unwrap();
    assert_eq!(written, 0);

    let ledger = AuditLedger::open(ctx.ledger_path()).unwrap();
    assert_eq!(ledger.verify().unwrap(), 9);
}

/// Test: State survives a restart of the context
#[tokio::test]
async fn test_reopen_data_directory() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path();

    let case_id = {
        let ctx = AppContext::new(data_path).await.unwrap();
        let case_id = submitted_case(&ctx, data_path, "USER-LINH").await;
        commands::review(&ctx, &case_id, ReviewAction::Assign, "REV-2", &ReviewParams::new())
            .await
            .unwrap();
        ctx.close().await;
        case_id
    };

    let ctx = AppContext::new(data_path).await.unwrap();
    let record = ctx.service.get_case(&case_id).await.unwrap();
    assert_eq!(record.status, CaseStatus::UnderReview);
    assert_eq!(record.assigned_reviewer.as_deref(), Some("REV-2"));

    // Still the applicant's active case
    let err = commands::submit(&ctx, "USER-LINH", &write_submission(data_path))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already has an active case"));
}

/// Test: Bulk command reports per-item outcomes
#[tokio::test]
async fn test_bulk_and_stats() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path();
    let ctx = AppContext::new(data_path).await.unwrap();

    let mut ids = Vec::new();
    for applicant in ["USER-A", "USER-B", "USER-C"] {
        ids.push(submitted_case(&ctx, data_path, applicant).await);
    }
    commands::bulk(&ctx, ReviewAction::Assign, "REV-1", &ids, &ReviewParams::new())
        .await
        .unwrap();
    commands::bulk(
        &ctx,
        ReviewAction::Reject,
        "REV-1",
        &ids[..2],
        &ReviewParams::new().with_reason("incomplete profile"),
    )
    .await
    .unwrap();

    let stats = ctx.service.get_stats(TimeRange::Last7Days).await.unwrap();
    assert_eq!(stats.summary.total, 3);
    assert_eq!(stats.summary.rejected, 2);
    assert_eq!(stats.summary.under_review, 1);
    assert_eq!(stats.summary.approval_rate, 0.0);
    assert_eq!(stats.reviewer_performance.len(), 1);
    assert_eq!(stats.reviewer_performance[0].reviewer_id, "REV-1");

    commands::stats(&ctx, TimeRange::Last30Days).await.unwrap();
}

/// Test: Config file is honored
#[tokio::test]
async fn test_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("kyc.json");
    std::fs::write(&config_path, r#"{"max_batch_size": 2, "min_applicant_age": 21}"#).unwrap();

    let config = AppContext::load_config(Some(&config_path)).unwrap();
    assert_eq!(config.max_batch_size, 2);
    assert_eq!(config.bulk_concurrency, KycConfig::default().bulk_concurrency);

    let ctx = AppContext::with_config(temp_dir.path(), config).await.unwrap();
    let ids: Vec<CaseId> = (0..3).map(|i| CaseId::new(format!("KYC-{i}"))).collect();
    let err = commands::bulk(&ctx, ReviewAction::Assign, "REV-1", &ids, &ReviewParams::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Too many items"));
}
