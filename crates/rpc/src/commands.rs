//! CLI commands

use std::path::Path;

use kycflow_audit::{verify_chain, AuditLedger};
use kycflow_core::{
    Actor, CaseId, DocumentId, DocumentStatus, DocumentType, FileRef, PageRequest, PersonalInfo,
    RiskAssessment,
};
use kycflow_query::{SearchFilters, SortSpec, TimeRange};
use kycflow_review::{ReviewAction, ReviewParams};
use serde::Deserialize;

use crate::context::AppContext;

/// Submission payload read from a JSON file
#[derive(Debug, Deserialize)]
pub struct Submission {
    pub personal_info: PersonalInfo,
    pub risk_assessment: RiskAssessment,
}

/// Submit a new verification for an applicant
pub async fn submit(
    ctx: &AppContext,
    applicant_id: &str,
    input: &Path,
) -> Result<CaseId, anyhow::Error> {
    let raw = std::fs::read_to_string(input)?;
    let submission: Submission = serde_json::from_str(&raw)?;

    let case_id = ctx
        .service
        .submit_verification(
            &Actor::applicant(applicant_id),
            submission.personal_info,
            submission.risk_assessment,
        )
        .await?;

    println!("✅ Submitted case {} for {}", case_id, applicant_id);
    Ok(case_id)
}

/// Upload a document reference into a case slot
pub async fn upload(
    ctx: &AppContext,
    case_id: &CaseId,
    applicant_id: &str,
    document_type: DocumentType,
    file: FileRef,
    document_number: Option<String>,
) -> Result<DocumentId, anyhow::Error> {
    let document_id = ctx
        .service
        .upload_document_with_number(
            case_id,
            document_type,
            file,
            document_number,
            &Actor::applicant(applicant_id),
        )
        .await?;

    println!(
        "✅ Uploaded {} as {} to {}",
        document_type, document_id, case_id
    );
    Ok(document_id)
}

/// Apply one reviewer action to a case
pub async fn review(
    ctx: &AppContext,
    case_id: &CaseId,
    action: ReviewAction,
    reviewer_id: &str,
    params: &ReviewParams,
) -> Result<(), anyhow::Error> {
    let record = ctx
        .service
        .review_case(case_id, action, &Actor::reviewer(reviewer_id), params)
        .await?;

    println!(
        "✅ {} {}: now {} (version {})",
        action, case_id, record.status, record.version
    );
    if let Some(expires_at) = record.expires_at {
        println!("   Valid until {}", expires_at.format("%Y-%m-%d"));
    }
    Ok(())
}

/// Approve or reject one document
pub async fn verify_document(
    ctx: &AppContext,
    document_id: &DocumentId,
    reviewer_id: &str,
    status: DocumentStatus,
    reason: Option<String>,
) -> Result<(), anyhow::Error> {
    let document = ctx
        .service
        .verify_document(document_id, status, &Actor::reviewer(reviewer_id), reason)
        .await?;

    println!(
        "✅ Document {} ({}) {}",
        document.id, document.document_type, document.verification_status
    );
    Ok(())
}

/// Apply one action to many cases
pub async fn bulk(
    ctx: &AppContext,
    action: ReviewAction,
    reviewer_id: &str,
    case_ids: &[CaseId],
    params: &ReviewParams,
) -> Result<(), anyhow::Error> {
    let result = ctx
        .service
        .bulk_review(action, case_ids, &Actor::reviewer(reviewer_id), params)
        .await?;

    println!(
        "✅ Bulk {}: {} succeeded, {} failed",
        action,
        result.succeeded.len(),
        result.failed.len()
    );
    for failure in &result.failed {
        println!("   ❌ {} [{}] {}", failure.id, failure.kind, failure.reason);
    }
    Ok(())
}

/// Print the audit trail of a case, newest first
pub async fn audit_trail(
    ctx: &AppContext,
    case_id: &CaseId,
    page: u32,
    limit: u32,
) -> Result<(), anyhow::Error> {
    let trail = ctx
        .service
        .list_audit_trail(case_id, &PageRequest::new(page, limit))
        .await?;

    println!(
        "Audit trail for {} (page {}/{}, {} entries)",
        case_id,
        trail.pagination.current_page,
        trail.pagination.total_pages,
        trail.pagination.total_records
    );
    for entry in &trail.records {
        let transition = match (entry.change.old_status(), entry.change.new_status()) {
            (Some(old), Some(new)) if old != new => format!(" {} → {}", old, new),
            (None, Some(new)) => format!(" → {}", new),
            _ => String::new(),
        };
        println!(
            "  #{} {} {} by {}{}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.actor_id,
            transition
        );
        if let Some(reason) = &entry.reason {
            println!("      {}", reason);
        }
    }
    Ok(())
}

/// Verify the audit hash chain
pub async fn verify_audit_chain(ctx: &AppContext) -> Result<bool, anyhow::Error> {
    let entries = ctx.service.audit_log().await?;

    match verify_chain(&entries) {
        Ok(()) => {
            println!("✅ Hash chain verified ({} entries)", entries.len());
            Ok(true)
        }
        Err(e) => {
            println!("❌ Hash chain broken: {}", e);
            Ok(false)
        }
    }
}

/// Append new audit entries to the JSONL ledger
pub async fn export_audit(
    ctx: &AppContext,
    output: Option<&Path>,
) -> Result<usize, anyhow::Error> {
    let path = output.unwrap_or_else(|| ctx.ledger_path());
    let entries = ctx.service.audit_log().await?;

    let mut ledger = AuditLedger::open(path)?;
    let written = ledger.sync(&entries)?;
    let total = ledger.verify()?;

    println!(
        "✅ Exported {} new entries to {} ({} total)",
        written,
        path.display(),
        total
    );
    Ok(written)
}

/// Search cases
pub async fn search(
    ctx: &AppContext,
    filters: &SearchFilters,
    sort: SortSpec,
    page: &PageRequest,
) -> Result<(), anyhow::Error> {
    let result = ctx.service.search_cases(filters, sort, page).await?;

    if result.records.is_empty() {
        println!("No cases found");
        return Ok(());
    }

    println!(
        "{:<44} {:<14} {:<8} {:<24} {}",
        "CASE", "STATUS", "RISK", "NAME", "SUBMITTED"
    );
    println!("{}", "-".repeat(110));
    for record in &result.records {
        let risk = record
            .risk_level
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<44} {:<14} {:<8} {:<24} {}",
            record.id,
            record.status,
            risk,
            record.personal_info.full_name(),
            record.submitted_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!(
        "Page {}/{} ({} cases)",
        result.pagination.current_page,
        result.pagination.total_pages,
        result.pagination.total_records
    );
    Ok(())
}

/// Print dashboard statistics as JSON
pub async fn stats(ctx: &AppContext, range: TimeRange) -> Result<(), anyhow::Error> {
    let summary = ctx.service.get_stats(range).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Expire lapsed approvals now
pub async fn sweep(ctx: &AppContext) -> Result<(), anyhow::Error> {
    let report = ctx.service.expire_due(chrono::Utc::now()).await?;

    println!(
        "✅ Sweep: {} expired, {} deferred, {} failed",
        report.expired.len(),
        report.deferred.len(),
        report.failed.len()
    );
    for case_id in &report.expired {
        println!("   {}", case_id);
    }
    Ok(())
}

/// Remove a closed case; its audit trail stays
pub async fn expunge(
    ctx: &AppContext,
    case_id: &CaseId,
    reviewer_id: &str,
) -> Result<(), anyhow::Error> {
    ctx.service
        .expunge_case(case_id, &Actor::reviewer(reviewer_id))
        .await?;

    println!("✅ Expunged {}", case_id);
    Ok(())
}
