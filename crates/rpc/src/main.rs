//! KYCFlow CLI - Main entry point

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kycflow_core::{
    CaseId, CaseStatus, DocumentId, DocumentStatus, DocumentType, FileRef, PageRequest, RiskLevel,
};
use kycflow_query::{SearchFilters, SortBy, SortOrder, SortSpec, TimeRange};
use kycflow_review::{ReviewAction, ReviewParams};
use kycflow_rpc::{commands, AppContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kycflow")]
#[command(about = "KYCFlow - KYC verification and review workflow", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// JSON config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a verification from a JSON file {personal_info, risk_assessment}
    Submit {
        /// Applicant ID
        applicant: String,
        /// Submission file
        input: PathBuf,
    },

    /// Upload a document reference
    Upload {
        case_id: CaseId,
        /// Owning applicant ID
        applicant: String,
        /// identity_front, identity_back, proof_of_address, selfie_verification
        document_type: DocumentType,
        /// Storage URL of the file
        url: String,
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        mime_type: String,
        #[arg(long)]
        size: u64,
        /// Number printed on the document
        #[arg(long)]
        number: Option<String>,
    },

    /// Take a case under review
    Assign {
        case_id: CaseId,
        /// Reviewer ID
        reviewer: String,
        /// Assign to another reviewer
        #[arg(long)]
        to: Option<String>,
    },

    /// Approve a case under review
    Approve {
        case_id: CaseId,
        reviewer: String,
        /// low, medium, high (defaults to the case's level, else low)
        #[arg(long)]
        risk: Option<RiskLevel>,
        #[arg(long)]
        notes: Option<String>,
        /// Fail unless the case is at this version
        #[arg(long)]
        if_version: Option<u64>,
    },

    /// Reject a case under review
    Reject {
        case_id: CaseId,
        reviewer: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        risk: Option<RiskLevel>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        if_version: Option<u64>,
    },

    /// Send a case back to the applicant
    RequestInfo {
        case_id: CaseId,
        reviewer: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Escalate a case, optionally to another reviewer
    Escalate {
        case_id: CaseId,
        reviewer: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        reassign_to: Option<String>,
    },

    /// Approve or reject a document
    VerifyDoc {
        document_id: DocumentId,
        reviewer: String,
        /// approved or rejected
        status: DocumentStatus,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Apply one action to many cases
    Bulk {
        /// assign, approve, reject, escalate
        action: ReviewAction,
        reviewer: String,
        #[arg(required = true)]
        case_ids: Vec<CaseId>,
        #[arg(long)]
        risk: Option<RiskLevel>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the audit trail of a case
    Audit {
        case_id: CaseId,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Verify the audit hash chain
    VerifyChain,

    /// Export the audit log to a JSONL ledger
    ExportAudit {
        /// Ledger file (defaults to <data>/audit/audit.jsonl)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Search cases
    Search {
        #[arg(long)]
        status: Option<CaseStatus>,
        #[arg(long)]
        risk: Option<RiskLevel>,
        /// Free text over names, email, document numbers and case id
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        nationality: Option<String>,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        document_type: Option<DocumentType>,
        #[arg(long, default_value = "submitted_at")]
        sort: SortBy,
        #[arg(long, default_value = "desc")]
        order: SortOrder,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Dashboard statistics
    Stats {
        /// 7d, 30d or 90d
        #[arg(long, default_value = "30d")]
        range: String,
        /// Custom range start (YYYY-MM-DD), requires --end
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
    },

    /// Expire lapsed approvals
    Sweep,

    /// Remove a rejected or expired case (audit trail is kept)
    Expunge { case_id: CaseId, reviewer: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = AppContext::load_config(cli.config.as_deref())?;
    let ctx = AppContext::with_config(&cli.data, config).await?;

    match cli.command {
        Commands::Submit { applicant, input } => {
            commands::submit(&ctx, &applicant, &input).await?;
        }

        Commands::Upload {
            case_id,
            applicant,
            document_type,
            url,
            file_name,
            mime_type,
            size,
            number,
        } => {
            let file = FileRef::new(url, file_name, mime_type, size);
            commands::upload(&ctx, &case_id, &applicant, document_type, file, number).await?;
        }

        Commands::Assign {
            case_id,
            reviewer,
            to,
        } => {
            let mut params = ReviewParams::new();
            params.reviewer_id = to;
            commands::review(&ctx, &case_id, ReviewAction::Assign, &reviewer, &params).await?;
        }

        Commands::Approve {
            case_id,
            reviewer,
            risk,
            notes,
            if_version,
        } => {
            let params = ReviewParams {
                risk_level: risk,
                notes,
                expected_version: if_version,
                ..ReviewParams::default()
            };
            commands::review(&ctx, &case_id, ReviewAction::Approve, &reviewer, &params).await?;
        }

        Commands::Reject {
            case_id,
            reviewer,
            reason,
            risk,
            notes,
            if_version,
        } => {
            let params = ReviewParams {
                reason: Some(reason),
                risk_level: risk,
                notes,
                expected_version: if_version,
                ..ReviewParams::default()
            };
            commands::review(&ctx, &case_id, ReviewAction::Reject, &reviewer, &params).await?;
        }

        Commands::RequestInfo {
            case_id,
            reviewer,
            notes,
        } => {
            let params = ReviewParams {
                notes,
                ..ReviewParams::default()
            };
            commands::review(
                &ctx,
                &case_id,
                ReviewAction::RequestAdditional,
                &reviewer,
                &params,
            )
            .await?;
        }

        Commands::Escalate {
            case_id,
            reviewer,
            notes,
            reassign_to,
        } => {
            let params = ReviewParams {
                notes,
                reassign_to,
                ..ReviewParams::default()
            };
            commands::review(&ctx, &case_id, ReviewAction::Escalate, &reviewer, &params).await?;
        }

        Commands::VerifyDoc {
            document_id,
            reviewer,
            status,
            reason,
        } => {
            commands::verify_document(&ctx, &document_id, &reviewer, status, reason).await?;
        }

        Commands::Bulk {
            action,
            reviewer,
            case_ids,
            risk,
            reason,
            notes,
        } => {
            let params = ReviewParams {
                risk_level: risk,
                reason,
                notes,
                ..ReviewParams::default()
            };
            commands::bulk(&ctx, action, &reviewer, &case_ids, &params).await?;
        }

        Commands::Audit {
            case_id,
            page,
            limit,
        } => {
            commands::audit_trail(&ctx, &case_id, page, limit).await?;
        }

        Commands::VerifyChain => {
            commands::verify_audit_chain(&ctx).await?;
        }

        Commands::ExportAudit { output } => {
            commands::export_audit(&ctx, output.as_deref()).await?;
        }

        Commands::Search {
            status,
            risk,
            query,
            nationality,
            reviewer,
            document_type,
            sort,
            order,
            page,
            limit,
        } => {
            let filters = SearchFilters {
                status,
                risk_level: risk,
                search_query: query,
                nationality,
                reviewer,
                document_type,
                ..SearchFilters::default()
            };
            commands::search(
                &ctx,
                &filters,
                SortSpec::new(sort, order),
                &PageRequest::new(page, limit),
            )
            .await?;
        }

        Commands::Stats { range, start, end } => {
            let range = match (start, end) {
                (Some(start), Some(end)) => TimeRange::Custom { start, end },
                _ => TimeRange::from_shorthand(&range).ok_or_else(|| {
                    anyhow::anyhow!("Unknown range '{}' (use 7d, 30d or 90d)", range)
                })?,
            };
            commands::stats(&ctx, range).await?;
        }

        Commands::Sweep => {
            commands::sweep(&ctx).await?;
        }

        Commands::Expunge { case_id, reviewer } => {
            commands::expunge(&ctx, &case_id, &reviewer).await?;
        }
    }

    ctx.close().await;
    Ok(())
}
