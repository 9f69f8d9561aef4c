//! Verification record - the top-level KYC case

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ids::CaseId;
use crate::risk::RiskAssessment;

/// Case-level verification status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaseStatus {
    /// Submitted (or re-opened), awaiting a reviewer
    Pending,
    /// Owned by a reviewer
    UnderReview,
    /// Verified; expires after the validity window
    Approved,
    /// Declined with a reason
    Rejected,
    /// Approval lapsed
    Expired,
}

impl CaseStatus {
    pub const ALL: [CaseStatus; 5] = [
        CaseStatus::Pending,
        CaseStatus::UnderReview,
        CaseStatus::Approved,
        CaseStatus::Rejected,
        CaseStatus::Expired,
    ];

    /// Approved, rejected and expired are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::Approved | CaseStatus::Rejected | CaseStatus::Expired
        )
    }
}

/// Risk level assigned at review time
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];
}

/// Applicant identity fields. Opaque to the workflow beyond shape validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
    pub address: String,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// A single applicant's KYC case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: CaseId,
    pub applicant_id: String,
    pub personal_info: PersonalInfo,
    pub risk_assessment: RiskAssessment,

    pub status: CaseStatus,
    pub risk_level: Option<RiskLevel>,
    /// Reviewer that currently owns the case while under review
    pub assigned_reviewer: Option<String>,
    /// Reviewer that made the terminal decision
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub compliance_notes: Option<String>,
    pub escalation_count: u32,

    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped on every committed mutation
    pub version: u64,
}

impl VerificationRecord {
    /// Create a freshly submitted case (status = pending)
    pub fn new(
        applicant_id: impl Into<String>,
        personal_info: PersonalInfo,
        risk_assessment: RiskAssessment,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CaseId::generate(),
            applicant_id: applicant_id.into(),
            personal_info,
            risk_assessment,
            status: CaseStatus::Pending,
            risk_level: None,
            assigned_reviewer: None,
            reviewed_by: None,
            rejection_reason: None,
            compliance_notes: None,
            escalation_count: 0,
            submitted_at,
            reviewed_at: None,
            expires_at: None,
            updated_at: submitted_at,
            version: 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Rejected and expired cases no longer block a new submission
    pub fn is_active(&self) -> bool {
        !matches!(self.status, CaseStatus::Rejected | CaseStatus::Expired)
    }

    /// Approved and past its expiry at `now`
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == CaseStatus::Approved && self.expires_at.is_some_and(|at| at <= now)
    }

    /// Hours between submission and the terminal review (terminal cases only)
    pub fn processing_hours(&self) -> Option<f64> {
        if !self.is_terminal() {
            return None;
        }
        self.reviewed_at
            .map(|reviewed| (reviewed - self.submitted_at).num_seconds() as f64 / 3600.0)
    }

    /// The reviewer responsible for the case, decided or assigned
    pub fn reviewer(&self) -> Option<&str> {
        self.reviewed_by
            .as_deref()
            .or(self.assigned_reviewer.as_deref())
    }
}
