//! Audit entry model
//!
//! The payload of an entry is a tagged union of typed snapshots: a case-level
//! change carries [`CaseSnapshot`]s, a document-level change carries
//! [`DocumentSnapshot`]s. Old/new values are therefore always comparable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use kycflow_core::{
    Actor, CaseId, CaseStatus, Document, DocumentId, DocumentStatus, DocumentType, Paginated,
    PersonalInfo, RiskLevel, Role, VerificationRecord,
};

use crate::hash::calculate_entry_hash;

/// What happened
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
    KycSubmit,
    KycUpdate,
    DocumentUploaded,
    DocumentApprove,
    DocumentReject,
    DocumentAccessed,
    ReviewAssign,
    ReviewApprove,
    ReviewReject,
    ReviewRequestAdditional,
    ReviewEscalate,
    BulkAssign,
    BulkApprove,
    BulkReject,
    BulkEscalate,
    KycExpired,
    KycExpunged,
}

impl AuditAction {
    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            AuditAction::BulkAssign
                | AuditAction::BulkApprove
                | AuditAction::BulkReject
                | AuditAction::BulkEscalate
        )
    }
}

/// The entity an entry is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AuditTarget {
    KycCase(CaseId),
    Document(DocumentId),
}

/// Reviewable fields of a case at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub status: CaseStatus,
    pub risk_level: Option<RiskLevel>,
    pub assigned_reviewer: Option<String>,
    pub reviewed_by: Option<String>,
    pub rejection_reason: Option<String>,
    pub compliance_notes: Option<String>,
    pub escalation_count: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub personal_info: PersonalInfo,
}

impl From<&VerificationRecord> for CaseSnapshot {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            status: record.status,
            risk_level: record.risk_level,
            assigned_reviewer: record.assigned_reviewer.clone(),
            reviewed_by: record.reviewed_by.clone(),
            rejection_reason: record.rejection_reason.clone(),
            compliance_notes: record.compliance_notes.clone(),
            escalation_count: record.escalation_count,
            expires_at: record.expires_at,
            personal_info: record.personal_info.clone(),
        }
    }
}

/// Verification fields of a document at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub document_type: DocumentType,
    pub verification_status: DocumentStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<String>,
    pub file_name: String,
    pub supersedes: Option<DocumentId>,
}

impl From<&Document> for DocumentSnapshot {
    fn from(doc: &Document) -> Self {
        Self {
            document_type: doc.document_type,
            verification_status: doc.verification_status,
            rejection_reason: doc.rejection_reason.clone(),
            verified_by: doc.verified_by.clone(),
            file_name: doc.file.file_name.clone(),
            supersedes: doc.supersedes.clone(),
        }
    }
}

/// Old/new values recorded by an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditChange {
    /// `old` is absent on creation, `new` is absent on expunge
    KycCase {
        old: Option<CaseSnapshot>,
        new: Option<CaseSnapshot>,
    },
    Document {
        old: Option<DocumentSnapshot>,
        new: DocumentSnapshot,
    },
    /// Read access, nothing changed
    Unchanged,
}

impl AuditChange {
    pub fn case(old: Option<&VerificationRecord>, new: Option<&VerificationRecord>) -> Self {
        AuditChange::KycCase {
            old: old.map(CaseSnapshot::from),
            new: new.map(CaseSnapshot::from),
        }
    }

    pub fn document(old: Option<&Document>, new: &Document) -> Self {
        AuditChange::Document {
            old: old.map(DocumentSnapshot::from),
            new: DocumentSnapshot::from(new),
        }
    }

    pub fn old_status(&self) -> Option<CaseStatus> {
        match self {
            AuditChange::KycCase { old, .. } => old.as_ref().map(|s| s.status),
            _ => None,
        }
    }

    pub fn new_status(&self) -> Option<CaseStatus> {
        match self {
            AuditChange::KycCase { new, .. } => new.as_ref().map(|s| s.status),
            _ => None,
        }
    }
}

/// An entry before the store has assigned its id and chain position
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub case_id: CaseId,
    pub action: AuditAction,
    pub actor: Actor,
    pub target: AuditTarget,
    pub change: AuditChange,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditDraft {
    pub fn new(
        case_id: CaseId,
        action: AuditAction,
        actor: &Actor,
        target: AuditTarget,
        change: AuditChange,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            case_id,
            action,
            actor: actor.clone(),
            target,
            change,
            reason: None,
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason.filter(|r| !r.trim().is_empty());
        self
    }

    /// Assign the store id, link to `prev_hash` and compute the entry hash
    pub fn seal(self, id: u64, prev_hash: &str) -> AuditEntry {
        let mut entry = AuditEntry {
            id,
            case_id: self.case_id,
            action: self.action,
            actor_id: self.actor.id,
            actor_role: self.actor.role,
            target: self.target,
            change: self.change,
            reason: self.reason,
            ip_address: self.actor.ip_address,
            user_agent: self.actor.user_agent,
            created_at: self.created_at,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
        };
        entry.hash = calculate_entry_hash(&entry);
        entry
    }
}

/// Immutable audit log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned, strictly increasing across the whole log
    pub id: u64,
    pub case_id: CaseId,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_role: Role,
    pub target: AuditTarget,
    pub change: AuditChange,
    pub reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

/// A page of audit entries, newest first
pub type AuditPage = Paginated<AuditEntry>;
