//! Identity documents attached to a case
//!
//! Each case has one slot per [`DocumentType`]. Re-uploading a rejected slot
//! creates a new [`Document`] that `supersedes` the old one; the old entity
//! is retained for the audit trail. The *active* document of a slot is the
//! most recently uploaded one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ids::{CaseId, DocumentId};

/// Document slot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    IdentityFront,
    IdentityBack,
    ProofOfAddress,
    SelfieVerification,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::IdentityFront,
        DocumentType::IdentityBack,
        DocumentType::ProofOfAddress,
        DocumentType::SelfieVerification,
    ];

    /// Slots that must be approved before the case can be approved
    pub const REQUIRED: [DocumentType; 3] = [
        DocumentType::IdentityFront,
        DocumentType::ProofOfAddress,
        DocumentType::SelfieVerification,
    ];

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

/// Per-document verification status, independent of the case status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

/// Opaque reference handed over by the storage collaborator.
/// The core never reads file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the content, when the uploader computed one
    #[serde(default)]
    pub sha256: Option<String>,
}

impl FileRef {
    pub fn new(
        url: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            sha256: None,
        }
    }
}

/// An uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub case_id: CaseId,
    pub document_type: DocumentType,
    pub file: FileRef,
    /// Number printed on the document (passport no., ID no.), searchable
    pub document_number: Option<String>,

    pub verification_status: DocumentStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,

    pub uploaded_at: DateTime<Utc>,
    /// Rejected document this upload replaces
    pub supersedes: Option<DocumentId>,
}

impl Document {
    pub fn new(
        case_id: CaseId,
        document_type: DocumentType,
        file: FileRef,
        document_number: Option<String>,
        supersedes: Option<DocumentId>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId::generate(),
            case_id,
            document_type,
            file,
            document_number,
            verification_status: DocumentStatus::Pending,
            rejection_reason: None,
            verified_by: None,
            verified_at: None,
            uploaded_at,
            supersedes,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.verification_status == DocumentStatus::Approved
    }
}

/// Active document per slot.
///
/// `documents` is expected in upload order; on equal timestamps the later
/// element wins.
pub fn active_documents(documents: &[Document]) -> BTreeMap<DocumentType, &Document> {
    let mut active: BTreeMap<DocumentType, &Document> = BTreeMap::new();
    for doc in documents {
        match active.get(&doc.document_type) {
            Some(current) if current.uploaded_at > doc.uploaded_at => {}
            _ => {
                active.insert(doc.document_type, doc);
            }
        }
    }
    active
}

/// Required slots whose active document is missing or not approved
pub fn missing_required(documents: &[Document]) -> Vec<DocumentType> {
    let active = active_documents(documents);
    DocumentType::REQUIRED
        .iter()
        .copied()
        .filter(|t| !active.get(t).is_some_and(|d| d.is_approved()))
        .collect()
}
