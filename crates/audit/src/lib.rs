//! KYCFlow Audit - append-only trail of every mutating action
//!
//! Entries are produced by the review engine as [`AuditDraft`]s and sealed by
//! the store, which assigns the id and links the SHA-256 hash chain inside the
//! same atomic commit as the state change they describe.

pub mod entry;
pub mod hash;
pub mod ledger;

pub use entry::{
    AuditAction, AuditChange, AuditDraft, AuditEntry, AuditPage, AuditTarget, CaseSnapshot,
    DocumentSnapshot,
};
pub use hash::{calculate_entry_hash, verify_chain, ChainError, GENESIS_HASH};
pub use ledger::{AuditLedger, LedgerError};
