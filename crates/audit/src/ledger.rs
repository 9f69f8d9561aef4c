//! Audit Ledger - append-only JSONL export of the audit log
//!
//! Retention copy for compliance. Each line is one JSON-serialized
//! [`AuditEntry`]; appends must continue the hash chain of the last line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::entry::AuditEntry;
use crate::hash::{calculate_entry_hash, verify_chain, ChainError, GENESIS_HASH};

/// Errors from the JSONL ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Append-only JSONL file of audit entries
pub struct AuditLedger {
    path: PathBuf,
    file: File,
    last_id: u64,
    last_hash: String,
}

impl AuditLedger {
    /// Open (or create) a ledger, resuming after its last entry
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut ledger = Self {
            path,
            file,
            last_id: 0,
            last_hash: GENESIS_HASH.to_string(),
        };
        if let Some(last) = ledger.read_all()?.pop() {
            ledger.last_id = last.id;
            ledger.last_hash = last.hash;
        }
        Ok(ledger)
    }

    /// Append one entry; it must link to the current tail
    pub fn append(&mut self, entry: &AuditEntry) -> LedgerResult<()> {
        if entry.prev_hash != self.last_hash {
            return Err(ChainError::BrokenLink {
                id: entry.id,
                expected: self.last_hash.clone(),
                actual: entry.prev_hash.clone(),
            }
            .into());
        }
        let calculated = calculate_entry_hash(entry);
        if entry.hash != calculated {
            return Err(ChainError::InvalidHash {
                id: entry.id,
                expected: calculated,
                actual: entry.hash.clone(),
            }
            .into());
        }

        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()?;

        self.last_id = entry.id;
        self.last_hash = entry.hash.clone();
        Ok(())
    }

    /// Append every entry newer than the ledger tail; returns how many were written
    pub fn sync(&mut self, entries: &[AuditEntry]) -> LedgerResult<usize> {
        let tail = self.last_id;
        let mut written = 0;
        for entry in entries.iter().filter(|e| e.id > tail) {
            self.append(entry)?;
            written += 1;
        }
        Ok(written)
    }

    /// Read all entries from the ledger
    pub fn read_all(&self) -> LedgerResult<Vec<AuditEntry>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }

        Ok(entries)
    }

    /// Re-read the file and verify its chain end to end
    pub fn verify(&self) -> LedgerResult<usize> {
        let entries = self.read_all()?;
        verify_chain(&entries)?;
        Ok(entries.len())
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
