//! Workflow configuration with configurable limits
//!
//! All limits are loaded from a JSON file; every field has a default, so a
//! partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the KYC workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycConfig {
    // === Bulk actions ===
    /// Maximum number of case ids in one bulk call
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Number of bulk items processed in parallel
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,

    // === Storage ===
    /// Timeout for a single storage round trip
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    // === Lifecycle ===
    /// Days an approval stays valid before the sweep expires it
    #[serde(default = "default_approval_validity_days")]
    pub approval_validity_days: i64,

    /// Interval of the background expiry sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    // === Submission rules ===
    #[serde(default = "default_min_applicant_age")]
    pub min_applicant_age: u32,

    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,

    #[serde(default = "default_accepted_mime_types")]
    pub accepted_mime_types: Vec<String>,

    // === Review policy ===
    /// Require an escalation before approving applicants with PEP,
    /// criminal-record or unconfirmed-sanctions answers
    #[serde(default)]
    pub escalate_flagged_risk: bool,
}

// Default value functions for serde
fn default_max_batch_size() -> usize {
    100
}

fn default_bulk_concurrency() -> usize {
    8
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

fn default_approval_validity_days() -> i64 {
    365
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

fn default_min_applicant_age() -> u32 {
    18
}

fn default_max_document_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_accepted_mime_types() -> Vec<String> {
    ["image/jpeg", "image/jpg", "image/png", "image/webp", "application/pdf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for KycConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            bulk_concurrency: default_bulk_concurrency(),
            operation_timeout_ms: default_operation_timeout_ms(),
            approval_validity_days: default_approval_validity_days(),
            sweep_interval_secs: default_sweep_interval_secs(),
            min_applicant_age: default_min_applicant_age(),
            max_document_bytes: default_max_document_bytes(),
            accepted_mime_types: default_accepted_mime_types(),
            escalate_flagged_risk: false,
        }
    }
}

impl KycConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Storage timeout as Duration
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Sweep interval as Duration, never below one second
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Approval validity as chrono Duration
    pub fn approval_validity(&self) -> chrono::Duration {
        chrono::Duration::days(self.approval_validity_days)
    }

    /// Bulk worker count, never below one
    pub fn workers(&self) -> usize {
        self.bulk_concurrency.max(1)
    }
}
