//! Per-case mutual exclusion
//!
//! At most one mutation per case is in flight. A second caller does not
//! queue: it fails fast with `ConcurrentModification` and may retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use kycflow_core::{CaseId, KycError, KycResult};

/// Guard held for the duration of one case mutation
pub type CaseGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct CaseLocks {
    slots: Mutex<HashMap<CaseId, Arc<AsyncMutex<()>>>>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the case lock without waiting
    pub fn try_acquire(&self, case_id: &CaseId) -> KycResult<CaseGuard> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop idle slots so the map tracks only cases currently in use
            slots.retain(|_, lock| Arc::strong_count(lock) > 1);
            slots.entry(case_id.clone()).or_default().clone()
        };

        slot.try_lock_owned().map_err(|_| {
            debug!(case_id = %case_id, "Case busy");
            KycError::ConcurrentModification(case_id.to_string())
        })
    }

    /// Number of cases with a live lock slot
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
