//! Expiry sweep
//!
//! Approved cases whose `expires_at` has passed move to expired. A pass is
//! idempotent: a case already expired (or re-checked under its lock and no
//! longer due) is left alone, so overlapping or repeated passes are safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use kycflow_core::{CaseId, KycError, KycResult};

use crate::bulk::BulkFailure;
use crate::engine::ReviewEngine;
use crate::timed::TimedStore;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Approved cases found past their expiry
    pub examined: usize,
    pub expired: Vec<CaseId>,
    /// Busy cases, picked up by the next pass
    pub deferred: Vec<CaseId>,
    pub failed: Vec<BulkFailure>,
}

pub struct ExpirySweeper {
    engine: Arc<ReviewEngine>,
    store: TimedStore,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<ReviewEngine>, store: TimedStore) -> Self {
        Self { engine, store }
    }

    /// Run one pass as of `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> KycResult<SweepReport> {
        let due: Vec<CaseId> = self
            .store
            .list_cases()
            .await?
            .into_iter()
            .filter(|record| record.is_due_for_expiry(now))
            .map(|record| record.id)
            .collect();

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };
        for case_id in due {
            match self.engine.expire(&case_id, now).await {
                Ok(Some(_)) => report.expired.push(case_id),
                Ok(None) => {}
                Err(KycError::ConcurrentModification(_)) => report.deferred.push(case_id),
                Err(err) => {
                    warn!(case_id = %case_id, error = %err, "Expiry failed");
                    report.failed.push(BulkFailure {
                        id: case_id,
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        if report.examined > 0 {
            info!(
                expired = report.expired.len(),
                deferred = report.deferred.len(),
                failed = report.failed.len(),
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    pub async fn sweep(&self) -> KycResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Sweep every `period` until the handle is aborted.
    /// A zero period is raised to one millisecond.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                if let Err(e) = self.sweep().await {
                    error!("Expiry sweep error: {}", e);
                }
            }
        })
    }
}
