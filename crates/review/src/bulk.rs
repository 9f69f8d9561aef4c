//! Bulk Action Coordinator
//!
//! Applies one review action to many cases. Items run independently under a
//! semaphore; each has its own deadline, and no item's failure affects
//! another. Results come back in input order.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use kycflow_audit::AuditAction;
use kycflow_core::{Actor, CaseId, ErrorKind, KycConfig, KycError, KycResult};

use crate::engine::{retry_once, ReviewAction, ReviewEngine, ReviewParams};

/// One failed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: CaseId,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub action: ReviewAction,
    pub succeeded: Vec<CaseId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkResult {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ids worth resubmitting (transient failures only)
    pub fn retryable_ids(&self) -> Vec<CaseId> {
        self.failed
            .iter()
            .filter(|f| {
                matches!(
                    f.kind,
                    ErrorKind::StorageUnavailable | ErrorKind::ConcurrentModification
                )
            })
            .map(|f| f.id.clone())
            .collect()
    }
}

/// One case of a bulk call, run on its own task
struct BulkItem {
    engine: Arc<ReviewEngine>,
    case_id: CaseId,
    action: ReviewAction,
    audit_action: AuditAction,
    actor: Arc<Actor>,
    params: Arc<ReviewParams>,
    timeout: Duration,
}

impl BulkItem {
    async fn run(self, permits: Arc<Semaphore>) -> KycResult<()> {
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| KycError::StorageUnavailable("bulk pool closed".to_string()))?;

        let attempt = retry_once(|| {
            self.engine.transition_journaled(
                &self.case_id,
                self.action,
                &self.actor,
                &self.params,
                self.audit_action,
            )
        });
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(KycError::StorageUnavailable(format!(
                "item timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

pub struct BulkCoordinator {
    engine: Arc<ReviewEngine>,
    permits: Arc<Semaphore>,
    max_batch_size: usize,
    item_timeout: Duration,
}

impl BulkCoordinator {
    pub fn new(engine: Arc<ReviewEngine>, config: &KycConfig) -> Self {
        // An item makes up to three store round trips (read, documents, commit)
        let item_timeout = config.operation_timeout() * 3;
        Self {
            engine,
            permits: Arc::new(Semaphore::new(config.workers())),
            max_batch_size: config.max_batch_size,
            item_timeout,
        }
    }

    /// Apply `action` to every id. Ids are not deduplicated.
    pub async fn apply(
        &self,
        action: ReviewAction,
        case_ids: &[CaseId],
        actor: &Actor,
        params: &ReviewParams,
    ) -> KycResult<BulkResult> {
        if case_ids.len() > self.max_batch_size {
            return Err(KycError::TooManyItems {
                count: case_ids.len(),
                max: self.max_batch_size,
            });
        }
        let audit_action = action.bulk_audit_action().ok_or_else(|| {
            KycError::validation(format!("action: {action} cannot be applied in bulk"))
        })?;
        actor.require_reviewer()?;

        // A single version token cannot match many cases
        let params = Arc::new(ReviewParams {
            expected_version: None,
            ..params.clone()
        });
        let actor = Arc::new(actor.clone());

        let mut handles = Vec::with_capacity(case_ids.len());
        for case_id in case_ids {
            let item = BulkItem {
                engine: self.engine.clone(),
                case_id: case_id.clone(),
                action,
                audit_action,
                actor: actor.clone(),
                params: params.clone(),
                timeout: self.item_timeout,
            };
            handles.push(tokio::spawn(item.run(self.permits.clone())));
        }

        let mut result = BulkResult {
            action,
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (case_id, handle) in case_ids.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(KycError::StorageUnavailable(format!(
                    "item task failed: {join_error}"
                ))),
            };
            match outcome {
                Ok(()) => result.succeeded.push(case_id.clone()),
                Err(err) => {
                    warn!(case_id = %case_id, action = %action, error = %err, "Bulk item failed");
                    result.failed.push(BulkFailure {
                        id: case_id.clone(),
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            action = %action,
            total = result.total(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            actor = %actor.id,
            "Bulk action completed"
        );
        Ok(result)
    }
}
