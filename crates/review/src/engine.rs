//! Review Engine - case-level state machine
//!
//! ```text
//! pending/under_review --assign-------------> under_review
//! under_review         --approve------------> approved      (required documents approved)
//! under_review         --reject-------------> rejected      (reason required)
//! under_review         --request_additional-> pending
//! under_review         --escalate-----------> under_review
//! approved             --expire-------------> expired       (sweeper only, after expires_at)
//! ```
//!
//! Every transition is one store commit: the new record state plus exactly
//! one audit entry carrying the old and new snapshots.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, info};

use kycflow_audit::{AuditAction, AuditChange, AuditDraft, AuditTarget};
use kycflow_core::{
    missing_required, Actor, CaseId, CaseStatus, Document, KycConfig, KycError, KycResult,
    RiskLevel, Role, VerificationRecord,
};
use kycflow_store::CaseCommit;

use crate::locks::CaseLocks;
use crate::timed::TimedStore;

/// Identity recorded on entries written by the expiry sweep
pub const SYSTEM_ACTOR_ID: &str = "system:expiry";

/// Backoff before the single automatic retry of a contended mutation
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Reviewer action on a case
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewAction {
    Assign,
    Approve,
    Reject,
    RequestAdditional,
    Escalate,
}

impl ReviewAction {
    pub fn audit_action(&self) -> AuditAction {
        match self {
            ReviewAction::Assign => AuditAction::ReviewAssign,
            ReviewAction::Approve => AuditAction::ReviewApprove,
            ReviewAction::Reject => AuditAction::ReviewReject,
            ReviewAction::RequestAdditional => AuditAction::ReviewRequestAdditional,
            ReviewAction::Escalate => AuditAction::ReviewEscalate,
        }
    }

    /// Journal action when applied through a bulk call, if bulk is allowed
    pub fn bulk_audit_action(&self) -> Option<AuditAction> {
        match self {
            ReviewAction::Assign => Some(AuditAction::BulkAssign),
            ReviewAction::Approve => Some(AuditAction::BulkApprove),
            ReviewAction::Reject => Some(AuditAction::BulkReject),
            ReviewAction::Escalate => Some(AuditAction::BulkEscalate),
            ReviewAction::RequestAdditional => None,
        }
    }
}

/// Inputs of a transition; which fields matter depends on the action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewParams {
    /// Assign: reviewer taking the case (defaults to the actor)
    pub reviewer_id: Option<String>,
    /// Approve: required. Reject: optional.
    pub risk_level: Option<RiskLevel>,
    /// Reject: required
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Escalate: new owner (defaults to the current one)
    pub reassign_to: Option<String>,
    /// If-Match token; a mismatch fails with `ConcurrentModification`
    pub expected_version: Option<u64>,
}

impl ReviewParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reviewer(mut self, reviewer_id: impl Into<String>) -> Self {
        self.reviewer_id = Some(reviewer_id.into());
        self
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_reassign_to(mut self, reviewer_id: impl Into<String>) -> Self {
        self.reassign_to = Some(reviewer_id.into());
        self
    }

    pub fn with_expected_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Apply `action` to `record`, returning the next state.
///
/// `documents` must be the case's documents when `action` is approve.
pub fn plan_transition(
    record: &VerificationRecord,
    action: ReviewAction,
    actor: &Actor,
    params: &ReviewParams,
    documents: &[Document],
    config: &KycConfig,
    now: DateTime<Utc>,
) -> KycResult<VerificationRecord> {
    let mut next = record.clone();
    next.updated_at = now;
    if let Some(notes) = non_blank(&params.notes) {
        next.compliance_notes = Some(notes);
    }

    match (action, record.status) {
        (ReviewAction::Assign, CaseStatus::Pending | CaseStatus::UnderReview) => {
            let reviewer = non_blank(&params.reviewer_id).unwrap_or_else(|| actor.id.clone());
            next.status = CaseStatus::UnderReview;
            next.assigned_reviewer = Some(reviewer);
        }
        (ReviewAction::Approve, CaseStatus::UnderReview) => {
            let missing = missing_required(documents);
            if !missing.is_empty() {
                return Err(KycError::IncompleteDocuments { missing });
            }
            if config.escalate_flagged_risk
                && record.risk_assessment.has_risk_flags()
                && record.escalation_count == 0
            {
                return Err(KycError::validation(
                    "risk flags: case must be escalated before approval",
                ));
            }

            next.status = CaseStatus::Approved;
            next.risk_level = Some(
                params
                    .risk_level
                    .or(record.risk_level)
                    .unwrap_or(RiskLevel::Low),
            );
            next.rejection_reason = None;
            next.reviewed_by = Some(actor.id.clone());
            next.reviewed_at = Some(now);
            next.expires_at = Some(now + config.approval_validity());
        }
        (ReviewAction::Reject, CaseStatus::UnderReview) => {
            let reason = non_blank(&params.reason)
                .ok_or_else(|| KycError::validation("reason: required to reject"))?;

            next.status = CaseStatus::Rejected;
            next.rejection_reason = Some(reason);
            next.risk_level = params.risk_level.or(record.risk_level);
            next.reviewed_by = Some(actor.id.clone());
            next.reviewed_at = Some(now);
            next.expires_at = None;
        }
        (ReviewAction::RequestAdditional, CaseStatus::UnderReview) => {
            next.status = CaseStatus::Pending;
            next.assigned_reviewer = None;
        }
        (ReviewAction::Escalate, CaseStatus::UnderReview) => {
            if let Some(owner) = non_blank(&params.reassign_to) {
                next.assigned_reviewer = Some(owner);
            }
            next.escalation_count += 1;
        }
        (action, from) => return Err(KycError::invalid_transition(from, action)),
    }

    Ok(next)
}

/// Run `op` and retry it once if it lost a race for the case
pub async fn retry_once<T, F, Fut>(mut op: F) -> KycResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = KycResult<T>>,
{
    match op().await {
        Err(KycError::ConcurrentModification(case_id)) => {
            debug!(case_id = %case_id, "Retrying after concurrent modification");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        other => other,
    }
}

pub struct ReviewEngine {
    store: TimedStore,
    locks: Arc<CaseLocks>,
    config: KycConfig,
}

impl ReviewEngine {
    pub fn new(store: TimedStore, locks: Arc<CaseLocks>, config: KycConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &KycConfig {
        &self.config
    }

    /// Apply a reviewer action to one case
    pub async fn transition(
        &self,
        case_id: &CaseId,
        action: ReviewAction,
        actor: &Actor,
        params: &ReviewParams,
    ) -> KycResult<VerificationRecord> {
        self.transition_journaled(case_id, action, actor, params, action.audit_action())
            .await
    }

    /// Same as [`transition`](Self::transition), journaled under `audit_action`
    pub(crate) async fn transition_journaled(
        &self,
        case_id: &CaseId,
        action: ReviewAction,
        actor: &Actor,
        params: &ReviewParams,
        audit_action: AuditAction,
    ) -> KycResult<VerificationRecord> {
        actor.require_reviewer()?;
        let _guard = self.locks.try_acquire(case_id)?;

        let record = self.store.get_case(case_id).await?;
        if let Some(expected) = params.expected_version {
            if expected != record.version {
                return Err(KycError::ConcurrentModification(case_id.to_string()));
            }
        }

        let documents = if action == ReviewAction::Approve && record.status == CaseStatus::UnderReview
        {
            self.store.documents_for_case(case_id).await?
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let next = plan_transition(
            &record,
            action,
            actor,
            params,
            &documents,
            &self.config,
            now,
        )?;

        let reason = non_blank(&params.reason).or_else(|| non_blank(&params.notes));
        let draft = AuditDraft::new(
            case_id.clone(),
            audit_action,
            actor,
            AuditTarget::KycCase(case_id.clone()),
            AuditChange::case(Some(&record), Some(&next)),
            now,
        )
        .with_reason(reason);

        let committed = self
            .store
            .commit(CaseCommit::new(record.version, next).with_audit(draft))
            .await?;

        info!(
            case_id = %case_id,
            action = %action,
            from = %record.status,
            to = %committed.record.status,
            actor = %actor.id,
            "Case transition"
        );
        Ok(committed.record)
    }

    /// Expire an approved case whose validity has lapsed at `now`.
    /// Returns `None` when there is nothing to do.
    pub async fn expire(
        &self,
        case_id: &CaseId,
        now: DateTime<Utc>,
    ) -> KycResult<Option<VerificationRecord>> {
        let _guard = self.locks.try_acquire(case_id)?;

        let record = self.store.get_case(case_id).await?;
        if !record.is_due_for_expiry(now) {
            return Ok(None);
        }

        let mut next = record.clone();
        next.status = CaseStatus::Expired;
        next.updated_at = now;

        let system = Actor::new(SYSTEM_ACTOR_ID, Role::Reviewer);
        let draft = AuditDraft::new(
            case_id.clone(),
            AuditAction::KycExpired,
            &system,
            AuditTarget::KycCase(case_id.clone()),
            AuditChange::case(Some(&record), Some(&next)),
            now,
        )
        .with_reason(Some("approval validity elapsed".to_string()));

        let committed = self
            .store
            .commit(CaseCommit::new(record.version, next).with_audit(draft))
            .await?;

        info!(case_id = %case_id, "Approval expired");
        Ok(Some(committed.record))
    }
}
