//! Authenticated actors
//!
//! The session layer authenticates callers; the core only receives the result.
//! No operation reads ambient session state - the actor is always explicit.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{KycError, KycResult};

/// Role of the caller
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// End user submitting their own verification
    Applicant,
    /// Compliance staff reviewing cases
    Reviewer,
}

/// The caller of a mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier from the session collaborator
    pub id: String,
    pub role: Role,
    /// Request origin, journaled with every audit entry
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn applicant(id: impl Into<String>) -> Self {
        Self::new(id, Role::Applicant)
    }

    pub fn reviewer(id: impl Into<String>) -> Self {
        Self::new(id, Role::Reviewer)
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn is_reviewer(&self) -> bool {
        self.role == Role::Reviewer
    }

    /// Fail with `Forbidden` unless the actor is a reviewer
    pub fn require_reviewer(&self) -> KycResult<()> {
        if self.is_reviewer() {
            Ok(())
        } else {
            Err(KycError::Forbidden(format!(
                "actor {} ({}) is not a reviewer",
                self.id, self.role
            )))
        }
    }
}
