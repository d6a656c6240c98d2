//! Shared types for the batch pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status for one processed identity.
///
/// Written verbatim into the report, one row per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The platform knows no account for this phone number.
    NotRegistered,
    /// Group membership verified after the invite.
    Added,
    /// Privacy-restricted add; the invite went out as a direct message.
    RestrictedDmSent,
    /// Privacy-restricted add, and the direct message failed too.
    RestrictedDmFailed,
    /// The invite (or its membership verification) failed outright.
    InviteError,
    /// The platform kept flood-limiting one call past the retry budget.
    RateLimitedAbandoned,
    /// Unclassified failure; this identity's cleanup was skipped.
    CriticalError,
}

impl Outcome {
    /// Report/console label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Added => "added",
            Self::RestrictedDmSent => "restricted_dm_sent",
            Self::RestrictedDmFailed => "restricted_dm_failed",
            Self::InviteError => "invite_error",
            Self::RateLimitedAbandoned => "rate_limited_abandoned",
            Self::CriticalError => "critical_error",
        }
    }
}

/// One row of the outcome ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub identity: String,
    pub status: Outcome,
    /// When processing of this identity completed.
    pub processed_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(identity: impl Into<String>, status: Outcome) -> Self {
        Self {
            identity: identity.into(),
            status,
            processed_at: Utc::now(),
        }
    }
}

/// A pre-existing contact matched during the batch; its display name is
/// restored when the update ledger is flushed after the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub identity: String,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
}
