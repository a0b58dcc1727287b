use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Denied,
}

impl AccessStatus {
    /// Approved and Denied are terminal. A new request must be created to
    /// ask again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccessStatus::Pending)
    }
}

impl Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Approved => "approved",
            AccessStatus::Denied => "denied",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Deny,
}

/// Cross-scope record-access request.
///
/// Invariant: `reviewed_at` and `reviewer_id` are set iff the status is
/// terminal, and both are set atomically with the status transition.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AccessRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub patient_id: Uuid,
    pub reason: String,
    pub status: AccessStatus,
    pub reviewer_id: Option<Uuid>,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewAccessRequest {
    pub requester_id: Uuid,
    pub patient_id: Uuid,
    pub reason: String,
}
