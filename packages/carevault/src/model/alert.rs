use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A flagged event requiring admin review, distinct from the audit trail.
///
/// Invariant: `resolved_at` is set iff `resolved` is true, and
/// `resolver_id` is set iff resolved.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SecurityAlert {
    pub id: Uuid,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub subject_id: Option<Uuid>,
    pub description: String,
    /// Supplied by an external analysis collaborator, never computed here.
    pub anomaly_score: Option<f64>,
    pub resolved: bool,
    pub resolver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewSecurityAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub subject_id: Option<Uuid>,
    pub description: String,
    pub anomaly_score: Option<f64>,
}
