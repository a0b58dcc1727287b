use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable reference target for users, patients and records.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub district: String,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewHospital {
    pub name: String,
    pub district: String,
    pub contact: Option<String>,
}
