use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

///
/// Closed set of roles.
///
/// All role-based branching lives in `policy::evaluate`, keyed off this enum.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    // Serde does not seem to have a case insensitive option. alias is clunky, but better than custom de/serialisers
    #[serde(alias = "Admin", alias = "admin", alias = "ADMIN")]
    Admin,
    #[serde(alias = "Doctor", alias = "doctor", alias = "DOCTOR")]
    Doctor,
    #[serde(alias = "Nurse", alias = "nurse", alias = "NURSE")]
    Nurse,
    #[serde(alias = "Patient", alias = "patient", alias = "PATIENT")]
    Patient,
}

impl Role {
    /// Doctors and nurses work within a hospital scope
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Doctor | Role::Nurse)
    }

    /// Access request reviews are restricted to admin and doctor
    pub fn can_review_access_requests(&self) -> bool {
        matches!(self, Role::Admin | Role::Doctor)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Patient => "patient",
        };
        write!(f, "{s}")
    }
}

/// An account in the system.
///
/// Users are never hard-deleted. Deactivation clears the `active` flag and
/// leaves the row in place so audit entries keep resolving to an actor.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Hospital affiliation. `None` for patients, whose affiliation is
    /// derived from their `Patient` row.
    pub hospital_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub hospital_id: Option<Uuid>,
}
