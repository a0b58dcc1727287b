use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "Female", alias = "female", alias = "FEMALE")]
    Female,
    #[serde(alias = "Male", alias = "male", alias = "MALE")]
    Male,
    #[serde(alias = "Other", alias = "other", alias = "OTHER")]
    Other,
}

/// Demographic and medical-context record, one-to-one with a `User` of role
/// patient. Never deleted while referencing medical records exist.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hospital_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub guardian_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewPatient {
    pub user_id: Uuid,
    pub hospital_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub guardian_contact: Option<String>,
}

/// Fields a doctor or admin may change after registration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PatientUpdate {
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub guardian_contact: Option<String>,
}
