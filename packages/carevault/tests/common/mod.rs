#![allow(dead_code)]

use carevault::config::VaultConfig;
use carevault::model::{
    Gender, Hospital, NewHospital, NewMedicalRecord, NewPatient, NewUser, Patient, Role,
};
use carevault::{Caller, EntityStore, MemoryStore, Session, Vault};
use chrono::{NaiveDate, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;

pub fn ip() -> IpAddr {
    "192.0.2.7".parse().unwrap()
}

/// Two hospitals, one admin. Everything else is created per test.
pub struct World {
    pub store: Arc<MemoryStore>,
    pub vault: Vault,
    pub admin: Session,
    pub northside: Hospital,
    pub southside: Hospital,
}

impl World {
    pub async fn new() -> World {
        World::with_config(VaultConfig::default()).await
    }

    pub async fn with_config(config: VaultConfig) -> World {
        let store = Arc::new(MemoryStore::new());
        let vault = Vault::new(&config, store.clone());

        // The bootstrap admin exists outside the user table, the way a
        // provisioning credential would
        let admin = Session::authenticated(Caller::new(Uuid::new_v4(), Role::Admin, None), ip());

        let northside = vault
            .create_hospital(
                &admin,
                NewHospital {
                    name: "Northside General".to_string(),
                    district: "North".to_string(),
                    contact: None,
                },
            )
            .await
            .unwrap();
        let southside = vault
            .create_hospital(
                &admin,
                NewHospital {
                    name: "Southside Clinic".to_string(),
                    district: "South".to_string(),
                    contact: None,
                },
            )
            .await
            .unwrap();

        World {
            store,
            vault,
            admin,
            northside,
            southside,
        }
    }

    /// Register a staff member at `hospital` and open a session for them.
    pub async fn staff(&self, role: Role, hospital: &Hospital) -> Session {
        let user = self
            .vault
            .register_user(
                &self.admin,
                NewUser {
                    name: format!("{} at {}", role, hospital.name),
                    email: format!("{}@{}.example.org", role, hospital.district.to_lowercase()),
                    role,
                    hospital_id: Some(hospital.id),
                },
            )
            .await
            .unwrap();
        Session::authenticated(Caller::new(user.id, role, Some(hospital.id)), ip())
    }

    /// Register a patient at `hospital` and open their own session.
    pub async fn admit_patient(&self, hospital: &Hospital) -> (Patient, Session) {
        let user = self
            .vault
            .register_user(
                &self.admin,
                NewUser {
                    name: "Pat Example".to_string(),
                    email: format!("pat-{}@example.org", Uuid::new_v4()),
                    role: Role::Patient,
                    hospital_id: None,
                },
            )
            .await
            .unwrap();
        let patient = self
            .vault
            .register_patient(
                &self.admin,
                NewPatient {
                    user_id: user.id,
                    hospital_id: hospital.id,
                    date_of_birth: NaiveDate::from_ymd_opt(1988, 3, 14).unwrap(),
                    gender: Gender::Female,
                    blood_group: Some("O+".to_string()),
                    allergies: None,
                    guardian_contact: None,
                },
            )
            .await
            .unwrap();
        let session = Session::authenticated(
            Caller::new(user.id, Role::Patient, None).with_patient(patient.id),
            ip(),
        );
        (patient, session)
    }

    pub fn visit_for(&self, patient_id: Uuid) -> NewMedicalRecord {
        NewMedicalRecord {
            patient_id,
            complaint: "Persistent cough".to_string(),
            diagnosis: "Bronchitis".to_string(),
            prescription: Some("Amoxicillin 500mg".to_string()),
            lab_results: None,
            treatment_plan: Some("Rest, review in one week".to_string()),
            notes: None,
            visit_date: Utc::now(),
        }
    }

    pub async fn audit_actions_for(&self, patient_id: Uuid) -> Vec<String> {
        self.store
            .audit_entries_for_patient(patient_id, 100)
            .await
            .unwrap()
            .iter()
            .map(|e| e.action.to_string())
            .collect()
    }
}
