use super::EntityStore;
use crate::error::StoreError;
use crate::log::STORE;
use crate::model::{
    AccessRequest, AccessStatus, AuditLogEntry, Hospital, MedicalRecord, MedicalRecordUpdate,
    NewAccessRequest, NewAuditEntry, NewHospital, NewMedicalRecord, NewPatient, NewSecurityAlert,
    NewUser, NewVitalSigns, Patient, PatientUpdate, ResourceKind, Role, SecurityAlert, User,
    VitalSigns,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    hospitals: HashMap<Uuid, Hospital>,
    patients: HashMap<Uuid, Patient>,
    records: HashMap<Uuid, MedicalRecord>,
    vitals: HashMap<Uuid, VitalSigns>,
    audit: Vec<AuditLogEntry>,
    requests: HashMap<Uuid, AccessRequest>,
    alerts: HashMap<Uuid, SecurityAlert>,
}

///
/// In-process `EntityStore` used for development and tests.
///
/// A single write lock spans each mutation and its audit append, so the
/// pair commits atomically. The audit fault hook lets tests prove that an
/// operation whose entry cannot be written does not commit at all.
///
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_audit_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm or disarm the injected audit fault. While armed, every audit
    /// append fails and the enclosing mutation is not committed.
    pub fn fail_audit_appends(&self, fail: bool) {
        self.fail_audit_appends.store(fail, Ordering::SeqCst);
    }

    /// Overwrite an access-request row, bypassing the transition guard.
    /// Lets tests manufacture states (e.g. a review in the past) that the
    /// public surface refuses to produce.
    #[cfg(test)]
    pub(crate) fn put_access_request(&self, request: AccessRequest) {
        self.tables
            .write()
            .expect("store lock poisoned")
            .requests
            .insert(request.id, request);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Unavailable {
            reason: "store lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Unavailable {
            reason: "store lock poisoned".to_string(),
        })
    }

    /// Turn a `NewAuditEntry` into a persistable row, or fail before any
    /// mutation is committed. Called with the write lock held.
    fn seal(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, StoreError> {
        if self.fail_audit_appends.load(Ordering::SeqCst) {
            return Err(StoreError::AuditAppend {
                reason: "injected audit fault".to_string(),
            });
        }

        Ok(AuditLogEntry {
            id: Uuid::new_v4(),
            actor_id: entry.actor_id,
            action: entry.action,
            resource: entry.resource,
            resource_id: entry.resource_id,
            patient_id: entry.patient_id,
            ip: entry.ip,
            detail: entry.detail,
            at: Utc::now(),
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation { field });
    }
    Ok(())
}

fn not_found(resource: ResourceKind, id: Uuid) -> StoreError {
    StoreError::NotFound { resource, id }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_user(
        &self,
        user: NewUser,
        mut audit: NewAuditEntry,
    ) -> Result<User, StoreError> {
        required("name", &user.name)?;
        required("email", &user.email)?;

        let mut tables = self.write()?;

        if let Some(hospital_id) = user.hospital_id {
            if !tables.hospitals.contains_key(&hospital_id) {
                return Err(not_found(ResourceKind::Hospital, hospital_id));
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            hospital_id: user.hospital_id,
            active: true,
            created_at: Utc::now(),
        };

        audit.resource_id.get_or_insert(user.id);
        let entry = self.seal(audit)?;

        tables.users.insert(user.id, user.clone());
        tables.audit.push(entry);

        debug!(target: STORE, msg = "Inserted user", id = %user.id, role = %user.role);
        Ok(user)
    }

    async fn user(&self, id: Uuid) -> Result<User, StoreError> {
        let tables = self.read()?;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::User, id))
    }

    async fn set_user_role(
        &self,
        id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&id) {
            return Err(not_found(ResourceKind::User, id));
        }

        let entry = self.seal(audit)?;

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(ResourceKind::User, id))?;
        user.role = role;
        let user = user.clone();
        tables.audit.push(entry);
        Ok(user)
    }

    async fn deactivate_user(
        &self,
        id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&id) {
            return Err(not_found(ResourceKind::User, id));
        }

        let entry = self.seal(audit)?;

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(ResourceKind::User, id))?;
        user.active = false;
        let user = user.clone();
        tables.audit.push(entry);
        Ok(user)
    }

    async fn insert_hospital(
        &self,
        hospital: NewHospital,
        mut audit: NewAuditEntry,
    ) -> Result<Hospital, StoreError> {
        required("name", &hospital.name)?;
        required("district", &hospital.district)?;

        let mut tables = self.write()?;

        let hospital = Hospital {
            id: Uuid::new_v4(),
            name: hospital.name,
            district: hospital.district,
            contact: hospital.contact,
            created_at: Utc::now(),
        };

        audit.resource_id.get_or_insert(hospital.id);
        let entry = self.seal(audit)?;

        tables.hospitals.insert(hospital.id, hospital.clone());
        tables.audit.push(entry);
        Ok(hospital)
    }

    async fn hospital(&self, id: Uuid) -> Result<Hospital, StoreError> {
        let tables = self.read()?;
        tables
            .hospitals
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Hospital, id))
    }

    async fn insert_patient(
        &self,
        patient: NewPatient,
        mut audit: NewAuditEntry,
    ) -> Result<Patient, StoreError> {
        let mut tables = self.write()?;

        if !tables.users.contains_key(&patient.user_id) {
            return Err(not_found(ResourceKind::User, patient.user_id));
        }
        if !tables.hospitals.contains_key(&patient.hospital_id) {
            return Err(not_found(ResourceKind::Hospital, patient.hospital_id));
        }
        // One patient row per user
        if tables
            .patients
            .values()
            .any(|p| p.user_id == patient.user_id)
        {
            return Err(StoreError::Conflict {
                resource: ResourceKind::Patient,
                id: patient.user_id,
            });
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: patient.user_id,
            hospital_id: patient.hospital_id,
            date_of_birth: patient.date_of_birth,
            gender: patient.gender,
            blood_group: patient.blood_group,
            allergies: patient.allergies,
            guardian_contact: patient.guardian_contact,
            created_at: now,
            updated_at: now,
        };

        audit.resource_id.get_or_insert(patient.id);
        audit.patient_id.get_or_insert(patient.id);
        let entry = self.seal(audit)?;

        tables.patients.insert(patient.id, patient.clone());
        tables.audit.push(entry);

        debug!(target: STORE, msg = "Inserted patient", id = %patient.id);
        Ok(patient)
    }

    async fn patient(&self, id: Uuid) -> Result<Patient, StoreError> {
        let tables = self.read()?;
        tables
            .patients
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Patient, id))
    }

    async fn patient_for_user(&self, user_id: Uuid) -> Result<Patient, StoreError> {
        let tables = self.read()?;
        tables
            .patients
            .values()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::Patient, user_id))
    }

    async fn update_patient(
        &self,
        id: Uuid,
        update: PatientUpdate,
        audit: NewAuditEntry,
    ) -> Result<Patient, StoreError> {
        let mut tables = self.write()?;
        if !tables.patients.contains_key(&id) {
            return Err(not_found(ResourceKind::Patient, id));
        }

        let entry = self.seal(audit)?;

        let patient = tables
            .patients
            .get_mut(&id)
            .ok_or_else(|| not_found(ResourceKind::Patient, id))?;
        if let Some(blood_group) = update.blood_group {
            patient.blood_group = Some(blood_group);
        }
        if let Some(allergies) = update.allergies {
            patient.allergies = Some(allergies);
        }
        if let Some(guardian_contact) = update.guardian_contact {
            patient.guardian_contact = Some(guardian_contact);
        }
        patient.updated_at = Utc::now();
        let patient = patient.clone();
        tables.audit.push(entry);
        Ok(patient)
    }

    async fn insert_medical_record(
        &self,
        record: NewMedicalRecord,
        doctor_id: Uuid,
        hospital_id: Uuid,
        mut audit: NewAuditEntry,
    ) -> Result<MedicalRecord, StoreError> {
        required("complaint", &record.complaint)?;
        required("diagnosis", &record.diagnosis)?;

        let mut tables = self.write()?;
        if !tables.patients.contains_key(&record.patient_id) {
            return Err(not_found(ResourceKind::Patient, record.patient_id));
        }

        let now = Utc::now();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: record.patient_id,
            doctor_id,
            hospital_id,
            complaint: record.complaint,
            diagnosis: record.diagnosis,
            prescription: record.prescription,
            lab_results: record.lab_results,
            treatment_plan: record.treatment_plan,
            notes: record.notes,
            visit_date: record.visit_date,
            created_at: now,
            updated_at: now,
        };

        audit.resource_id.get_or_insert(record.id);
        let entry = self.seal(audit)?;

        tables.records.insert(record.id, record.clone());
        tables.audit.push(entry);

        debug!(target: STORE, msg = "Inserted medical record", id = %record.id);
        Ok(record)
    }

    async fn medical_record(&self, id: Uuid) -> Result<MedicalRecord, StoreError> {
        let tables = self.read()?;
        tables
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::MedicalRecord, id))
    }

    async fn update_medical_record(
        &self,
        id: Uuid,
        update: MedicalRecordUpdate,
        audit: NewAuditEntry,
    ) -> Result<MedicalRecord, StoreError> {
        let mut tables = self.write()?;
        if !tables.records.contains_key(&id) {
            return Err(not_found(ResourceKind::MedicalRecord, id));
        }

        let entry = self.seal(audit)?;

        let record = tables
            .records
            .get_mut(&id)
            .ok_or_else(|| not_found(ResourceKind::MedicalRecord, id))?;
        if let Some(diagnosis) = update.diagnosis {
            record.diagnosis = diagnosis;
        }
        if let Some(prescription) = update.prescription {
            record.prescription = Some(prescription);
        }
        if let Some(lab_results) = update.lab_results {
            record.lab_results = Some(lab_results);
        }
        if let Some(treatment_plan) = update.treatment_plan {
            record.treatment_plan = Some(treatment_plan);
        }
        if let Some(notes) = update.notes {
            record.notes = Some(notes);
        }
        record.updated_at = Utc::now();
        let record = record.clone();
        tables.audit.push(entry);
        Ok(record)
    }

    async fn records_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<MedicalRecord>, StoreError> {
        let tables = self.read()?;
        let mut records: Vec<MedicalRecord> = tables
            .records
            .values()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.visit_date.cmp(&a.visit_date));
        Ok(records)
    }

    async fn insert_vital_signs(
        &self,
        record_id: Uuid,
        recorded_by: Uuid,
        vitals: NewVitalSigns,
        mut audit: NewAuditEntry,
    ) -> Result<VitalSigns, StoreError> {
        let mut tables = self.write()?;
        if !tables.records.contains_key(&record_id) {
            return Err(not_found(ResourceKind::MedicalRecord, record_id));
        }

        let bmi = vitals.bmi();
        let vitals = VitalSigns {
            id: Uuid::new_v4(),
            record_id,
            recorded_by,
            temperature: vitals.temperature,
            systolic: vitals.systolic,
            diastolic: vitals.diastolic,
            pulse: vitals.pulse,
            respiration: vitals.respiration,
            weight: vitals.weight,
            height: vitals.height,
            bmi,
            recorded_at: Utc::now(),
        };

        audit.resource_id.get_or_insert(vitals.id);
        let entry = self.seal(audit)?;

        tables.vitals.insert(vitals.id, vitals.clone());
        tables.audit.push(entry);
        Ok(vitals)
    }

    async fn vitals_for_record(&self, record_id: Uuid) -> Result<Vec<VitalSigns>, StoreError> {
        let tables = self.read()?;
        let mut vitals: Vec<VitalSigns> = tables
            .vitals
            .values()
            .filter(|v| v.record_id == record_id)
            .cloned()
            .collect();
        vitals.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(vitals)
    }

    async fn append_audit_entry(
        &self,
        entry: NewAuditEntry,
    ) -> Result<AuditLogEntry, StoreError> {
        let mut tables = self.write()?;
        let entry = self.seal(entry)?;
        tables.audit.push(entry.clone());
        Ok(entry)
    }

    async fn audit_entries(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        let tables = self.read()?;
        // Entries are appended in order, so newest-first is a reverse scan
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }

    async fn audit_entries_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .audit
            .iter()
            .rev()
            .filter(|e| e.patient_id == Some(patient_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_access_request(
        &self,
        request: NewAccessRequest,
        mut audit: NewAuditEntry,
    ) -> Result<AccessRequest, StoreError> {
        required("reason", &request.reason)?;

        let mut tables = self.write()?;
        if !tables.patients.contains_key(&request.patient_id) {
            return Err(not_found(ResourceKind::Patient, request.patient_id));
        }

        let request = AccessRequest {
            id: Uuid::new_v4(),
            requester_id: request.requester_id,
            patient_id: request.patient_id,
            reason: request.reason,
            status: AccessStatus::Pending,
            reviewer_id: None,
            requested_at: Utc::now(),
            reviewed_at: None,
        };

        audit.resource_id.get_or_insert(request.id);
        let entry = self.seal(audit)?;

        tables.requests.insert(request.id, request.clone());
        tables.audit.push(entry);
        Ok(request)
    }

    async fn access_request(&self, id: Uuid) -> Result<AccessRequest, StoreError> {
        let tables = self.read()?;
        tables
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::AccessRequest, id))
    }

    async fn update_access_request(
        &self,
        request: AccessRequest,
        audit: NewAuditEntry,
    ) -> Result<AccessRequest, StoreError> {
        let mut tables = self.write()?;
        let stored = tables
            .requests
            .get(&request.id)
            .ok_or_else(|| not_found(ResourceKind::AccessRequest, request.id))?;
        // The transition out of Pending commits at most once, even when two
        // reviewers observed the same pending row
        if stored.status.is_terminal() {
            return Err(StoreError::Conflict {
                resource: ResourceKind::AccessRequest,
                id: request.id,
            });
        }

        let entry = self.seal(audit)?;

        tables.requests.insert(request.id, request.clone());
        tables.audit.push(entry);
        Ok(request)
    }

    async fn requests_for(
        &self,
        requester_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Vec<AccessRequest>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .requests
            .values()
            .filter(|r| r.requester_id == requester_id && r.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn insert_security_alert(
        &self,
        alert: NewSecurityAlert,
        mut audit: NewAuditEntry,
    ) -> Result<SecurityAlert, StoreError> {
        required("alert_type", &alert.alert_type)?;
        required("description", &alert.description)?;

        let mut tables = self.write()?;
        if let Some(subject_id) = alert.subject_id {
            if !tables.users.contains_key(&subject_id) {
                return Err(not_found(ResourceKind::User, subject_id));
            }
        }

        let alert = SecurityAlert {
            id: Uuid::new_v4(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            subject_id: alert.subject_id,
            description: alert.description,
            anomaly_score: alert.anomaly_score,
            resolved: false,
            resolver_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        };

        audit.resource_id.get_or_insert(alert.id);
        let entry = self.seal(audit)?;

        tables.alerts.insert(alert.id, alert.clone());
        tables.audit.push(entry);
        Ok(alert)
    }

    async fn security_alert(&self, id: Uuid) -> Result<SecurityAlert, StoreError> {
        let tables = self.read()?;
        tables
            .alerts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(ResourceKind::SecurityAlert, id))
    }

    async fn update_security_alert(
        &self,
        alert: SecurityAlert,
        audit: NewAuditEntry,
    ) -> Result<SecurityAlert, StoreError> {
        let mut tables = self.write()?;
        let stored = tables
            .alerts
            .get(&alert.id)
            .ok_or_else(|| not_found(ResourceKind::SecurityAlert, alert.id))?;
        // Resolution commits at most once
        if stored.resolved {
            return Err(StoreError::Conflict {
                resource: ResourceKind::SecurityAlert,
                id: alert.id,
            });
        }

        let entry = self.seal(audit)?;

        tables.alerts.insert(alert.id, alert.clone());
        tables.audit.push(entry);
        Ok(alert)
    }

    async fn security_alerts(&self) -> Result<Vec<SecurityAlert>, StoreError> {
        let tables = self.read()?;
        let mut alerts: Vec<SecurityAlert> = tables.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}
