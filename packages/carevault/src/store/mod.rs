//! Persistence seam.
//!
//! The production deployment backs this with a relational database; the
//! crate ships `MemoryStore` for development and tests. Stores enforce
//! relational invariants (foreign keys resolve, uniqueness holds) but never
//! authorization, which lives in `policy`.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::model::{
    AccessRequest, AuditLogEntry, Hospital, MedicalRecord, MedicalRecordUpdate, NewAccessRequest,
    NewAuditEntry, NewHospital, NewMedicalRecord, NewPatient, NewSecurityAlert, NewUser,
    NewVitalSigns, Patient, PatientUpdate, Role, SecurityAlert, User, VitalSigns,
};
use async_trait::async_trait;
use uuid::Uuid;

///
/// Typed create/read/update operations per entity.
///
/// Every state-changing operation takes the `NewAuditEntry` describing it
/// and must persist the entry in the same unit of work as the mutation: if
/// the entry cannot be appended the mutation must not commit, and the call
/// fails with `StoreError::AuditAppend`. A store fills `resource_id` (and
/// `patient_id` for patient rows) with the generated identifier when the
/// caller could not know it yet.
///
/// There is no update or delete operation for audit entries, and no delete
/// operation for any entity. Deactivation stands in for deletion.
///
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_user(&self, user: NewUser, audit: NewAuditEntry) -> Result<User, StoreError>;
    async fn user(&self, id: Uuid) -> Result<User, StoreError>;
    async fn set_user_role(
        &self,
        id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<User, StoreError>;
    async fn deactivate_user(&self, id: Uuid, audit: NewAuditEntry) -> Result<User, StoreError>;

    async fn insert_hospital(
        &self,
        hospital: NewHospital,
        audit: NewAuditEntry,
    ) -> Result<Hospital, StoreError>;
    async fn hospital(&self, id: Uuid) -> Result<Hospital, StoreError>;

    async fn insert_patient(
        &self,
        patient: NewPatient,
        audit: NewAuditEntry,
    ) -> Result<Patient, StoreError>;
    async fn patient(&self, id: Uuid) -> Result<Patient, StoreError>;
    async fn patient_for_user(&self, user_id: Uuid) -> Result<Patient, StoreError>;
    async fn update_patient(
        &self,
        id: Uuid,
        update: PatientUpdate,
        audit: NewAuditEntry,
    ) -> Result<Patient, StoreError>;

    /// `record.doctor_id` and `record.hospital_id` are supplied by the
    /// caller, derived from the authenticated doctor.
    async fn insert_medical_record(
        &self,
        record: NewMedicalRecord,
        doctor_id: Uuid,
        hospital_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<MedicalRecord, StoreError>;
    async fn medical_record(&self, id: Uuid) -> Result<MedicalRecord, StoreError>;
    async fn update_medical_record(
        &self,
        id: Uuid,
        update: MedicalRecordUpdate,
        audit: NewAuditEntry,
    ) -> Result<MedicalRecord, StoreError>;
    /// Sorted by visit date, newest first.
    async fn records_for_patient(&self, patient_id: Uuid) -> Result<Vec<MedicalRecord>, StoreError>;

    async fn insert_vital_signs(
        &self,
        record_id: Uuid,
        recorded_by: Uuid,
        vitals: NewVitalSigns,
        audit: NewAuditEntry,
    ) -> Result<VitalSigns, StoreError>;
    async fn vitals_for_record(&self, record_id: Uuid) -> Result<Vec<VitalSigns>, StoreError>;

    /// Append-only. Used for audited reads and denial entries, where there
    /// is no mutation to pair the entry with.
    async fn append_audit_entry(&self, entry: NewAuditEntry)
        -> Result<AuditLogEntry, StoreError>;
    /// Newest first, at most `limit` entries.
    async fn audit_entries(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError>;
    /// Newest first, only entries whose `patient_id` matches.
    async fn audit_entries_for_patient(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<AuditLogEntry>, StoreError>;

    async fn insert_access_request(
        &self,
        request: NewAccessRequest,
        audit: NewAuditEntry,
    ) -> Result<AccessRequest, StoreError>;
    async fn access_request(&self, id: Uuid) -> Result<AccessRequest, StoreError>;
    /// Persists a review. The stored row must still be `Pending`: a row
    /// that has already been reviewed is rejected with `Conflict`, so the
    /// Pending → terminal transition commits at most once even under
    /// concurrent reviewers. (A relational implementation guards the write
    /// with `WHERE status = 'pending'`.)
    async fn update_access_request(
        &self,
        request: AccessRequest,
        audit: NewAuditEntry,
    ) -> Result<AccessRequest, StoreError>;
    /// All requests this requester has filed for this patient.
    async fn requests_for(
        &self,
        requester_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Vec<AccessRequest>, StoreError>;

    async fn insert_security_alert(
        &self,
        alert: NewSecurityAlert,
        audit: NewAuditEntry,
    ) -> Result<SecurityAlert, StoreError>;
    async fn security_alert(&self, id: Uuid) -> Result<SecurityAlert, StoreError>;
    /// Persists a resolution. A row that is already resolved is rejected
    /// with `Conflict`, so an alert resolves at most once.
    async fn update_security_alert(
        &self,
        alert: SecurityAlert,
        audit: NewAuditEntry,
    ) -> Result<SecurityAlert, StoreError>;
    async fn security_alerts(&self) -> Result<Vec<SecurityAlert>, StoreError>;
}
