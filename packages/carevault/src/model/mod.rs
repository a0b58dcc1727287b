mod access;
mod alert;
mod audit;
mod hospital;
mod patient;
mod record;
mod user;

pub use access::{AccessRequest, AccessStatus, NewAccessRequest, ReviewDecision};
pub use alert::{AlertSeverity, NewSecurityAlert, SecurityAlert};
pub use audit::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceKind};
pub use hospital::{Hospital, NewHospital};
pub use patient::{Gender, NewPatient, Patient, PatientUpdate};
pub use record::{
    MedicalRecord, MedicalRecordUpdate, NewMedicalRecord, NewVitalSigns, VitalSigns,
};
pub use user::{NewUser, Role, User};
