use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;
use uuid::Uuid;

///
/// Action labels for the audit trail.
///
/// A closed enum rather than free text so the compiler keeps callers honest
/// about which operations are audited.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateUser,
    ChangeUserRole,
    DeactivateUser,
    CreateHospital,
    CreatePatient,
    ViewPatient,
    UpdatePatient,
    CreateMedicalRecord,
    ViewMedicalRecord,
    UpdateMedicalRecord,
    ViewPatientRecords,
    RecordVitalSigns,
    ViewVitalSigns,
    ViewAuditTrail,
    CreateAccessRequest,
    ApprovedAccessRequest,
    DeniedAccessRequest,
    CreateSecurityAlert,
    ResolvedSecurityAlert,
    AccessDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateUser => "create_user",
            AuditAction::ChangeUserRole => "change_user_role",
            AuditAction::DeactivateUser => "deactivate_user",
            AuditAction::CreateHospital => "create_hospital",
            AuditAction::CreatePatient => "create_patient",
            AuditAction::ViewPatient => "view_patient",
            AuditAction::UpdatePatient => "update_patient",
            AuditAction::CreateMedicalRecord => "create_medical_record",
            AuditAction::ViewMedicalRecord => "view_medical_record",
            AuditAction::UpdateMedicalRecord => "update_medical_record",
            AuditAction::ViewPatientRecords => "view_patient_records",
            AuditAction::RecordVitalSigns => "record_vital_signs",
            AuditAction::ViewVitalSigns => "view_vital_signs",
            AuditAction::ViewAuditTrail => "view_audit_trail",
            AuditAction::CreateAccessRequest => "create_access_request",
            AuditAction::ApprovedAccessRequest => "approved_access_request",
            AuditAction::DeniedAccessRequest => "denied_access_request",
            AuditAction::CreateSecurityAlert => "create_security_alert",
            AuditAction::ResolvedSecurityAlert => "resolved_security_alert",
            AuditAction::AccessDenied => "access_denied",
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight relations an operation can target.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Hospital,
    Patient,
    MedicalRecord,
    VitalSigns,
    AuditTrail,
    AccessRequest,
    SecurityAlert,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::User => "user",
            ResourceKind::Hospital => "hospital",
            ResourceKind::Patient => "patient",
            ResourceKind::MedicalRecord => "medical_record",
            ResourceKind::VitalSigns => "vital_signs",
            ResourceKind::AuditTrail => "audit_trail",
            ResourceKind::AccessRequest => "access_request",
            ResourceKind::SecurityAlert => "security_alert",
        };
        write!(f, "{s}")
    }
}

/// Immutable record of who did what to which patient's data and when.
///
/// There is deliberately no update or delete surface for audit entries
/// anywhere in this crate.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// `None` only for genuinely anonymous operations.
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource: ResourceKind,
    pub resource_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub ip: IpAddr,
    /// Action-specific context.
    pub detail: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewAuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource: ResourceKind,
    pub resource_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub ip: IpAddr,
    pub detail: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(
        actor_id: Option<Uuid>,
        action: AuditAction,
        resource: ResourceKind,
        ip: IpAddr,
    ) -> Self {
        NewAuditEntry {
            actor_id,
            action,
            resource,
            resource_id: None,
            patient_id: None,
            ip,
            detail: None,
        }
    }

    pub fn resource_id(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn patient(mut self, patient_id: Uuid) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}
