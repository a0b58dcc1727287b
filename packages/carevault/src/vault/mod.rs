//! The orchestrator.
//!
//! Every operation runs the same sequence: establish the caller, evaluate
//! the policy, perform the store operation, append the audit entry, and
//! only then report success. Authorization failures never mutate anything;
//! audit failures fail the whole operation.

use crate::audit::AuditRecorder;
use crate::config::VaultConfig;
use crate::error::{Error, StoreError, WorkflowError};
use crate::log::POLICY;
use crate::model::{
    AccessRequest, AuditAction, AuditLogEntry, Hospital, MedicalRecord, MedicalRecordUpdate,
    NewAuditEntry, NewHospital, NewMedicalRecord, NewPatient, NewSecurityAlert, NewUser,
    NewVitalSigns, Patient, PatientUpdate, ResourceKind, ReviewDecision, Role, SecurityAlert,
    User, VitalSigns,
};
use crate::policy::{evaluate, AccessGrant, Action, Caller, Decision, Resource};
use crate::prometheus::OPERATIONS_TOTAL;
use crate::store::EntityStore;
use crate::workflow::AccessRequests;
use chrono::Utc;
use metrics::counter;
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One inbound request's identity and origin.
#[derive(Clone, Debug)]
pub struct Session {
    caller: Option<Caller>,
    ip: IpAddr,
}

impl Session {
    pub fn authenticated(caller: Caller, ip: IpAddr) -> Self {
        Session {
            caller: Some(caller),
            ip,
        }
    }

    pub fn anonymous(ip: IpAddr) -> Self {
        Session { caller: None, ip }
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

///
/// All of the things required to serve the records core.
///
#[derive(Clone)]
pub struct Vault {
    store: Arc<dyn EntityStore>,
    recorder: AuditRecorder,
    requests: AccessRequests,
}

impl Vault {
    pub fn new(config: &VaultConfig, store: Arc<dyn EntityStore>) -> Vault {
        let recorder = AuditRecorder::new(store.clone(), &config.audit);
        let requests = AccessRequests::new(store.clone(), config.approval_ttl());
        Vault {
            store,
            recorder,
            requests,
        }
    }

    // ------------------------------------------------------------------
    // Users and hospitals
    // ------------------------------------------------------------------

    pub async fn register_user(&self, session: &Session, user: NewUser) -> Result<User, Error> {
        let caller = self
            .authorize(session, Action::Create, &Resource::User { id: None })
            .await?;
        let audit = self.entry(&caller, AuditAction::CreateUser, ResourceKind::User, session);
        Ok(self.store.insert_user(user, audit).await?)
    }

    pub async fn change_user_role(
        &self,
        session: &Session,
        user_id: Uuid,
        role: Role,
    ) -> Result<User, Error> {
        let caller = self
            .authorize(session, Action::Update, &Resource::User { id: Some(user_id) })
            .await?;
        let audit = self
            .entry(&caller, AuditAction::ChangeUserRole, ResourceKind::User, session)
            .resource_id(user_id)
            .detail(json!({ "role": role }));
        Ok(self.store.set_user_role(user_id, role, audit).await?)
    }

    /// Users are deactivated, never deleted.
    pub async fn deactivate_user(&self, session: &Session, user_id: Uuid) -> Result<User, Error> {
        let caller = self
            .authorize(session, Action::Update, &Resource::User { id: Some(user_id) })
            .await?;
        let audit = self
            .entry(&caller, AuditAction::DeactivateUser, ResourceKind::User, session)
            .resource_id(user_id);
        Ok(self.store.deactivate_user(user_id, audit).await?)
    }

    pub async fn create_hospital(
        &self,
        session: &Session,
        hospital: NewHospital,
    ) -> Result<Hospital, Error> {
        let caller = self
            .authorize(session, Action::Create, &Resource::Hospital { id: None })
            .await?;
        let audit = self.entry(
            &caller,
            AuditAction::CreateHospital,
            ResourceKind::Hospital,
            session,
        );
        Ok(self.store.insert_hospital(hospital, audit).await?)
    }

    // ------------------------------------------------------------------
    // Patients
    // ------------------------------------------------------------------

    pub async fn register_patient(
        &self,
        session: &Session,
        patient: NewPatient,
    ) -> Result<Patient, Error> {
        let caller = self
            .authorize(
                session,
                Action::Create,
                &Resource::Patient {
                    id: None,
                    hospital_id: patient.hospital_id,
                },
            )
            .await?;
        let audit = self.entry(
            &caller,
            AuditAction::CreatePatient,
            ResourceKind::Patient,
            session,
        );
        Ok(self.store.insert_patient(patient, audit).await?)
    }

    pub async fn patient(&self, session: &Session, id: Uuid) -> Result<Patient, Error> {
        let patient = self.store.patient(id).await?;
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::Patient {
                    id: Some(patient.id),
                    hospital_id: patient.hospital_id,
                },
            )
            .await?;

        self.recorder
            .record(
                self.entry(&caller, AuditAction::ViewPatient, ResourceKind::Patient, session)
                    .resource_id(patient.id)
                    .patient(patient.id),
            )
            .await?;
        Ok(patient)
    }

    pub async fn update_patient(
        &self,
        session: &Session,
        id: Uuid,
        update: PatientUpdate,
    ) -> Result<Patient, Error> {
        let patient = self.store.patient(id).await?;
        let caller = self
            .authorize(
                session,
                Action::Update,
                &Resource::Patient {
                    id: Some(patient.id),
                    hospital_id: patient.hospital_id,
                },
            )
            .await?;
        let audit = self
            .entry(&caller, AuditAction::UpdatePatient, ResourceKind::Patient, session)
            .resource_id(patient.id)
            .patient(patient.id);
        Ok(self.store.update_patient(id, update, audit).await?)
    }

    // ------------------------------------------------------------------
    // Medical records and vital signs
    // ------------------------------------------------------------------

    pub async fn create_medical_record(
        &self,
        session: &Session,
        record: NewMedicalRecord,
    ) -> Result<MedicalRecord, Error> {
        let patient = self.store.patient(record.patient_id).await?;
        let caller = self
            .authorize(
                session,
                Action::Create,
                &Resource::MedicalRecord {
                    patient_id: patient.id,
                    hospital_id: patient.hospital_id,
                    doctor_id: None,
                },
            )
            .await?;

        let audit = self
            .entry(
                &caller,
                AuditAction::CreateMedicalRecord,
                ResourceKind::MedicalRecord,
                session,
            )
            .patient(patient.id);

        // The policy has just proven the caller is in the patient's
        // hospital (or admin), so the record lands in that hospital under
        // the caller as authoring doctor.
        Ok(self
            .store
            .insert_medical_record(record, caller.user_id, patient.hospital_id, audit)
            .await?)
    }

    pub async fn medical_record(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<MedicalRecord, Error> {
        let record = self.store.medical_record(id).await?;
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::MedicalRecord {
                    patient_id: record.patient_id,
                    hospital_id: record.hospital_id,
                    doctor_id: Some(record.doctor_id),
                },
            )
            .await?;

        self.recorder
            .record(
                self.entry(
                    &caller,
                    AuditAction::ViewMedicalRecord,
                    ResourceKind::MedicalRecord,
                    session,
                )
                .resource_id(record.id)
                .patient(record.patient_id),
            )
            .await?;
        Ok(record)
    }

    pub async fn update_medical_record(
        &self,
        session: &Session,
        id: Uuid,
        update: MedicalRecordUpdate,
    ) -> Result<MedicalRecord, Error> {
        let record = self.store.medical_record(id).await?;
        let caller = self
            .authorize(
                session,
                Action::Update,
                &Resource::MedicalRecord {
                    patient_id: record.patient_id,
                    hospital_id: record.hospital_id,
                    doctor_id: Some(record.doctor_id),
                },
            )
            .await?;
        let audit = self
            .entry(
                &caller,
                AuditAction::UpdateMedicalRecord,
                ResourceKind::MedicalRecord,
                session,
            )
            .resource_id(record.id)
            .patient(record.patient_id);
        Ok(self.store.update_medical_record(id, update, audit).await?)
    }

    /// A patient's visit history, newest first.
    pub async fn records_for_patient(
        &self,
        session: &Session,
        patient_id: Uuid,
    ) -> Result<Vec<MedicalRecord>, Error> {
        let patient = self.store.patient(patient_id).await?;
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::MedicalRecord {
                    patient_id: patient.id,
                    hospital_id: patient.hospital_id,
                    doctor_id: None,
                },
            )
            .await?;

        let records = self.store.records_for_patient(patient.id).await?;
        self.recorder
            .record(
                self.entry(
                    &caller,
                    AuditAction::ViewPatientRecords,
                    ResourceKind::MedicalRecord,
                    session,
                )
                .patient(patient.id),
            )
            .await?;
        Ok(records)
    }

    /// The patient self-service view of their own records.
    pub async fn my_records(&self, session: &Session) -> Result<Vec<MedicalRecord>, Error> {
        let caller = session.caller().ok_or(Error::AuthenticationRequired)?;
        let patient = match caller.patient_id {
            Some(id) => self.store.patient(id).await?,
            None => self.store.patient_for_user(caller.user_id).await?,
        };
        self.records_for_patient(session, patient.id).await
    }

    pub async fn record_vital_signs(
        &self,
        session: &Session,
        record_id: Uuid,
        vitals: NewVitalSigns,
    ) -> Result<VitalSigns, Error> {
        let record = self.store.medical_record(record_id).await?;
        let caller = self
            .authorize(
                session,
                Action::Create,
                &Resource::VitalSigns {
                    patient_id: record.patient_id,
                    hospital_id: record.hospital_id,
                },
            )
            .await?;
        let audit = self
            .entry(
                &caller,
                AuditAction::RecordVitalSigns,
                ResourceKind::VitalSigns,
                session,
            )
            .patient(record.patient_id);
        Ok(self
            .store
            .insert_vital_signs(record_id, caller.user_id, vitals, audit)
            .await?)
    }

    pub async fn vitals_for_record(
        &self,
        session: &Session,
        record_id: Uuid,
    ) -> Result<Vec<VitalSigns>, Error> {
        let record = self.store.medical_record(record_id).await?;
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::VitalSigns {
                    patient_id: record.patient_id,
                    hospital_id: record.hospital_id,
                },
            )
            .await?;

        let vitals = self.store.vitals_for_record(record_id).await?;
        self.recorder
            .record(
                self.entry(
                    &caller,
                    AuditAction::ViewVitalSigns,
                    ResourceKind::VitalSigns,
                    session,
                )
                .resource_id(record.id)
                .patient(record.patient_id),
            )
            .await?;
        Ok(vitals)
    }

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    /// Unfiltered trail, admin only, capped at the configured page size.
    pub async fn audit_trail(
        &self,
        session: &Session,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::AuditTrail { patient_id: None },
            )
            .await?;

        let entries = self.recorder.trail(limit).await?;
        self.recorder
            .record(self.entry(
                &caller,
                AuditAction::ViewAuditTrail,
                ResourceKind::AuditTrail,
                session,
            ))
            .await?;
        Ok(entries)
    }

    /// "Who accessed my records": a patient's own trail, or any via admin.
    pub async fn audit_trail_for_patient(
        &self,
        session: &Session,
        patient_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        let caller = self
            .authorize(
                session,
                Action::Read,
                &Resource::AuditTrail {
                    patient_id: Some(patient_id),
                },
            )
            .await?;

        let entries = self.recorder.trail_for_patient(patient_id, limit).await?;
        self.recorder
            .record(
                self.entry(
                    &caller,
                    AuditAction::ViewAuditTrail,
                    ResourceKind::AuditTrail,
                    session,
                )
                .patient(patient_id),
            )
            .await?;
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Access requests
    // ------------------------------------------------------------------

    pub async fn request_access(
        &self,
        session: &Session,
        patient_id: Uuid,
        reason: &str,
    ) -> Result<AccessRequest, Error> {
        let caller = self
            .authorize(
                session,
                Action::Create,
                &Resource::AccessRequest {
                    patient_id: Some(patient_id),
                },
            )
            .await?;
        self.requests
            .create(caller.user_id, patient_id, reason, session.ip())
            .await
    }

    pub async fn review_access_request(
        &self,
        session: &Session,
        id: Uuid,
        decision: ReviewDecision,
    ) -> Result<AccessRequest, Error> {
        let caller = self
            .authorize(
                session,
                Action::Update,
                &Resource::AccessRequest { patient_id: None },
            )
            .await?;
        self.requests
            .review(id, decision, caller.user_id, session.ip())
            .await
    }

    pub async fn access_request(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<AccessRequest, Error> {
        self.authorize(
            session,
            Action::Read,
            &Resource::AccessRequest { patient_id: None },
        )
        .await?;
        Ok(self.store.access_request(id).await?)
    }

    // ------------------------------------------------------------------
    // Security alerts
    // ------------------------------------------------------------------

    pub async fn raise_security_alert(
        &self,
        session: &Session,
        alert: NewSecurityAlert,
    ) -> Result<SecurityAlert, Error> {
        let caller = self
            .authorize(session, Action::Create, &Resource::SecurityAlert { id: None })
            .await?;
        let audit = self.entry(
            &caller,
            AuditAction::CreateSecurityAlert,
            ResourceKind::SecurityAlert,
            session,
        );
        Ok(self.store.insert_security_alert(alert, audit).await?)
    }

    /// Resolve an alert exactly once.
    pub async fn resolve_security_alert(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<SecurityAlert, Error> {
        let caller = self
            .authorize(
                session,
                Action::Update,
                &Resource::SecurityAlert { id: Some(id) },
            )
            .await?;

        // Fast path for a precise error; the store's unresolved guard is
        // what keeps concurrent resolvers from both committing
        let mut alert = self.store.security_alert(id).await?;
        if alert.resolved {
            return Err(WorkflowError::AlertAlreadyResolved { id }.into());
        }

        // Resolved flag, resolver and resolution time change together
        alert.resolved = true;
        alert.resolver_id = Some(caller.user_id);
        alert.resolved_at = Some(Utc::now());

        let audit = self
            .entry(
                &caller,
                AuditAction::ResolvedSecurityAlert,
                ResourceKind::SecurityAlert,
                session,
            )
            .resource_id(id);
        match self.store.update_security_alert(alert, audit).await {
            Ok(alert) => Ok(alert),
            // Another resolver won the race between our read and write
            Err(StoreError::Conflict { .. }) => {
                Err(WorkflowError::AlertAlreadyResolved { id }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn security_alerts(&self, session: &Session) -> Result<Vec<SecurityAlert>, Error> {
        self.authorize(session, Action::Read, &Resource::SecurityAlert { id: None })
            .await?;
        Ok(self.store.security_alerts().await?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    ///
    /// Evaluate the policy for this request, recording a denial entry when
    /// it denies. Runs before any store mutation.
    ///
    async fn authorize(
        &self,
        session: &Session,
        action: Action,
        resource: &Resource,
    ) -> Result<Caller, Error> {
        let caller = session.caller().ok_or(Error::AuthenticationRequired)?;
        let grant = self.grant_for(caller, resource).await?;

        match evaluate(Some(caller), action, resource, grant) {
            Decision::Allow => {
                counter!(OPERATIONS_TOTAL).increment(1);
                Ok(caller.clone())
            }
            Decision::Deny(reason) => {
                warn!(
                    target: POLICY,
                    msg = "Operation denied",
                    user = %caller.user_id,
                    role = %caller.role,
                    action = ?action,
                    reason = %reason,
                );
                let (kind, resource_id, patient_id) = describe(resource);
                self.recorder
                    .record_denial(
                        Some(caller.user_id),
                        kind,
                        resource_id,
                        patient_id,
                        session.ip(),
                        reason,
                    )
                    .await;
                Err(Error::AuthorizationDenied(reason))
            }
        }
    }

    /// Look up the caller's access-request grant when the resource sits
    /// outside their hospital scope. In-scope and non-staff callers never
    /// need one.
    async fn grant_for(&self, caller: &Caller, resource: &Resource) -> Result<AccessGrant, Error> {
        if !caller.role.is_staff() {
            return Ok(AccessGrant::None);
        }

        let (hospital_id, patient_id) = match resource {
            Resource::Patient {
                id: Some(id),
                hospital_id,
            } => (*hospital_id, *id),
            Resource::MedicalRecord {
                patient_id,
                hospital_id,
                ..
            }
            | Resource::VitalSigns {
                patient_id,
                hospital_id,
            } => (*hospital_id, *patient_id),
            _ => return Ok(AccessGrant::None),
        };

        if caller.hospital_id == Some(hospital_id) {
            return Ok(AccessGrant::None);
        }
        self.requests.grant_for(caller.user_id, patient_id).await
    }

    fn entry(
        &self,
        caller: &Caller,
        action: AuditAction,
        resource: ResourceKind,
        session: &Session,
    ) -> NewAuditEntry {
        NewAuditEntry::new(Some(caller.user_id), action, resource, session.ip())
    }
}

/// Reduce a policy resource to the fields a denial entry carries.
fn describe(resource: &Resource) -> (ResourceKind, Option<Uuid>, Option<Uuid>) {
    match resource {
        Resource::User { id } => (ResourceKind::User, *id, None),
        Resource::Hospital { id } => (ResourceKind::Hospital, *id, None),
        Resource::Patient { id, .. } => (ResourceKind::Patient, *id, *id),
        Resource::MedicalRecord { patient_id, .. } => {
            (ResourceKind::MedicalRecord, None, Some(*patient_id))
        }
        Resource::VitalSigns { patient_id, .. } => {
            (ResourceKind::VitalSigns, None, Some(*patient_id))
        }
        Resource::AuditTrail { patient_id } => (ResourceKind::AuditTrail, None, *patient_id),
        Resource::AccessRequest { patient_id } => (ResourceKind::AccessRequest, None, *patient_id),
        Resource::SecurityAlert { id } => (ResourceKind::SecurityAlert, *id, None),
    }
}
