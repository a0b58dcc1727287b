//! The single home for role and hospital-scope rules.
//!
//! `evaluate` is a pure function over the caller, the requested action and a
//! descriptor of the target resource. Denial is a normal outcome, not an
//! error; recording denials and translating them for the outside world is
//! the caller's responsibility.

use crate::model::Role;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAuthenticated,
    InsufficientRole,
    WrongHospitalScope,
    NoApprovedAccess,
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenyReason::NotAuthenticated => "not_authenticated",
            DenyReason::InsufficientRole => "insufficient_role",
            DenyReason::WrongHospitalScope => "wrong_hospital_scope",
            DenyReason::NoApprovedAccess => "no_approved_access",
        };
        write!(f, "{s}")
    }
}

///
/// Outcome of the access-request lookup for a (requester, patient) pair.
///
/// `Requested` means a request is on file but is not (or is no longer)
/// approved, which earns a more specific deny reason than having never
/// asked.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessGrant {
    #[default]
    None,
    Requested,
    Approved,
}

/// The authenticated identity a request runs as.
#[derive(Clone, Debug, PartialEq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    /// Staff affiliation. `None` for patients and unaffiliated users.
    pub hospital_id: Option<Uuid>,
    /// Set when the caller is a patient, to their own patient id.
    pub patient_id: Option<Uuid>,
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role, hospital_id: Option<Uuid>) -> Self {
        Caller {
            user_id,
            role,
            hospital_id,
            patient_id: None,
        }
    }

    pub fn with_patient(mut self, patient_id: Uuid) -> Self {
        self.patient_id = Some(patient_id);
        self
    }
}

/// What is being accessed, reduced to the fields the rule table needs.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    User {
        id: Option<Uuid>,
    },
    Hospital {
        id: Option<Uuid>,
    },
    Patient {
        id: Option<Uuid>,
        hospital_id: Uuid,
    },
    MedicalRecord {
        patient_id: Uuid,
        hospital_id: Uuid,
        /// Authoring doctor, when the record already exists.
        doctor_id: Option<Uuid>,
    },
    VitalSigns {
        patient_id: Uuid,
        hospital_id: Uuid,
    },
    AuditTrail {
        /// `None` is the unfiltered admin view.
        patient_id: Option<Uuid>,
    },
    AccessRequest {
        patient_id: Option<Uuid>,
    },
    SecurityAlert {
        id: Option<Uuid>,
    },
}

///
/// Decide whether `caller` may perform `action` on `resource`.
///
/// `grant` is the pre-computed access-request status for the caller and the
/// resource's patient; passing it in keeps this function free of side
/// effects and store lookups.
///
/// Rule table:
/// - admin: allow everything.
/// - doctor/nurse: read and create within their own hospital; doctors
///   update only records they authored; nurses never write record content;
///   cross-hospital reads need an approved access request; cross-hospital
///   writes are always out of scope.
/// - patient: read-only access to their own patient row, records, vitals
///   and audit trail.
///
pub fn evaluate(
    caller: Option<&Caller>,
    action: Action,
    resource: &Resource,
    grant: AccessGrant,
) -> Decision {
    let caller = match caller {
        Some(caller) => caller,
        None => return Decision::Deny(DenyReason::NotAuthenticated),
    };

    if caller.role == Role::Admin {
        return Decision::Allow;
    }

    match resource {
        Resource::User { id } => match action {
            // Non-admin users may read their own account, nothing else
            Action::Read if *id == Some(caller.user_id) => Decision::Allow,
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },

        // Reference data, readable by any authenticated caller
        Resource::Hospital { .. } => match action {
            Action::Read => Decision::Allow,
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },

        Resource::Patient { id, hospital_id } => match caller.role {
            Role::Patient => match action {
                Action::Read if owns(caller, *id) => Decision::Allow,
                _ => Decision::Deny(DenyReason::InsufficientRole),
            },
            Role::Doctor | Role::Nurse => {
                if in_scope(caller, *hospital_id) {
                    match action {
                        Action::Read | Action::Create => Decision::Allow,
                        Action::Update if caller.role == Role::Doctor => Decision::Allow,
                        _ => Decision::Deny(DenyReason::InsufficientRole),
                    }
                } else {
                    cross_hospital(action, grant)
                }
            }
            Role::Admin => Decision::Allow,
        },

        Resource::MedicalRecord {
            patient_id,
            hospital_id,
            doctor_id,
        } => match caller.role {
            Role::Patient => match action {
                Action::Read if owns(caller, Some(*patient_id)) => Decision::Allow,
                _ => Decision::Deny(DenyReason::InsufficientRole),
            },
            Role::Doctor => {
                if in_scope(caller, *hospital_id) {
                    match action {
                        Action::Read | Action::Create => Decision::Allow,
                        // Only the authoring doctor may revise a record
                        Action::Update if *doctor_id == Some(caller.user_id) => Decision::Allow,
                        _ => Decision::Deny(DenyReason::InsufficientRole),
                    }
                } else {
                    cross_hospital(action, grant)
                }
            }
            Role::Nurse => {
                if in_scope(caller, *hospital_id) {
                    match action {
                        Action::Read => Decision::Allow,
                        _ => Decision::Deny(DenyReason::InsufficientRole),
                    }
                } else {
                    cross_hospital(action, grant)
                }
            }
            Role::Admin => Decision::Allow,
        },

        Resource::VitalSigns {
            patient_id,
            hospital_id,
        } => match caller.role {
            Role::Patient => match action {
                Action::Read if owns(caller, Some(*patient_id)) => Decision::Allow,
                _ => Decision::Deny(DenyReason::InsufficientRole),
            },
            Role::Doctor | Role::Nurse => {
                if in_scope(caller, *hospital_id) {
                    match action {
                        // Append-only: no update or delete even in scope
                        Action::Read | Action::Create => Decision::Allow,
                        _ => Decision::Deny(DenyReason::InsufficientRole),
                    }
                } else {
                    cross_hospital(action, grant)
                }
            }
            Role::Admin => Decision::Allow,
        },

        Resource::AuditTrail { patient_id } => match (caller.role, action) {
            // "Who accessed my records": patients read their own trail
            (Role::Patient, Action::Read) if owns(caller, *patient_id) => Decision::Allow,
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },

        Resource::AccessRequest { .. } => match action {
            // Any authenticated user may ask
            Action::Create => Decision::Allow,
            Action::Read | Action::Update if caller.role.can_review_access_requests() => {
                Decision::Allow
            }
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },

        Resource::SecurityAlert { .. } => match action {
            // Anyone may raise an alert; review and resolution are admin-only
            Action::Create => Decision::Allow,
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },
    }
}

fn in_scope(caller: &Caller, hospital_id: Uuid) -> bool {
    caller.hospital_id == Some(hospital_id)
}

fn owns(caller: &Caller, patient_id: Option<Uuid>) -> bool {
    patient_id.is_some() && caller.patient_id == patient_id
}

///
/// Cross-hospital access. An approved request grants read access only;
/// writes stay out of scope regardless of any grant.
///
fn cross_hospital(action: Action, grant: AccessGrant) -> Decision {
    match (action, grant) {
        (Action::Read, AccessGrant::Approved) => Decision::Allow,
        (Action::Read, AccessGrant::Requested) => Decision::Deny(DenyReason::NoApprovedAccess),
        _ => Decision::Deny(DenyReason::WrongHospitalScope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    fn admin() -> Caller {
        Caller::new(Uuid::new_v4(), Role::Admin, None)
    }

    fn doctor(hospital_id: Uuid) -> Caller {
        Caller::new(Uuid::new_v4(), Role::Doctor, Some(hospital_id))
    }

    fn nurse(hospital_id: Uuid) -> Caller {
        Caller::new(Uuid::new_v4(), Role::Nurse, Some(hospital_id))
    }

    fn patient(patient_id: Uuid) -> Caller {
        Caller::new(Uuid::new_v4(), Role::Patient, None).with_patient(patient_id)
    }

    #[test]
    fn unauthenticated_is_denied() {
        let (h1, p1, _) = ids();
        let resource = Resource::Patient {
            id: Some(p1),
            hospital_id: h1,
        };
        assert_eq!(
            evaluate(None, Action::Read, &resource, AccessGrant::None),
            Decision::Deny(DenyReason::NotAuthenticated)
        );
    }

    #[test]
    fn admin_is_allowed_everything() {
        let (h1, p1, r1) = ids();
        let caller = admin();
        let resources = [
            Resource::User { id: Some(r1) },
            Resource::Hospital { id: Some(h1) },
            Resource::Patient {
                id: Some(p1),
                hospital_id: h1,
            },
            Resource::MedicalRecord {
                patient_id: p1,
                hospital_id: h1,
                doctor_id: None,
            },
            Resource::VitalSigns {
                patient_id: p1,
                hospital_id: h1,
            },
            Resource::AuditTrail { patient_id: None },
            Resource::AccessRequest { patient_id: None },
            Resource::SecurityAlert { id: None },
        ];
        for resource in &resources {
            for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
                assert_eq!(
                    evaluate(Some(&caller), action, resource, AccessGrant::None),
                    Decision::Allow,
                    "admin {action:?} on {resource:?}"
                );
            }
        }
    }

    // The (role, action, scope) rule table from the policy contract
    #[test]
    fn staff_rule_table() {
        let (h1, h2, p1) = ids();
        let own = Resource::Patient {
            id: Some(p1),
            hospital_id: h1,
        };
        let other = Resource::Patient {
            id: Some(p1),
            hospital_id: h2,
        };

        let table: Vec<(Caller, Action, &Resource, AccessGrant, Decision)> = vec![
            (doctor(h1), Action::Read, &own, AccessGrant::None, Decision::Allow),
            (doctor(h1), Action::Create, &own, AccessGrant::None, Decision::Allow),
            (doctor(h1), Action::Update, &own, AccessGrant::None, Decision::Allow),
            (
                doctor(h1),
                Action::Delete,
                &own,
                AccessGrant::None,
                Decision::Deny(DenyReason::InsufficientRole),
            ),
            (nurse(h1), Action::Read, &own, AccessGrant::None, Decision::Allow),
            (nurse(h1), Action::Create, &own, AccessGrant::None, Decision::Allow),
            (
                nurse(h1),
                Action::Update,
                &own,
                AccessGrant::None,
                Decision::Deny(DenyReason::InsufficientRole),
            ),
            (
                doctor(h1),
                Action::Read,
                &other,
                AccessGrant::None,
                Decision::Deny(DenyReason::WrongHospitalScope),
            ),
            (
                doctor(h1),
                Action::Read,
                &other,
                AccessGrant::Requested,
                Decision::Deny(DenyReason::NoApprovedAccess),
            ),
            (doctor(h1), Action::Read, &other, AccessGrant::Approved, Decision::Allow),
            (
                doctor(h1),
                Action::Update,
                &other,
                AccessGrant::Approved,
                Decision::Deny(DenyReason::WrongHospitalScope),
            ),
            (
                nurse(h1),
                Action::Create,
                &other,
                AccessGrant::None,
                Decision::Deny(DenyReason::WrongHospitalScope),
            ),
        ];

        for (caller, action, resource, grant, expected) in table {
            assert_eq!(
                evaluate(Some(&caller), action, resource, grant),
                expected,
                "{} {action:?} grant={grant:?}",
                caller.role
            );
        }
    }

    #[test]
    fn doctor_updates_only_own_records() {
        let (h1, p1, _) = ids();
        let author = doctor(h1);
        let colleague = doctor(h1);

        let record = Resource::MedicalRecord {
            patient_id: p1,
            hospital_id: h1,
            doctor_id: Some(author.user_id),
        };

        assert_eq!(
            evaluate(Some(&author), Action::Update, &record, AccessGrant::None),
            Decision::Allow
        );
        assert_eq!(
            evaluate(Some(&colleague), Action::Update, &record, AccessGrant::None),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        // Colleagues in the same hospital may still read
        assert_eq!(
            evaluate(Some(&colleague), Action::Read, &record, AccessGrant::None),
            Decision::Allow
        );
    }

    #[test]
    fn nurse_records_vitals_but_not_record_content() {
        let (h1, p1, _) = ids();
        let caller = nurse(h1);

        let vitals = Resource::VitalSigns {
            patient_id: p1,
            hospital_id: h1,
        };
        let record = Resource::MedicalRecord {
            patient_id: p1,
            hospital_id: h1,
            doctor_id: None,
        };

        assert_eq!(
            evaluate(Some(&caller), Action::Create, &vitals, AccessGrant::None),
            Decision::Allow
        );
        assert_eq!(
            evaluate(Some(&caller), Action::Create, &record, AccessGrant::None),
            Decision::Deny(DenyReason::InsufficientRole)
        );
    }

    #[test]
    fn vitals_are_append_only_for_staff() {
        let (h1, p1, _) = ids();
        let vitals = Resource::VitalSigns {
            patient_id: p1,
            hospital_id: h1,
        };
        for caller in [doctor(h1), nurse(h1)] {
            assert_eq!(
                evaluate(Some(&caller), Action::Update, &vitals, AccessGrant::None),
                Decision::Deny(DenyReason::InsufficientRole)
            );
            assert_eq!(
                evaluate(Some(&caller), Action::Delete, &vitals, AccessGrant::None),
                Decision::Deny(DenyReason::InsufficientRole)
            );
        }
    }

    #[test]
    fn patient_reads_own_data_only() {
        let (h1, p1, p2) = ids();
        let caller = patient(p1);

        let own = Resource::MedicalRecord {
            patient_id: p1,
            hospital_id: h1,
            doctor_id: None,
        };
        let someone_elses = Resource::MedicalRecord {
            patient_id: p2,
            hospital_id: h1,
            doctor_id: None,
        };

        assert_eq!(
            evaluate(Some(&caller), Action::Read, &own, AccessGrant::None),
            Decision::Allow
        );
        assert_eq!(
            evaluate(Some(&caller), Action::Read, &someone_elses, AccessGrant::None),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        // No write access to clinical data at all
        assert_eq!(
            evaluate(Some(&caller), Action::Update, &own, AccessGrant::None),
            Decision::Deny(DenyReason::InsufficientRole)
        );
    }

    #[test]
    fn patient_reads_own_audit_trail() {
        let (_, p1, p2) = ids();
        let caller = patient(p1);

        assert_eq!(
            evaluate(
                Some(&caller),
                Action::Read,
                &Resource::AuditTrail { patient_id: Some(p1) },
                AccessGrant::None
            ),
            Decision::Allow
        );
        assert_eq!(
            evaluate(
                Some(&caller),
                Action::Read,
                &Resource::AuditTrail { patient_id: Some(p2) },
                AccessGrant::None
            ),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        // The unfiltered view stays admin-only
        assert_eq!(
            evaluate(
                Some(&caller),
                Action::Read,
                &Resource::AuditTrail { patient_id: None },
                AccessGrant::None
            ),
            Decision::Deny(DenyReason::InsufficientRole)
        );
    }

    #[test]
    fn anyone_may_request_access_but_only_reviewers_review() {
        let (h1, p1, _) = ids();
        let request = Resource::AccessRequest {
            patient_id: Some(p1),
        };

        for caller in [doctor(h1), nurse(h1), patient(p1)] {
            assert_eq!(
                evaluate(Some(&caller), Action::Create, &request, AccessGrant::None),
                Decision::Allow
            );
        }

        assert_eq!(
            evaluate(Some(&doctor(h1)), Action::Update, &request, AccessGrant::None),
            Decision::Allow
        );
        for caller in [nurse(h1), patient(p1)] {
            assert_eq!(
                evaluate(Some(&caller), Action::Update, &request, AccessGrant::None),
                Decision::Deny(DenyReason::InsufficientRole)
            );
        }
    }

    #[test]
    fn alerts_raised_by_anyone_resolved_by_admin() {
        let (h1, p1, a1) = ids();
        let alert = Resource::SecurityAlert { id: Some(a1) };

        for caller in [doctor(h1), nurse(h1), patient(p1)] {
            assert_eq!(
                evaluate(Some(&caller), Action::Create, &alert, AccessGrant::None),
                Decision::Allow
            );
            assert_eq!(
                evaluate(Some(&caller), Action::Update, &alert, AccessGrant::None),
                Decision::Deny(DenyReason::InsufficientRole)
            );
        }
        assert_eq!(
            evaluate(Some(&admin()), Action::Update, &alert, AccessGrant::None),
            Decision::Allow
        );
    }
}
