//! The audit trail is the system's compliance record: exactly one entry per
//! audited operation, appended after the operation persists and before the
//! caller sees success. A lost entry fails the operation (fail-closed).

use crate::config::AuditConfig;
use crate::error::{AuditError, Error};
use crate::log::AUDIT;
use crate::model::{AuditAction, AuditLogEntry, NewAuditEntry, ResourceKind};
use crate::policy::DenyReason;
use crate::prometheus::{AUDIT_ENTRIES_TOTAL, AUDIT_WRITE_FAILURES_TOTAL, AUTHZ_DENIALS_TOTAL};
use crate::store::EntityStore;
use metrics::counter;
use serde_json::json;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn EntityStore>,
    page_size: usize,
    record_denials: bool,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn EntityStore>, config: &AuditConfig) -> Self {
        AuditRecorder {
            store,
            page_size: config.page_size,
            record_denials: config.record_denials,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    ///
    /// Append an entry for an audited read.
    ///
    /// Mutations pair their entry with the write inside the store instead;
    /// this path is for operations with nothing to roll back. A failed
    /// append still fails the enclosing operation.
    ///
    pub async fn record(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, Error> {
        match self.store.append_audit_entry(entry).await {
            Ok(entry) => {
                counter!(AUDIT_ENTRIES_TOTAL).increment(1);
                debug!(
                    target: AUDIT,
                    msg = "Appended audit entry",
                    action = %entry.action,
                    resource = %entry.resource,
                );
                Ok(entry)
            }
            Err(err) => {
                counter!(AUDIT_WRITE_FAILURES_TOTAL).increment(1);
                error!(
                    target: AUDIT,
                    msg = "Audit entry could not be written",
                    error = err.to_string(),
                );
                Err(Error::Audit(AuditError::WriteFailed {
                    reason: err.to_string(),
                }))
            }
        }
    }

    ///
    /// Record an authorization denial, if denial auditing is enabled.
    ///
    /// The denied operation has already failed; losing the denial entry is
    /// logged and counted but never masks the denial itself.
    ///
    pub async fn record_denial(
        &self,
        actor_id: Option<Uuid>,
        resource: ResourceKind,
        resource_id: Option<Uuid>,
        patient_id: Option<Uuid>,
        ip: IpAddr,
        reason: DenyReason,
    ) {
        counter!(AUTHZ_DENIALS_TOTAL).increment(1);

        if !self.record_denials {
            return;
        }

        let mut entry = NewAuditEntry::new(actor_id, AuditAction::AccessDenied, resource, ip)
            .detail(json!({ "reason": reason.to_string() }));
        entry.resource_id = resource_id;
        entry.patient_id = patient_id;

        match self.store.append_audit_entry(entry).await {
            Ok(_) => counter!(AUDIT_ENTRIES_TOTAL).increment(1),
            Err(err) => {
                counter!(AUDIT_WRITE_FAILURES_TOTAL).increment(1);
                warn!(
                    target: AUDIT,
                    msg = "Denial entry could not be written",
                    error = err.to_string(),
                );
            }
        }
    }

    /// Unfiltered trail, newest first, capped at the configured page size.
    pub async fn trail(&self, limit: Option<usize>) -> Result<Vec<AuditLogEntry>, Error> {
        let limit = limit.unwrap_or(self.page_size).min(self.page_size);
        Ok(self.store.audit_entries(limit).await?)
    }

    /// The "who accessed my records" view.
    pub async fn trail_for_patient(
        &self,
        patient_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, Error> {
        let limit = limit.unwrap_or(self.page_size).min(self.page_size);
        Ok(self
            .store
            .audit_entries_for_patient(patient_id, limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::store::MemoryStore;

    fn ip() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    fn recorder(store: Arc<MemoryStore>, record_denials: bool) -> AuditRecorder {
        AuditRecorder::new(
            store,
            &AuditConfig {
                page_size: 3,
                record_denials,
            },
        )
    }

    #[tokio::test]
    async fn record_fails_closed_when_the_store_rejects_the_entry() {
        let store = Arc::new(MemoryStore::new());
        let recorder = recorder(store.clone(), true);

        store.fail_audit_appends(true);
        let err = recorder
            .record(NewAuditEntry::new(
                Some(Uuid::new_v4()),
                AuditAction::ViewPatient,
                ResourceKind::Patient,
                ip(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Audit(AuditError::WriteFailed { .. })));
    }

    #[tokio::test]
    async fn trail_is_capped_at_the_configured_page_size() {
        let store = Arc::new(MemoryStore::new());
        let recorder = recorder(store.clone(), true);

        for _ in 0..5 {
            recorder
                .record(NewAuditEntry::new(
                    Some(Uuid::new_v4()),
                    AuditAction::ViewPatient,
                    ResourceKind::Patient,
                    ip(),
                ))
                .await
                .unwrap();
        }

        assert_eq!(recorder.trail(None).await.unwrap().len(), 3);
        // An explicit limit cannot exceed the cap either
        assert_eq!(recorder.trail(Some(100)).await.unwrap().len(), 3);
        assert_eq!(recorder.trail(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denials_are_recorded_only_when_enabled() {
        let store = Arc::new(MemoryStore::new());

        let silent = recorder(store.clone(), false);
        silent
            .record_denial(
                None,
                ResourceKind::Patient,
                None,
                None,
                ip(),
                DenyReason::WrongHospitalScope,
            )
            .await;
        assert!(store.audit_entries(10).await.unwrap().is_empty());

        let loud = recorder(store.clone(), true);
        loud.record_denial(
            None,
            ResourceKind::Patient,
            None,
            None,
            ip(),
            DenyReason::WrongHospitalScope,
        )
        .await;
        let entries = store.audit_entries(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::AccessDenied);
        assert_eq!(
            entries[0].detail,
            Some(json!({ "reason": "wrong_hospital_scope" }))
        );
    }
}
