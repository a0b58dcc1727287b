//! Access-request workflow.
//!
//! Pending → Approved or Denied, exactly once. Reviewer and review time
//! move atomically with the status; a terminal request can never be
//! reviewed again. An approved request grants cross-scope read access,
//! optionally time-boxed by `access.approval_ttl_hours`.

use crate::error::{Error, StoreError, WorkflowError};
use crate::log::WORKFLOW;
use crate::model::{
    AccessRequest, AccessStatus, AuditAction, NewAccessRequest, NewAuditEntry, ResourceKind,
    ReviewDecision,
};
use crate::policy::AccessGrant;
use crate::prometheus::{ACCESS_REQUESTS_TOTAL, ACCESS_REVIEWS_TOTAL};
use crate::store::EntityStore;
use chrono::{Duration, Utc};
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct AccessRequests {
    store: Arc<dyn EntityStore>,
    approval_ttl: Option<Duration>,
}

impl AccessRequests {
    pub fn new(store: Arc<dyn EntityStore>, approval_ttl: Option<Duration>) -> Self {
        AccessRequests {
            store,
            approval_ttl,
        }
    }

    /// File a Pending request. The reason is mandatory.
    pub async fn create(
        &self,
        requester_id: Uuid,
        patient_id: Uuid,
        reason: &str,
        ip: IpAddr,
    ) -> Result<AccessRequest, Error> {
        if reason.trim().is_empty() {
            return Err(WorkflowError::EmptyReason.into());
        }

        let audit = NewAuditEntry::new(
            Some(requester_id),
            AuditAction::CreateAccessRequest,
            ResourceKind::AccessRequest,
            ip,
        )
        .patient(patient_id);

        let request = self
            .store
            .insert_access_request(
                NewAccessRequest {
                    requester_id,
                    patient_id,
                    reason: reason.to_string(),
                },
                audit,
            )
            .await?;

        counter!(ACCESS_REQUESTS_TOTAL).increment(1);
        info!(
            target: WORKFLOW,
            msg = "Access request created",
            id = %request.id,
            patient = %request.patient_id,
        );
        Ok(request)
    }

    ///
    /// Transition a Pending request to Approved or Denied.
    ///
    /// Fails with `InvalidStateTransition` if the request is already
    /// terminal, and writes the matching audit entry in the same unit of
    /// work as the transition. The check here is only a fast path for a
    /// precise error; the store's Pending guard is what keeps concurrent
    /// reviewers from both committing.
    ///
    pub async fn review(
        &self,
        id: Uuid,
        decision: ReviewDecision,
        reviewer_id: Uuid,
        ip: IpAddr,
    ) -> Result<AccessRequest, Error> {
        let mut request = self.store.access_request(id).await?;

        if request.status.is_terminal() {
            return Err(WorkflowError::InvalidStateTransition {
                id,
                status: request.status,
            }
            .into());
        }

        let (status, action) = match decision {
            ReviewDecision::Approve => (AccessStatus::Approved, AuditAction::ApprovedAccessRequest),
            ReviewDecision::Deny => (AccessStatus::Denied, AuditAction::DeniedAccessRequest),
        };

        // Status, reviewer and review time change together
        request.status = status;
        request.reviewer_id = Some(reviewer_id);
        request.reviewed_at = Some(Utc::now());

        let audit = NewAuditEntry::new(Some(reviewer_id), action, ResourceKind::AccessRequest, ip)
            .resource_id(request.id)
            .patient(request.patient_id);

        let request = match self.store.update_access_request(request, audit).await {
            Ok(request) => request,
            // Another reviewer won the race between our read and write
            Err(StoreError::Conflict { .. }) => {
                let current = self.store.access_request(id).await?;
                return Err(WorkflowError::InvalidStateTransition {
                    id,
                    status: current.status,
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        counter!(ACCESS_REVIEWS_TOTAL).increment(1);
        info!(
            target: WORKFLOW,
            msg = "Access request reviewed",
            id = %request.id,
            status = %request.status,
        );
        Ok(request)
    }

    ///
    /// Grant status for a (requester, patient) pair, fed into the policy.
    ///
    /// An expired approval counts as a request on file without approval, so
    /// the requester is denied with `NoApprovedAccess` and must file again.
    ///
    pub async fn grant_for(
        &self,
        requester_id: Uuid,
        patient_id: Uuid,
    ) -> Result<AccessGrant, Error> {
        let requests = self.store.requests_for(requester_id, patient_id).await?;

        if requests
            .iter()
            .any(|r| r.status == AccessStatus::Approved && !self.expired(r))
        {
            Ok(AccessGrant::Approved)
        } else if requests.is_empty() {
            Ok(AccessGrant::None)
        } else {
            Ok(AccessGrant::Requested)
        }
    }

    fn expired(&self, request: &AccessRequest) -> bool {
        match (self.approval_ttl, request.reviewed_at) {
            (Some(ttl), Some(reviewed_at)) => reviewed_at + ttl < Utc::now(),
            _ => false,
        }
    }
}
