use crate::model::{AccessStatus, ResourceKind};
use crate::policy::DenyReason;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("Caller identity could not be established")]
    AuthenticationRequired,

    #[error("Access denied: {0}")]
    AuthorizationDenied(DenyReason),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// An audit append that could not be persisted. Routed to
    /// `AuditError::WriteFailed` so the enclosing operation fails closed.
    #[error("Audit entry could not be appended: {reason}")]
    AuditAppend { reason: String },

    #[error("Duplicate {resource} for {id}")]
    Conflict { resource: ResourceKind, id: Uuid },

    #[error("{resource} {id} was not found")]
    NotFound { resource: ResourceKind, id: Uuid },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Missing or invalid field {field}")]
    Validation { field: &'static str },
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit entry could not be written: {reason}")]
    WriteFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Security alert {id} is already resolved")]
    AlertAlreadyResolved { id: Uuid },

    #[error("Access request reason must not be empty")]
    EmptyReason,

    #[error("Access request {id} is already {status}")]
    InvalidStateTransition { id: Uuid, status: AccessStatus },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    FileOrEnvironment(#[from] config::ConfigError),

    #[error("Invalid value {value} for {name} in configuration file or environment")]
    InvalidParameter { name: String, value: String },

    #[error("Prometheus exporter could not be started: {reason}")]
    MetricsExporter { reason: String },

    #[error("Missing field {name} from configuration file or environment")]
    MissingParameter { name: String },
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.into())
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            // A lost audit entry must never surface as a generic store
            // failure: the enclosing operation fails as unaudited.
            StoreError::AuditAppend { reason } => Error::Audit(AuditError::WriteFailed { reason }),
            _ => Error::Store(e),
        }
    }
}

impl From<DenyReason> for Error {
    fn from(reason: DenyReason) -> Self {
        Error::AuthorizationDenied(reason)
    }
}
