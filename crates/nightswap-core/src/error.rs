use chrono::NaiveDate;
use nightswap_domain::{LeaseId, RequestId, RequestStatus};
use thiserror::Error;

use crate::night_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Conflict on {date}: {reason}")]
    Conflict { date: NaiveDate, reason: String },
    #[error("Not authorized: {0}")]
    NotAuthorized(String),
    #[error("Cannot {action} request {request}: status is {status}")]
    InvalidState {
        request: RequestId,
        status: RequestStatus,
        action: &'static str,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Lease not found: {0}")]
    LeaseNotFound(LeaseId),
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Outcome classes a caller switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    NotAuthorized,
    InvalidState,
    Validation,
    NotFound,
    Storage,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            CoreError::InvalidState { .. } => ErrorKind::InvalidState,
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::LeaseNotFound(_) | CoreError::RequestNotFound(_) => ErrorKind::NotFound,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<LedgerError> for CoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyLocked { date, .. }
            | LedgerError::StaleOwner { date, .. }
            | LedgerError::LockMismatch { date, .. } => CoreError::Conflict {
                date,
                reason: err.to_string(),
            },
            LedgerError::UnknownNight(_)
            | LedgerError::Unassigned(_)
            | LedgerError::NotAParty(_) => CoreError::Validation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}
