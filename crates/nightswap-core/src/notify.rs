//! Outbound notifications about request transitions.

use chrono::{DateTime, Utc};
use nightswap_domain::{LeaseId, OccupantId, Request, RequestId, RequestKind, RequestStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// A committed request transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeEvent {
    pub lease_id: LeaseId,
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub initiator: OccupantId,
    pub counterpart: OccupantId,
    pub price: Decimal,
    pub at: DateTime<Utc>,
}

impl ExchangeEvent {
    pub fn from_request(request: &Request, at: DateTime<Utc>) -> Self {
        Self {
            lease_id: request.lease_id,
            request_id: request.id,
            kind: request.kind.clone(),
            status: request.status,
            initiator: request.initiator,
            counterpart: request.counterpart,
            price: request.price,
            at,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort delivery of events. Errors are logged by the caller and never
/// undo the transition that produced the event.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: &ExchangeEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl NotificationDispatcher for NoopDispatcher {
    fn dispatch(&self, _event: &ExchangeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl NotificationDispatcher for TracingDispatcher {
    fn dispatch(&self, event: &ExchangeEvent) -> Result<(), NotifyError> {
        tracing::info!(
            lease = %event.lease_id,
            request = %event.request_id,
            kind = %event.kind,
            status = %event.status,
            price = %event.price,
            "request transition"
        );
        Ok(())
    }
}
