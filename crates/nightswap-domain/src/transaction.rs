//! Settled night transfers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    common::NightSet,
    ids::{LeaseId, OccupantId, RequestId},
    request::RequestKind,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Audit entry written once per accepted request.
pub struct TransactionRecord {
    pub request_id: RequestId,
    pub lease_id: LeaseId,
    pub kind: RequestKind,
    /// Previous holder of `dates`.
    pub from_owner: OccupantId,
    /// Acquirer of `dates`.
    pub to_owner: OccupantId,
    pub dates: NightSet,
    /// Nights flowing the other way (swaps only).
    #[serde(default)]
    pub returned_dates: NightSet,
    pub price: Decimal,
    pub settled_at: DateTime<Utc>,
}
