//! Night-exchange requests and their lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    common::{Displayable, NightSet},
    ids::{LeaseId, OccupantId, RequestId},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// What a request asks for. Swap carries the nights offered in exchange.
pub enum RequestKind {
    Buyout,
    Swap { offered_nights: NightSet },
    Share,
}

impl RequestKind {
    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Buyout => "buyout",
            RequestKind::Swap { .. } => "swap",
            RequestKind::Share => "share",
        }
    }

    pub fn offered_nights(&self) -> Option<&NightSet> {
        match self {
            RequestKind::Swap { offered_nights } => Some(offered_nights),
            RequestKind::Buyout | RequestKind::Share => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Lifecycle state of a request. Everything but `Pending` is terminal.
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Countered,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Accepted => "Accepted",
            RequestStatus::Declined => "Declined",
            RequestStatus::Countered => "Countered",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Expired => "Expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Which side of the exchange proposed the request.
///
/// A fresh request is proposed by the acquirer. A counter is proposed by
/// whoever received the previous offer, so the role alternates along a
/// counter chain while the direction of the exchange stays fixed.
pub enum ProposerRole {
    #[default]
    Acquirer,
    Holder,
}

impl ProposerRole {
    pub fn flipped(self) -> Self {
        match self {
            ProposerRole::Acquirer => ProposerRole::Holder,
            ProposerRole::Holder => ProposerRole::Acquirer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub lease_id: LeaseId,
    pub kind: RequestKind,
    /// Party that proposed these terms; only it may cancel.
    pub initiator: OccupantId,
    /// Party that must respond; only it may accept, decline, or counter.
    pub counterpart: OccupantId,
    #[serde(default)]
    pub proposer_role: ProposerRole,
    /// Nights currently held by the holder that the acquirer wants.
    pub target_nights: NightSet,
    /// Adjustment supplied by the proposer, if any.
    pub manual_adjustment: Option<Decimal>,
    /// Signed amount the acquirer pays the holder.
    pub price: Decimal,
    pub status: RequestStatus,
    pub parent_request_id: Option<RequestId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Party that receives the target nights.
    pub fn acquirer(&self) -> OccupantId {
        match self.proposer_role {
            ProposerRole::Acquirer => self.initiator,
            ProposerRole::Holder => self.counterpart,
        }
    }

    /// Party that currently owns the target nights.
    pub fn holder(&self) -> OccupantId {
        match self.proposer_role {
            ProposerRole::Acquirer => self.counterpart,
            ProposerRole::Holder => self.initiator,
        }
    }

    pub fn offered_nights(&self) -> Option<&NightSet> {
        self.kind.offered_nights()
    }

    /// Target and offered nights together: every night the request locks.
    pub fn all_nights(&self) -> NightSet {
        let mut nights = self.target_nights.clone();
        if let Some(offered) = self.offered_nights() {
            nights.extend(offered.iter().copied());
        }
        nights
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn touches_any(&self, nights: &NightSet) -> bool {
        self.all_nights().iter().any(|date| nights.contains(date))
    }

    /// Moves a pending request to `status`. A request transitions at most once;
    /// on failure the current status is returned.
    pub fn resolve(&mut self, status: RequestStatus, at: DateTime<Utc>) -> Result<(), RequestStatus> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(self.status);
        }
        self.status = status;
        self.resolved_at = Some(at);
        Ok(())
    }
}

impl Displayable for Request {
    fn display_label(&self) -> String {
        format!("{} {} [{}]", self.kind, self.id.short(), self.status)
    }
}
