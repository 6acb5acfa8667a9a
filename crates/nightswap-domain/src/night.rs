//! Night ownership and lock state.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::{OccupantId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Committed owner of a night.
pub enum NightOwner {
    Occupant(OccupantId),
    /// Co-owned by two occupants (split use). Stored in ascending id order.
    Shared(OccupantId, OccupantId),
}

impl NightOwner {
    pub fn shared(a: OccupantId, b: OccupantId) -> Self {
        if a <= b {
            NightOwner::Shared(a, b)
        } else {
            NightOwner::Shared(b, a)
        }
    }

    /// Returns true only when `id` is the single committed owner.
    pub fn is_sole(&self, id: OccupantId) -> bool {
        matches!(self, NightOwner::Occupant(owner) if *owner == id)
    }

    pub fn includes(&self, id: OccupantId) -> bool {
        match self {
            NightOwner::Occupant(owner) => *owner == id,
            NightOwner::Shared(a, b) => *a == id || *b == id,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, NightOwner::Shared(..))
    }
}

impl fmt::Display for NightOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NightOwner::Occupant(id) => write!(f, "{}", id.short()),
            NightOwner::Shared(a, b) => write!(f, "shared({}, {})", a.short(), b.short()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Whether an in-flight request holds the night.
pub enum LockState {
    #[default]
    Free,
    Pending(RequestId),
}

impl LockState {
    pub fn holder(&self) -> Option<RequestId> {
        match self {
            LockState::Free => None,
            LockState::Pending(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One calendar date of a lease, the atomic unit of ownership.
pub struct Night {
    pub date: NaiveDate,
    pub owner: NightOwner,
    #[serde(default)]
    pub lock: LockState,
}

impl Night {
    pub fn new(date: NaiveDate, owner: NightOwner) -> Self {
        Self {
            date,
            owner,
            lock: LockState::Free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_owner_is_order_independent() {
        let a = OccupantId::new();
        let b = OccupantId::new();
        assert_eq!(NightOwner::shared(a, b), NightOwner::shared(b, a));
        let owner = NightOwner::shared(a, b);
        assert!(owner.includes(a) && owner.includes(b));
        assert!(!owner.is_sole(a));
    }
}
