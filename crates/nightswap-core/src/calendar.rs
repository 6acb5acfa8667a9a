//! Calendar read models for rendering.

use chrono::NaiveDate;
use nightswap_domain::{NightOwner, OccupantId, RequestId};

use crate::night_ledger::NightLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub owner: NightOwner,
    pub pending: Option<RequestId>,
}

/// A night's ownership relative to one occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStanding {
    Mine,
    Theirs(OccupantId),
    SharedWithMe(OccupantId),
    SharedByOthers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerspectiveDay {
    pub date: NaiveDate,
    pub standing: DayStanding,
    pub pending: Option<RequestId>,
}

pub(crate) fn days(ledger: &NightLedger) -> Vec<CalendarDay> {
    ledger
        .nights()
        .map(|night| CalendarDay {
            date: night.date,
            owner: night.owner,
            pending: night.lock.holder(),
        })
        .collect()
}

pub(crate) fn days_for(ledger: &NightLedger, perspective: OccupantId) -> Vec<PerspectiveDay> {
    ledger
        .nights()
        .map(|night| {
            let standing = match night.owner {
                NightOwner::Occupant(owner) if owner == perspective => DayStanding::Mine,
                NightOwner::Occupant(owner) => DayStanding::Theirs(owner),
                NightOwner::Shared(a, b) if a == perspective => DayStanding::SharedWithMe(b),
                NightOwner::Shared(a, b) if b == perspective => DayStanding::SharedWithMe(a),
                NightOwner::Shared(..) => DayStanding::SharedByOthers,
            };
            PerspectiveDay {
                date: night.date,
                standing,
                pending: night.lock.holder(),
            }
        })
        .collect()
}
