//! Authoritative per-date ownership map for one lease.
//!
//! The ledger is the only place night ownership changes. A night is claimed by
//! `lock`, transferred by `commit`, and released by `unlock`; the request
//! engine never writes owners directly. Callers serialize access to a ledger
//! (see [`crate::hub::ExchangeHub`]), so the methods here take `&mut self` and
//! do no locking of their own.

use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use nightswap_domain::{Lease, LockState, Night, NightOwner, NightSet, OccupantId, RequestId};

/// How nights are assigned when a lease is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipPattern {
    /// Round-robin over the lease's occupants by day index.
    Alternating,
    /// Every night of the lease mapped to its first owner.
    Explicit(BTreeMap<NaiveDate, OccupantId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    UnknownNight(NaiveDate),
    Unassigned(NaiveDate),
    NotAParty(OccupantId),
    AlreadyLocked {
        date: NaiveDate,
        holder: RequestId,
    },
    StaleOwner {
        date: NaiveDate,
        expected: OccupantId,
        actual: NightOwner,
    },
    LockMismatch {
        date: NaiveDate,
        request: RequestId,
        actual: LockState,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::UnknownNight(date) => write!(f, "{} is outside the lease", date),
            LedgerError::Unassigned(date) => write!(f, "{} has no owner", date),
            LedgerError::NotAParty(id) => write!(f, "{} is not an occupant of the lease", id),
            LedgerError::AlreadyLocked { date, holder } => {
                write!(f, "{} is already claimed by request {}", date, holder.short())
            }
            LedgerError::StaleOwner {
                date,
                expected,
                actual,
            } => write!(
                f,
                "{} is owned by {}, not {}",
                date,
                actual,
                expected.short()
            ),
            LedgerError::LockMismatch {
                date,
                request,
                actual,
            } => match actual.holder() {
                Some(holder) => write!(
                    f,
                    "{} is locked by {}, not {}",
                    date,
                    holder.short(),
                    request.short()
                ),
                None => write!(f, "{} is not locked by {}", date, request.short()),
            },
        }
    }
}

impl std::error::Error for LedgerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightLedger {
    nights: BTreeMap<NaiveDate, Night>,
}

impl NightLedger {
    pub fn new(lease: &Lease, pattern: &OwnershipPattern) -> Result<Self, LedgerError> {
        let mut nights = BTreeMap::new();
        match pattern {
            OwnershipPattern::Alternating => {
                let count = lease.occupants.len();
                for (index, date) in lease.nights().enumerate() {
                    let owner = lease.occupants[index % count].id;
                    nights.insert(date, Night::new(date, NightOwner::Occupant(owner)));
                }
            }
            OwnershipPattern::Explicit(assignments) => {
                if let Some(date) = assignments.keys().find(|date| !lease.contains(**date)) {
                    return Err(LedgerError::UnknownNight(*date));
                }
                for date in lease.nights() {
                    let owner = *assignments.get(&date).ok_or(LedgerError::Unassigned(date))?;
                    if !lease.is_party(owner) {
                        return Err(LedgerError::NotAParty(owner));
                    }
                    nights.insert(date, Night::new(date, NightOwner::Occupant(owner)));
                }
            }
        }
        Ok(Self { nights })
    }

    /// Rebuilds a ledger from persisted nights, keeping their lock state.
    pub fn from_nights(nights: impl IntoIterator<Item = Night>) -> Self {
        Self {
            nights: nights.into_iter().map(|night| (night.date, night)).collect(),
        }
    }

    pub fn get_owner(&self, date: NaiveDate) -> Result<NightOwner, LedgerError> {
        self.nights
            .get(&date)
            .map(|night| night.owner)
            .ok_or(LedgerError::UnknownNight(date))
    }

    pub fn night(&self, date: NaiveDate) -> Option<&Night> {
        self.nights.get(&date)
    }

    pub fn nights(&self) -> impl Iterator<Item = &Night> {
        self.nights.values()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.nights.contains_key(&date)
    }

    /// Nights whose sole owner is `occupant`.
    pub fn owned_by(&self, occupant: OccupantId) -> NightSet {
        self.nights
            .values()
            .filter(|night| night.owner.is_sole(occupant))
            .map(|night| night.date)
            .collect()
    }

    pub fn locked_by(&self, request: RequestId) -> NightSet {
        self.nights
            .values()
            .filter(|night| night.lock == LockState::Pending(request))
            .map(|night| night.date)
            .collect()
    }

    /// Marks `date` pending for `request`, provided `expected_owner` still holds it alone.
    /// Re-locking a night already held by the same request is a no-op.
    pub fn lock(
        &mut self,
        date: NaiveDate,
        request: RequestId,
        expected_owner: OccupantId,
    ) -> Result<(), LedgerError> {
        let night = self
            .nights
            .get_mut(&date)
            .ok_or(LedgerError::UnknownNight(date))?;
        match night.lock {
            LockState::Pending(holder) if holder == request => return Ok(()),
            LockState::Pending(holder) => return Err(LedgerError::AlreadyLocked { date, holder }),
            LockState::Free => {}
        }
        if !night.owner.is_sole(expected_owner) {
            return Err(LedgerError::StaleOwner {
                date,
                expected: expected_owner,
                actual: night.owner,
            });
        }
        night.lock = LockState::Pending(request);
        Ok(())
    }

    /// Locks every claim or none. On failure, locks taken by this call are released.
    pub fn lock_all(
        &mut self,
        claims: &[(NaiveDate, OccupantId)],
        request: RequestId,
    ) -> Result<(), LedgerError> {
        let mut taken = Vec::with_capacity(claims.len());
        for (date, owner) in claims {
            let already_held = self
                .nights
                .get(date)
                .is_some_and(|night| night.lock == LockState::Pending(request));
            if let Err(err) = self.lock(*date, request, *owner) {
                for date in taken {
                    self.unlock(date, request);
                }
                return Err(err);
            }
            if !already_held {
                taken.push(*date);
            }
        }
        Ok(())
    }

    /// Transfers `date` to `new_owner` and clears the lock held by `request`.
    pub fn commit(
        &mut self,
        date: NaiveDate,
        new_owner: NightOwner,
        request: RequestId,
    ) -> Result<(), LedgerError> {
        self.check_lock(date, request)?;
        if let Some(night) = self.nights.get_mut(&date) {
            night.owner = new_owner;
            night.lock = LockState::Free;
        }
        Ok(())
    }

    /// Commits every transfer or none: all locks are verified before any owner changes.
    pub fn commit_all(
        &mut self,
        transfers: &[(NaiveDate, NightOwner)],
        request: RequestId,
    ) -> Result<(), LedgerError> {
        for (date, _) in transfers {
            self.check_lock(*date, request)?;
        }
        for (date, owner) in transfers {
            self.commit(*date, *owner, request)?;
        }
        Ok(())
    }

    /// Releases the lock on `date` if `request` holds it. Returns whether anything changed.
    pub fn unlock(&mut self, date: NaiveDate, request: RequestId) -> bool {
        match self.nights.get_mut(&date) {
            Some(night) if night.lock == LockState::Pending(request) => {
                night.lock = LockState::Free;
                true
            }
            _ => false,
        }
    }

    pub fn unlock_all(&mut self, dates: &NightSet, request: RequestId) {
        for date in dates {
            self.unlock(*date, request);
        }
    }

    fn check_lock(&self, date: NaiveDate, request: RequestId) -> Result<(), LedgerError> {
        let night = self
            .nights
            .get(&date)
            .ok_or(LedgerError::UnknownNight(date))?;
        if night.lock != LockState::Pending(request) {
            return Err(LedgerError::LockMismatch {
                date,
                request,
                actual: night.lock,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nightswap_domain::Occupant;
    use rust_decimal_macros::dec;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn lease() -> Lease {
        Lease::new(
            "Loft",
            vec![Occupant::new("Alex"), Occupant::new("Sarah")],
            dec!(50),
            date(10),
            date(14),
        )
        .unwrap()
    }

    #[test]
    fn alternating_pattern_assigns_every_night() {
        let lease = lease();
        let ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let alex = lease.occupants[0].id;
        let sarah = lease.occupants[1].id;
        assert_eq!(ledger.get_owner(date(10)).unwrap(), NightOwner::Occupant(alex));
        assert_eq!(ledger.get_owner(date(11)).unwrap(), NightOwner::Occupant(sarah));
        assert_eq!(ledger.nights().count(), 4);
        assert_eq!(
            ledger.get_owner(date(20)),
            Err(LedgerError::UnknownNight(date(20)))
        );
    }

    #[test]
    fn explicit_pattern_requires_full_coverage() {
        let lease = lease();
        let mut assignments = BTreeMap::new();
        assignments.insert(date(10), lease.occupants[0].id);
        let err = NightLedger::new(&lease, &OwnershipPattern::Explicit(assignments)).unwrap_err();
        assert_eq!(err, LedgerError::Unassigned(date(11)));
    }

    #[test]
    fn lock_rejects_second_request_and_stale_owner() {
        let lease = lease();
        let alex = lease.occupants[0].id;
        let sarah = lease.occupants[1].id;
        let mut ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let first = RequestId::new();
        let second = RequestId::new();

        ledger.lock(date(11), first, sarah).unwrap();
        assert_eq!(
            ledger.lock(date(11), second, sarah),
            Err(LedgerError::AlreadyLocked {
                date: date(11),
                holder: first
            })
        );
        assert!(matches!(
            ledger.lock(date(10), second, sarah),
            Err(LedgerError::StaleOwner { .. })
        ));
        assert!(ledger.lock(date(10), second, alex).is_ok());
    }

    #[test]
    fn lock_all_leaves_no_partial_locks() {
        let lease = lease();
        let sarah = lease.occupants[1].id;
        let mut ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let blocker = RequestId::new();
        ledger.lock(date(13), blocker, sarah).unwrap();

        let request = RequestId::new();
        let err = ledger
            .lock_all(&[(date(11), sarah), (date(13), sarah)], request)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyLocked { .. }));
        assert!(ledger.locked_by(request).is_empty());
        assert_eq!(ledger.locked_by(blocker).len(), 1);
    }

    #[test]
    fn commit_requires_matching_lock() {
        let lease = lease();
        let alex = lease.occupants[0].id;
        let sarah = lease.occupants[1].id;
        let mut ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let request = RequestId::new();
        let intruder = RequestId::new();

        assert!(matches!(
            ledger.commit(date(11), NightOwner::Occupant(alex), request),
            Err(LedgerError::LockMismatch { .. })
        ));
        ledger.lock(date(11), request, sarah).unwrap();
        assert!(ledger
            .commit(date(11), NightOwner::Occupant(alex), intruder)
            .is_err());
        ledger
            .commit(date(11), NightOwner::Occupant(alex), request)
            .unwrap();
        let night = ledger.night(date(11)).unwrap();
        assert_eq!(night.owner, NightOwner::Occupant(alex));
        assert_eq!(night.lock, LockState::Free);
    }

    #[test]
    fn commit_all_is_all_or_nothing() {
        let lease = lease();
        let alex = lease.occupants[0].id;
        let sarah = lease.occupants[1].id;
        let mut ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let request = RequestId::new();
        ledger.lock(date(11), request, sarah).unwrap();

        let err = ledger
            .commit_all(
                &[
                    (date(11), NightOwner::Occupant(alex)),
                    (date(13), NightOwner::Occupant(alex)),
                ],
                request,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::LockMismatch { .. }));
        assert_eq!(ledger.get_owner(date(11)).unwrap(), NightOwner::Occupant(sarah));
        assert_eq!(ledger.locked_by(request).len(), 1);
    }

    #[test]
    fn unlock_only_releases_own_lock() {
        let lease = lease();
        let sarah = lease.occupants[1].id;
        let mut ledger = NightLedger::new(&lease, &OwnershipPattern::Alternating).unwrap();
        let request = RequestId::new();
        ledger.lock(date(11), request, sarah).unwrap();
        assert!(!ledger.unlock(date(11), RequestId::new()));
        assert!(ledger.unlock(date(11), request));
        assert_eq!(ledger.night(date(11)).unwrap().lock, LockState::Free);
    }
}
