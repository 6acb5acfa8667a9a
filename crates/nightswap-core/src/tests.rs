use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use nightswap_domain::{
    Lease, LeaseId, LockState, MessageBody, NightOwner, NightSet, Occupant, OccupantId, RequestKind,
    RequestStatus,
};
use rust_decimal_macros::dec;

use crate::{
    CardAction, CardRole, CoreError, CounterTerms, ErrorKind, ExchangeEvent, ExchangeHub,
    ExchangeSettings, ExpireOutcome, LeaseBackupInfo, LeaseBook, LeaseRecord, LeaseStorage,
    ManualClock, NewRequest, NotificationDispatcher, NotifyError, OwnershipPattern, ViewContent,
};

struct Fixture {
    book: LeaseBook,
    alex: OccupantId,
    sarah: OccupantId,
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
}

fn nights(days: &[u32]) -> NightSet {
    days.iter().map(|day| date(*day)).collect()
}

/// Feb 10..16: Sarah holds the 10th, 12th, and 14th; Alex everything else.
fn lease_with_pattern() -> (Lease, OwnershipPattern) {
    let alex = Occupant::new("Alex");
    let sarah = Occupant::new("Sarah");
    let mut assignments = BTreeMap::new();
    for day in 10..16 {
        let owner = if day % 2 == 0 { sarah.id } else { alex.id };
        assignments.insert(date(day), owner);
    }
    let lease = Lease::new("Mission Loft", vec![alex, sarah], dec!(50), date(10), date(16))
        .expect("valid lease");
    (lease, OwnershipPattern::Explicit(assignments))
}

fn fixture() -> Fixture {
    let (lease, pattern) = lease_with_pattern();
    let alex = lease.occupants[0].id;
    let sarah = lease.occupants[1].id;
    let book = LeaseBook::open(lease, &pattern).expect("open book");
    Fixture { book, alex, sarah }
}

#[test]
fn buyout_transfers_night_and_records_transaction() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();

    let request = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .expect("create buyout");
    assert_eq!(request.price, dec!(50));
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(
        book.ledger().night(date(10)).unwrap().lock,
        LockState::Pending(request.id)
    );

    let accepted = book.accept(request.id, sarah, now).expect("accept");
    assert_eq!(accepted.status, RequestStatus::Accepted);
    assert_eq!(book.get_owner(date(10)).unwrap(), NightOwner::Occupant(alex));
    assert_eq!(book.ledger().night(date(10)).unwrap().lock, LockState::Free);

    let history = book.history();
    assert_eq!(history.len(), 1);
    let record = history.iter().next().unwrap();
    assert_eq!(record.from_owner, sarah);
    assert_eq!(record.to_owner, alex);
    assert_eq!(record.price, dec!(50));
    assert_eq!(record.dates, nights(&[10]));
}

#[test]
fn swap_counter_flips_roles_and_keeps_direction() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();

    let offer = book
        .create(NewRequest::swap(alex, sarah, nights(&[12]), nights(&[11])), now)
        .expect("create swap");
    assert_eq!(offer.price, dec!(0));

    let counter = book
        .counter(
            offer.id,
            sarah,
            CounterTerms::default().with_adjustment(dec!(10)),
            now,
        )
        .expect("counter");
    let parent = book.requests().get(offer.id).unwrap();
    assert_eq!(parent.status, RequestStatus::Countered);
    assert_eq!(counter.parent_request_id, Some(offer.id));
    assert_eq!(counter.price, dec!(10));
    assert_eq!(counter.initiator, sarah);
    assert_eq!(counter.counterpart, alex);
    assert_eq!(counter.acquirer(), alex);
    assert_eq!(counter.holder(), sarah);

    let err = book.accept(counter.id, sarah, now).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    book.accept(counter.id, alex, now).expect("accept counter");
    assert_eq!(book.get_owner(date(12)).unwrap(), NightOwner::Occupant(alex));
    assert_eq!(book.get_owner(date(11)).unwrap(), NightOwner::Occupant(sarah));
    let record = book.journal().get(counter.id).expect("transaction");
    assert_eq!(record.returned_dates, nights(&[11]));
    assert_eq!(record.price, dec!(10));
}

#[test]
fn buyout_of_night_no_longer_held_is_a_validation_error() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let first = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap();
    book.accept(first.id, sarah, now).unwrap();

    let err = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn night_taken_by_a_third_occupant_is_a_stale_conflict() {
    let alex = Occupant::new("Alex");
    let sarah = Occupant::new("Sarah");
    let jo = Occupant::new("Jo");
    let mut assignments = BTreeMap::new();
    for day in 10..16 {
        let owner = if day % 2 == 0 { sarah.id } else { alex.id };
        assignments.insert(date(day), owner);
    }
    let lease = Lease::new(
        "Mission Loft",
        vec![alex.clone(), sarah.clone(), jo.clone()],
        dec!(50),
        date(10),
        date(16),
    )
    .expect("valid lease");
    let mut book = LeaseBook::open(lease, &OwnershipPattern::Explicit(assignments)).unwrap();
    let now = Utc::now();

    let taken = book
        .create(NewRequest::buyout(jo.id, sarah.id, nights(&[14])), now)
        .unwrap();
    book.accept(taken.id, sarah.id, now).unwrap();

    let err = book
        .create(NewRequest::buyout(alex.id, sarah.id, nights(&[12, 14])), now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(book.ledger().night(date(12)).unwrap().lock, LockState::Free);
    assert_eq!(book.requests().len(), 1);

    let err = book
        .create(NewRequest::buyout(alex.id, sarah.id, nights(&[14])), now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn overlapping_request_conflicts_without_partial_locks() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let first = book
        .create(NewRequest::buyout(alex, sarah, nights(&[12])), now)
        .unwrap();

    let err = book
        .create(NewRequest::share(alex, sarah, nights(&[12, 14])), now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(book.ledger().night(date(14)).unwrap().lock, LockState::Free);
    assert_eq!(book.ledger().locked_by(first.id), nights(&[12]));
    assert_eq!(book.requests().len(), 1);
}

#[test]
fn accepting_cancels_other_pending_requests_on_the_same_nights() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let winner = book
        .create(NewRequest::buyout(alex, sarah, nights(&[12])), now)
        .unwrap();

    // A second pending claim on the 12th can only come from a stored snapshot.
    let mut record = book.to_record();
    let mut loser = winner.clone();
    loser.id = nightswap_domain::RequestId::new();
    loser.kind = RequestKind::Share;
    record.requests.push(loser.clone());
    let mut book = LeaseBook::from_record(record);

    book.accept(winner.id, sarah, now).expect("accept winner");
    let loser = book.requests().get(loser.id).unwrap();
    assert_eq!(loser.status, RequestStatus::Cancelled);
    let night = book.ledger().night(date(12)).unwrap();
    assert_eq!(night.lock, LockState::Free);
    assert_eq!(night.owner, NightOwner::Occupant(alex));
    assert_eq!(book.history().len(), 1);
}

#[test]
fn only_the_right_party_may_respond() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let request = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap();

    assert_eq!(
        book.accept(request.id, alex, now).unwrap_err().kind(),
        ErrorKind::NotAuthorized
    );
    assert_eq!(
        book.decline(request.id, alex, now).unwrap_err().kind(),
        ErrorKind::NotAuthorized
    );
    assert_eq!(
        book.cancel(request.id, sarah, now).unwrap_err().kind(),
        ErrorKind::NotAuthorized
    );
    assert_eq!(
        book.counter(request.id, alex, CounterTerms::default(), now)
            .unwrap_err()
            .kind(),
        ErrorKind::NotAuthorized
    );
}

#[test]
fn terminal_requests_never_transition_again() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let request = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10, 12])), now)
        .unwrap();
    book.decline(request.id, sarah, now).expect("decline");
    assert!(book.ledger().locked_by(request.id).is_empty());

    let again = book.decline(request.id, sarah, now).expect("repeat decline");
    assert_eq!(again.status, RequestStatus::Declined);
    assert_eq!(
        book.accept(request.id, sarah, now).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        book.cancel(request.id, alex, now).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    match book.expire(request.id, now).expect("expire") {
        ExpireOutcome::AlreadyResolved(request) => {
            assert_eq!(request.status, RequestStatus::Declined)
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn cancel_releases_locks_and_is_idempotent() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let request = book
        .create(NewRequest::buyout(alex, sarah, nights(&[14])), now)
        .unwrap();
    book.cancel(request.id, alex, now).expect("cancel");
    book.cancel(request.id, alex, now).expect("repeat cancel");
    assert_eq!(
        book.requests().get(request.id).unwrap().status,
        RequestStatus::Cancelled
    );
    assert!(book
        .create(NewRequest::buyout(alex, sarah, nights(&[14])), now)
        .is_ok());
}

#[test]
fn rejected_counter_still_counters_the_parent() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let parent = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap();

    let terms = CounterTerms {
        target_nights: Some(nights(&[11])),
        ..CounterTerms::default()
    };
    let err = book.counter(parent.id, sarah, terms, now).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let parent = book.requests().get(parent.id).unwrap();
    assert_eq!(parent.status, RequestStatus::Countered);
    assert!(book.ledger().locked_by(parent.id).is_empty());
    assert_eq!(book.requests().len(), 1);
    assert!(book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .is_ok());
}

#[test]
fn hub_commits_the_countered_parent_when_new_terms_fail() {
    let hub = ExchangeHub::default();
    let (lease, alex, sarah) = hub_with_lease(&hub);
    let parent = hub
        .create(lease, NewRequest::buyout(alex, sarah, nights(&[10])))
        .unwrap();

    let terms = CounterTerms {
        target_nights: Some(nights(&[11])),
        ..CounterTerms::default()
    };
    let err = hub.counter(parent.id, sarah, terms).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        hub.request(parent.id).unwrap().status,
        RequestStatus::Countered
    );
    assert_eq!(hub.calendar(lease).unwrap()[0].pending, None);

    let err = hub
        .counter(parent.id, alex, CounterTerms::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
    assert_eq!(
        hub.request(parent.id).unwrap().status,
        RequestStatus::Countered
    );
}

#[test]
fn counter_chain_lineage_is_oldest_first() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let first = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap();
    let second = book
        .counter(
            first.id,
            sarah,
            CounterTerms::default().with_adjustment(dec!(20)),
            now,
        )
        .unwrap();
    let third = book
        .counter(
            second.id,
            alex,
            CounterTerms::default().with_adjustment(dec!(10)),
            now,
        )
        .unwrap();
    assert_eq!(third.initiator, alex);
    assert_eq!(third.price, dec!(60));

    let chain: Vec<_> = book
        .lineage(third.id)
        .unwrap()
        .into_iter()
        .map(|request| request.id)
        .collect();
    assert_eq!(chain, vec![first.id, second.id, third.id]);
}

#[test]
fn share_creates_co_owned_night_that_cannot_be_retraded() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    let share = book
        .create(NewRequest::share(alex, sarah, nights(&[14])), now)
        .unwrap();
    assert_eq!(share.price, dec!(25));
    book.accept(share.id, sarah, now).unwrap();
    assert_eq!(
        book.get_owner(date(14)).unwrap(),
        NightOwner::shared(alex, sarah)
    );

    let err = book
        .create(NewRequest::buyout(alex, sarah, nights(&[14])), now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn swap_must_offer_nights_the_initiator_holds() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let err = book
        .create(
            NewRequest::swap(alex, sarah, nights(&[12]), nights(&[14])),
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn thread_view_reports_live_status_and_actions() {
    let Fixture {
        mut book,
        alex,
        sarah,
    } = fixture();
    let now = Utc::now();
    book.post_message(alex, "could I take the 10th?", now)
        .unwrap();
    let request = book
        .create(NewRequest::buyout(alex, sarah, nights(&[10])), now)
        .unwrap();

    let sarah_view = book.view(sarah).unwrap();
    assert_eq!(sarah_view.len(), 2);
    match &sarah_view[1].content {
        ViewContent::RequestCard(card) => {
            assert_eq!(card.status, RequestStatus::Pending);
            assert_eq!(card.role, CardRole::Responder);
            assert_eq!(
                card.actions,
                vec![CardAction::Accept, CardAction::Decline, CardAction::Counter]
            );
        }
        other => panic!("expected request card, got {:?}", other),
    }

    book.accept(request.id, sarah, now).unwrap();
    let alex_view = book.view(alex).unwrap();
    match &alex_view[1].content {
        ViewContent::RequestCard(card) => {
            assert_eq!(card.status, RequestStatus::Accepted);
            assert!(card.actions.is_empty());
        }
        other => panic!("expected request card, got {:?}", other),
    }
    assert!(alex_view[0].from_me);
    assert_eq!(
        book.view(OccupantId::new()).unwrap_err().kind(),
        ErrorKind::NotAuthorized
    );
}

#[test]
fn messages_cannot_be_edited_to_blank() {
    let Fixture { mut book, alex, .. } = fixture();
    let now = Utc::now();
    let posted = book.post_message(alex, "swap the 12th?", now).unwrap();

    let err = book
        .edit_message(alex, posted.sequence, "   ", now)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        book.thread().message(posted.sequence).unwrap().body,
        MessageBody::Text("swap the 12th?".into())
    );
}

fn hub_with_lease(hub: &ExchangeHub) -> (LeaseId, OccupantId, OccupantId) {
    let (lease, pattern) = lease_with_pattern();
    let alex = lease.occupants[0].id;
    let sarah = lease.occupants[1].id;
    let id = hub.open_lease(lease, &pattern).expect("open lease");
    (id, alex, sarah)
}

#[test]
fn concurrent_claims_on_one_night_admit_a_single_winner() {
    let hub = Arc::new(ExchangeHub::default());
    let (lease, alex, sarah) = hub_with_lease(&hub);

    let winners = AtomicUsize::new(0);
    let conflicts = AtomicUsize::new(0);
    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                match hub.create(lease, NewRequest::buyout(alex, sarah, nights(&[12]))) {
                    Ok(_) => winners.fetch_add(1, Ordering::SeqCst),
                    Err(err) => {
                        assert_eq!(err.kind(), ErrorKind::Conflict);
                        conflicts.fetch_add(1, Ordering::SeqCst)
                    }
                };
            });
        }
    });
    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), 7);
    assert_eq!(hub.requests(lease).unwrap().len(), 1);
}

#[test]
fn hub_expires_stale_requests_with_injected_clock() {
    let start = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let hub = ExchangeHub::new(ExchangeSettings::with_ttl_hours(48)).with_clock(clock.clone());
    let (lease, alex, sarah) = hub_with_lease(&hub);

    let request = hub
        .create(lease, NewRequest::buyout(alex, sarah, nights(&[10])))
        .unwrap();
    clock.advance(Duration::hours(47));
    assert!(hub.expire_due(lease).unwrap().is_empty());

    clock.advance(Duration::hours(2));
    let expired = hub.expire_due(lease).unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, request.id);
    assert_eq!(
        hub.request(request.id).unwrap().resolved_at,
        Some(start + Duration::hours(49))
    );
    assert_eq!(
        hub.accept(request.id, sarah).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert!(matches!(
        hub.expire(request.id).unwrap(),
        ExpireOutcome::AlreadyResolved(_)
    ));
}

struct FailingDispatcher {
    attempts: AtomicUsize,
}

impl NotificationDispatcher for FailingDispatcher {
    fn dispatch(&self, _event: &ExchangeEvent) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Unavailable("push gateway down".into()))
    }
}

#[test]
fn notification_failures_do_not_roll_back() {
    let dispatcher = Arc::new(FailingDispatcher {
        attempts: AtomicUsize::new(0),
    });
    let hub = ExchangeHub::default().with_dispatcher(dispatcher.clone());
    let (lease, alex, sarah) = hub_with_lease(&hub);

    let request = hub
        .create(lease, NewRequest::buyout(alex, sarah, nights(&[10])))
        .unwrap();
    hub.accept(request.id, sarah).expect("accept despite dispatcher");

    assert_eq!(dispatcher.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(
        hub.get_owner(lease, date(10)).unwrap(),
        NightOwner::Occupant(alex)
    );
}

#[test]
fn snapshots_taken_before_a_write_stay_unchanged() {
    let hub = ExchangeHub::default();
    let (lease, alex, sarah) = hub_with_lease(&hub);
    let before = hub.snapshot(lease).unwrap();

    let request = hub
        .create(lease, NewRequest::buyout(alex, sarah, nights(&[10])))
        .unwrap();
    hub.accept(request.id, sarah).unwrap();

    assert_eq!(
        before.get_owner(date(10)).unwrap(),
        NightOwner::Occupant(sarah)
    );
    let calendar = hub.calendar(lease).unwrap();
    let tenth = calendar.iter().find(|day| day.date == date(10)).unwrap();
    assert_eq!(tenth.owner, NightOwner::Occupant(alex));
    assert_eq!(tenth.pending, None);
}

/// Accepts the first `budget` saves, then fails every write.
struct FlakyStorage {
    budget: AtomicUsize,
}

impl LeaseStorage for FlakyStorage {
    fn save_lease(&self, _record: &LeaseRecord) -> Result<(), CoreError> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(CoreError::Storage("disk full".into()));
        }
        self.budget.store(left - 1, Ordering::SeqCst);
        Ok(())
    }

    fn load_lease(&self, id: LeaseId) -> Result<LeaseRecord, CoreError> {
        Err(CoreError::LeaseNotFound(id))
    }

    fn list_leases(&self) -> Result<Vec<LeaseId>, CoreError> {
        Ok(Vec::new())
    }

    fn backup_lease(
        &self,
        _record: &LeaseRecord,
        _note: Option<&str>,
    ) -> Result<LeaseBackupInfo, CoreError> {
        Err(CoreError::Storage("backups unsupported".into()))
    }

    fn list_backups(&self, _id: LeaseId) -> Result<Vec<LeaseBackupInfo>, CoreError> {
        Ok(Vec::new())
    }

    fn restore_backup(&self, backup: &LeaseBackupInfo) -> Result<LeaseRecord, CoreError> {
        Err(CoreError::LeaseNotFound(backup.lease))
    }
}

#[test]
fn failed_persistence_leaves_state_untouched() {
    let storage = Arc::new(FlakyStorage {
        budget: AtomicUsize::new(2),
    });
    let hub = ExchangeHub::default().with_storage(storage);
    let (lease, alex, sarah) = hub_with_lease(&hub);

    let request = hub
        .create(lease, NewRequest::buyout(alex, sarah, nights(&[10])))
        .expect("second save succeeds");
    let err = hub.accept(request.id, sarah).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    assert_eq!(
        hub.request(request.id).unwrap().status,
        RequestStatus::Pending
    );
    assert_eq!(
        hub.get_owner(lease, date(10)).unwrap(),
        NightOwner::Occupant(sarah)
    );
    assert!(hub.history(lease).unwrap().is_empty());
}

#[test]
fn expiry_sweep_with_nothing_due_does_not_write() {
    let storage = Arc::new(FlakyStorage {
        budget: AtomicUsize::new(1),
    });
    let hub = ExchangeHub::default().with_storage(storage);
    let (lease, _, _) = hub_with_lease(&hub);

    assert!(hub.expire_due(lease).expect("read-only sweep").is_empty());
}
