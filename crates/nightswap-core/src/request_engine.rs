//! Request state machine: create, accept, decline, counter, cancel, expire.
//!
//! Every operation runs against a [`LeaseBook`] held by a single writer. Night
//! claims go through the book's [`crate::NightLedger`]; a request holds a lock
//! on each of its nights for as long as it is pending.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use nightswap_domain::{
    MessageBody, NightOwner, NightSet, OccupantId, ProposerRole, Request, RequestId, RequestKind,
    RequestStatus, TransactionRecord,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{book::LeaseBook, pricing, CoreError};

/// Flat table of a lease's requests. Counter chains are linked through
/// `parent_request_id` rather than by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestArena {
    requests: Vec<Request>,
    index: HashMap<RequestId, usize>,
}

impl RequestArena {
    pub fn from_requests(requests: Vec<Request>) -> Self {
        let mut arena = Self::default();
        for request in requests {
            arena.insert(request);
        }
        arena
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.index.get(&id).map(|slot| &self.requests[*slot])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Request> {
        self.requests.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter().filter(|request| request.is_pending())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// The counter chain ending at `id`, oldest offer first.
    pub fn lineage(&self, id: RequestId) -> Vec<&Request> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.get(id);
        while let Some(request) = cursor {
            if !seen.insert(request.id) {
                break;
            }
            chain.push(request);
            cursor = request.parent_request_id.and_then(|parent| self.get(parent));
        }
        chain.reverse();
        chain
    }

    fn insert(&mut self, request: Request) {
        match self.index.get(&request.id) {
            Some(slot) => self.requests[*slot] = request,
            None => {
                self.index.insert(request.id, self.requests.len());
                self.requests.push(request);
            }
        }
    }

    fn get_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.index.get(&id).map(|slot| &mut self.requests[*slot])
    }
}

/// Terms of a fresh offer from `initiator` for nights held by `counterpart`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub initiator: OccupantId,
    pub counterpart: OccupantId,
    pub kind: RequestKind,
    pub target_nights: NightSet,
    pub manual_adjustment: Option<Decimal>,
}

impl NewRequest {
    pub fn buyout(initiator: OccupantId, counterpart: OccupantId, target_nights: NightSet) -> Self {
        Self {
            initiator,
            counterpart,
            kind: RequestKind::Buyout,
            target_nights,
            manual_adjustment: None,
        }
    }

    pub fn swap(
        initiator: OccupantId,
        counterpart: OccupantId,
        target_nights: NightSet,
        offered_nights: NightSet,
    ) -> Self {
        Self {
            initiator,
            counterpart,
            kind: RequestKind::Swap { offered_nights },
            target_nights,
            manual_adjustment: None,
        }
    }

    pub fn share(initiator: OccupantId, counterpart: OccupantId, target_nights: NightSet) -> Self {
        Self {
            initiator,
            counterpart,
            kind: RequestKind::Share,
            target_nights,
            manual_adjustment: None,
        }
    }

    pub fn with_adjustment(mut self, adjustment: Decimal) -> Self {
        self.manual_adjustment = Some(adjustment);
        self
    }
}

/// Replacement terms for a counteroffer. Unset fields keep the parent's terms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterTerms {
    pub kind: Option<RequestKind>,
    pub target_nights: Option<NightSet>,
    pub offered_nights: Option<NightSet>,
    pub manual_adjustment: Option<Decimal>,
}

impl CounterTerms {
    pub fn with_adjustment(mut self, adjustment: Decimal) -> Self {
        self.manual_adjustment = Some(adjustment);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpireOutcome {
    Expired(Request),
    /// The request had already reached a terminal status; nothing changed.
    AlreadyResolved(Request),
}

struct Draft {
    initiator: OccupantId,
    counterpart: OccupantId,
    role: ProposerRole,
    kind: RequestKind,
    target_nights: NightSet,
    manual_adjustment: Option<Decimal>,
    parent: Option<RequestId>,
}

#[derive(Clone, Copy)]
enum Actor {
    Proposer,
    Responder,
}

impl LeaseBook {
    pub fn create(&mut self, new: NewRequest, now: DateTime<Utc>) -> Result<Request, CoreError> {
        self.ensure_party(new.initiator, "create requests on")?;
        self.open_request(
            Draft {
                initiator: new.initiator,
                counterpart: new.counterpart,
                role: ProposerRole::Acquirer,
                kind: new.kind,
                target_nights: new.target_nights,
                manual_adjustment: new.manual_adjustment,
                parent: None,
            },
            now,
        )
    }

    pub fn accept(
        &mut self,
        id: RequestId,
        acting: OccupantId,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let request = self.authorize(id, acting, Actor::Responder, "accept")?;
        if !request.is_pending() {
            return Err(invalid_state(&request, "accept"));
        }

        self.ledger.commit_all(&transfers(&request), id)?;
        let accepted = self.transition(id, RequestStatus::Accepted, now)?;
        self.journal.record(TransactionRecord {
            request_id: id,
            lease_id: accepted.lease_id,
            kind: accepted.kind.clone(),
            from_owner: accepted.holder(),
            to_owner: accepted.acquirer(),
            dates: accepted.target_nights.clone(),
            returned_dates: accepted.offered_nights().cloned().unwrap_or_default(),
            price: accepted.price,
            settled_at: now,
        });
        info!(
            lease = %accepted.lease_id,
            request = %id,
            price = %accepted.price,
            "request accepted"
        );

        let committed = accepted.all_nights();
        let losers: Vec<RequestId> = self
            .requests
            .pending()
            .filter(|other| other.touches_any(&committed))
            .map(|other| other.id)
            .collect();
        for loser in losers {
            warn!(request = %loser, winner = %id, "cancelling request superseded by acceptance");
            self.close(loser, RequestStatus::Cancelled, now)?;
        }
        Ok(accepted)
    }

    pub fn decline(
        &mut self,
        id: RequestId,
        acting: OccupantId,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let request = self.authorize(id, acting, Actor::Responder, "decline")?;
        match request.status {
            RequestStatus::Pending => self.close(id, RequestStatus::Declined, now),
            RequestStatus::Declined => Ok(request),
            _ => Err(invalid_state(&request, "decline")),
        }
    }

    pub fn cancel(
        &mut self,
        id: RequestId,
        acting: OccupantId,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let request = self.authorize(id, acting, Actor::Proposer, "cancel")?;
        match request.status {
            RequestStatus::Pending => self.close(id, RequestStatus::Cancelled, now),
            RequestStatus::Cancelled => Ok(request),
            _ => Err(invalid_state(&request, "cancel")),
        }
    }

    /// Expires a pending request. Requests already resolved (for example by a
    /// racing accept) are left untouched.
    pub fn expire(&mut self, id: RequestId, now: DateTime<Utc>) -> Result<ExpireOutcome, CoreError> {
        let request = self
            .requests
            .get(id)
            .cloned()
            .ok_or(CoreError::RequestNotFound(id))?;
        if request.status.is_terminal() {
            debug!(request = %id, status = %request.status, "expire skipped");
            return Ok(ExpireOutcome::AlreadyResolved(request));
        }
        self.close(id, RequestStatus::Expired, now)
            .map(ExpireOutcome::Expired)
    }

    /// Pending requests created at least `ttl` before `now`.
    pub fn due_for_expiry(&self, ttl: Duration, now: DateTime<Utc>) -> Vec<RequestId> {
        self.requests
            .pending()
            .filter(|request| request.created_at + ttl <= now)
            .map(|request| request.id)
            .collect()
    }

    /// Expires every pending request created at least `ttl` before `now`.
    pub fn expire_due(&mut self, ttl: Duration, now: DateTime<Utc>) -> Result<Vec<Request>, CoreError> {
        let due = self.due_for_expiry(ttl, now);
        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            if let ExpireOutcome::Expired(request) = self.expire(id, now)? {
                expired.push(request);
            }
        }
        Ok(expired)
    }

    /// Replaces a pending request with new terms proposed by its counterpart.
    ///
    /// The parent is unlocked and marked `Countered` before the new terms are
    /// opened. If they fail validation or locking, the error is returned and
    /// the parent stays `Countered` with no locks.
    pub fn counter(
        &mut self,
        id: RequestId,
        acting: OccupantId,
        terms: CounterTerms,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let parent = self.authorize(id, acting, Actor::Responder, "counter")?;
        if !parent.is_pending() {
            return Err(invalid_state(&parent, "counter"));
        }

        self.ledger.unlock_all(&parent.all_nights(), id);
        self.transition(id, RequestStatus::Countered, now)?;

        let draft = counter_draft(&parent, acting, terms)?;
        let child = self.open_request(draft, now).map_err(|err| {
            debug!(lease = %parent.lease_id, parent = %id, error = %err, "counter terms rejected");
            err
        })?;
        info!(lease = %child.lease_id, parent = %id, request = %child.id, "request countered");
        Ok(child)
    }

    /// The counter chain ending at `id`, oldest offer first.
    pub fn lineage(&self, id: RequestId) -> Result<Vec<Request>, CoreError> {
        if self.requests.get(id).is_none() {
            return Err(CoreError::RequestNotFound(id));
        }
        Ok(self.requests.lineage(id).into_iter().cloned().collect())
    }

    fn open_request(&mut self, draft: Draft, now: DateTime<Utc>) -> Result<Request, CoreError> {
        if !self.lease.is_party(draft.counterpart) {
            return Err(CoreError::Validation(format!(
                "{} is not an occupant of this lease",
                draft.counterpart
            )));
        }
        if draft.initiator == draft.counterpart {
            return Err(CoreError::Validation(
                "initiator and counterpart must differ".into(),
            ));
        }
        let (acquirer, holder) = match draft.role {
            ProposerRole::Acquirer => (draft.initiator, draft.counterpart),
            ProposerRole::Holder => (draft.counterpart, draft.initiator),
        };
        self.validate_nights(&draft.target_nights, holder, acquirer, "requested")?;
        if let Some(offered) = draft.kind.offered_nights() {
            self.validate_nights(offered, acquirer, holder, "offered")?;
            if offered.iter().any(|date| draft.target_nights.contains(date)) {
                return Err(CoreError::Validation(
                    "a night cannot be both requested and offered".into(),
                ));
            }
        }
        let price = pricing::price(
            &self.lease,
            &draft.kind,
            &draft.target_nights,
            draft.manual_adjustment,
        )?;

        let request = Request {
            id: RequestId::new(),
            lease_id: self.lease.id,
            kind: draft.kind,
            initiator: draft.initiator,
            counterpart: draft.counterpart,
            proposer_role: draft.role,
            target_nights: draft.target_nights,
            manual_adjustment: draft.manual_adjustment,
            price,
            status: RequestStatus::Pending,
            parent_request_id: draft.parent,
            created_at: now,
            resolved_at: None,
        };
        if let Err(err) = self.ledger.lock_all(&claims(&request), request.id) {
            debug!(lease = %self.lease.id, error = %err, "request lost lock contention");
            return Err(err.into());
        }

        self.requests.insert(request.clone());
        self.thread.append(
            Some(request.initiator),
            MessageBody::RequestCard(request.id),
            now,
        );
        self.emit(&request, now);
        info!(
            lease = %request.lease_id,
            request = %request.id,
            kind = %request.kind,
            price = %request.price,
            "request opened"
        );
        Ok(request)
    }

    /// Rejects night sets that could never be traded between `owner` and
    /// `other`. Nights a third occupant has taken since the caller last looked
    /// pass through here and surface as a lock conflict.
    fn validate_nights(
        &self,
        nights: &NightSet,
        owner: OccupantId,
        other: OccupantId,
        label: &str,
    ) -> Result<(), CoreError> {
        if nights.is_empty() {
            return Err(CoreError::Validation(format!("no {} nights selected", label)));
        }
        let name = self.lease.occupant_name(owner);
        let mut owned = 0usize;
        let mut first_problem = None;
        for date in nights {
            match self.ledger.get_owner(*date) {
                Err(_) => {
                    return Err(CoreError::Validation(format!(
                        "{} is outside the lease",
                        date
                    )))
                }
                Ok(current) if current.is_sole(owner) => owned += 1,
                Ok(NightOwner::Shared(..)) => {
                    first_problem.get_or_insert(format!("{} is shared and cannot be traded", date));
                }
                Ok(current) if current.is_sole(other) => {
                    first_problem.get_or_insert(format!(
                        "{} is already held by {}",
                        date,
                        self.lease.occupant_name(other)
                    ));
                }
                Ok(_) => {}
            }
        }
        if owned == 0 {
            return Err(CoreError::Validation(format!(
                "{} holds none of the {} nights",
                name, label
            )));
        }
        match first_problem {
            Some(problem) => Err(CoreError::Validation(problem)),
            None => Ok(()),
        }
    }

    fn authorize(
        &self,
        id: RequestId,
        acting: OccupantId,
        actor: Actor,
        action: &'static str,
    ) -> Result<Request, CoreError> {
        let request = self
            .requests
            .get(id)
            .ok_or(CoreError::RequestNotFound(id))?;
        let allowed = match actor {
            Actor::Proposer => request.initiator,
            Actor::Responder => request.counterpart,
        };
        if acting != allowed {
            return Err(CoreError::NotAuthorized(format!(
                "only {} may {} request {}",
                self.lease.occupant_name(allowed),
                action,
                id.short()
            )));
        }
        Ok(request.clone())
    }

    /// Releases a pending request's locks and moves it to a terminal status.
    fn close(
        &mut self,
        id: RequestId,
        status: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let nights = self
            .requests
            .get(id)
            .map(Request::all_nights)
            .ok_or(CoreError::RequestNotFound(id))?;
        self.ledger.unlock_all(&nights, id);
        let closed = self.transition(id, status, now)?;
        info!(lease = %closed.lease_id, request = %id, status = %status, "request closed");
        Ok(closed)
    }

    fn transition(
        &mut self,
        id: RequestId,
        status: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<Request, CoreError> {
        let request = self
            .requests
            .get_mut(id)
            .ok_or(CoreError::RequestNotFound(id))?;
        if let Err(current) = request.resolve(status, now) {
            return Err(CoreError::InvalidState {
                request: id,
                status: current,
                action: "resolve",
            });
        }
        let resolved = request.clone();
        self.emit(&resolved, now);
        Ok(resolved)
    }
}

fn counter_draft(
    parent: &Request,
    acting: OccupantId,
    terms: CounterTerms,
) -> Result<Draft, CoreError> {
    let mut kind = terms.kind.unwrap_or_else(|| parent.kind.clone());
    if let Some(offered) = terms.offered_nights {
        match &mut kind {
            RequestKind::Swap { offered_nights } => *offered_nights = offered,
            RequestKind::Buyout | RequestKind::Share => {
                return Err(CoreError::Validation(
                    "offered nights only apply to swaps".into(),
                ))
            }
        }
    }
    Ok(Draft {
        initiator: acting,
        counterpart: parent.initiator,
        role: parent.proposer_role.flipped(),
        kind,
        target_nights: terms
            .target_nights
            .unwrap_or_else(|| parent.target_nights.clone()),
        manual_adjustment: terms.manual_adjustment.or(parent.manual_adjustment),
        parent: Some(parent.id),
    })
}

fn invalid_state(request: &Request, action: &'static str) -> CoreError {
    CoreError::InvalidState {
        request: request.id,
        status: request.status,
        action,
    }
}

/// Night claims a pending request holds: targets from the holder, offered nights from the acquirer.
fn claims(request: &Request) -> Vec<(NaiveDate, OccupantId)> {
    let holder = request.holder();
    let acquirer = request.acquirer();
    let mut claims: Vec<_> = request
        .target_nights
        .iter()
        .map(|date| (*date, holder))
        .collect();
    if let Some(offered) = request.offered_nights() {
        claims.extend(offered.iter().map(|date| (*date, acquirer)));
    }
    claims
}

/// New owner of every night touched by accepting `request`.
fn transfers(request: &Request) -> Vec<(NaiveDate, NightOwner)> {
    let holder = request.holder();
    let acquirer = request.acquirer();
    let incoming = match request.kind {
        RequestKind::Buyout | RequestKind::Swap { .. } => NightOwner::Occupant(acquirer),
        RequestKind::Share => NightOwner::shared(holder, acquirer),
    };
    let mut transfers: Vec<_> = request
        .target_nights
        .iter()
        .map(|date| (*date, incoming))
        .collect();
    if let Some(offered) = request.offered_nights() {
        transfers.extend(
            offered
                .iter()
                .map(|date| (*date, NightOwner::Occupant(holder))),
        );
    }
    transfers
}
