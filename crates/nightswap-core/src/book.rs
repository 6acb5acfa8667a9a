//! All negotiation state of a single lease.

use chrono::{DateTime, NaiveDate, Utc};
use nightswap_domain::{Lease, Message, MessageBody, NightOwner, OccupantId, Request};

use crate::{
    calendar::{self, CalendarDay, PerspectiveDay},
    journal::{History, TransactionJournal},
    night_ledger::{NightLedger, OwnershipPattern},
    notify::ExchangeEvent,
    request_engine::RequestArena,
    storage::{LeaseRecord, CURRENT_SCHEMA_VERSION},
    thread::{MessageView, NegotiationThread},
    CoreError,
};

/// Ledger, requests, thread, and journal of one lease.
///
/// A book is mutated by one writer at a time; the hub hands readers immutable
/// clones. Request operations live in [`crate::request_engine`].
#[derive(Debug, Clone)]
pub struct LeaseBook {
    pub(crate) lease: Lease,
    pub(crate) ledger: NightLedger,
    pub(crate) requests: RequestArena,
    pub(crate) thread: NegotiationThread,
    pub(crate) journal: TransactionJournal,
    outbox: Vec<ExchangeEvent>,
}

impl LeaseBook {
    pub fn open(lease: Lease, pattern: &OwnershipPattern) -> Result<Self, CoreError> {
        let ledger = NightLedger::new(&lease, pattern)?;
        let thread = NegotiationThread::new(lease.id);
        Ok(Self {
            lease,
            ledger,
            requests: RequestArena::default(),
            thread,
            journal: TransactionJournal::new(),
            outbox: Vec::new(),
        })
    }

    pub fn from_record(record: LeaseRecord) -> Self {
        let thread = NegotiationThread::from_messages(record.lease.id, record.messages);
        Self {
            ledger: NightLedger::from_nights(record.nights),
            requests: RequestArena::from_requests(record.requests),
            thread,
            journal: TransactionJournal::from_records(record.transactions),
            lease: record.lease,
            outbox: Vec::new(),
        }
    }

    pub fn to_record(&self) -> LeaseRecord {
        LeaseRecord {
            schema_version: CURRENT_SCHEMA_VERSION,
            lease: self.lease.clone(),
            nights: self.ledger.nights().cloned().collect(),
            requests: self.requests.iter().cloned().collect(),
            messages: self.thread.messages().to_vec(),
            transactions: self.journal.history().iter().cloned().collect(),
        }
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    pub fn ledger(&self) -> &NightLedger {
        &self.ledger
    }

    pub fn requests(&self) -> &RequestArena {
        &self.requests
    }

    pub fn thread(&self) -> &NegotiationThread {
        &self.thread
    }

    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }

    pub fn get_owner(&self, date: NaiveDate) -> Result<NightOwner, CoreError> {
        Ok(self.ledger.get_owner(date)?)
    }

    pub fn calendar(&self) -> Vec<CalendarDay> {
        calendar::days(&self.ledger)
    }

    pub fn calendar_for(&self, perspective: OccupantId) -> Result<Vec<PerspectiveDay>, CoreError> {
        self.ensure_party(perspective, "view the calendar of")?;
        Ok(calendar::days_for(&self.ledger, perspective))
    }

    pub fn view(&self, perspective: OccupantId) -> Result<Vec<MessageView>, CoreError> {
        self.ensure_party(perspective, "read the thread of")?;
        Ok(self.thread.view(perspective, &self.requests))
    }

    pub fn history(&self) -> History {
        self.journal.history()
    }

    pub fn post_message(
        &mut self,
        author: OccupantId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Message, CoreError> {
        self.ensure_party(author, "post to")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("message text is empty".into()));
        }
        Ok(self
            .thread
            .append(Some(author), MessageBody::Text(text.to_string()), now))
    }

    pub fn edit_message(
        &mut self,
        author: OccupantId,
        sequence: u64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Message, CoreError> {
        self.ensure_party(author, "post to")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("message text is empty".into()));
        }
        self.thread.edit(author, sequence, text.to_string(), now)
    }

    pub(crate) fn ensure_party(&self, who: OccupantId, action: &str) -> Result<(), CoreError> {
        if self.lease.is_party(who) {
            Ok(())
        } else {
            Err(CoreError::NotAuthorized(format!(
                "{} may not {} lease {}",
                who, action, self.lease.id
            )))
        }
    }

    pub(crate) fn emit(&mut self, request: &Request, at: DateTime<Utc>) {
        self.outbox.push(ExchangeEvent::from_request(request, at));
    }

    pub(crate) fn take_events(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.outbox)
    }
}
