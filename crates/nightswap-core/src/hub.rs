//! Concurrency front door: one single-writer book per lease.
//!
//! Each lease owns a mutex that serializes every mutation of its nights,
//! requests, thread, and journal. A mutation runs against a working copy of
//! the book; only when it succeeds (and, with storage attached, once the copy
//! is persisted) does the copy replace the authoritative book. A counter
//! whose new terms are rejected still commits its parent. Readers never
//! take the writer mutex: they receive the last published snapshot, which may
//! trail an in-flight write. Leases share nothing, so they never contend.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use nightswap_domain::{
    Lease, LeaseId, Message, NightOwner, OccupantId, Request, RequestId, RequestStatus,
};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    book::LeaseBook,
    calendar::{CalendarDay, PerspectiveDay},
    journal::History,
    night_ledger::OwnershipPattern,
    notify::{ExchangeEvent, NoopDispatcher, NotificationDispatcher},
    request_engine::{CounterTerms, ExpireOutcome, NewRequest},
    settings::ExchangeSettings,
    storage::{record_warnings, LeaseBackupInfo, LeaseStorage},
    thread::MessageView,
    time::{Clock, SystemClock},
    CoreError,
};

struct LeaseSlot {
    writer: Mutex<LeaseBook>,
    published: RwLock<Arc<LeaseBook>>,
}

impl LeaseSlot {
    fn new(book: LeaseBook) -> Self {
        Self {
            published: RwLock::new(Arc::new(book.clone())),
            writer: Mutex::new(book),
        }
    }
}

pub struct ExchangeHub {
    leases: RwLock<HashMap<LeaseId, Arc<LeaseSlot>>>,
    request_index: RwLock<HashMap<RequestId, LeaseId>>,
    settings: ExchangeSettings,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    storage: Option<Arc<dyn LeaseStorage>>,
}

impl Default for ExchangeHub {
    fn default() -> Self {
        Self::new(ExchangeSettings::default())
    }
}

impl ExchangeHub {
    pub fn new(settings: ExchangeSettings) -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
            request_index: RwLock::new(HashMap::new()),
            settings,
            clock: Arc::new(SystemClock),
            dispatcher: Arc::new(NoopDispatcher),
            storage: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn LeaseStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn settings(&self) -> ExchangeSettings {
        self.settings
    }

    pub fn open_lease(
        &self,
        lease: Lease,
        pattern: &OwnershipPattern,
    ) -> Result<LeaseId, CoreError> {
        let id = lease.id;
        if self.leases.read().contains_key(&id) {
            return Err(CoreError::Validation(format!("lease {} is already open", id)));
        }
        let book = LeaseBook::open(lease, pattern)?;
        if let Some(storage) = &self.storage {
            storage.save_lease(&book.to_record())?;
        }
        self.install(book);
        info!(lease = %id, "lease opened");
        Ok(id)
    }

    /// Loads a persisted lease into the hub, replacing nothing already open.
    pub fn load_lease(&self, id: LeaseId) -> Result<LeaseId, CoreError> {
        if self.leases.read().contains_key(&id) {
            return Ok(id);
        }
        let record = self.storage()?.load_lease(id)?;
        for warning in record_warnings(&record) {
            warn!(lease = %id, "{}", warning);
        }
        self.install(LeaseBook::from_record(record));
        info!(lease = %id, "lease loaded");
        Ok(id)
    }

    /// Loads every lease the attached storage knows about.
    pub fn load_all(&self) -> Result<Vec<LeaseId>, CoreError> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(Vec::new());
        };
        let ids = storage.list_leases()?;
        for id in &ids {
            self.load_lease(*id)?;
        }
        Ok(ids)
    }

    pub fn lease_ids(&self) -> Vec<LeaseId> {
        self.leases.read().keys().copied().collect()
    }

    /// Latest published state of a lease. Never waits on a writer.
    pub fn snapshot(&self, lease: LeaseId) -> Result<Arc<LeaseBook>, CoreError> {
        let slot = self.slot(lease)?;
        let published = slot.published.read();
        Ok(Arc::clone(&published))
    }

    pub fn lease(&self, lease: LeaseId) -> Result<Lease, CoreError> {
        Ok(self.snapshot(lease)?.lease().clone())
    }

    pub fn get_owner(&self, lease: LeaseId, date: NaiveDate) -> Result<NightOwner, CoreError> {
        self.snapshot(lease)?.get_owner(date)
    }

    pub fn calendar(&self, lease: LeaseId) -> Result<Vec<CalendarDay>, CoreError> {
        Ok(self.snapshot(lease)?.calendar())
    }

    pub fn calendar_for(
        &self,
        lease: LeaseId,
        perspective: OccupantId,
    ) -> Result<Vec<PerspectiveDay>, CoreError> {
        self.snapshot(lease)?.calendar_for(perspective)
    }

    pub fn view(
        &self,
        lease: LeaseId,
        perspective: OccupantId,
    ) -> Result<Vec<MessageView>, CoreError> {
        self.snapshot(lease)?.view(perspective)
    }

    pub fn history(&self, lease: LeaseId) -> Result<History, CoreError> {
        Ok(self.snapshot(lease)?.history())
    }

    pub fn requests(&self, lease: LeaseId) -> Result<Vec<Request>, CoreError> {
        Ok(self.snapshot(lease)?.requests().iter().cloned().collect())
    }

    pub fn request(&self, id: RequestId) -> Result<Request, CoreError> {
        let lease = self.lease_of(id)?;
        self.snapshot(lease)?
            .requests()
            .get(id)
            .cloned()
            .ok_or(CoreError::RequestNotFound(id))
    }

    pub fn lineage(&self, id: RequestId) -> Result<Vec<Request>, CoreError> {
        let lease = self.lease_of(id)?;
        self.snapshot(lease)?.lineage(id)
    }

    pub fn create(&self, lease: LeaseId, new: NewRequest) -> Result<Request, CoreError> {
        let request = self.write(lease, |book, now| book.create(new, now))?;
        self.request_index.write().insert(request.id, lease);
        Ok(request)
    }

    pub fn accept(&self, id: RequestId, acting: OccupantId) -> Result<Request, CoreError> {
        let lease = self.lease_of(id)?;
        self.write(lease, |book, now| book.accept(id, acting, now))
    }

    pub fn decline(&self, id: RequestId, acting: OccupantId) -> Result<Request, CoreError> {
        let lease = self.lease_of(id)?;
        self.write(lease, |book, now| book.decline(id, acting, now))
    }

    pub fn cancel(&self, id: RequestId, acting: OccupantId) -> Result<Request, CoreError> {
        let lease = self.lease_of(id)?;
        self.write(lease, |book, now| book.cancel(id, acting, now))
    }

    pub fn counter(
        &self,
        id: RequestId,
        acting: OccupantId,
        terms: CounterTerms,
    ) -> Result<Request, CoreError> {
        let lease = self.lease_of(id)?;
        // Once the parent is countered that transition is committed, even if the new terms fail.
        let outcome = self.write(lease, |book, now| {
            let was_pending = book.requests().get(id).is_some_and(Request::is_pending);
            match book.counter(id, acting, terms, now) {
                Ok(child) => Ok(Ok(child)),
                Err(err) if was_pending && book.requests().get(id).is_some_and(is_countered) => {
                    Ok(Err(err))
                }
                Err(err) => Err(err),
            }
        })?;
        let child = outcome?;
        self.request_index.write().insert(child.id, lease);
        Ok(child)
    }

    pub fn expire(&self, id: RequestId) -> Result<ExpireOutcome, CoreError> {
        let lease = self.lease_of(id)?;
        self.write(lease, |book, now| book.expire(id, now))
    }

    /// Expires every request on `lease` that has waited longer than the configured TTL.
    pub fn expire_due(&self, lease: LeaseId) -> Result<Vec<Request>, CoreError> {
        let ttl = self.settings.request_ttl;
        if self
            .snapshot(lease)?
            .due_for_expiry(ttl, self.clock.now())
            .is_empty()
        {
            return Ok(Vec::new());
        }
        self.write(lease, |book, now| book.expire_due(ttl, now))
    }

    pub fn post_message(
        &self,
        lease: LeaseId,
        author: OccupantId,
        text: &str,
    ) -> Result<Message, CoreError> {
        self.write(lease, |book, now| book.post_message(author, text, now))
    }

    pub fn edit_message(
        &self,
        lease: LeaseId,
        author: OccupantId,
        sequence: u64,
        text: &str,
    ) -> Result<Message, CoreError> {
        self.write(lease, |book, now| book.edit_message(author, sequence, text, now))
    }

    /// Writes a backup of the lease's current state through the attached storage.
    pub fn backup(&self, lease: LeaseId, note: Option<&str>) -> Result<String, CoreError> {
        let record = self.snapshot(lease)?.to_record();
        Ok(self.storage()?.backup_lease(&record, note)?.id)
    }

    /// Backups of `lease`, newest first.
    pub fn backups(&self, lease: LeaseId) -> Result<Vec<LeaseBackupInfo>, CoreError> {
        self.slot(lease)?;
        self.storage()?.list_backups(lease)
    }

    /// Replaces the lease's state with a stored backup.
    pub fn restore_backup(&self, backup: &LeaseBackupInfo) -> Result<(), CoreError> {
        let storage = self.storage()?;
        let slot = self.slot(backup.lease)?;
        let mut book = slot.writer.lock();
        let record = storage.restore_backup(backup)?;
        for warning in record_warnings(&record) {
            warn!(lease = %backup.lease, "{}", warning);
        }
        let restored = LeaseBook::from_record(record);
        {
            let mut index = self.request_index.write();
            index.retain(|_, lease| *lease != backup.lease);
            for request in restored.requests().iter() {
                index.insert(request.id, backup.lease);
            }
        }
        *slot.published.write() = Arc::new(restored.clone());
        *book = restored;
        info!(lease = %backup.lease, backup = %backup.id, "lease restored from backup");
        Ok(())
    }

    fn storage(&self) -> Result<&Arc<dyn LeaseStorage>, CoreError> {
        self.storage
            .as_ref()
            .ok_or_else(|| CoreError::Storage("no storage attached".into()))
    }

    fn install(&self, book: LeaseBook) {
        let id = book.lease().id;
        {
            let mut index = self.request_index.write();
            for request in book.requests().iter() {
                index.insert(request.id, id);
            }
        }
        self.leases.write().insert(id, Arc::new(LeaseSlot::new(book)));
    }

    fn slot(&self, lease: LeaseId) -> Result<Arc<LeaseSlot>, CoreError> {
        self.leases
            .read()
            .get(&lease)
            .cloned()
            .ok_or(CoreError::LeaseNotFound(lease))
    }

    fn lease_of(&self, request: RequestId) -> Result<LeaseId, CoreError> {
        self.request_index
            .read()
            .get(&request)
            .copied()
            .ok_or(CoreError::RequestNotFound(request))
    }

    fn write<T>(
        &self,
        lease: LeaseId,
        op: impl FnOnce(&mut LeaseBook, DateTime<Utc>) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let slot = self.slot(lease)?;
        let (value, events) = {
            let mut book = slot.writer.lock();
            let mut working = book.clone();
            let value = op(&mut working, self.clock.now())?;
            let events = working.take_events();
            if let Some(storage) = &self.storage {
                storage.save_lease(&working.to_record())?;
            }
            *slot.published.write() = Arc::new(working.clone());
            *book = working;
            (value, events)
        };
        self.dispatch(&events);
        Ok(value)
    }

    fn dispatch(&self, events: &[ExchangeEvent]) {
        for event in events {
            if let Err(err) = self.dispatcher.dispatch(event) {
                warn!(
                    lease = %event.lease_id,
                    request = %event.request_id,
                    status = %event.status,
                    error = %err,
                    "notification dispatch failed"
                );
            }
        }
    }
}

fn is_countered(request: &Request) -> bool {
    request.status == RequestStatus::Countered
}
