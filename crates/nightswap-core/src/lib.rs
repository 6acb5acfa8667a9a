//! nightswap-core
//!
//! Negotiation engine for split-lease night exchange.
//! Depends on nightswap-domain. No CLI, no terminal I/O, no direct storage interactions.

pub mod book;
pub mod calendar;
pub mod error;
pub mod hub;
pub mod journal;
pub mod night_ledger;
pub mod notify;
pub mod pricing;
pub mod request_engine;
pub mod settings;
pub mod storage;
pub mod thread;
pub mod time;

#[cfg(test)]
mod tests;

pub use book::LeaseBook;
pub use calendar::{CalendarDay, DayStanding, PerspectiveDay};
pub use error::{CoreError, ErrorKind};
pub use hub::ExchangeHub;
pub use journal::{History, TransactionJournal};
pub use night_ledger::{LedgerError, NightLedger, OwnershipPattern};
pub use notify::{ExchangeEvent, NoopDispatcher, NotificationDispatcher, NotifyError, TracingDispatcher};
pub use request_engine::{CounterTerms, ExpireOutcome, NewRequest};
pub use settings::ExchangeSettings;
pub use storage::{LeaseBackupInfo, LeaseRecord, LeaseStorage};
pub use thread::{CardAction, CardRole, MessageView, NegotiationThread, RequestCard, ViewContent};
pub use time::{Clock, ManualClock, SystemClock};
