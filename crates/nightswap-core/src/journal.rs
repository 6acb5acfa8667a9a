//! Append-only record of settled transfers.

use std::sync::Arc;

use nightswap_domain::{RequestId, TransactionRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionJournal {
    records: Arc<Vec<TransactionRecord>>,
}

impl TransactionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a journal from persisted records.
    pub fn from_records(records: Vec<TransactionRecord>) -> Self {
        let mut journal = Self::new();
        for record in records {
            journal.record(record);
        }
        journal
    }

    /// Appends `transaction`, keeping timestamp order. Recording the same
    /// request twice is a no-op; returns whether a record was added.
    pub fn record(&mut self, transaction: TransactionRecord) -> bool {
        if self.get(transaction.request_id).is_some() {
            return false;
        }
        let records = Arc::make_mut(&mut self.records);
        let position =
            records.partition_point(|existing| existing.settled_at <= transaction.settled_at);
        records.insert(position, transaction);
        true
    }

    pub fn get(&self, request_id: RequestId) -> Option<&TransactionRecord> {
        self.records
            .iter()
            .find(|record| record.request_id == request_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Point-in-time view of the journal that can be iterated any number of times.
    pub fn history(&self) -> History {
        History {
            records: Arc::clone(&self.records),
        }
    }
}

/// Settled transfers ordered by timestamp. Cloning is cheap and later
/// appends to the journal are not visible through an existing `History`.
#[derive(Debug, Clone)]
pub struct History {
    records: Arc<Vec<TransactionRecord>>,
}

impl History {
    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a TransactionRecord;
    type IntoIter = std::slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
