use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use nightswap_domain::{
    Lease, LeaseId, LockState, Message, Night, Request, RequestStatus, TransactionRecord,
};
use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Full persisted state of one lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    #[serde(default = "LeaseRecord::default_schema_version")]
    pub schema_version: u32,
    pub lease: Lease,
    pub nights: Vec<Night>,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

impl LeaseRecord {
    fn default_schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Describes a persisted backup artifact for a lease.
#[derive(Debug, Clone)]
pub struct LeaseBackupInfo {
    pub lease: LeaseId,
    pub id: String,
    pub created_at: String,
    pub path: PathBuf,
}

/// Abstraction over persistence backends capable of storing leases and backups.
pub trait LeaseStorage: Send + Sync {
    fn save_lease(&self, record: &LeaseRecord) -> Result<(), CoreError>;
    fn load_lease(&self, id: LeaseId) -> Result<LeaseRecord, CoreError>;
    fn list_leases(&self) -> Result<Vec<LeaseId>, CoreError>;
    fn backup_lease(
        &self,
        record: &LeaseRecord,
        note: Option<&str>,
    ) -> Result<LeaseBackupInfo, CoreError>;
    fn list_backups(&self, id: LeaseId) -> Result<Vec<LeaseBackupInfo>, CoreError>;
    fn restore_backup(&self, backup: &LeaseBackupInfo) -> Result<LeaseRecord, CoreError>;
}

/// Detects dangling references and other anomalies within a lease snapshot.
pub fn record_warnings(record: &LeaseRecord) -> Vec<String> {
    let statuses: HashMap<_, _> = record.requests.iter().map(|r| (r.id, r.status)).collect();
    let mut warnings = Vec::new();

    for night in &record.nights {
        if !record.lease.contains(night.date) {
            warnings.push(format!("night {} lies outside the lease", night.date));
        }
        if let LockState::Pending(holder) = night.lock {
            match statuses.get(&holder) {
                Some(RequestStatus::Pending) => {}
                Some(status) => warnings.push(format!(
                    "night {} locked by {} request {}",
                    night.date, status, holder
                )),
                None => warnings.push(format!(
                    "night {} locked by unknown request {}",
                    night.date, holder
                )),
            }
        }
    }

    let settled: HashSet<_> = record.transactions.iter().map(|t| t.request_id).collect();
    for request in &record.requests {
        if request.status == RequestStatus::Accepted && !settled.contains(&request.id) {
            warnings.push(format!("accepted request {} has no transaction", request.id));
        }
        if let Some(parent) = request.parent_request_id {
            if !statuses.contains_key(&parent) {
                warnings.push(format!(
                    "request {} counters missing request {}",
                    request.id, parent
                ));
            }
        }
    }
    for transaction in &record.transactions {
        if statuses.get(&transaction.request_id) != Some(&RequestStatus::Accepted) {
            warnings.push(format!(
                "transaction for request {} without an accepted request",
                transaction.request_id
            ));
        }
    }

    let mut sequences: Vec<_> = record.messages.iter().map(|m| m.sequence).collect();
    sequences.sort_unstable();
    for (index, sequence) in sequences.iter().enumerate() {
        if *sequence != index as u64 + 1 {
            warnings.push(format!("thread sequence gap before #{}", sequence));
            break;
        }
    }
    warnings
}
