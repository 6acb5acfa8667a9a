//! Negotiation thread messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LeaseId, OccupantId, RequestId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Text(String),
    /// Reference to a request; rendered with the request's live status.
    RequestCard(RequestId),
    /// Replacement text for an earlier message, identified by its sequence.
    Edit { edits: u64, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub lease_id: LeaseId,
    /// Position in the lease's thread, starting at 1 with no gaps.
    pub sequence: u64,
    /// `None` for engine-authored entries.
    pub author: Option<OccupantId>,
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn request_id(&self) -> Option<RequestId> {
        match self.body {
            MessageBody::RequestCard(id) => Some(id),
            _ => None,
        }
    }
}
