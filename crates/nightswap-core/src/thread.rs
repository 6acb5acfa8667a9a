//! Per-lease negotiation thread and its read model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use nightswap_domain::{
    LeaseId, Message, MessageBody, NightSet, OccupantId, Request, RequestId, RequestKind,
    RequestStatus,
};
use rust_decimal::Decimal;

use crate::{request_engine::RequestArena, CoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationThread {
    lease_id: LeaseId,
    messages: Vec<Message>,
}

impl NegotiationThread {
    pub fn new(lease_id: LeaseId) -> Self {
        Self {
            lease_id,
            messages: Vec::new(),
        }
    }

    /// Rebuilds a thread from persisted messages, ordered by sequence.
    pub fn from_messages(lease_id: LeaseId, mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|message| message.sequence);
        Self { lease_id, messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn next_sequence(&self) -> u64 {
        self.messages.last().map_or(1, |message| message.sequence + 1)
    }

    /// Appends a message under the next sequence number.
    pub fn append(
        &mut self,
        author: Option<OccupantId>,
        body: MessageBody,
        sent_at: DateTime<Utc>,
    ) -> Message {
        let message = Message {
            lease_id: self.lease_id,
            sequence: self.next_sequence(),
            author,
            body,
            sent_at,
        };
        self.messages.push(message.clone());
        message
    }

    /// Records an edit of an earlier text message as a new message.
    pub fn edit(
        &mut self,
        author: OccupantId,
        sequence: u64,
        text: String,
        sent_at: DateTime<Utc>,
    ) -> Result<Message, CoreError> {
        let original = self
            .message(sequence)
            .ok_or_else(|| CoreError::Validation(format!("no message #{}", sequence)))?;
        if !matches!(original.body, MessageBody::Text(_)) {
            return Err(CoreError::Validation(format!(
                "message #{} is not a text message",
                sequence
            )));
        }
        if original.author != Some(author) {
            return Err(CoreError::NotAuthorized(format!(
                "only the author may edit message #{}",
                sequence
            )));
        }
        Ok(self.append(
            Some(author),
            MessageBody::Edit {
                edits: sequence,
                text,
            },
            sent_at,
        ))
    }

    pub fn message(&self, sequence: u64) -> Option<&Message> {
        self.messages
            .binary_search_by_key(&sequence, |message| message.sequence)
            .ok()
            .map(|index| &self.messages[index])
    }

    /// Messages as seen by `perspective`, with request cards carrying the
    /// referenced request's current status.
    pub fn view(&self, perspective: OccupantId, requests: &RequestArena) -> Vec<MessageView> {
        let mut latest_edit: HashMap<u64, &str> = HashMap::new();
        for message in &self.messages {
            if let MessageBody::Edit { edits, text } = &message.body {
                latest_edit.insert(*edits, text.as_str());
            }
        }

        self.messages
            .iter()
            .filter_map(|message| {
                let content = match &message.body {
                    MessageBody::Text(text) => {
                        let edited = latest_edit.get(&message.sequence);
                        ViewContent::Text {
                            text: edited.map_or_else(|| text.clone(), |t| t.to_string()),
                            edited: edited.is_some(),
                        }
                    }
                    MessageBody::Edit { edits, text } => ViewContent::Edit {
                        edits: *edits,
                        text: text.clone(),
                    },
                    MessageBody::RequestCard(id) => match requests.get(*id) {
                        Some(request) => ViewContent::RequestCard(RequestCard::new(request, perspective)),
                        None => {
                            tracing::warn!(request = %id, "thread references unknown request");
                            return None;
                        }
                    },
                };
                Some(MessageView {
                    sequence: message.sequence,
                    author: message.author,
                    from_me: message.author == Some(perspective),
                    sent_at: message.sent_at,
                    content,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    pub sequence: u64,
    pub author: Option<OccupantId>,
    pub from_me: bool,
    pub sent_at: DateTime<Utc>,
    pub content: ViewContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewContent {
    Text { text: String, edited: bool },
    Edit { edits: u64, text: String },
    RequestCard(RequestCard),
}

/// How the viewer relates to a request card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardRole {
    Proposer,
    Responder,
    Observer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Accept,
    Decline,
    Counter,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestCard {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub price: Decimal,
    pub target_nights: NightSet,
    pub initiator: OccupantId,
    pub counterpart: OccupantId,
    pub parent_request_id: Option<RequestId>,
    pub role: CardRole,
    pub actions: Vec<CardAction>,
}

impl RequestCard {
    fn new(request: &Request, perspective: OccupantId) -> Self {
        let role = if request.initiator == perspective {
            CardRole::Proposer
        } else if request.counterpart == perspective {
            CardRole::Responder
        } else {
            CardRole::Observer
        };
        let actions = match (request.is_pending(), role) {
            (true, CardRole::Responder) => {
                vec![CardAction::Accept, CardAction::Decline, CardAction::Counter]
            }
            (true, CardRole::Proposer) => vec![CardAction::Cancel],
            _ => Vec::new(),
        };
        Self {
            request_id: request.id,
            kind: request.kind.clone(),
            status: request.status,
            price: request.price,
            target_nights: request.target_nights.clone(),
            initiator: request.initiator,
            counterpart: request.counterpart,
            parent_request_id: request.parent_request_id,
            role,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_gapless_from_one() {
        let lease = LeaseId::new();
        let author = OccupantId::new();
        let mut thread = NegotiationThread::new(lease);
        let first = thread.append(Some(author), MessageBody::Text("hi".into()), Utc::now());
        let second = thread.append(None, MessageBody::Text("system".into()), Utc::now());
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(thread.next_sequence(), 3);
    }

    #[test]
    fn edits_append_and_only_author_may_edit() {
        let lease = LeaseId::new();
        let alex = OccupantId::new();
        let sarah = OccupantId::new();
        let mut thread = NegotiationThread::new(lease);
        thread.append(Some(alex), MessageBody::Text("swap tuesday?".into()), Utc::now());

        let err = thread
            .edit(sarah, 1, "no".into(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAuthorized(_)));

        let edit = thread
            .edit(alex, 1, "swap wednesday?".into(), Utc::now())
            .unwrap();
        assert_eq!(edit.sequence, 2);
        assert_eq!(thread.len(), 2);

        let view = thread.view(sarah, &RequestArena::default());
        assert_eq!(
            view[0].content,
            ViewContent::Text {
                text: "swap wednesday?".into(),
                edited: true
            }
        );
        assert!(!view[0].from_me);
        assert!(matches!(view[1].content, ViewContent::Edit { edits: 1, .. }));
    }
}
