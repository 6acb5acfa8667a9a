//! Text renderings of engine read models, shared by the command handlers.

use nightswap_core::{CardAction, DayStanding, RequestCard};
use nightswap_domain::{
    format_nights, Lease, NightOwner, Request, RequestKind, TransactionRecord,
};
use rust_decimal::Decimal;

/// Formatting backed by the active configuration's currency.
#[derive(Debug, Clone)]
pub struct CliFormatters {
    currency: String,
}

impl CliFormatters {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn money(&self, amount: Decimal) -> String {
        format!("{:.2} {}", amount.round_dp(2), self.currency)
    }

    pub fn owner(&self, lease: &Lease, owner: NightOwner) -> String {
        match owner {
            NightOwner::Occupant(id) => lease.occupant_name(id),
            NightOwner::Shared(a, b) => format!(
                "{} & {}",
                lease.occupant_name(a),
                lease.occupant_name(b)
            ),
        }
    }

    pub fn standing(&self, lease: &Lease, standing: DayStanding) -> String {
        match standing {
            DayStanding::Mine => "mine".into(),
            DayStanding::Theirs(id) => lease.occupant_name(id),
            DayStanding::SharedWithMe(id) => {
                format!("shared with {}", lease.occupant_name(id))
            }
            DayStanding::SharedByOthers => "shared by others".into(),
        }
    }

    /// One-line summary: kind, short id, status, parties, nights, and price.
    pub fn request(&self, lease: &Lease, request: &Request) -> String {
        format!(
            "{} {} [{}] {} -> {}: {}{} for {}",
            request.kind,
            request.id.short(),
            request.status,
            lease.occupant_name(request.initiator),
            lease.occupant_name(request.counterpart),
            format_nights(&request.target_nights),
            offered_suffix(&request.kind),
            self.money(request.price)
        )
    }

    pub fn card(&self, lease: &Lease, card: &RequestCard) -> String {
        let mut line = format!(
            "{} {} [{}] {} -> {}: {}{} for {}",
            card.kind,
            card.request_id.short(),
            card.status,
            lease.occupant_name(card.initiator),
            lease.occupant_name(card.counterpart),
            format_nights(&card.target_nights),
            offered_suffix(&card.kind),
            self.money(card.price)
        );
        if let Some(parent) = card.parent_request_id {
            line.push_str(&format!(" (counters {})", parent.short()));
        }
        if !card.actions.is_empty() {
            let actions: Vec<&str> = card.actions.iter().map(action_label).collect();
            line.push_str(&format!(" | you can: {}", actions.join(", ")));
        }
        line
    }

    pub fn transaction(&self, lease: &Lease, record: &TransactionRecord) -> String {
        let mut line = format!(
            "{} {} {}: {} -> {} {}",
            record.settled_at.format("%Y-%m-%d %H:%M"),
            record.kind.label(),
            record.request_id.short(),
            lease.occupant_name(record.from_owner),
            lease.occupant_name(record.to_owner),
            format_nights(&record.dates)
        );
        if !record.returned_dates.is_empty() {
            line.push_str(&format!(
                " (returned {})",
                format_nights(&record.returned_dates)
            ));
        }
        line.push_str(&format!(" for {}", self.money(record.price)));
        line
    }
}

fn offered_suffix(kind: &RequestKind) -> String {
    match kind.offered_nights() {
        Some(offered) => format!(" in exchange for {}", format_nights(offered)),
        None => String::new(),
    }
}

fn action_label(action: &CardAction) -> &'static str {
    match action {
        CardAction::Accept => "accept",
        CardAction::Decline => "decline",
        CardAction::Counter => "counter",
        CardAction::Cancel => "cancel",
    }
}
