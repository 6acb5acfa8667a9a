//! Shared traits and date helpers.

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Ordered, de-duplicated set of calendar nights.
pub type NightSet = BTreeSet<NaiveDate>;

/// Formats a night set as a comma separated list of ISO dates.
pub fn format_nights(nights: &NightSet) -> String {
    nights
        .iter()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
