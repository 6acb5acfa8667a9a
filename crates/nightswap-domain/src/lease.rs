//! Lease and occupant models.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{LeaseId, OccupantId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// A party to a lease.
pub struct Occupant {
    pub id: OccupantId,
    pub name: String,
}

impl Occupant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OccupantId::new(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A shared rental agreement. Nights cover the half-open range `[start, end)`.
pub struct Lease {
    pub id: LeaseId,
    pub name: String,
    pub occupants: Vec<Occupant>,
    pub base_rate: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(
        name: impl Into<String>,
        occupants: Vec<Occupant>,
        base_rate: Decimal,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, LeaseError> {
        if occupants.len() < 2 {
            return Err(LeaseError::TooFewOccupants);
        }
        let mut seen = HashSet::new();
        for occupant in &occupants {
            if !seen.insert(occupant.id) {
                return Err(LeaseError::DuplicateOccupant(occupant.id));
            }
        }
        if base_rate <= Decimal::ZERO {
            return Err(LeaseError::NonPositiveRate);
        }
        if end <= start {
            return Err(LeaseError::InvalidRange);
        }
        Ok(Self {
            id: LeaseId::new(),
            name: name.into(),
            occupants,
            base_rate,
            start,
            end,
            created_at: Utc::now(),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Every night of the lease in calendar order.
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |date| *date < self.end)
    }

    pub fn night_count(&self) -> usize {
        (self.end - self.start).num_days().max(0) as usize
    }

    pub fn is_party(&self, id: OccupantId) -> bool {
        self.occupants.iter().any(|occupant| occupant.id == id)
    }

    pub fn occupant(&self, id: OccupantId) -> Option<&Occupant> {
        self.occupants.iter().find(|occupant| occupant.id == id)
    }

    /// Case-insensitive lookup used by shells and fixtures.
    pub fn occupant_by_name(&self, name: &str) -> Option<&Occupant> {
        self.occupants
            .iter()
            .find(|occupant| occupant.name.eq_ignore_ascii_case(name))
    }

    pub fn occupant_name(&self, id: OccupantId) -> String {
        self.occupant(id)
            .map(|occupant| occupant.name.clone())
            .unwrap_or_else(|| id.short())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`Lease`] values.
pub enum LeaseError {
    TooFewOccupants,
    DuplicateOccupant(OccupantId),
    NonPositiveRate,
    InvalidRange,
}

impl fmt::Display for LeaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaseError::TooFewOccupants => f.write_str("a lease needs at least two occupants"),
            LeaseError::DuplicateOccupant(id) => write!(f, "occupant {} listed twice", id),
            LeaseError::NonPositiveRate => f.write_str("base nightly rate must be positive"),
            LeaseError::InvalidRange => f.write_str("lease end must be after start"),
        }
    }
}

impl std::error::Error for LeaseError {}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn lease_requires_two_occupants() {
        let err = Lease::new("Solo", vec![Occupant::new("Alex")], dec!(50), date(1), date(5))
            .unwrap_err();
        assert_eq!(err, LeaseError::TooFewOccupants);
    }

    #[test]
    fn lease_rejects_non_positive_rate_and_empty_range() {
        let occupants = vec![Occupant::new("Alex"), Occupant::new("Sarah")];
        assert_eq!(
            Lease::new("Zero", occupants.clone(), dec!(0), date(1), date(5)).unwrap_err(),
            LeaseError::NonPositiveRate
        );
        assert_eq!(
            Lease::new("Empty", occupants, dec!(50), date(5), date(5)).unwrap_err(),
            LeaseError::InvalidRange
        );
    }

    #[test]
    fn nights_cover_half_open_range() {
        let lease = Lease::new(
            "Loft",
            vec![Occupant::new("Alex"), Occupant::new("Sarah")],
            dec!(50),
            date(1),
            date(4),
        )
        .unwrap();
        let nights: Vec<_> = lease.nights().collect();
        assert_eq!(nights, vec![date(1), date(2), date(3)]);
        assert_eq!(lease.night_count(), 3);
        assert!(!lease.contains(date(4)));
        assert!(lease.occupant_by_name("sarah").is_some());
    }
}
