//! Offer pricing.

use nightswap_domain::{Lease, NightSet, RequestKind};
use rust_decimal::Decimal;

use crate::CoreError;

/// Computes the signed amount the acquirer pays the holder.
///
/// Buyout: `base_rate * nights + adjustment`. Share: half of that before the
/// adjustment. Swap: the adjustment alone, which is mandatory when the two
/// sides exchange a different number of nights.
pub fn price(
    lease: &Lease,
    kind: &RequestKind,
    target_nights: &NightSet,
    manual_adjustment: Option<Decimal>,
) -> Result<Decimal, CoreError> {
    if target_nights.is_empty() {
        return Err(CoreError::Validation("no target nights selected".into()));
    }
    if lease.base_rate <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "base nightly rate must be positive".into(),
        ));
    }
    let adjustment = manual_adjustment.unwrap_or(Decimal::ZERO);
    let nights = Decimal::from(target_nights.len());
    match kind {
        RequestKind::Buyout => Ok(lease.base_rate * nights + adjustment),
        RequestKind::Share => Ok(lease.base_rate * nights / Decimal::TWO + adjustment),
        RequestKind::Swap { offered_nights } => {
            if offered_nights.is_empty() {
                return Err(CoreError::Validation(
                    "a swap must offer at least one night".into(),
                ));
            }
            if offered_nights.len() != target_nights.len() && manual_adjustment.is_none() {
                return Err(CoreError::Validation(format!(
                    "swapping {} night(s) for {} requires a manual adjustment",
                    offered_nights.len(),
                    target_nights.len()
                )));
            }
            Ok(adjustment)
        }
    }
}
