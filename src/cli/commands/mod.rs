pub mod config;
pub mod lease;
pub mod request;
pub mod system;
pub mod thread;

use std::str::FromStr;

use chrono::NaiveDate;
use nightswap_domain::NightSet;
use rust_decimal::Decimal;

use crate::cli::core::CommandError;
use crate::cli::registry::CommandEntry;

pub(crate) fn all_definitions() -> Vec<CommandEntry> {
    let mut commands = Vec::new();
    commands.extend(lease::definitions());
    commands.extend(request::definitions());
    commands.extend(thread::definitions());
    commands.extend(config::definitions());
    commands.extend(system::definitions());
    commands
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        CommandError::InvalidArguments(format!("invalid date `{}` (use YYYY-MM-DD)", input))
    })
}

/// Parses `2026-02-10,2026-02-12` or inclusive ranges like `2026-02-10..2026-02-12`.
pub(crate) fn parse_nights(input: &str) -> Result<NightSet, CommandError> {
    let mut nights = NightSet::new();
    for part in input.split(',').filter(|part| !part.trim().is_empty()) {
        match part.split_once("..") {
            Some((from, to)) => {
                let (from, to) = (parse_date(from)?, parse_date(to)?);
                if to < from {
                    return Err(CommandError::InvalidArguments(format!(
                        "range `{}` ends before it starts",
                        part
                    )));
                }
                nights.extend(from.iter_days().take_while(|day| *day <= to));
            }
            None => {
                nights.insert(parse_date(part)?);
            }
        }
    }
    if nights.is_empty() {
        return Err(CommandError::InvalidArguments("no nights given".into()));
    }
    Ok(nights)
}

pub(crate) fn parse_amount(input: &str) -> Result<Decimal, CommandError> {
    let trimmed = input.trim();
    Decimal::from_str(trimmed.strip_prefix('+').unwrap_or(trimmed))
        .map_err(|_| CommandError::InvalidArguments(format!("invalid amount `{}`", input)))
}

pub(crate) fn expect_args(args: &[&str], min: usize, usage: &str) -> Result<(), CommandError> {
    if args.len() < min {
        return Err(CommandError::InvalidArguments(format!("usage: {}", usage)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn nights_accept_lists_and_ranges() {
        let nights = parse_nights("2026-02-10..2026-02-12,2026-02-15").expect("parse");
        let expected: NightSet = [day(10), day(11), day(12), day(15)].into();
        assert_eq!(nights, expected);
        assert!(parse_nights("2026-02-12..2026-02-10").is_err());
        assert!(parse_nights("tuesday").is_err());
        assert!(parse_nights(",").is_err());
    }

    #[test]
    fn amounts_allow_explicit_sign() {
        assert_eq!(parse_amount("+10").unwrap(), dec!(10));
        assert_eq!(parse_amount("-7.5").unwrap(), dec!(-7.5));
        assert!(parse_amount("ten").is_err());
    }
}
