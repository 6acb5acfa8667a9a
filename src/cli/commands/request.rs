use nightswap_core::{CounterTerms, ExpireOutcome, NewRequest};
use nightswap_domain::{Request, RequestKind};

use super::{expect_args, parse_amount, parse_nights};
use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::{Awaiting, ShellContext};

const BUYOUT_USAGE: &str = "buyout <occupant> <nights> [adjustment]";
const SWAP_USAGE: &str = "swap <occupant> <their-nights> <my-nights> [adjustment]";
const SHARE_USAGE: &str = "share <occupant> <nights> [adjustment]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "buyout",
            "Offer to buy another occupant's nights",
            BUYOUT_USAGE,
            cmd_buyout,
        ),
        CommandEntry::new(
            "swap",
            "Offer some of your nights for some of theirs",
            SWAP_USAGE,
            cmd_swap,
        ),
        CommandEntry::new(
            "share",
            "Offer to co-own another occupant's nights for half the rate",
            SHARE_USAGE,
            cmd_share,
        ),
        CommandEntry::new(
            "accept",
            "Accept a request addressed to you",
            "accept [request]",
            cmd_accept,
        ),
        CommandEntry::new(
            "decline",
            "Decline a request addressed to you",
            "decline [request]",
            cmd_decline,
        ),
        CommandEntry::new(
            "counter",
            "Answer a request with new terms",
            "counter [request] [kind=buyout|share|swap] [nights=<dates>] [offer=<dates>] [adjust=<amount>]",
            cmd_counter,
        ),
        CommandEntry::new(
            "cancel",
            "Withdraw a request you proposed",
            "cancel [request]",
            cmd_cancel,
        ),
        CommandEntry::new(
            "expire",
            "Expire one request, or every request past its deadline",
            "expire [request]",
            cmd_expire,
        ),
        CommandEntry::new(
            "lineage",
            "Show the counter chain behind a request",
            "lineage [request]",
            cmd_lineage,
        ),
    ]
}

fn cmd_buyout(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 2, BUYOUT_USAGE)?;
    let (lease, actor) = context.require_actor()?;
    let counterpart = context.occupant(&lease, args[0])?;
    let new = with_optional_adjustment(
        NewRequest::buyout(actor, counterpart, parse_nights(args[1])?),
        args.get(2),
    )?;
    open(context, new)
}

fn cmd_swap(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 3, SWAP_USAGE)?;
    let (lease, actor) = context.require_actor()?;
    let counterpart = context.occupant(&lease, args[0])?;
    let new = with_optional_adjustment(
        NewRequest::swap(
            actor,
            counterpart,
            parse_nights(args[1])?,
            parse_nights(args[2])?,
        ),
        args.get(3),
    )?;
    open(context, new)
}

fn cmd_share(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 2, SHARE_USAGE)?;
    let (lease, actor) = context.require_actor()?;
    let counterpart = context.occupant(&lease, args[0])?;
    let new = with_optional_adjustment(
        NewRequest::share(actor, counterpart, parse_nights(args[1])?),
        args.get(2),
    )?;
    open(context, new)
}

fn with_optional_adjustment(
    new: NewRequest,
    raw: Option<&&str>,
) -> Result<NewRequest, CommandError> {
    match raw {
        Some(raw) => Ok(new.with_adjustment(parse_amount(raw)?)),
        None => Ok(new),
    }
}

fn open(context: &mut ShellContext, new: NewRequest) -> CommandResult {
    let lease = context.require_lease()?;
    let request = context.hub.create(lease.id, new)?;
    output::success(format!(
        "Request opened: {}",
        context.formatters.request(&lease, &request)
    ));
    Ok(())
}

fn cmd_accept(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (lease, actor) = context.require_actor()?;
    let request = context.resolve_request(args.first().copied(), Awaiting::Responder)?;
    let accepted = context.hub.accept(request.id, actor)?;
    output::success(format!(
        "Accepted: {}",
        context.formatters.request(&lease, &accepted)
    ));
    Ok(())
}

fn cmd_decline(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (lease, actor) = context.require_actor()?;
    let request = context.resolve_request(args.first().copied(), Awaiting::Responder)?;
    let declined = context.hub.decline(request.id, actor)?;
    output::success(format!(
        "Declined: {}",
        context.formatters.request(&lease, &declined)
    ));
    Ok(())
}

fn cmd_cancel(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (lease, actor) = context.require_actor()?;
    let request = context.resolve_request(args.first().copied(), Awaiting::Proposer)?;
    let cancelled = context.hub.cancel(request.id, actor)?;
    output::success(format!(
        "Cancelled: {}",
        context.formatters.request(&lease, &cancelled)
    ));
    Ok(())
}

fn cmd_counter(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (lease, actor) = context.require_actor()?;
    let (reference, options) = match args.split_first() {
        Some((first, rest)) if !first.contains('=') => (Some(*first), rest),
        _ => (None, args),
    };
    let parent = context.resolve_request(reference, Awaiting::Responder)?;
    let terms = parse_counter_terms(&parent, options)?;
    let child = context.hub.counter(parent.id, actor, terms)?;
    output::success(format!(
        "Countered {}: {}",
        parent.id.short(),
        context.formatters.request(&lease, &child)
    ));
    Ok(())
}

fn parse_counter_terms(parent: &Request, options: &[&str]) -> Result<CounterTerms, CommandError> {
    let mut terms = CounterTerms::default();
    for option in options {
        let (key, value) = option.split_once('=').ok_or_else(|| {
            CommandError::InvalidArguments(format!("expected key=value, got `{}`", option))
        })?;
        match key.to_ascii_lowercase().as_str() {
            "kind" => {
                terms.kind = Some(match value.to_ascii_lowercase().as_str() {
                    "buyout" => RequestKind::Buyout,
                    "share" => RequestKind::Share,
                    "swap" => RequestKind::Swap {
                        offered_nights: parent.offered_nights().cloned().unwrap_or_default(),
                    },
                    other => {
                        return Err(CommandError::InvalidArguments(format!(
                            "unknown request kind `{}`",
                            other
                        )))
                    }
                })
            }
            "nights" => terms.target_nights = Some(parse_nights(value)?),
            "offer" => terms.offered_nights = Some(parse_nights(value)?),
            "adjust" => terms.manual_adjustment = Some(parse_amount(value)?),
            other => {
                return Err(CommandError::InvalidArguments(format!(
                    "unknown counter option `{}`",
                    other
                )))
            }
        }
    }
    Ok(terms)
}

fn cmd_expire(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let Some(reference) = args.first().copied() else {
        let expired = context.hub.expire_due(lease.id)?;
        if expired.is_empty() {
            output::info("No requests are past their deadline.");
        }
        for request in expired {
            output::success(format!(
                "Expired: {}",
                context.formatters.request(&lease, &request)
            ));
        }
        return Ok(());
    };

    let request = context.resolve_request(Some(reference), Awaiting::Anyone)?;
    match context.hub.expire(request.id)? {
        ExpireOutcome::Expired(request) => output::success(format!(
            "Expired: {}",
            context.formatters.request(&lease, &request)
        )),
        ExpireOutcome::AlreadyResolved(request) => output::info(format!(
            "Request {} was already {}.",
            request.id.short(),
            request.status
        )),
    }
    Ok(())
}

fn cmd_lineage(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let request = context.resolve_request(args.first().copied(), Awaiting::Anyone)?;
    output::section(format!("Lineage of {}", request.id.short()));
    for (depth, step) in context.hub.lineage(request.id)?.iter().enumerate() {
        output::info(format!(
            "{}{}",
            "  ".repeat(depth),
            context.formatters.request(&lease, step)
        ));
    }
    Ok(())
}
