use nightswap_core::OwnershipPattern;
use nightswap_domain::{Lease, LeaseId, Occupant};

use super::{expect_args, parse_amount, parse_date};
use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;

const LEASE_USAGE: &str = "lease <name> <start YYYY-MM-DD> <end YYYY-MM-DD> <nightly-rate> <occupant> <occupant> [...]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "lease",
            "Open a lease with nights alternating between occupants",
            LEASE_USAGE,
            cmd_lease,
        ),
        CommandEntry::new("leases", "List known leases", "leases", cmd_leases),
        CommandEntry::new(
            "use",
            "Select the current lease",
            "use <lease-id-prefix | name>",
            cmd_use,
        ),
        CommandEntry::new(
            "as",
            "Act as an occupant of the current lease",
            "as <occupant>",
            cmd_as,
        ),
        CommandEntry::new(
            "calendar",
            "Show night ownership and pending locks",
            "calendar [all]",
            cmd_calendar,
        ),
        CommandEntry::new(
            "backup",
            "Write a backup of the current lease",
            "backup [note]",
            cmd_backup,
        ),
        CommandEntry::new(
            "backups",
            "List backups of the current lease, newest first",
            "backups",
            cmd_backups,
        ),
        CommandEntry::new(
            "restore",
            "Replace the current lease with one of its backups",
            "restore <number | backup-name-prefix>",
            cmd_restore,
        ),
    ]
}

fn cmd_lease(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 6, LEASE_USAGE)?;
    let start = parse_date(args[1])?;
    let end = parse_date(args[2])?;
    let rate = parse_amount(args[3])?;
    let occupants: Vec<Occupant> = args[4..].iter().map(|name| Occupant::new(*name)).collect();
    let lease = Lease::new(args[0], occupants, rate, start, end)
        .map_err(|err| CommandError::InvalidArguments(err.to_string()))?;
    let first = lease.occupants[0].id;
    let names: Vec<String> = lease.occupants.iter().map(|o| o.name.clone()).collect();
    let summary = format!(
        "Lease `{}` opened ({}) for {} with {} nights at {} per night.",
        lease.name,
        lease.id.short(),
        names.join(", "),
        lease.night_count(),
        context.formatters.money(lease.base_rate)
    );

    let id = context.hub.open_lease(lease, &OwnershipPattern::Alternating)?;
    context.current_lease = Some(id);
    context.acting = Some(first);
    context.remember_lease();
    output::success(summary);
    output::info(format!("Acting as {}.", names[0]));
    Ok(())
}

fn cmd_leases(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let mut leases = Vec::new();
    for id in context.hub.lease_ids() {
        leases.push(context.hub.lease(id)?);
    }
    if leases.is_empty() {
        output::info("No leases yet. Use `lease` to open one.");
        return Ok(());
    }
    leases.sort_by(|a, b| a.name.cmp(&b.name));
    output::section("Leases");
    for lease in leases {
        let marker = if context.current_lease == Some(lease.id) {
            "*"
        } else {
            " "
        };
        let names: Vec<&str> = lease.occupants.iter().map(|o| o.name.as_str()).collect();
        output::info(format!(
            "{} {} {:<16} {} .. {}  {}",
            marker,
            lease.id.short(),
            lease.name,
            lease.start,
            lease.end,
            names.join(", ")
        ));
    }
    Ok(())
}

fn cmd_use(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 1, "use <lease-id-prefix | name>")?;
    let id = find_lease(context, args[0])?;
    let lease = context.hub.lease(id)?;
    context.current_lease = Some(id);
    context.acting = None;
    context.remember_lease();
    output::success(format!("Using lease `{}` ({}).", lease.name, id.short()));
    Ok(())
}

fn find_lease(context: &ShellContext, reference: &str) -> Result<LeaseId, CommandError> {
    let needle = reference.to_lowercase();
    let mut matches = Vec::new();
    for id in context.hub.lease_ids() {
        let lease = context.hub.lease(id)?;
        if id.to_string().starts_with(&needle) || lease.name.to_lowercase() == needle {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(CommandError::InvalidArguments(format!(
            "no lease matches `{}`",
            reference
        ))),
        _ => Err(CommandError::InvalidArguments(format!(
            "lease reference `{}` is ambiguous",
            reference
        ))),
    }
}

fn cmd_as(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 1, "as <occupant>")?;
    let lease = context.require_lease()?;
    let id = context.occupant(&lease, args[0])?;
    context.acting = Some(id);
    output::success(format!("Acting as {}.", lease.occupant_name(id)));
    Ok(())
}

fn cmd_calendar(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let everyone = args.first().is_some_and(|arg| arg.eq_ignore_ascii_case("all"));
    output::section(format!("Calendar: {}", lease.name));

    match context.acting.filter(|id| !everyone && lease.is_party(*id)) {
        Some(actor) => {
            for day in context.hub.calendar_for(lease.id, actor)? {
                output::info(format!(
                    "{}  {:<24}{}",
                    day.date,
                    context.formatters.standing(&lease, day.standing),
                    pending_suffix(day.pending)
                ));
            }
        }
        None => {
            for day in context.hub.calendar(lease.id)? {
                output::info(format!(
                    "{}  {:<24}{}",
                    day.date,
                    context.formatters.owner(&lease, day.owner),
                    pending_suffix(day.pending)
                ));
            }
        }
    }
    Ok(())
}

fn pending_suffix(pending: Option<nightswap_domain::RequestId>) -> String {
    pending
        .map(|id| format!("pending {}", id.short()))
        .unwrap_or_default()
}

fn cmd_backup(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let note = (!args.is_empty()).then(|| args.join(" "));
    let name = context.hub.backup(lease.id, note.as_deref())?;
    output::success(format!("Backup written: {}", name));
    Ok(())
}

fn cmd_backups(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let backups = context.hub.backups(lease.id)?;
    if backups.is_empty() {
        output::info("No backups yet. Use `backup` to write one.");
        return Ok(());
    }
    output::section(format!("Backups: {}", lease.name));
    for (index, backup) in backups.iter().enumerate() {
        output::info(format!("{:>2}. {}  {}", index + 1, backup.created_at, backup.id));
    }
    Ok(())
}

fn cmd_restore(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 1, "restore <number | backup-name-prefix>")?;
    let lease = context.require_lease()?;
    let backups = context.hub.backups(lease.id)?;
    let backup = pick_backup(&backups, args[0], |backup| backup.id.as_str())?;
    context.hub.restore_backup(backup)?;
    output::success(format!("Restored `{}` from {}.", lease.name, backup.id));
    Ok(())
}

/// Resolves a 1-based list position or a unique name prefix.
pub(crate) fn pick_backup<'a, T>(
    backups: &'a [T],
    reference: &str,
    name: impl Fn(&T) -> &str,
) -> Result<&'a T, CommandError> {
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| backups.get(index))
            .ok_or_else(|| {
                CommandError::InvalidArguments(format!("no backup numbered {}", position))
            });
    }
    let matches: Vec<&T> = backups
        .iter()
        .filter(|backup| name(backup).starts_with(reference))
        .collect();
    match matches.as_slice() {
        [backup] => Ok(*backup),
        [] => Err(CommandError::InvalidArguments(format!(
            "no backup matches `{}`",
            reference
        ))),
        _ => Err(CommandError::InvalidArguments(format!(
            "backup reference `{}` is ambiguous",
            reference
        ))),
    }
}
