use nightswap_core::ViewContent;

use super::expect_args;
use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "say",
            "Post a message to the lease thread",
            "say <text>",
            cmd_say,
        ),
        CommandEntry::new(
            "edit",
            "Correct one of your earlier messages",
            "edit <sequence> <text>",
            cmd_edit,
        ),
        CommandEntry::new(
            "thread",
            "Show the negotiation thread with live request status",
            "thread",
            cmd_thread,
        ),
        CommandEntry::new(
            "history",
            "Show settled exchanges",
            "history",
            cmd_history,
        ),
    ]
}

fn cmd_say(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 1, "say <text>")?;
    let (lease, actor) = context.require_actor()?;
    let message = context.hub.post_message(lease.id, actor, &args.join(" "))?;
    output::success(format!("Posted #{}.", message.sequence));
    Ok(())
}

fn cmd_edit(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    expect_args(args, 2, "edit <sequence> <text>")?;
    let (lease, actor) = context.require_actor()?;
    let sequence = args[0].trim_start_matches('#').parse::<u64>().map_err(|_| {
        CommandError::InvalidArguments(format!("invalid message number `{}`", args[0]))
    })?;
    let message = context
        .hub
        .edit_message(lease.id, actor, sequence, &args[1..].join(" "))?;
    output::success(format!("Edited #{} as #{}.", sequence, message.sequence));
    Ok(())
}

fn cmd_thread(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let (lease, actor) = context.require_actor()?;
    let view = context.hub.view(lease.id, actor)?;
    output::section(format!("Thread: {}", lease.name));
    if view.is_empty() {
        output::info("No messages yet.");
    }
    for message in view {
        let author = message
            .author
            .map(|id| lease.occupant_name(id))
            .unwrap_or_else(|| "system".into());
        let body = match &message.content {
            ViewContent::Text { text, edited } => {
                if *edited {
                    format!("{} (edited)", text)
                } else {
                    text.clone()
                }
            }
            ViewContent::Edit { edits, .. } => format!("edited #{}", edits),
            ViewContent::RequestCard(card) => context.formatters.card(&lease, card),
        };
        output::info(format!(
            "#{:<3} {} {}: {}",
            message.sequence,
            message.sent_at.format("%m-%d %H:%M"),
            author,
            body
        ));
    }
    Ok(())
}

fn cmd_history(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let lease = context.require_lease()?;
    let history = context.hub.history(lease.id)?;
    output::section(format!("History: {}", lease.name));
    if history.is_empty() {
        output::info("No settled exchanges yet.");
    }
    for record in &history {
        output::info(context.formatters.transaction(&lease, record));
    }
    Ok(())
}
