use crate::cli::core::{CommandError, CommandResult};
use crate::cli::formatters::CliFormatters;
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::{CliMode, ShellContext};

use super::lease::pick_backup;

const CONFIG_USAGE: &str = "config [show|backup [note]|backups|restore <number | name-prefix>]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "config",
        "View and back up shell preferences",
        CONFIG_USAGE,
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((action, rest)) = args.split_first() else {
        return show_config(context);
    };
    match action.to_ascii_lowercase().as_str() {
        "show" => show_config(context),
        "backup" => {
            let note = (!rest.is_empty()).then(|| rest.join(" "));
            let name = context
                .config_manager
                .backup(&context.config, note.as_deref())?;
            output::success(format!("Configuration backup written: {}", name));
            Ok(())
        }
        "backups" => {
            let backups = context.config_manager.list_backups()?;
            if backups.is_empty() {
                output::info("No configuration backups yet.");
                return Ok(());
            }
            output::section("Configuration backups");
            for (index, name) in backups.iter().enumerate() {
                output::info(format!("{:>2}. {}", index + 1, name));
            }
            Ok(())
        }
        "restore" => {
            let reference = rest.first().ok_or_else(|| {
                CommandError::InvalidArguments(format!("usage: {}", CONFIG_USAGE))
            })?;
            let backups = context.config_manager.list_backups()?;
            let name = pick_backup(&backups, reference, |name| name.as_str())?;
            let mut restored = context.config_manager.restore(name)?;
            restored.validate()?;
            restored.last_opened_lease = context.config.last_opened_lease.clone();
            context.config_manager.save(&restored)?;
            context.formatters = CliFormatters::new(restored.currency.clone());
            colored::control::set_override(
                restored.ui_color_enabled && context.mode == CliMode::Interactive,
            );
            context.config = restored;
            output::success(format!("Configuration restored from {}.", name));
            output::hint("Request expiry and backup retention apply from the next session.");
            Ok(())
        }
        other => Err(CommandError::InvalidArguments(format!(
            "unknown config action `{}`; usage: {}",
            other, CONFIG_USAGE
        ))),
    }
}

fn show_config(context: &ShellContext) -> CommandResult {
    let config = &context.config;
    output::section("Configuration");
    output::info(format!("file              {}", context.config_manager.config_path().display()));
    output::info(format!("data root         {}", context.data_root.display()));
    output::info(format!("locale            {}", config.locale));
    output::info(format!("currency          {}", config.currency));
    output::info(format!("request ttl       {}h", config.request_ttl_hours));
    output::info(format!("backup retention  {}", config.backup_retention));
    output::info(format!("log filter        {}", config.log_filter));
    output::info(format!("color             {}", config.ui_color_enabled));
    Ok(())
}
