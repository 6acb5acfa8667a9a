//! Shared runtime state for shell interactions and command execution.

use std::{env, path::PathBuf, sync::Arc};

use nightswap_config::{Config, ConfigManager};
use nightswap_core::{ErrorKind, ExchangeHub, ExchangeSettings, LeaseStorage, TracingDispatcher};
use nightswap_domain::{Lease, LeaseId, OccupantId, Request};
use nightswap_storage_json::{JsonLeaseStorage, StoragePaths};
use strsim::levenshtein;
use tracing::warn;

use super::{
    commands,
    core::{CliError, CommandError, LoopControl},
    formatters::CliFormatters,
    output,
    registry::CommandRegistry,
};

/// Overrides the directory holding config and lease files.
pub const HOME_ENV: &str = "NIGHTSWAP_HOME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

/// Which side of a request the acting occupant is on when picking a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Awaiting {
    Responder,
    Proposer,
    Anyone,
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub hub: ExchangeHub,
    pub config_manager: ConfigManager,
    pub config: Config,
    pub formatters: CliFormatters,
    pub data_root: PathBuf,
    pub current_lease: Option<LeaseId>,
    pub acting: Option<OccupantId>,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let base = env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Config::default().resolve_data_root());
        let config_manager = ConfigManager::with_base_dir(base.clone())?;
        let config = config_manager.load()?;
        crate::init_with_filter(&config.log_filter);
        colored::control::set_override(config.ui_color_enabled && mode == CliMode::Interactive);

        let data_root = config.data_root.clone().unwrap_or(base);
        let storage = Arc::new(JsonLeaseStorage::with_retention(
            StoragePaths::under(&data_root),
            config.backup_retention,
        )?);
        let hub = ExchangeHub::new(ExchangeSettings::with_ttl_hours(config.request_ttl_hours))
            .with_dispatcher(Arc::new(TracingDispatcher))
            .with_storage(storage.clone());
        for id in storage.list_leases()? {
            if let Err(err) = hub.load_lease(id) {
                warn!(lease = %id, error = %err, "skipping unreadable lease");
            }
        }

        let current_lease = config
            .last_opened_lease
            .as_deref()
            .and_then(|raw| raw.parse::<LeaseId>().ok())
            .filter(|id| hub.lease_ids().contains(id));

        let mut registry = CommandRegistry::new();
        for entry in commands::all_definitions() {
            registry.register(entry);
        }

        Ok(Self {
            mode,
            registry,
            hub,
            formatters: CliFormatters::new(config.currency.clone()),
            config_manager,
            config,
            data_root,
            current_lease,
            acting: None,
            last_command: None,
            running: true,
        })
    }

    pub fn prompt(&self) -> String {
        let lease = self
            .current_lease
            .and_then(|id| self.hub.lease(id).ok())
            .map(|lease| lease.name)
            .unwrap_or_else(|| "no lease".into());
        match self.acting_name() {
            Some(name) => format!("nightswap [{} as {}]> ", lease, name),
            None => format!("nightswap [{}]> ", lease),
        }
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.handler(command) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        self.sweep_expired();
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &input.to_lowercase()), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 2 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        Ok(dialoguer::Confirm::new()
            .with_prompt("Exit shell?")
            .default(true)
            .interact()?)
    }

    pub(crate) fn report_error(&self, err: CommandError) -> Result<(), CliError> {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::Core(err) => {
                output::error(&err);
                match err.kind() {
                    ErrorKind::Conflict => {
                        output::hint("That night is claimed or has changed hands. Check `calendar` and retry.")
                    }
                    ErrorKind::NotAuthorized => {
                        output::hint("Switch occupants with `as <name>`.")
                    }
                    _ => {}
                }
            }
            other => output::error(other),
        }
        Ok(())
    }

    /// Expires stale requests on the current lease before each command.
    fn sweep_expired(&self) {
        let Some(lease) = self.current_lease else {
            return;
        };
        match self.hub.expire_due(lease) {
            Ok(expired) => {
                for request in expired {
                    output::warning(format!("Request {} expired.", request.id.short()));
                }
            }
            Err(err) => warn!(lease = %lease, error = %err, "expiry sweep failed"),
        }
    }

    pub(crate) fn require_lease(&self) -> Result<Lease, CommandError> {
        let id = self.current_lease.ok_or(CommandError::LeaseNotSelected)?;
        Ok(self.hub.lease(id)?)
    }

    pub(crate) fn require_actor(&self) -> Result<(Lease, OccupantId), CommandError> {
        let lease = self.require_lease()?;
        let actor = self
            .acting
            .filter(|id| lease.is_party(*id))
            .ok_or(CommandError::ActorNotSelected)?;
        Ok((lease, actor))
    }

    pub(crate) fn acting_name(&self) -> Option<String> {
        let lease = self.hub.lease(self.current_lease?).ok()?;
        let id = self.acting.filter(|id| lease.is_party(*id))?;
        Some(lease.occupant_name(id))
    }

    pub(crate) fn occupant(&self, lease: &Lease, name: &str) -> Result<OccupantId, CommandError> {
        lease
            .occupant_by_name(name)
            .map(|occupant| occupant.id)
            .ok_or_else(|| {
                CommandError::InvalidArguments(format!(
                    "`{}` is not an occupant of {}",
                    name, lease.name
                ))
            })
    }

    /// Resolves a request by id prefix, or picks the newest pending request
    /// waiting on the acting occupant when no reference is given.
    pub(crate) fn resolve_request(
        &self,
        reference: Option<&str>,
        awaiting: Awaiting,
    ) -> Result<Request, CommandError> {
        let lease = self.require_lease()?;
        let requests = self.hub.requests(lease.id)?;
        if let Some(reference) = reference {
            let needle = reference.to_ascii_lowercase();
            let mut matches = requests
                .into_iter()
                .filter(|request| request.id.to_string().starts_with(&needle));
            return match (matches.next(), matches.next()) {
                (Some(request), None) => Ok(request),
                (Some(_), Some(_)) => Err(CommandError::InvalidArguments(format!(
                    "request reference `{}` is ambiguous",
                    reference
                ))),
                (None, _) => Err(CommandError::InvalidArguments(format!(
                    "no request matches `{}`",
                    reference
                ))),
            };
        }

        let actor = self.acting.ok_or(CommandError::ActorNotSelected)?;
        requests
            .into_iter()
            .rev()
            .filter(|request| request.is_pending())
            .find(|request| match awaiting {
                Awaiting::Responder => request.counterpart == actor,
                Awaiting::Proposer => request.initiator == actor,
                Awaiting::Anyone => true,
            })
            .ok_or_else(|| {
                CommandError::InvalidArguments("no pending request to act on".into())
            })
    }

    /// Records the current lease as the one to reopen next session.
    pub(crate) fn remember_lease(&mut self) {
        self.config.last_opened_lease = self.current_lease.map(|id| id.to_string());
        if let Err(err) = self.config_manager.save(&self.config) {
            warn!(error = %err, "failed to persist last opened lease");
        }
    }
}
