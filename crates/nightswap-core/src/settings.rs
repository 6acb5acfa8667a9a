use chrono::Duration;

pub const DEFAULT_REQUEST_TTL_HOURS: u32 = 48;

/// Engine tunables, usually derived from the user's configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// How long a request may stay pending before `expire` applies.
    pub request_ttl: Duration,
}

impl ExchangeSettings {
    pub fn with_ttl_hours(hours: u32) -> Self {
        Self {
            request_ttl: Duration::hours(i64::from(hours.max(1))),
        }
    }
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self::with_ttl_hours(DEFAULT_REQUEST_TTL_HOURS)
    }
}
