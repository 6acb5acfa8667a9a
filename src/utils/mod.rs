use tracing_subscriber::{fmt, EnvFilter};

use nightswap_config::model::DEFAULT_LOG_FILTER;

/// Installs the global subscriber. Logs go to stderr so shell output stays clean.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
