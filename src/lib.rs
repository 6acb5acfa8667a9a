//! Nightswap: a shell over the split-lease night exchange engine.
//!
//! The negotiation engine lives in `nightswap-core`; this crate wires it to
//! configuration, JSON persistence, logging, and an interactive shell.

pub mod cli;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter.
pub fn init() {
    init_with_filter(nightswap_config::model::DEFAULT_LOG_FILTER);
}

/// Initializes global tracing once; later calls are ignored. `RUST_LOG` wins
/// over `filter` when set.
pub fn init_with_filter(filter: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::debug!("Nightswap tracing initialized.");
    });
}
