#![forbid(unsafe_code)]

//! Logging bootstrap.
//!
//! The library crates only emit `tracing` spans and events. Applications
//! that do not install their own subscriber can call [`init`] once at
//! startup. The filter comes from `LOOKLESS_LOG` when set, otherwise from
//! `default_filter`:
//!
//! ```text
//! LOOKLESS_LOG=lookless_core=debug,lookless_reactive=warn
//! ```

use tracing_subscriber::EnvFilter;

/// Environment variable read for the log filter.
pub const FILTER_ENV: &str = "LOOKLESS_LOG";

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a human-readable fmt subscriber. Returns `false` when a global
/// subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a JSON-lines fmt subscriber with span context on every event.
/// Returns `false` when a global subscriber was already installed.
#[cfg(feature = "logging-json")]
pub fn init_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_env_filter(filter(default_filter))
        .try_init()
        .is_ok()
}
