// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging setup.

use std::sync::Once;
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt,
};

/// The environment variable used to configure log filtering, e.g. `outcome_harness=debug`.
pub const LOG_ENV_VAR: &str = "OUTCOME_HARNESS_LOG";

static INIT_LOGGER: Once = Once::new();

/// Installs a stderr logger for the process. Only the first call has an effect.
///
/// Log filtering is read from [`LOG_ENV_VAR`], in the same `target=level` syntax as
/// `RUST_LOG`. If it's unset or empty, events at `info` and above are logged.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let level_str = std::env::var(LOG_ENV_VAR).unwrap_or_default();
        let default_targets = Targets::new().with_default(LevelFilter::INFO);

        // If the level string is empty, use the standard level filter instead.
        let (targets, parse_error) = if level_str.is_empty() {
            (default_targets, None)
        } else {
            match level_str.parse::<Targets>() {
                Ok(targets) => (targets, None),
                Err(error) => (default_targets, Some(error)),
            }
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(targets);

        // Another subscriber may already be installed, e.g. by the embedding test binary.
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            return;
        }

        if let Some(error) = parse_error {
            warn!("ignoring invalid {LOG_ENV_VAR} value `{level_str}`: {error}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
        assert!(INIT_LOGGER.is_completed());
    }
}
