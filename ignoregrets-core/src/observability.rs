/*!
Logging setup for the ignoregrets binaries.

The core only emits `tracing` events; installing a subscriber is left to the
binary so library users keep control of their own logging.
*/

use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::{IgnoregretsError, Result};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Install the global tracing subscriber
///
/// # Arguments
/// * `verbose` - Log at debug level unless `RUST_LOG` says otherwise
/// * `json` - Emit structured JSON lines instead of human-readable output
pub fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let filter = default_filter(verbose);

    let result = if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false)
            .with_writer(std::io::stderr);
        set_global_default(Registry::default().with(filter).with(fmt_layer))
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        set_global_default(Registry::default().with(filter).with(fmt_layer))
    };

    result.map_err(|e| {
        IgnoregretsError::validation(format!("Failed to set global tracing subscriber: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Whichever call runs first wins; the other must report an error
        let first = init_logging(false, false);
        let second = init_logging(true, true);
        assert!(first.is_err() || second.is_err());
    }
}
