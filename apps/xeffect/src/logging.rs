//! Log output setup.

use crate::config::LoggingConfig;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Filter used when `RUST_LOG` is unset.
fn default_filter(level: &str) -> String {
    format!("xeffect={level},streak_engine={level}")
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
pub fn init(config: &LoggingConfig) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        // A subscriber may already be set (tests); keep it.
        let _ = if config.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    });
}
