//! Tracing setup
//!
//! The subscriber is installed before the config file is read so that config
//! loading is logged. `RUST_LOG` wins; otherwise the filter starts at the
//! built-in level and is swapped for `logging.level` once the config is known.

use motion_common::config::LoggingConfig;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Per-crate filter at `level`
pub fn filter_for_level(level: &str) -> EnvFilter {
    EnvFilter::new(format!("motion_relay={0},motion_common={0},tower_http=info", level))
}

/// Handle for adjusting the installed filter
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogControl {
    /// Switch to the configured level unless `RUST_LOG` was given
    ///
    /// Returns whether the filter was replaced.
    pub fn apply_config_level(&self, config: &LoggingConfig) -> bool {
        if self.from_env {
            return false;
        }
        match self.handle.reload(filter_for_level(&config.level)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to apply log level {}: {}", config.level, e);
                false
            }
        }
    }

    /// Current filter directives
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|filter| filter.to_string()).ok()
    }
}

/// Reloadable filter layer, starting from `env_filter` or the built-in level
pub fn reloadable_filter(env_filter: Option<EnvFilter>) -> (reload::Layer<EnvFilter, Registry>, LogControl) {
    let from_env = env_filter.is_some();
    let initial = env_filter.unwrap_or_else(|| filter_for_level(&LoggingConfig::default().level));
    let (layer, handle) = reload::Layer::new(initial);
    (layer, LogControl { handle, from_env })
}

/// Install the global subscriber
pub fn init() -> LogControl {
    let (filter, control) = reloadable_filter(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    control
}
