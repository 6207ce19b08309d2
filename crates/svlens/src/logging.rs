//! Process-wide logging setup.
//!
//! Library code only emits `tracing` events. Hosts that want them printed
//! call [`init_logging`] once at startup; the first configuration wins and
//! stays read-only for the life of the process.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_CONFIG: OnceCell<LogConfig> = OnceCell::new();

/// Logging options supplied by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Emit debug-level events from this crate.
    pub debug: bool,
}

impl LogConfig {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Default filter directive when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> &'static str {
        if self.debug { "svlens=debug" } else { "svlens=info" }
    }
}

/// Resolve the logging configuration and install a fmt subscriber.
///
/// `RUST_LOG` overrides the default filter. Later calls return the first
/// configuration unchanged. If the host already installed a global
/// subscriber, that one is kept.
pub fn init_logging(config: LogConfig) -> &'static LogConfig {
    let mut first = false;
    let resolved = LOG_CONFIG.get_or_init(|| {
        first = true;
        config
    });

    if first {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| resolved.default_directive().into());
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    }

    resolved
}

/// The resolved configuration, if logging was initialised.
pub fn log_config() -> Option<&'static LogConfig> {
    LOG_CONFIG.get()
}

/// Whether debug logging was requested.
pub fn debug_enabled() -> bool {
    log_config().is_some_and(|c| c.debug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_configuration_wins() {
        let first = *init_logging(LogConfig::new(true));
        let second = init_logging(LogConfig::new(!first.debug));
        assert_eq!(*second, first);
        assert_eq!(log_config(), Some(&first));
        assert_eq!(debug_enabled(), first.debug);
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(LogConfig::new(true).default_directive(), "svlens=debug");
        assert_eq!(LogConfig::default().default_directive(), "svlens=info");
    }
}
