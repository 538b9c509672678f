//! Tracing setup for the host binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub verbose: u8,
    pub logging: LoggingConfig,
}

impl TelemetryConfig {
    pub fn new(verbose: u8, logging: LoggingConfig) -> Self {
        Self { verbose, logging }
    }

    fn filter(&self) -> EnvFilter {
        if let Some(filter) = &self.logging.filter {
            return EnvFilter::new(filter.clone());
        }
        let default = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init(config: TelemetryConfig) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init();
}
