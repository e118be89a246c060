use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use howell_core::Config;

/// Initialize the tracing subscriber. `RUST_LOG` wins if set; otherwise
/// falls back to the configured level.
pub fn init_telemetry(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level configuration")?;

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    Registry::default().with(env_filter).with(fmt_layer).init();

    tracing::info!(log_level = %level, "telemetry initialized");
    Ok(())
}

/// Create a span for store operations.
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::info_span!("store_operation", operation = $operation)
    };
}

/// Create a span for tool-RPC dispatch.
#[macro_export]
macro_rules! rpc_span {
    ($method:expr) => {
        tracing::info_span!("rpc_method", method = $method)
    };
}

pub fn log_startup_info(config: &Config) {
    tracing::info!(
        bind_addr = %config.bind_addr(),
        persist_root = %config.persist_root,
        auth_enabled = config.auth_enabled(),
        "howelld starting up"
    );
}

pub fn log_config_validation(config: &Config) {
    match config.validate() {
        Ok(()) => tracing::info!("configuration validation passed"),
        Err(e) => tracing::error!(error = %e, "configuration validation failed"),
    }
}

pub fn report_error(error: &anyhow::Error, context: &str) {
    tracing::error!(error = %error, context = context, "operation failed");
    let mut current = error.source();
    let mut depth = 1;
    while let Some(err) = current {
        tracing::error!(error = %err, depth = depth, "error cause");
        current = err.source();
        depth += 1;
    }
}

#[allow(dead_code)]
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!(operation = %operation, "starting performance timer");
        Self { start: std::time::Instant::now(), operation }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::info!(operation = %self.operation, duration_ms = duration.as_millis(), "operation completed");
        if duration.as_millis() > 1000 {
            tracing::warn!(operation = %self.operation, duration_ms = duration.as_millis(), "slow operation detected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn performance_timer_does_not_panic() {
        let timer = PerformanceTimer::new("test_operation");
        std::thread::sleep(Duration::from_millis(5));
        timer.finish();
    }
}
