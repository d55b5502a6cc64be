//! Telemetry for the discovery stack
//!
//! Log output goes through `tracing`; metrics are emitted as structured
//! events on the `metrics` target so any subscriber can pick them up.

use std::collections::HashMap;
use std::time::Instant;

/// Configuration for the telemetry system
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name of the service
    pub service_name: String,
    /// Enable console output with targets and colors
    pub enable_console: bool,
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "tool-discovery".to_string(),
            enable_console: true,
            log_level: "info".to_string(),
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_telemetry(
    config: TelemetryConfig,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
    );

    if config.enable_console {
        builder.with_target(true).with_ansi(true).try_init()?;
    } else {
        builder.with_ansi(false).try_init()?;
    }

    tracing::debug!(service = %config.service_name, "Telemetry initialized");
    Ok(())
}

/// Records a single metric with tags
pub fn add_metric(name: &str, value: f64, tags: &[(&str, String)]) {
    let tags_str = tags
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    tracing::debug!(
        target: "metrics",
        metric_name = %name,
        metric_value = %value,
        metric_tags = %tags_str,
        "Recorded metric"
    );
}

/// Records several untagged metrics
pub fn add_metrics(metrics: HashMap<&'static str, f64>) {
    for (key, value) in metrics.iter() {
        add_metric(key, *value, &[]);
    }
}

/// Guard that records how long an operation took when dropped
#[derive(Debug)]
pub struct SpanDuration {
    name: &'static str,
    start: Instant,
}

impl Drop for SpanDuration {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        add_metric(self.name, duration_ms, &[("unit", "ms".to_string())]);
    }
}

/// Starts measuring an operation
pub fn span_duration(name: &'static str) -> SpanDuration {
    SpanDuration {
        name,
        start: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_subscriber_do_not_panic() {
        add_metric("search_latency", 1.5, &[("mode", "keyword".to_string())]);
        add_metrics(HashMap::from([("loader_hits", 2.0)]));
        drop(span_duration("noop"));
    }

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "tool-discovery");
        assert_eq!(config.log_level, "info");
    }
}
