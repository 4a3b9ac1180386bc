//! Telemetry and observability utilities

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled
    pub enabled: bool,
    /// Service name for metrics
    pub service_name: String,
    /// Service version for metrics
    pub service_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "servicenow-connector".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(feature = "metrics")]
pub use self::otel::{init_telemetry, telemetry, Metrics};

#[cfg(feature = "metrics")]
mod otel {
    use super::TelemetryConfig;
    use crate::errors::ErrorKind;
    use opentelemetry::{
        metrics::{Counter, Histogram},
        KeyValue,
    };
    use std::sync::Arc;

    /// Connector metrics collector
    #[derive(Clone)]
    pub struct Metrics {
        requests_total: Counter<u64>,
        request_duration: Histogram<f64>,
        errors_total: Counter<u64>,
        client_cache_hits: Counter<u64>,
        client_cache_misses: Counter<u64>,
    }

    impl Metrics {
        /// Create a metrics instance on the global meter provider
        pub fn new(config: &TelemetryConfig) -> Self {
            let meter = opentelemetry::global::meter(config.service_name.clone());

            let requests_total = meter
                .u64_counter("servicenow_connector.requests_total")
                .with_description("Total number of requests sent")
                .init();

            let request_duration = meter
                .f64_histogram("servicenow_connector.request_duration_seconds")
                .with_description("Request duration in seconds")
                .init();

            let errors_total = meter
                .u64_counter("servicenow_connector.errors_total")
                .with_description("Total number of failed operations")
                .init();

            let client_cache_hits = meter
                .u64_counter("servicenow_connector.client_cache_hits_total")
                .with_description("Total number of client cache hits")
                .init();

            let client_cache_misses = meter
                .u64_counter("servicenow_connector.client_cache_misses_total")
                .with_description("Total number of client cache misses")
                .init();

            Self {
                requests_total,
                request_duration,
                errors_total,
                client_cache_hits,
                client_cache_misses,
            }
        }

        /// Record a completed request
        pub fn record_request(&self, operation: &str, method: &str, status: u16, duration_secs: f64) {
            let labels = &[
                KeyValue::new("operation", operation.to_string()),
                KeyValue::new("method", method.to_string()),
                KeyValue::new("status", status.to_string()),
            ];

            self.requests_total.add(1, labels);
            self.request_duration.record(duration_secs, labels);
        }

        /// Record a failed operation
        pub fn record_error(&self, operation: &str, kind: ErrorKind) {
            self.errors_total.add(
                1,
                &[
                    KeyValue::new("operation", operation.to_string()),
                    KeyValue::new("kind", format!("{:?}", kind)),
                ],
            );
        }

        /// Record a client cache lookup
        pub fn record_client_cache(&self, hit: bool) {
            if hit {
                self.client_cache_hits.add(1, &[]);
            } else {
                self.client_cache_misses.add(1, &[]);
            }
        }
    }

    impl std::fmt::Debug for Metrics {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Metrics").finish_non_exhaustive()
        }
    }

    static TELEMETRY: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

    /// Initialize global telemetry
    pub fn init_telemetry(config: TelemetryConfig) -> Arc<Metrics> {
        TELEMETRY
            .get_or_init(|| Arc::new(Metrics::new(&config)))
            .clone()
    }

    /// Get global telemetry instance
    pub fn telemetry() -> Option<Arc<Metrics>> {
        TELEMETRY.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.service_name, "servicenow-connector");
        assert_eq!(config.service_version, crate::VERSION);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_metrics_record() {
        let metrics = init_telemetry(TelemetryConfig {
            enabled: true,
            ..Default::default()
        });
        metrics.record_request("get_record", "GET", 200, 0.05);
        metrics.record_error("get_record", crate::ErrorKind::Timeout);
        metrics.record_client_cache(true);
        assert!(telemetry().is_some());
    }
}
