use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Central metrics registry for the auth service
pub struct MetricsRegistry {
    registry: Registry,

    // HTTP Metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // Auth Metrics
    pub auth_events_total: CounterVec,
    pub otp_dispatched_total: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace("otp_gate"),
            &["method", "endpoint", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .namespace("otp_gate")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let auth_events_total = CounterVec::new(
            Opts::new("auth_events_total", "Auth flow outcomes").namespace("otp_gate"),
            &["event", "outcome"],
        )?;
        registry.register(Box::new(auth_events_total.clone()))?;

        let otp_dispatched_total = CounterVec::new(
            Opts::new("otp_dispatched_total", "One-time codes handed to the notifier")
                .namespace("otp_gate"),
            &["purpose"],
        )?;
        registry.register(Box::new(otp_dispatched_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            auth_events_total,
            otp_dispatched_total,
        }))
    }

    /// Count one auth flow attempt. `outcome` is `"success"` or an error label.
    pub fn record_auth_event(&self, event: &str, outcome: &str) {
        self.auth_events_total
            .with_label_values(&[event, outcome])
            .inc();
    }

    pub fn record_otp_dispatched(&self, purpose: &str) {
        self.otp_dispatched_total
            .with_label_values(&[purpose])
            .inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
