//! Prometheus metrics for the crash reporter
//!
//! Counts captured crashes, startup retries and delivery outcomes so a host
//! application can expose them next to its own metrics.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Central metrics registry holding all reporter metrics.
pub struct ReporterMetrics {
    registry: Registry,
    /// Counter: crashes handed to the reporter
    pub crashes_captured_total: IntCounter,
    /// Counter: delivery outcomes by label (acknowledged, rejected, failed, cancelled)
    pub deliveries_total: IntCounterVec,
    /// Counter: pending records resubmitted at startup
    pub startup_retries_total: IntCounter,
}

impl ReporterMetrics {
    /// Creates a new `ReporterMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("tracepost".to_string()), None)?;

        let crashes_captured_total = IntCounter::with_opts(Opts::new(
            "crashes_captured_total",
            "Total crashes captured by the fault handler",
        ))?;
        registry.register(Box::new(crashes_captured_total.clone()))?;

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Total crash report deliveries by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let startup_retries_total = IntCounter::with_opts(Opts::new(
            "startup_retries_total",
            "Total pending crash records resubmitted at startup",
        ))?;
        registry.register(Box::new(startup_retries_total.clone()))?;

        Ok(Self {
            registry,
            crashes_captured_total,
            deliveries_total,
            startup_retries_total,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    pub fn record_crash_captured(&self) {
        self.crashes_captured_total.inc();
    }

    /// Record a delivery outcome by its label.
    pub fn record_delivery(&self, outcome: &str) {
        self.deliveries_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_startup_retry(&self) {
        self.startup_retries_total.inc();
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
