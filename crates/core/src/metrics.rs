//! Prometheus metrics for core components.
//!
//! Metrics live in an explicit [`Metrics`] value with its own registry.
//! Components receive a clone; every clone records into the same series.

use std::path::Path;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Handle to the run's metric series.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Items finished per pool by outcome ("succeeded", "failed", "skipped").
    items: IntCounterVec,
    /// Retries per stage ("catalog", "download", "conversion", "compression").
    retries: IntCounterVec,
    /// Tasks currently holding a pool slot.
    in_flight: IntGaugeVec,
    /// Duration of each automation session attempt.
    session_duration: HistogramVec,
}

impl Metrics {
    /// Creates the metric series and registers them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let items = IntCounterVec::new(
            Opts::new("musicdl_items_total", "Items finished by a worker pool"),
            &["pool", "outcome"],
        )?;
        let retries = IntCounterVec::new(
            Opts::new("musicdl_retries_total", "Retried attempts by stage"),
            &["stage"],
        )?;
        let in_flight = IntGaugeVec::new(
            Opts::new("musicdl_pool_in_flight", "Tasks currently running in a pool"),
            &["pool"],
        )?;
        let session_duration = HistogramVec::new(
            HistogramOpts::new(
                "musicdl_session_duration_seconds",
                "Duration of automation session attempts",
            )
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["result"],
        )?;

        registry.register(Box::new(items.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(session_duration.clone()))?;

        Ok(Self {
            registry,
            items,
            retries,
            in_flight,
            session_duration,
        })
    }

    pub fn record_item(&self, pool: &str, outcome: &str) {
        self.items.with_label_values(&[pool, outcome]).inc();
    }

    pub fn record_retry(&self, stage: &str) {
        self.retries.with_label_values(&[stage]).inc();
    }

    pub fn task_started(&self, pool: &str) {
        self.in_flight.with_label_values(&[pool]).inc();
    }

    pub fn task_finished(&self, pool: &str) {
        self.in_flight.with_label_values(&[pool]).dec();
    }

    pub fn observe_session(&self, result: &str, secs: f64) {
        self.session_duration
            .with_label_values(&[result])
            .observe(secs);
    }

    /// Count recorded for `pool` and `outcome`.
    pub fn item_count(&self, pool: &str, outcome: &str) -> u64 {
        self.items.with_label_values(&[pool, outcome]).get()
    }

    /// Count of retries recorded for `stage`.
    pub fn retry_count(&self, stage: &str) -> u64 {
        self.retries.with_label_values(&[stage]).get()
    }

    /// Tasks of `pool` currently running.
    pub fn active_tasks(&self, pool: &str) -> i64 {
        self.in_flight.with_label_values(&[pool]).get()
    }

    /// Renders every series in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Writes [`Metrics::render`] output to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let text = self
            .render()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        std::fs::write(path, text)
    }
}
