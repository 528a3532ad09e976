use std::sync::Arc;
use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::actors::{FailureHandler, MessageListener};

// ============================================================================
// Metrics Module - Prometheus metrics for the actor runtime
// ============================================================================
//
// Provides metrics for:
// - Messages sent to and processed by actor threads
// - Handler processing latency
// - Messages currently being processed
// - Failures escaping handlers and unattended workers
//
// The runtime feeds these through `MetricsMessageListener` and
// `MetricsFailureHandler`. The daemon logs a text snapshot at shutdown.
// ============================================================================

/// Central metrics registry for one process
pub struct Metrics {
    registry: Registry,

    pub messages_sent: IntCounterVec,
    pub messages_processed: IntCounterVec,
    pub processing_duration: HistogramVec,
    pub messages_in_progress: IntGauge,
    pub handler_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_sent = IntCounterVec::new(
            Opts::new("actor_messages_sent_total", "Total messages accepted into actor mailboxes"),
            &["actor", "message"],
        )?;
        registry.register(Box::new(messages_sent.clone()))?;

        let messages_processed = IntCounterVec::new(
            Opts::new("actor_messages_processed_total", "Total messages processed by actor threads"),
            &["actor", "message"],
        )?;
        registry.register(Box::new(messages_processed.clone()))?;

        let processing_duration = HistogramVec::new(
            HistogramOpts::new("actor_processing_duration_seconds", "Handler processing duration")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["message"],
        )?;
        registry.register(Box::new(processing_duration.clone()))?;

        let messages_in_progress = IntGauge::new(
            "actor_messages_in_progress",
            "Messages currently being processed across all actor threads",
        )?;
        registry.register(Box::new(messages_in_progress.clone()))?;

        let handler_failures = IntCounterVec::new(
            Opts::new("actor_handler_failures_total", "Failures that escaped handlers or workers"),
            &["actor", "message"],
        )?;
        registry.register(Box::new(handler_failures.clone()))?;

        Ok(Self {
            registry,
            messages_sent,
            messages_processed,
            processing_duration,
            messages_in_progress,
            handler_failures,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_sent(&self, actor: &str, message: &str) {
        self.messages_sent.with_label_values(&[actor, message]).inc();
    }

    pub fn record_started(&self) {
        self.messages_in_progress.inc();
    }

    pub fn record_processed(&self, actor: &str, message: &str, elapsed: Duration) {
        self.messages_in_progress.dec();
        self.messages_processed.with_label_values(&[actor, message]).inc();
        self.processing_duration
            .with_label_values(&[message])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, actor: &str, message: &str) {
        self.handler_failures.with_label_values(&[actor, message]).inc();
    }

    /// Prometheus text exposition of everything gathered so far
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Feeds `Metrics` from the runtime's message flow
pub struct MetricsMessageListener {
    metrics: Arc<Metrics>,
}

impl MetricsMessageListener {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl MessageListener for MetricsMessageListener {
    fn on_message_sent(&self, actor: &str, message: &'static str) {
        self.metrics.record_sent(actor, message);
    }

    fn on_processing_started(&self, _actor: &str, _message: &'static str) {
        self.metrics.record_started();
    }

    fn on_processing_finished(&self, actor: &str, message: &'static str, elapsed: Duration) {
        self.metrics.record_processed(actor, message, elapsed);
    }
}

/// Counts failures, then hands them on
pub struct MetricsFailureHandler {
    metrics: Arc<Metrics>,
    next: Arc<dyn FailureHandler>,
}

impl MetricsFailureHandler {
    pub fn new(metrics: Arc<Metrics>, next: Arc<dyn FailureHandler>) -> Self {
        Self { metrics, next }
    }
}

impl FailureHandler for MetricsFailureHandler {
    fn uncaught_failure(&self, actor: &str, message: &'static str, cause: &str) {
        self.metrics.record_failure(actor, message);
        self.next.uncaught_failure(actor, message, cause);
    }
}
