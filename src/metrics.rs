//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Runs
    pub runs_started: IntCounter,
    pub runs_completed: IntCounter,
    pub runs_failed: IntCounter,
    /// Labelled by reason: busy, cooldown, paused, misconfigured
    pub runs_skipped: IntCounterVec,
    /// Labelled by outcome: burn, holder
    pub outcomes: IntCounterVec,

    // Payouts
    pub transfers_total: IntCounter,
    pub transfers_failed: IntCounter,
    pub safety_violations: IntCounter,

    pub notification_failures: IntCounter,

    // Histograms
    pub run_latency: Histogram,
    pub transfer_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let runs_started = IntCounter::with_opts(Opts::new(
            "lottery_runs_started_total",
            "Distribution runs that passed the guard",
        ))?;

        let runs_completed = IntCounter::with_opts(Opts::new(
            "lottery_runs_completed_total",
            "Distribution runs finalized as completed",
        ))?;

        let runs_failed = IntCounter::with_opts(Opts::new(
            "lottery_runs_failed_total",
            "Distribution runs finalized as failed",
        ))?;

        let runs_skipped = IntCounterVec::new(
            Opts::new(
                "lottery_runs_skipped_total",
                "Triggers that did not run, by reason",
            ),
            &["reason"],
        )?;

        let outcomes = IntCounterVec::new(
            Opts::new("lottery_outcomes_total", "Drawn outcomes, by kind"),
            &["outcome"],
        )?;

        let transfers_total = IntCounter::with_opts(Opts::new(
            "lottery_transfers_total",
            "Transfers submitted, one per hop",
        ))?;

        let transfers_failed = IntCounter::with_opts(Opts::new(
            "lottery_transfers_failed_total",
            "Transfers that failed to confirm",
        ))?;

        let safety_violations = IntCounter::with_opts(Opts::new(
            "lottery_safety_violations_total",
            "Selections rejected by post-selection validation",
        ))?;

        let notification_failures = IntCounter::with_opts(Opts::new(
            "lottery_notification_failures_total",
            "Post-commit hooks that returned an error",
        ))?;

        let run_latency = Histogram::with_opts(
            HistogramOpts::new("lottery_run_latency_seconds", "End-to-end run latency")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        let transfer_latency = Histogram::with_opts(
            HistogramOpts::new(
                "lottery_transfer_latency_seconds",
                "Submit-to-confirm latency per hop",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("lottery_rpc_latency_seconds", "RPC read latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(runs_started.clone()))?;
        registry.register(Box::new(runs_completed.clone()))?;
        registry.register(Box::new(runs_failed.clone()))?;
        registry.register(Box::new(runs_skipped.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(transfers_total.clone()))?;
        registry.register(Box::new(transfers_failed.clone()))?;
        registry.register(Box::new(safety_violations.clone()))?;
        registry.register(Box::new(notification_failures.clone()))?;
        registry.register(Box::new(run_latency.clone()))?;
        registry.register(Box::new(transfer_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            runs_started,
            runs_completed,
            runs_failed,
            runs_skipped,
            outcomes,
            transfers_total,
            transfers_failed,
            safety_violations,
            notification_failures,
            run_latency,
            transfer_latency,
            rpc_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_skip(&self, reason: &str) {
        self.runs_skipped.with_label_values(&[reason]).inc();
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.outcomes.with_label_values(&[outcome]).inc();
    }

    /// Prometheus text exposition of the registry
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(|| {
        Metrics::new().unwrap_or_else(|e| panic!("Failed to initialize metrics: {e}"))
    });
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
