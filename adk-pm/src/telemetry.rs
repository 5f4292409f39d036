//! Telemetry instrumentation for the product-management pipeline.
//!
//! This module provides:
//! - Span helpers for stage execution, classification and publishing
//! - Metrics for tracking stage runs, routing and publish outcomes
//!
//! ## Spans
//!
//! - `pm.workflow_run` - One `run_workflow` / `resume` / `retry_stage` call
//! - `pm.stage_execution` - A single stage executor run
//! - `pm.feedback_classification` - Classification of one feedback item
//! - `pm.publish` - Publishing an artifact to an external system
//!
//! ## Metrics
//!
//! - `pm_stage_runs_total` - Stage executions (counter)
//! - `pm_stage_failures_total` - Failed stage executions (counter)
//! - `pm_routing_decisions_total` - Routing decisions by target (counter)
//! - `pm_suspensions_total` - Workflows suspended for approval (counter)
//! - `pm_publish_failures_total` - Publishes that gave up (counter)
//! - `pm_publish_duration_seconds` - Publish duration including retries (histogram)

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Span, info_span};

pub use tracing::{debug, error, info, instrument, trace, warn};

static METRICS: OnceLock<PmMetrics> = OnceLock::new();

static OTEL_METRICS: OnceLock<PmOtelMetrics> = OnceLock::new();

static OTEL_ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn OpenTelemetry recording on or off. Local counters are always kept.
pub fn set_otel_enabled(enabled: bool) {
    OTEL_ENABLED.store(enabled, Ordering::Relaxed);
}

fn record_otel(f: impl FnOnce(&PmOtelMetrics)) {
    if OTEL_ENABLED.load(Ordering::Relaxed) {
        f(otel_metrics());
    }
}

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static PmMetrics {
    METRICS.get_or_init(PmMetrics::new)
}

/// Get or initialize the global OpenTelemetry metrics instance.
pub fn otel_metrics() -> &'static PmOtelMetrics {
    OTEL_METRICS.get_or_init(|| {
        let meter = opentelemetry::global::meter("adk-pm");
        PmOtelMetrics::new(meter)
    })
}

/// OpenTelemetry instruments.
pub struct PmOtelMetrics {
    pub stage_runs_counter: Counter<u64>,
    pub stage_failures_counter: Counter<u64>,
    pub routing_counter: Counter<u64>,
    pub suspensions_counter: Counter<u64>,
    pub publish_failures_counter: Counter<u64>,
    pub publish_duration_histogram: Histogram<f64>,
}

impl PmOtelMetrics {
    pub fn new(meter: Meter) -> Self {
        let stage_runs_counter = meter
            .u64_counter("pm_stage_runs_total")
            .with_description("Total number of stage executions")
            .init();

        let stage_failures_counter = meter
            .u64_counter("pm_stage_failures_total")
            .with_description("Total number of failed stage executions")
            .init();

        let routing_counter = meter
            .u64_counter("pm_routing_decisions_total")
            .with_description("Routing decisions produced by the feedback classifier")
            .init();

        let suspensions_counter = meter
            .u64_counter("pm_suspensions_total")
            .with_description("Workflows suspended for human approval")
            .init();

        let publish_failures_counter = meter
            .u64_counter("pm_publish_failures_total")
            .with_description("Publishes that failed after all retries")
            .init();

        let publish_duration_histogram = meter
            .f64_histogram("pm_publish_duration_seconds")
            .with_description("Publish duration in seconds, retries included")
            .init();

        Self {
            stage_runs_counter,
            stage_failures_counter,
            routing_counter,
            suspensions_counter,
            publish_failures_counter,
            publish_duration_histogram,
        }
    }

    pub fn record_stage_run(&self, stage: &str, success: bool) {
        self.stage_runs_counter
            .add(1, &[KeyValue::new("stage", stage.to_string())]);
        if !success {
            self.stage_failures_counter
                .add(1, &[KeyValue::new("stage", stage.to_string())]);
        }
    }

    pub fn record_routing(&self, target: &str, suspend: bool) {
        self.routing_counter.add(
            1,
            &[
                KeyValue::new("target", target.to_string()),
                KeyValue::new("suspend", suspend),
            ],
        );
    }

    pub fn record_suspension(&self) {
        self.suspensions_counter.add(1, &[]);
    }

    pub fn record_publish(&self, target: &str, duration_secs: f64, success: bool) {
        self.publish_duration_histogram.record(
            duration_secs,
            &[
                KeyValue::new("target", target.to_string()),
                KeyValue::new("success", success),
            ],
        );
        if !success {
            self.publish_failures_counter
                .add(1, &[KeyValue::new("target", target.to_string())]);
        }
    }
}

/// Local atomic counters, readable without an exporter.
#[derive(Debug)]
pub struct PmMetrics {
    pub stages_completed: AtomicU64,
    pub stages_failed: AtomicU64,
    pub routing_decisions: AtomicU64,
    pub suspensions: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl PmMetrics {
    pub fn new() -> Self {
        Self {
            stages_completed: AtomicU64::new(0),
            stages_failed: AtomicU64::new(0),
            routing_decisions: AtomicU64::new(0),
            suspensions: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_stages_completed(&self) {
        self.stages_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stages_failed(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_routing_decisions(&self) {
        self.routing_decisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_suspensions(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stages_completed(&self) -> u64 {
        self.stages_completed.load(Ordering::Relaxed)
    }

    pub fn get_stages_failed(&self) -> u64 {
        self.stages_failed.load(Ordering::Relaxed)
    }

    pub fn get_routing_decisions(&self) -> u64 {
        self.routing_decisions.load(Ordering::Relaxed)
    }

    pub fn get_suspensions(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    pub fn get_publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters (useful for testing).
    pub fn reset(&self) {
        self.stages_completed.store(0, Ordering::Relaxed);
        self.stages_failed.store(0, Ordering::Relaxed);
        self.routing_decisions.store(0, Ordering::Relaxed);
        self.suspensions.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for PmMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Span Helpers
// ============================================================================

/// Create a span for one workflow entry point call.
pub fn workflow_run_span(session_id: &str, operation: &str) -> Span {
    info_span!(
        "pm.workflow_run",
        otel.name = "Workflow Run",
        session_id = %session_id,
        operation = %operation
    )
}

/// Create a span for a stage execution.
pub fn stage_execution_span(stage: &str, run: u32) -> Span {
    info_span!(
        "pm.stage_execution",
        otel.name = "Stage Execution",
        stage = %stage,
        run = %run
    )
}

/// Create a span for feedback classification.
pub fn feedback_classification_span(feedback_type: &str, priority: &str) -> Span {
    info_span!(
        "pm.feedback_classification",
        otel.name = "Feedback Classification",
        feedback_type = %feedback_type,
        priority = %priority
    )
}

/// Create a span for publishing an artifact.
pub fn publish_span(target: &str, stage: &str) -> Span {
    info_span!(
        "pm.publish",
        otel.name = "Publish",
        target = %target,
        stage = %stage
    )
}

// ============================================================================
// Timing Helpers
// ============================================================================

/// A guard that records duration when dropped.
pub struct TimingGuard {
    start: Instant,
    name: String,
}

impl TimingGuard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Get elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        tracing::debug!(
            target: "pm.timing",
            name = %self.name,
            duration_ms = %elapsed.as_millis(),
            "Operation completed"
        );
    }
}

/// Start timing an operation.
pub fn start_timing(name: impl Into<String>) -> TimingGuard {
    TimingGuard::new(name)
}

// ============================================================================
// Event Logging Helpers
// ============================================================================

/// Log stage start event.
pub fn log_stage_start(stage: &str, run: u32) {
    tracing::info!(
        target: "pm.events",
        event = "stage_start",
        stage = %stage,
        run = %run,
        "Starting stage"
    );
}

/// Log stage completion event.
pub fn log_stage_complete(stage: &str, ready: bool, duration_ms: u64) {
    metrics().inc_stages_completed();
    record_otel(|m| m.record_stage_run(stage, true));
    tracing::info!(
        target: "pm.events",
        event = "stage_complete",
        stage = %stage,
        ready_for_next_step = %ready,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

/// Log stage failure event.
pub fn log_stage_failed(stage: &str, error: &str, duration_ms: u64) {
    metrics().inc_stages_failed();
    record_otel(|m| m.record_stage_run(stage, false));
    tracing::warn!(
        target: "pm.events",
        event = "stage_failed",
        stage = %stage,
        error = %error,
        duration_ms = %duration_ms,
        "Stage failed"
    );
}

/// Log a routing decision.
pub fn log_routing_decision(target: &str, suspend: bool, reasoning: &str) {
    metrics().inc_routing_decisions();
    record_otel(|m| m.record_routing(target, suspend));
    tracing::info!(
        target: "pm.events",
        event = "routing_decision",
        target_agent = %target,
        should_suspend = %suspend,
        reasoning = %reasoning,
        "Feedback routed"
    );
}

/// Log a workflow suspension.
pub fn log_suspension(session_id: &str, pending: usize) {
    metrics().inc_suspensions();
    record_otel(|m| m.record_suspension());
    tracing::info!(
        target: "pm.events",
        event = "suspended",
        session_id = %session_id,
        pending_decisions = %pending,
        "Workflow suspended for approval"
    );
}

/// Log a resume decision.
pub fn log_resume(session_id: &str, approved: bool) {
    tracing::info!(
        target: "pm.events",
        event = "resumed",
        session_id = %session_id,
        approved = %approved,
        "Workflow resumed"
    );
}

/// Log the outcome of a publish.
pub fn log_publish(target: &str, success: bool, attempts: u32, duration_secs: f64) {
    record_otel(|m| m.record_publish(target, duration_secs, success));
    if success {
        tracing::info!(
            target: "pm.events",
            event = "publish",
            publish_target = %target,
            attempts = %attempts,
            "Artifact published"
        );
    } else {
        metrics().inc_publish_failures();
        tracing::warn!(
            target: "pm.events",
            event = "publish_failed",
            publish_target = %target,
            attempts = %attempts,
            "Artifact generated but not published"
        );
    }
}

/// Log error event.
pub fn log_error(context: &str, error: &str) {
    tracing::error!(
        target: "pm.events",
        event = "error",
        context = %context,
        error = %error,
        "Error occurred"
    );
}
