//! Metric names and descriptions for the coordinator and scheduler.
//!
//! Counters are emitted through the `metrics` facade; installing a recorder
//! (Prometheus or otherwise) is left to the embedding application. Call
//! [`register_metrics`] once at startup so exporters can attach descriptions.
//!
//! # Example
//!
//! ```rust
//! attendance_runtime::metrics::register_metrics();
//! ```

use metrics::describe_counter;

// Re-export metrics macros for use in other modules
pub use metrics::counter;

/// Optimistic writes rejected because the stored version moved.
pub const WRITE_CONFLICTS_TOTAL: &str = "attendance_write_conflicts_total";

/// Operations that gave up after the last attempt conflicted.
pub const RETRY_EXHAUSTED_TOTAL: &str = "attendance_retry_exhausted_total";

/// Delta batches the notifier failed to deliver after a persisted write.
pub const NOTIFY_FAILURES_TOTAL: &str = "attendance_notify_failures_total";

/// Events created by the recurrence scheduler.
pub const EVENTS_GENERATED_TOTAL: &str = "scheduler_events_generated_total";

/// Series whose generation pass failed.
pub const SERIES_FAILURES_TOTAL: &str = "scheduler_series_failures_total";

/// Register all metric descriptions.
pub fn register_metrics() {
    // Coordinator
    describe_counter!(
        WRITE_CONFLICTS_TOTAL,
        "Total number of optimistic writes that hit a version conflict"
    );
    describe_counter!(
        RETRY_EXHAUSTED_TOTAL,
        "Total number of operations that failed after exhausting retries"
    );
    describe_counter!(
        NOTIFY_FAILURES_TOTAL,
        "Total number of delta batches that could not be delivered"
    );

    // Scheduler
    describe_counter!(
        EVENTS_GENERATED_TOTAL,
        "Total number of events generated from recurring series"
    );
    describe_counter!(
        SERIES_FAILURES_TOTAL,
        "Total number of series whose generation pass failed"
    );
}
