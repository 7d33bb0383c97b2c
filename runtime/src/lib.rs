//! # Attendance Runtime
//!
//! Runs the pure transitions of `attendance-core` against real collaborators.
//!
//! ## Core Components
//!
//! - **Coordinator**: optimistic read-modify-write loop with bounded retries
//! - **Retry**: injectable backoff policies for the coordinator
//! - **Scheduler**: periodic generation of recurring events
//! - **Service**: the command facade used by API layers
//!
//! ## Example
//!
//! ```ignore
//! use attendance_runtime::{AttendanceService, Config, Coordinator};
//! use std::sync::Arc;
//!
//! let config = Config::from_env();
//! config.validate()?;
//!
//! let coordinator = Coordinator::with_backoff(notifier, Arc::new(config.retry_policy()));
//! let service = AttendanceService::new(events, series, coordinator, clock, admin_policy);
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! if let Some(scheduler) = service.configured_scheduler(&config) {
//!     tokio::spawn(async move { scheduler.run(shutdown_rx).await });
//! }
//!
//! let joined = service.add_attendee(&slug, "Ana", "ana@example.com".parse()?).await?;
//! println!("{} is {}", "ana@example.com", joined.result);
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Optimistic concurrency coordinator
pub mod coordinator;

/// Recurring event generation
pub mod scheduler;

/// Command facade
pub mod service;

/// Environment-driven configuration
pub mod config;

/// Metric names and descriptions
pub mod metrics;

pub use config::{Config, ConfigError};
pub use coordinator::{Committed, Coordinator};
pub use retry::{Backoff, NoBackoff, RetryPolicy};
pub use scheduler::{GenerationReport, RecurrenceScheduler, SeriesReport};
pub use service::AttendanceService;
