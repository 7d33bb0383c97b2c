//! Collaborators injected into the runtime: clock, notifier and admin predicate.
//!
//! All external dependencies are abstracted behind traits so tests can swap
//! in deterministic implementations.

use crate::delta::DeltaBatch;
use crate::error::NotifyError;
use crate::key::{Email, Slug};
use crate::model::Event;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use attendance_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let _now = clock.now();
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fan-out of delta batches to subscribers.
///
/// Called only after the batch's state change has been persisted. The batch
/// must be delivered in order and as a unit; transport is up to the
/// implementation.
pub trait Notifier: Send + Sync {
    /// Deliver `batch` to subscribers of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::DeliveryFailed`] if the transport rejects the batch.
    fn notify(
        &self,
        target: Slug,
        batch: DeltaBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

/// Admin predicate owned by the authorization layer.
///
/// The core only forwards the question; callers decide whether to reject a
/// request with `Forbidden`.
pub trait AdminPolicy: Send + Sync {
    /// Whether `email` may administer `event`.
    fn is_admin(&self, event: &Event, email: &Email) -> bool;
}
