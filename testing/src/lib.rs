//! # Attendance Testing
//!
//! Testing utilities for code built on `attendance-core`.
//!
//! This crate provides:
//! - In-memory stores that honour optimistic versioning and can simulate races
//! - Mock notifier, clocks and admin policy
//! - Fixture builders for events and series
//! - A Given-When-Then harness for pure transitions
//! - proptest strategies for attendance operations
//!
//! ## Example
//!
//! ```
//! use attendance_testing::{RecordingNotifier, helpers};
//! use attendance_core::attendance;
//! use attendance_core::model::NewAttendee;
//!
//! let event = helpers::event("pottery", 1);
//! let joined = attendance::add_attendee(
//!     &event,
//!     NewAttendee::new("Ana", helpers::email("ana@example.com")),
//!     helpers::minutes(1),
//! )
//! .unwrap();
//!
//! assert_eq!(joined.state.confirmed_count(), 1);
//! assert!(RecordingNotifier::new().is_empty());
//! ```

use attendance_core::delta::{Delta, DeltaBatch};
use attendance_core::environment::{AdminPolicy, Clock, Notifier};
use attendance_core::error::NotifyError;
use attendance_core::key::{Email, Slug};
use attendance_core::model::Event;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stores with race simulation
pub mod memory_store;

/// Given-When-Then harness for transitions
pub mod transition_test;

/// proptest strategies and invariant checks
pub mod properties;

/// Mock implementations of the runtime's collaborators.
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Lock poisoning only happens after a panicking test
    #![allow(clippy::missing_panics_doc)]

    use super::{
        AdminPolicy, Arc, AtomicBool, AtomicUsize, BTreeSet, Clock, DateTime, Delta, DeltaBatch,
        Email, Event, Future, Mutex, Notifier, NotifyError, Ordering, Pin, Slug, Utc,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use attendance_testing::mocks::FixedClock;
    /// use attendance_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::helpers::minutes(0))
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can advance the clock held by
    /// the code under test.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move forward by `by`
        pub fn advance(&self, by: chrono::Duration) {
            *self.time.lock().unwrap() += by;
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Notifier that records every delivered batch.
    ///
    /// Can be switched to failing mode to check that delivery errors never
    /// undo a persisted write.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingNotifier {
        batches: Arc<Mutex<Vec<(Slug, DeltaBatch)>>>,
        failing: Arc<AtomicBool>,
        attempts: Arc<AtomicUsize>,
    }

    impl RecordingNotifier {
        /// Create a notifier that accepts everything
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a notifier that rejects every batch
        #[must_use]
        pub fn failing() -> Self {
            let notifier = Self::default();
            notifier.set_failing(true);
            notifier
        }

        /// Switch failing mode on or off
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Delivered batches, in delivery order
        #[must_use]
        pub fn batches(&self) -> Vec<(Slug, DeltaBatch)> {
            self.batches.lock().unwrap().clone()
        }

        /// Delivered deltas, flattened in delivery order
        #[must_use]
        pub fn deltas(&self) -> Vec<Delta> {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .flat_map(|(_, batch)| batch.iter().cloned())
                .collect()
        }

        /// Number of delivered batches
        #[must_use]
        pub fn len(&self) -> usize {
            self.batches.lock().unwrap().len()
        }

        /// Whether nothing was delivered
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.batches.lock().unwrap().is_empty()
        }

        /// Delivery attempts, including rejected ones
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// Forget everything delivered so far
        pub fn clear(&self) {
            self.batches.lock().unwrap().clear();
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            target: Slug,
            batch: DeltaBatch,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            Box::pin(async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                if self.failing.load(Ordering::SeqCst) {
                    return Err(NotifyError::DeliveryFailed {
                        target,
                        reason: "notifier switched to failing mode".to_string(),
                    });
                }
                self.batches.lock().unwrap().push((target, batch));
                Ok(())
            })
        }
    }

    /// Admin predicate: the creator, listed event admins and any configured
    /// site admins.
    #[derive(Debug, Clone, Default)]
    pub struct StaticAdminPolicy {
        site_admins: BTreeSet<Email>,
    }

    impl StaticAdminPolicy {
        /// Policy with no site admins
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Grant `email` admin rights on every event
        #[must_use]
        pub fn with_site_admin(mut self, email: Email) -> Self {
            self.site_admins.insert(email);
            self
        }
    }

    impl AdminPolicy for StaticAdminPolicy {
        fn is_admin(&self, event: &Event, email: &Email) -> bool {
            self.site_admins.contains(email)
                || &event.creator_email == email
                || event.admins.contains(email)
        }
    }
}

/// Fixture builders.
pub mod helpers {
    #![allow(clippy::expect_used)] // Fixtures are built from literals
    #![allow(clippy::missing_panics_doc)]

    use super::{DateTime, Email, Event, Slug, Utc};
    use attendance_core::key::{AttendeeId, Version};
    use attendance_core::model::{Attendee, AttendeeStatus, EventSeries, RecurrenceInterval};
    use std::collections::BTreeSet;

    /// 2025-01-01T00:00:00Z plus `offset` minutes. All fixtures are built on
    /// this timeline.
    #[must_use]
    pub fn minutes(offset: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
            + chrono::Duration::minutes(offset)
    }

    /// 2025-01-01T00:00:00Z plus `offset` days.
    #[must_use]
    pub fn days(offset: i64) -> DateTime<Utc> {
        minutes(offset * 24 * 60)
    }

    /// Parse an email literal.
    #[must_use]
    pub fn email(raw: &str) -> Email {
        raw.parse().expect("fixture email should be valid")
    }

    /// A live event at version 1 with no attendees, a week after the
    /// fixture epoch.
    #[must_use]
    pub fn event(slug: &str, capacity: u32) -> Event {
        Event {
            slug: Slug::new(slug),
            name: format!("Event {slug}"),
            description: None,
            location: None,
            cover_image_url: None,
            event_date: days(7),
            timezone: "UTC".to_string(),
            capacity,
            attendees: Vec::new(),
            creator_email: email("host@example.com"),
            admins: BTreeSet::new(),
            series_slug: None,
            created_at: minutes(0),
            updated_at: minutes(0),
            deleted_at: None,
            version: Version::new(1),
        }
    }

    /// An event whose attendees joined one minute apart, in the given order.
    #[must_use]
    pub fn event_with(slug: &str, capacity: u32, attendees: &[(&str, AttendeeStatus)]) -> Event {
        let mut event = event(slug, capacity);
        event.attendees = (1_i64..)
            .zip(attendees)
            .map(|(minute, &(address, status))| Attendee {
                id: AttendeeId::new(),
                name: address.split('@').next().unwrap_or(address).to_string(),
                email: email(address),
                status,
                joined_at: minutes(minute),
            })
            .collect();
        event
    }

    /// A template event of `series` on `date`.
    #[must_use]
    pub fn occurrence(series: &EventSeries, date: DateTime<Utc>, capacity: u32) -> Event {
        let mut event = event(
            Slug::occurrence(&series.slug, date.date_naive()).as_str(),
            capacity,
        );
        event.event_date = date;
        event.series_slug = Some(series.slug.clone());
        event.creator_email = series.creator_email.clone();
        event
    }

    /// An auto-generating series at version 1.
    #[must_use]
    pub fn series(slug: &str, interval: RecurrenceInterval, lead_weeks: u32) -> EventSeries {
        EventSeries {
            slug: Slug::new(slug),
            name: format!("Series {slug}"),
            interval: Some(interval),
            lead_weeks,
            auto_generate: true,
            end_date: None,
            creator_email: email("host@example.com"),
            admins: BTreeSet::new(),
            created_at: minutes(0),
            updated_at: minutes(0),
            version: Version::new(1),
        }
    }
}

/// Install a `tracing` subscriber for tests, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// Re-export commonly used items
pub use memory_store::{InMemoryEventStore, InMemorySeriesStore, InMemoryStore};
pub use mocks::{FixedClock, ManualClock, RecordingNotifier, StaticAdminPolicy, test_clock};
pub use transition_test::TransitionTest;
