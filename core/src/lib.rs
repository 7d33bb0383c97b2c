//! # Attendance Core
//!
//! State transitions, change records and storage ports for capacity-limited
//! events.
//!
//! This crate is the functional core: every rule about who holds a seat and
//! who waits lives here as a pure function, and everything that touches the
//! outside world (storage, notification, authorization, time) is a trait the
//! runtime injects.
//!
//! ## Core Concepts
//!
//! - **Event**: one dated event with a capacity and a single ordered attendee list
//! - **Series**: recurrence template from which dated events are generated
//! - **Transition**: `(State, Input) → (State', Deltas)` computed without I/O
//! - **Delta**: versioned record of one change, delivered to subscribers in batches
//! - **Ports**: [`store::AggregateStore`], [`environment::Notifier`],
//!   [`environment::AdminPolicy`], [`environment::Clock`]
//!
//! ## Example
//!
//! ```
//! use attendance_core::attendance::{self, CreateEvent};
//! use attendance_core::key::Slug;
//! use attendance_core::model::NewAttendee;
//! use chrono::Utc;
//! use std::collections::BTreeSet;
//!
//! # fn main() -> Result<(), attendance_core::error::AttendanceError> {
//! let now = Utc::now();
//! let event = attendance::create_event(
//!     CreateEvent {
//!         slug: Slug::new("pottery"),
//!         name: "Pottery night".to_string(),
//!         capacity: 1,
//!         event_date: now,
//!         timezone: "Europe/Paris".to_string(),
//!         creator_email: "host@studio.fr".parse()?,
//!         series_slug: None,
//!         description: None,
//!         location: None,
//!         cover_image_url: None,
//!         admins: BTreeSet::new(),
//!     },
//!     now,
//! )?
//! .state;
//!
//! let ana = NewAttendee::new("Ana", "ana@x.fr".parse()?);
//! let joined = attendance::add_attendee(&event, ana, now)?;
//! assert_eq!(joined.state.confirmed_count(), 1);
//! assert_eq!(joined.deltas.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod attendance;
pub mod delta;
pub mod environment;
pub mod error;
pub mod key;
pub mod mirror;
pub mod model;
pub mod series;
pub mod store;

// Re-export commonly used types
pub use attendance::Transition;
pub use delta::{Change, Delta, DeltaBatch};
pub use error::{AttendanceError, NotifyError, StoreError};
pub use key::{AttendeeId, Email, Slug, Version};
pub use model::{Attendee, AttendeeStatus, Event, EventSeries, NewAttendee, RecurrenceInterval};
pub use smallvec::{SmallVec, smallvec};
